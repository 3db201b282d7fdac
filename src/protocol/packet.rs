//! Packet framing
//!
//! Every packet is a 4-byte header followed by its payload:
//!
//! ```text
//! +----------------+----------+----------------------+
//! | payload length | sequence |       payload        |
//! +----------------+----------+----------------------+
//!   3 bytes LE       1 byte        length bytes
//! ```
//!
//! Payloads of `MAX_PAYLOAD_LEN` bytes or more are split into full-size
//! frames followed by a shorter (possibly empty) final frame. The sequence
//! number increments with every frame in either direction and wraps at 256.
//! A reassembled packet may not exceed the channel's `max_packet_size`.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};

/// Largest payload a single frame can carry
pub const MAX_PAYLOAD_LEN: usize = 0xff_ffff;

/// Size of the frame header
pub const HEADER_LEN: usize = 4;

/// Default limit on a reassembled packet (16 MiB)
pub const DEFAULT_MAX_PACKET_SIZE: usize = 16 * 1024 * 1024;

/// A framed, sequenced packet stream over one connection
#[derive(Debug)]
pub struct PacketChannel<S> {
    stream: BufStream<S>,
    sequence: u8,
    max_packet_size: usize,
}

impl<S> PacketChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a stream; the sequence starts at 0
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufStream::new(stream),
            sequence: 0,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }

    /// Set the largest packet `read_packet` will reassemble
    pub fn with_max_packet_size(mut self, max_packet_size: usize) -> Self {
        self.set_max_packet_size(max_packet_size);
        self
    }

    /// Change the limit on reassembled packets
    pub fn set_max_packet_size(&mut self, max_packet_size: usize) {
        self.max_packet_size = max_packet_size;
    }

    /// Largest packet `read_packet` will reassemble
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Sequence number expected on the next frame
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Start a new exchange
    pub fn reset_sequence(&mut self) {
        self.sequence = 0;
    }

    /// Read one logical packet, reassembling fragments
    pub async fn read_packet(&mut self) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        loop {
            let mut header = [0u8; HEADER_LEN];
            self.stream.read_exact(&mut header).await?;

            let length = LittleEndian::read_u24(&header[..3]) as usize;
            let sequence = header[3];
            if sequence != self.sequence {
                return Err(Error::PacketOutOfOrder {
                    expected: self.sequence,
                    found: sequence,
                });
            }
            self.sequence = self.sequence.wrapping_add(1);

            let start = payload.len();
            if start + length > self.max_packet_size {
                return Err(Error::MalformedPacket("packet too large".to_string()));
            }
            payload.resize(start + length, 0);
            self.stream.read_exact(&mut payload[start..]).await?;

            if length < MAX_PAYLOAD_LEN {
                return Ok(payload);
            }
        }
    }

    /// Queue one logical packet, fragmenting it if needed
    ///
    /// Nothing reaches the peer until [`PacketChannel::flush`] is called.
    pub async fn write_packet(&mut self, payload: &[u8]) -> Result<()> {
        for chunk in payload.chunks(MAX_PAYLOAD_LEN) {
            self.write_frame(chunk).await?;
        }
        // An empty payload, or one that filled its last frame exactly, ends
        // with an empty frame.
        if payload.len() % MAX_PAYLOAD_LEN == 0 {
            self.write_frame(&[]).await?;
        }
        Ok(())
    }

    async fn write_frame(&mut self, chunk: &[u8]) -> Result<()> {
        let mut header = [0u8; HEADER_LEN];
        LittleEndian::write_u24(&mut header[..3], chunk.len() as u32);
        header[3] = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        self.stream.write_all(&header).await?;
        self.stream.write_all(chunk).await?;
        Ok(())
    }

    /// Push queued packets to the peer
    pub async fn flush(&mut self) -> Result<()> {
        self.stream.flush().await?;
        Ok(())
    }

    /// Flush and close the write side of the stream
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
