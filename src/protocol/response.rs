//! Server responses: OK, ERR, EOF and text result sets
//!
//! A result set is sent as a sequence of packets:
//!
//! ```text
//! column count | column def * N | EOF | row * M | EOF
//! ```
//!
//! Rows use the text protocol: each value is `0xFB` for NULL, otherwise a
//! length-encoded string of its text form.

use super::codec::{
    put_lenenc_int, put_lenenc_str, read_lenenc_bytes, read_lenenc_int, NULL_MARKER,
};
use super::packet::PacketChannel;
use super::{CHARSET_BINARY, CHARSET_UTF8, SQL_STATE};
use crate::error::{Error, Result};
use crate::storage::{Column, Row};
use byteorder::{LittleEndian, ReadBytesExt};
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};

/// First byte of an OK packet
pub const OK_HEADER: u8 = 0x00;

/// First byte of an EOF packet
pub const EOF_HEADER: u8 = 0xfe;

/// First byte of an ERR packet
pub const ERR_HEADER: u8 = 0xff;

/// Catalog name reported in column definitions
pub const CATALOG_NAME: &str = "def";

/// Schema name reported in column definitions
pub const SCHEMA_NAME: &str = "minisql";

/// Length of the fixed-size tail of a column definition
const COLUMN_FIXED_LEN: u8 = 0x0c;

/// Column type codes used in column definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColumnType {
    LongLong = 0x08,
    VarString = 0xfd,
}

/// Column flag: BINARY
const BINARY_FLAG: u16 = 0x0080;

/// Column flag: NUM (numeric column)
const NUM_FLAG: u16 = 0x8000;

/// Build an OK packet with zeroed counters
pub fn ok_packet() -> BytesMut {
    let mut buf = BytesMut::with_capacity(7);
    buf.put_u8(OK_HEADER);
    put_lenenc_int(&mut buf, 0); // affected rows
    put_lenenc_int(&mut buf, 0); // last insert id
    buf.put_u16_le(0); // status flags
    buf.put_u16_le(0); // warnings
    buf
}

/// Build an ERR packet
pub fn err_packet(code: u16, message: &str) -> BytesMut {
    let mut buf = BytesMut::with_capacity(9 + message.len());
    buf.put_u8(ERR_HEADER);
    buf.put_u16_le(code);
    buf.put_u8(b'#');
    buf.put_slice(SQL_STATE.as_bytes());
    buf.put_slice(message.as_bytes());
    buf
}

/// Build an EOF packet
pub fn eof_packet() -> BytesMut {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(EOF_HEADER);
    buf.put_u16_le(0); // warnings
    buf.put_u16_le(0); // status flags
    buf
}

/// Build the column definition packet for one column
pub fn column_definition(table: &str, column: &Column) -> BytesMut {
    let (column_type, charset, length, flags) = if column.is_integer() {
        (ColumnType::LongLong, CHARSET_BINARY, 20u32, BINARY_FLAG | NUM_FLAG)
    } else {
        (ColumnType::VarString, CHARSET_UTF8, 256u32, 0)
    };

    let mut buf = BytesMut::new();
    put_lenenc_str(&mut buf, CATALOG_NAME.as_bytes());
    put_lenenc_str(&mut buf, SCHEMA_NAME.as_bytes());
    put_lenenc_str(&mut buf, table.as_bytes()); // table
    put_lenenc_str(&mut buf, table.as_bytes()); // org_table
    put_lenenc_str(&mut buf, column.name.as_bytes()); // name
    put_lenenc_str(&mut buf, column.name.as_bytes()); // org_name
    buf.put_u8(COLUMN_FIXED_LEN);
    buf.put_u16_le(u16::from(charset));
    buf.put_u32_le(length);
    buf.put_u8(column_type as u8);
    buf.put_u16_le(flags);
    buf.put_u8(0); // decimals
    buf.put_u16_le(0); // filler
    buf
}

/// Build a text-protocol row packet
pub fn row_packet(row: &Row) -> BytesMut {
    let mut buf = BytesMut::new();
    for value in row.values() {
        match value.to_text() {
            Some(text) => put_lenenc_str(&mut buf, text.as_bytes()),
            None => buf.put_u8(NULL_MARKER),
        }
    }
    buf
}

/// Send an OK packet
pub async fn write_ok<S>(channel: &mut PacketChannel<S>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    channel.write_packet(&ok_packet()).await?;
    channel.flush().await
}

/// Send an ERR packet
pub async fn write_error<S>(channel: &mut PacketChannel<S>, code: u16, message: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    channel.write_packet(&err_packet(code, message)).await?;
    channel.flush().await
}

/// Send a complete text result set
pub async fn write_result_set<S>(
    channel: &mut PacketChannel<S>,
    table: &str,
    columns: &[Column],
    rows: &[Row],
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut count = BytesMut::new();
    put_lenenc_int(&mut count, columns.len() as u64);
    channel.write_packet(&count).await?;

    for column in columns {
        channel.write_packet(&column_definition(table, column)).await?;
    }
    channel.write_packet(&eof_packet()).await?;

    for row in rows {
        channel.write_packet(&row_packet(row)).await?;
    }
    channel.write_packet(&eof_packet()).await?;
    channel.flush().await
}

/// Whether a payload is an EOF packet (as opposed to a row starting with 0xFE)
pub fn is_eof_packet(payload: &[u8]) -> bool {
    payload.first() == Some(&EOF_HEADER) && payload.len() < 9
}

/// Decoded OK packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status: u16,
    pub warnings: u16,
}

/// Decode an OK packet
pub fn parse_ok(payload: &[u8]) -> Result<OkPacket> {
    let mut input = payload;
    let header = input
        .read_u8()
        .map_err(|_| Error::MalformedPacket("empty OK packet".to_string()))?;
    if header != OK_HEADER {
        return Err(Error::MalformedPacket(format!(
            "expected OK packet, got header 0x{:02x}",
            header
        )));
    }
    let affected_rows = read_lenenc_int(&mut input)?;
    let last_insert_id = read_lenenc_int(&mut input)?;
    let status = input.read_u16::<LittleEndian>().unwrap_or(0);
    let warnings = input.read_u16::<LittleEndian>().unwrap_or(0);
    Ok(OkPacket {
        affected_rows,
        last_insert_id,
        status,
        warnings,
    })
}

/// Decode an ERR packet into a [`Error::ServerError`]
pub fn parse_err(payload: &[u8]) -> Error {
    let mut input = payload;
    if input.read_u8().ok() != Some(ERR_HEADER) {
        return Error::MalformedPacket("expected ERR packet".to_string());
    }
    let code = match input.read_u16::<LittleEndian>() {
        Ok(code) => code,
        Err(_) => return Error::MalformedPacket("truncated ERR packet".to_string()),
    };
    let mut sql_state = SQL_STATE.to_string();
    if input.first() == Some(&b'#') && input.len() >= 6 {
        sql_state = String::from_utf8_lossy(&input[1..6]).into_owned();
        input = &input[6..];
    }
    Error::ServerError {
        code,
        sql_state,
        message: String::from_utf8_lossy(input).into_owned(),
    }
}

/// Decode the column name out of a column definition packet
pub fn parse_column_name(payload: &[u8]) -> Result<String> {
    let mut input = payload;
    for _ in 0..4 {
        read_lenenc_bytes(&mut input)?; // catalog, schema, table, org_table
    }
    let name = read_lenenc_bytes(&mut input)?;
    Ok(String::from_utf8_lossy(name).into_owned())
}

/// Decode a text-protocol row packet
pub fn parse_row(payload: &[u8], column_count: usize) -> Result<Vec<Option<String>>> {
    let mut input = payload;
    let mut values = Vec::with_capacity(column_count);
    for _ in 0..column_count {
        if input.first() == Some(&NULL_MARKER) {
            input = &input[1..];
            values.push(None);
        } else {
            let raw = read_lenenc_bytes(&mut input)?;
            values.push(Some(String::from_utf8_lossy(raw).into_owned()));
        }
    }
    if !input.is_empty() {
        return Err(Error::MalformedPacket(format!(
            "{} trailing byte(s) after row",
            input.len()
        )));
    }
    Ok(values)
}
