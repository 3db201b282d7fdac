//! Challenge-response authentication (`mysql_native_password`)
//!
//! The server sends a random 20-byte scramble. The client answers with
//! `SHA1(password) XOR SHA1(scramble || SHA1(SHA1(password)))`, which the
//! server recomputes from the stored password. The password itself never
//! crosses the wire.

use indexmap::IndexMap;
use rand::rngs::OsRng;
use rand::Rng;
use sha1::{Digest, Sha1};

/// Length of the full scramble
pub const SCRAMBLE_LEN: usize = 20;

/// Length of the first scramble fragment in the greeting
pub const SCRAMBLE_PART1_LEN: usize = 8;

/// Name of the only authentication plugin offered
pub const AUTH_PLUGIN_NAME: &str = "mysql_native_password";

/// Random challenge bytes for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scramble([u8; SCRAMBLE_LEN]);

impl Scramble {
    /// Draw a fresh scramble from the OS random source
    ///
    /// Bytes are kept in 1..=127 so the NUL-terminated fragment in the
    /// greeting is never cut short.
    pub fn generate() -> Self {
        let mut rng = OsRng;
        let mut bytes = [0u8; SCRAMBLE_LEN];
        for b in bytes.iter_mut() {
            *b = rng.gen_range(1..=127);
        }
        Self(bytes)
    }

    /// Build a scramble from known bytes
    pub fn from_bytes(bytes: [u8; SCRAMBLE_LEN]) -> Self {
        Self(bytes)
    }

    /// Full 20-byte challenge
    pub fn as_bytes(&self) -> &[u8; SCRAMBLE_LEN] {
        &self.0
    }

    /// First fragment (8 bytes)
    pub fn part1(&self) -> &[u8] {
        &self.0[..SCRAMBLE_PART1_LEN]
    }

    /// Second fragment (12 bytes)
    pub fn part2(&self) -> &[u8] {
        &self.0[SCRAMBLE_PART1_LEN..]
    }
}

fn sha1(parts: &[&[u8]]) -> [u8; SCRAMBLE_LEN] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Compute the client's auth response for a password
///
/// An empty password yields an empty response.
pub fn scramble_password(scramble: &Scramble, password: &str) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let stage1 = sha1(&[password.as_bytes()]);
    let stage2 = sha1(&[stage1.as_slice()]);
    let digest = sha1(&[scramble.as_bytes().as_slice(), stage2.as_slice()]);
    stage1.iter().zip(digest.iter()).map(|(a, b)| a ^ b).collect()
}

/// Check a client's auth response against the stored password
pub fn verify_response(scramble: &Scramble, password: &str, response: &[u8]) -> bool {
    if password.is_empty() {
        return response.is_empty();
    }
    let expected = scramble_password(scramble, password);
    if expected.len() != response.len() {
        return false;
    }
    // Compare every byte regardless of where the first difference is.
    expected
        .iter()
        .zip(response)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Usernames and their passwords, loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    users: IndexMap<String, String>,
}

impl Credentials {
    /// Build a credential table
    pub fn new(users: IndexMap<String, String>) -> Self {
        Self { users }
    }

    /// Add or replace a user
    #[cfg(test)]
    pub fn with_user(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(user.into(), password.into());
        self
    }

    /// Stored password for a user
    pub fn password(&self, user: &str) -> Option<&str> {
        self.users.get(user).map(String::as_str)
    }

    /// Verify a login; unknown users always fail
    pub fn verify(&self, user: &str, scramble: &Scramble, response: &[u8]) -> bool {
        match self.password(user) {
            Some(password) => verify_response(scramble, password, response),
            None => false,
        }
    }

    /// Number of configured users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no users are configured
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
