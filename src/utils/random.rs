// src/utils/random.rs
use rand::RngCore;
use rand::rngs::OsRng;

use crate::errors::{BackupError, Result};

/// Number of hex characters in the collision-avoidance token of an object key.
pub const TOKEN_HEX_LEN: usize = 32;

/// Returns `length` lowercase hex characters encoding `length / 2` bytes
/// from the operating system's secure random source.
///
/// Fails with [`BackupError::InvalidLength`] when `length` is odd or zero,
/// and with [`BackupError::RandomSource`] when the OS cannot supply entropy.
pub fn generate_random_hex(length: usize) -> Result<String> {
    if length == 0 || length % 2 != 0 {
        return Err(BackupError::InvalidLength(length));
    }

    let mut bytes = vec![0u8; length / 2];
    OsRng.try_fill_bytes(&mut bytes)?;

    Ok(hex::encode(bytes))
}
