//! Random identifiers for user ids and tokens.
//!
//! Identifiers are chosen by this service, never by the database, so inserts
//! can be conditioned on the natural key and a lost race is resolved by
//! reading back what was persisted.

use rand::{RngCore, rngs::OsRng};
use uuid::{Builder, Uuid};

/// Draw 128 random bits from the OS and shape them as a version-4 UUID.
///
/// # Errors
/// Returns the underlying `rand::Error` if the OS random source fails.
pub fn generate() -> Result<Uuid, rand::Error> {
    let mut bytes = [0u8; 16];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(Builder::from_random_bytes(bytes).into_uuid())
}
