//! Content hashing for stored packages.
//!
//! The package blob is hashed with blake3 when written and verified when
//! read back, so a corrupted row surfaces as an integrity error rather
//! than a broken download.

/// Returns the blake3 hex digest of a package blob.
pub fn package_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
