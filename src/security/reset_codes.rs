use rand::RngCore;
use sha2::{Digest, Sha256};

/// Length of the random portion of a reset code, in bytes (hex doubles it).
pub const RESET_CODE_BYTES: usize = 32;

/// Generates a single-use password reset code: 32 random bytes, hex encoded.
pub fn generate_reset_code() -> String {
    let mut code_bytes = [0u8; RESET_CODE_BYTES];
    rand::rng().fill_bytes(&mut code_bytes);
    hex::encode(code_bytes)
}

/// Hashes a reset code for storage. Only the digest is persisted, so a dump
/// of the security store cannot be replayed as live reset codes.
pub fn hash_reset_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}
