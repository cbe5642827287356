/// Chunk integrity digests.
///
/// MD5 is used for corruption detection only; the protocol never
/// relies on it for collision resistance or authenticity.

use md5::{Digest, Md5};

/// Computes the MD5 digest of `data` as 32 lowercase hex characters.
pub fn checksum(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
