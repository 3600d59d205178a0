use sha2::Digest;

use super::DigestBytes;
use crate::DigestAlgorithm;

/// Digest `data` with `algorithm`.
#[must_use]
pub fn compute_digest(algorithm: DigestAlgorithm, data: &[u8]) -> DigestBytes {
    let bytes = match algorithm {
        DigestAlgorithm::Md5 => md5::Md5::digest(data).to_vec(),
        DigestAlgorithm::Sha1 => sha1::Sha1::digest(data).to_vec(),
        DigestAlgorithm::Sha224 => sha2::Sha224::digest(data).to_vec(),
        DigestAlgorithm::Sha256 => sha2::Sha256::digest(data).to_vec(),
        DigestAlgorithm::Sha384 => sha2::Sha384::digest(data).to_vec(),
        DigestAlgorithm::Sha512 => sha2::Sha512::digest(data).to_vec(),
        DigestAlgorithm::Gost3411_2012_256 => streebog::Streebog256::digest(data).to_vec(),
        DigestAlgorithm::Gost3411_2012_512 => streebog::Streebog512::digest(data).to_vec(),
    };
    DigestBytes::computed(algorithm, bytes)
}
