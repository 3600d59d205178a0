//! Foundational cryptographic domain types.
//!
//! Provides strongly-typed wrappers for cryptographic artifacts including:
//! - Digest values paired with the algorithm that produced them
//! - Certificate records extracted from embedded or external X.509 certificates
//! - Signature algorithm identifiers resolved to key family and bound hash
//!
//! Parsing of the enclosing CMS structures lives in the service layer.

mod cert;
mod digest_bytes;
mod hash;
mod signature;

pub use cert::{CertificateRecord, PublicKeyMaterial};
pub use digest_bytes::{DigestBytes, DigestBytesError};
pub use hash::compute_digest;
pub use signature::{KeyFamily, SignatureAlgorithm};

#[cfg(test)]
pub(crate) use cert::test_support;
