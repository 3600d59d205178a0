//! sigstamp library
//!
//! Verification of detached CMS/PKCS#7 signatures (including GOST R 34.10-2012)
//! and browser-mediated remote signing sessions over a nonce-protected
//! loopback HTTP endpoint.

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use der::asn1::ObjectIdentifier;
use serde::{Deserialize, Serialize};

pub use adapters::browser::session::{
    SessionCanceller, SessionHandle, SessionManager, SessionSettings, SigningRequest,
};
pub use domain::crypto::{CertificateRecord, DigestBytes};
pub use domain::pkcs7::SignatureContainer;
pub use domain::session::SessionFailure;
pub use domain::verification::{CertificateStatus, VerificationResult};
pub use infra::error::{SigningError, SigningResult};
pub use pipelines::{BrowserSignWorkflow, VerifyWorkflow};
pub use services::status::ReferenceTime;

use domain::constants;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DigestAlgorithm {
    /// Legacy, verification only
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    /// GOST R 34.11-2012 (Streebog), 256-bit output
    Gost3411_2012_256,
    /// GOST R 34.11-2012 (Streebog), 512-bit output
    Gost3411_2012_512,
}

impl DigestAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha224 => "sha224",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
            DigestAlgorithm::Gost3411_2012_256 => "gost3411-2012-256",
            DigestAlgorithm::Gost3411_2012_512 => "gost3411-2012-512",
        }
    }

    pub fn digest_size(&self) -> usize {
        match self {
            DigestAlgorithm::Md5 => 16,
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha224 => 28,
            DigestAlgorithm::Sha256 | DigestAlgorithm::Gost3411_2012_256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 | DigestAlgorithm::Gost3411_2012_512 => 64,
        }
    }

    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Md5 => constants::OID_MD5,
            DigestAlgorithm::Sha1 => constants::OID_SHA1,
            DigestAlgorithm::Sha224 => constants::OID_SHA224,
            DigestAlgorithm::Sha256 => constants::OID_SHA256,
            DigestAlgorithm::Sha384 => constants::OID_SHA384,
            DigestAlgorithm::Sha512 => constants::OID_SHA512,
            DigestAlgorithm::Gost3411_2012_256 => constants::OID_GOST3411_2012_256,
            DigestAlgorithm::Gost3411_2012_512 => constants::OID_GOST3411_2012_512,
        }
    }

    /// Map a digest algorithm identifier to a supported algorithm.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [
            DigestAlgorithm::Md5,
            DigestAlgorithm::Sha1,
            DigestAlgorithm::Sha224,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
            DigestAlgorithm::Gost3411_2012_256,
            DigestAlgorithm::Gost3411_2012_512,
        ]
        .into_iter()
        .find(|alg| alg.oid() == *oid)
    }

    pub fn is_gost(&self) -> bool {
        matches!(
            self,
            DigestAlgorithm::Gost3411_2012_256 | DigestAlgorithm::Gost3411_2012_512
        )
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha1" | "sha-1" => Ok(DigestAlgorithm::Sha1),
            "sha224" | "sha-224" => Ok(DigestAlgorithm::Sha224),
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            "sha384" | "sha-384" => Ok(DigestAlgorithm::Sha384),
            "sha512" | "sha-512" => Ok(DigestAlgorithm::Sha512),
            "gost3411-2012-256" | "streebog256" | "id-tc26-gost3411-12-256" => {
                Ok(DigestAlgorithm::Gost3411_2012_256)
            }
            "gost3411-2012-512" | "streebog512" | "id-tc26-gost3411-12-512" => {
                Ok(DigestAlgorithm::Gost3411_2012_512)
            }
            other => ObjectIdentifier::new(other)
                .ok()
                .and_then(|oid| DigestAlgorithm::from_oid(&oid))
                .ok_or_else(|| {
                    SigningError::UnsupportedAlgorithm(format!("digest algorithm '{s}'"))
                }),
        }
    }
}

/// Verify a detached signature over `content_bytes`.
///
/// The signing certificate is taken from `external_certificate_bytes` (DER or
/// PEM) when given, otherwise from the certificates embedded in the container.
/// Semantic outcomes (tampered content, bad signature, expired certificate)
/// come back as a [`CertificateStatus`]; structural faults are errors.
pub fn verify_detached_signature(
    signature_bytes: &[u8],
    content_bytes: &[u8],
    external_certificate_bytes: Option<&[u8]>,
) -> SigningResult<CertificateStatus> {
    let report = VerifyWorkflow::new().run(
        signature_bytes,
        content_bytes,
        external_certificate_bytes,
    )?;
    Ok(report.status)
}

/// Run one browser signing session for an already computed content digest.
///
/// `on_ready` receives the page URL as soon as the loopback endpoint listens,
/// so the caller can open it in a browser. Resolves once the browser posts a
/// result, the session is cancelled, or `timeout` elapses.
pub async fn run_remote_signing_session<F>(
    content_digest: &[u8],
    digest_algorithm: DigestAlgorithm,
    timeout: Duration,
    on_ready: F,
) -> SigningResult<SignatureContainer>
where
    F: FnOnce(&str),
{
    let digest = DigestBytes::new(digest_algorithm, content_digest.to_vec())
        .map_err(|e| SigningError::InvalidInput(e.to_string()))?;
    let manager = SessionManager::new(SessionSettings::default());
    let handle = manager.start(SigningRequest::new(digest), timeout).await?;
    on_ready(&handle.url());
    handle.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_algorithm_properties() {
        assert_eq!(DigestAlgorithm::Sha256.as_str(), "sha256");
        assert_eq!(DigestAlgorithm::Sha256.digest_size(), 32);
        assert_eq!(DigestAlgorithm::Sha1.digest_size(), 20);
        assert_eq!(DigestAlgorithm::Gost3411_2012_512.digest_size(), 64);
        assert!(DigestAlgorithm::Gost3411_2012_256.is_gost());
        assert!(!DigestAlgorithm::Sha384.is_gost());
    }

    #[test]
    fn test_digest_algorithm_oid_lookup() {
        let oid = ObjectIdentifier::new_unwrap("1.2.643.7.1.1.2.2");
        assert_eq!(
            DigestAlgorithm::from_oid(&oid),
            Some(DigestAlgorithm::Gost3411_2012_256)
        );
        let md5 = ObjectIdentifier::new_unwrap("1.2.840.113549.2.5");
        assert_eq!(DigestAlgorithm::from_oid(&md5), Some(DigestAlgorithm::Md5));
        let md2 = ObjectIdentifier::new_unwrap("1.2.840.113549.2.2");
        assert_eq!(DigestAlgorithm::from_oid(&md2), None);
    }

    #[test]
    fn test_digest_algorithm_parsing() {
        assert_eq!(
            "SHA-256".parse::<DigestAlgorithm>().unwrap(),
            DigestAlgorithm::Sha256
        );
        assert_eq!(
            "streebog512".parse::<DigestAlgorithm>().unwrap(),
            DigestAlgorithm::Gost3411_2012_512
        );
        assert_eq!(
            "2.16.840.1.101.3.4.2.3".parse::<DigestAlgorithm>().unwrap(),
            DigestAlgorithm::Sha512
        );
        assert_eq!(
            "SHA-224".parse::<DigestAlgorithm>().unwrap(),
            DigestAlgorithm::Sha224
        );
        assert!(matches!(
            "md4".parse::<DigestAlgorithm>(),
            Err(SigningError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_remote_session_rejects_wrong_digest_length() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result = runtime.block_on(run_remote_signing_session(
            &[0u8; 20],
            DigestAlgorithm::Sha256,
            Duration::from_secs(1),
            |_| panic!("endpoint must not start for an invalid digest"),
        ));
        assert!(matches!(result, Err(SigningError::InvalidInput(_))));
    }
}
