//! Verification domain types for detached CMS signatures.
//!
//! The validator produces a [`VerificationResult`]; the status evaluator
//! folds it into a single [`CertificateStatus`]. Workflows wrap both in a
//! [`VerificationReport`] for display layers.

use std::fmt;
use std::time::SystemTime;

use crate::domain::crypto::{CertificateRecord, DigestBytes};
use crate::infra::error::SigningError;
use crate::DigestAlgorithm;

/// Digest recomputed over the content, paired with the digest the signer claims.
///
/// The computed digest always uses the signer info's digest algorithm.
#[derive(Debug, Clone)]
pub struct ContentBinding {
    pub computed: DigestBytes,
    pub claimed: Option<Vec<u8>>,
}

impl ContentBinding {
    /// True when a claimed digest is present and equals the computed one.
    #[must_use]
    pub fn matches(&self) -> bool {
        self.claimed
            .as_deref()
            .is_some_and(|claimed| claimed == self.computed.as_slice())
    }
}

/// Outcome of validating one signer info against content and certificate.
///
/// Each field represents a specific aspect of the verification process:
/// - `signature_crypto_valid`: the signature verifies under the certificate's key
/// - `content_matches`: the recomputed content digest equals `messageDigest`
/// - `signing_time`: the `signingTime` signed attribute, when present
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub signature_crypto_valid: bool,
    pub content_matches: bool,
    pub signing_time: Option<SystemTime>,
    pub certificate: CertificateRecord,
    /// Index of the signer info that was validated.
    pub signer_index: usize,
    /// Signer infos present in the container but not validated.
    pub additional_signers: usize,
    pub digest_algorithm: DigestAlgorithm,
}

/// User-facing status of a verified signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateStatus {
    Valid,
    Expired,
    ContentMismatch,
    SignatureInvalid,
    Error(String),
}

impl CertificateStatus {
    /// Status shown for a verification that aborted with a structural fault.
    #[must_use]
    pub fn from_fault(error: &SigningError) -> Self {
        CertificateStatus::Error(error.to_string())
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, CertificateStatus::Valid)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Valid => "valid",
            CertificateStatus::Expired => "expired",
            CertificateStatus::ContentMismatch => "content-mismatch",
            CertificateStatus::SignatureInvalid => "signature-invalid",
            CertificateStatus::Error(_) => "error",
        }
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateStatus::Valid => f.write_str("Signature valid"),
            CertificateStatus::Expired => f.write_str("Signature valid, certificate expired"),
            CertificateStatus::ContentMismatch => {
                f.write_str("Document does not match the signature")
            }
            CertificateStatus::SignatureInvalid => f.write_str("Signature invalid"),
            CertificateStatus::Error(reason) => write!(f, "Verification error: {reason}"),
        }
    }
}

/// Result of a verification workflow run.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub status: CertificateStatus,
    pub result: VerificationResult,
    /// Number of signer infos in the container.
    pub signer_count: usize,
}

impl VerificationReport {
    #[must_use]
    pub fn certificate(&self) -> &CertificateRecord {
        &self.result.certificate
    }

    #[must_use]
    pub fn signing_time(&self) -> Option<SystemTime> {
        self.result.signing_time
    }

    /// Overall success indicator.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_fault() {
        let status = CertificateStatus::from_fault(&SigningError::NoSignerInfo);
        assert_eq!(
            status,
            CertificateStatus::Error("Signature container has no signer info".to_string())
        );
        assert!(!status.is_valid());
        assert_eq!(status.as_str(), "error");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(CertificateStatus::Valid.to_string(), "Signature valid");
        assert_eq!(
            CertificateStatus::ContentMismatch.as_str(),
            "content-mismatch"
        );
    }
}
