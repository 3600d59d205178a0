//! Error handling types and result definitions for verification and signing.

use thiserror::Error;

use crate::domain::session::SessionFailure;

/// Result type for verification and signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Comprehensive error types for verification and signing operations.
///
/// Semantic verification outcomes (content mismatch, invalid signature,
/// expired certificate) are not errors; they are reported through
/// [`crate::CertificateStatus`].
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SigningError {
    #[error("Malformed signature container: {0}")]
    #[diagnostic(help("expected a CMS/PKCS#7 SignedData object in DER, PEM or base64 form"))]
    MalformedContainer(String),

    #[error("Signature container has no signer info")]
    NoSignerInfo,

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("No signing certificate available")]
    #[diagnostic(help("the signature embeds no certificate; supply the signer's certificate file"))]
    MissingCertificate,

    #[error("Remote signing failed: {0}")]
    RemoteSigning(#[from] SessionFailure),

    #[error("Cryptographic error: {0}")]
    CryptographicError(String),

    #[error("ASN.1 encoding/decoding error: {0}")]
    Asn1Error(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl SigningError {
    /// Faults raised while decoding or checking structure; never retried.
    #[must_use]
    pub fn is_parse_fault(&self) -> bool {
        matches!(
            self,
            SigningError::MalformedContainer(_)
                | SigningError::NoSignerInfo
                | SigningError::UnsupportedAlgorithm(_)
                | SigningError::InvalidCertificate(_)
                | SigningError::MissingCertificate
        )
    }
}

impl From<der::Error> for SigningError {
    fn from(error: der::Error) -> Self {
        SigningError::Asn1Error(error.to_string())
    }
}

impl From<openssl::error::ErrorStack> for SigningError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        SigningError::CryptographicError(error.to_string())
    }
}

impl From<std::io::Error> for SigningError {
    fn from(error: std::io::Error) -> Self {
        SigningError::IoError(error.to_string())
    }
}

impl From<warp::Error> for SigningError {
    fn from(error: warp::Error) -> Self {
        SigningError::NetworkError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SigningError::MalformedContainer("truncated".to_string());
        assert_eq!(error.to_string(), "Malformed signature container: truncated");

        let error = SigningError::RemoteSigning(SessionFailure::SessionExpired);
        assert!(error.to_string().starts_with("Remote signing failed: "));
    }

    #[test]
    fn test_parse_fault_classification() {
        assert!(SigningError::NoSignerInfo.is_parse_fault());
        assert!(SigningError::InvalidCertificate("bad key".into()).is_parse_fault());
        assert!(!SigningError::RemoteSigning(SessionFailure::UserCancelled).is_parse_fault());
        assert!(!SigningError::IoError("gone".into()).is_parse_fault());
    }
}
