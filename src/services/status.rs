//! Certificate status evaluation.
//!
//! Rules, first match wins:
//! 1. content does not match the signed digest -> `ContentMismatch`
//! 2. signature does not verify -> `SignatureInvalid`
//! 3. reference time is past the certificate's `notAfter` -> `Expired`
//! 4. otherwise -> `Valid`
//!
//! Content integrity is checked first so a tampered document is never
//! reported merely as expired.

use std::time::SystemTime;

use crate::domain::verification::{CertificateStatus, VerificationResult};

/// Point in time certificate validity is judged at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTime {
    /// Wall clock at evaluation
    Now,
    /// The signer's `signingTime`, falling back to the wall clock when absent
    SigningTime,
    /// An explicit instant
    At(SystemTime),
}

impl ReferenceTime {
    /// Resolve to an instant for `result`.
    #[must_use]
    pub fn resolve(&self, result: &VerificationResult) -> SystemTime {
        match self {
            ReferenceTime::Now => SystemTime::now(),
            ReferenceTime::SigningTime => result.signing_time.unwrap_or_else(|| {
                log::info!("No signingTime attribute, judging validity as of now");
                SystemTime::now()
            }),
            ReferenceTime::At(instant) => *instant,
        }
    }
}

impl Default for ReferenceTime {
    fn default() -> Self {
        ReferenceTime::Now
    }
}

/// Derive the status of `result` as of `now`.
#[must_use]
pub fn evaluate(result: &VerificationResult, now: SystemTime) -> CertificateStatus {
    if !result.content_matches {
        CertificateStatus::ContentMismatch
    } else if !result.signature_crypto_valid {
        CertificateStatus::SignatureInvalid
    } else if now > result.certificate.not_after() {
        CertificateStatus::Expired
    } else {
        CertificateStatus::Valid
    }
}

/// Derive the status of `result` as of `reference`.
#[must_use]
pub fn evaluate_as_of(result: &VerificationResult, reference: ReferenceTime) -> CertificateStatus {
    let status = evaluate(result, reference.resolve(result));
    log::debug!("Certificate status ({reference:?}): {}", status.as_str());
    status
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::domain::crypto::test_support::ec_certificate_der;
    use crate::domain::crypto::CertificateRecord;
    use crate::DigestAlgorithm;

    const NOT_BEFORE: i64 = 1_600_000_000;
    const NOT_AFTER: i64 = 1_700_000_000;

    fn result(content_matches: bool, signature_crypto_valid: bool) -> VerificationResult {
        let der = ec_certificate_der(NOT_BEFORE, NOT_AFTER);
        VerificationResult {
            signature_crypto_valid,
            content_matches,
            signing_time: Some(at(NOT_AFTER - 100)),
            certificate: CertificateRecord::from_der(&der).unwrap(),
            signer_index: 0,
            additional_signers: 0,
            digest_algorithm: DigestAlgorithm::Sha256,
        }
    }

    fn at(secs: i64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(u64::try_from(secs).unwrap())
    }

    #[test]
    fn test_precedence() {
        let inside = at(NOT_BEFORE + 10);
        let after = at(NOT_AFTER + 10);

        assert_eq!(evaluate(&result(true, true), inside), CertificateStatus::Valid);
        assert_eq!(evaluate(&result(true, true), after), CertificateStatus::Expired);
        assert_eq!(
            evaluate(&result(true, false), after),
            CertificateStatus::SignatureInvalid
        );
        // a tampered document is never reported as merely expired
        assert_eq!(
            evaluate(&result(false, false), after),
            CertificateStatus::ContentMismatch
        );
        assert_eq!(
            evaluate(&result(false, true), inside),
            CertificateStatus::ContentMismatch
        );
    }

    #[test]
    fn test_not_after_boundary_is_inclusive() {
        assert_eq!(
            evaluate(&result(true, true), at(NOT_AFTER)),
            CertificateStatus::Valid
        );
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let result = result(true, true);
        let now = at(NOT_AFTER + 1);
        assert_eq!(evaluate(&result, now), evaluate(&result, now));
    }

    #[test]
    fn test_reference_times() {
        let result = result(true, true);
        // the certificate expired long before the wall clock
        assert_eq!(
            evaluate_as_of(&result, ReferenceTime::Now),
            CertificateStatus::Expired
        );
        assert_eq!(
            evaluate_as_of(&result, ReferenceTime::SigningTime),
            CertificateStatus::Valid
        );
        assert_eq!(
            evaluate_as_of(&result, ReferenceTime::At(at(NOT_BEFORE))),
            CertificateStatus::Valid
        );

        let mut unsigned_time = result;
        unsigned_time.signing_time = None;
        assert_eq!(
            evaluate_as_of(&unsigned_time, ReferenceTime::SigningTime),
            CertificateStatus::Expired
        );
    }
}
