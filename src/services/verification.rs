//! Signature and content validation for one signer info of a CMS container.
//!
//! Cryptographic failures are results, not faults: a bad signature, a
//! malformed signature value or an algorithm mismatch all come back as
//! `signature_crypto_valid == false`. Only key material that cannot be
//! parsed aborts with `InvalidCertificate`.

use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Public};
use openssl::sign::Verifier;

use crate::domain::crypto::{compute_digest, CertificateRecord, KeyFamily};
use crate::domain::pkcs7::{SignatureContainer, SignerInfoEntry};
use crate::domain::verification::{ContentBinding, VerificationResult};
use crate::infra::error::{SigningError, SigningResult};
use crate::services::gost::GostPublicKey;
use crate::DigestAlgorithm;

/// Validates a selected signer info against content and a certificate.
pub struct SignatureValidator;

impl Default for SignatureValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureValidator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate signer info `signer_index` of `container` over `content`.
    ///
    /// Signer infos other than the selected one are counted in
    /// `additional_signers` and not validated.
    pub fn validate(
        &self,
        container: &SignatureContainer,
        signer_index: usize,
        content: &[u8],
        certificate: &CertificateRecord,
    ) -> SigningResult<VerificationResult> {
        let signer = container.signer_info(signer_index).ok_or_else(|| {
            SigningError::InvalidInput(format!(
                "signer index {signer_index} out of range ({} signer infos)",
                container.signer_infos().len()
            ))
        })?;

        let additional_signers = container.signer_infos().len() - 1;
        if additional_signers > 0 {
            log::warn!(
                "Container has {} signer infos; only signer {} is validated",
                additional_signers + 1,
                signer_index
            );
        }
        if !signer.signer.matches(certificate) {
            log::warn!(
                "Certificate {} ({}) is not the one referenced by signer {:?}",
                certificate.serial(),
                certificate.subject(),
                signer.signer
            );
        }

        let content_matches = self.check_content(container, signer, content);

        let signed_bytes = match &signer.signed_attributes {
            Some(attrs) => attrs.as_der(),
            None => container.encapsulated_content().unwrap_or(content),
        };
        let signature_crypto_valid = self.verify_signature(signer, certificate, signed_bytes)?;

        log::info!(
            "Signer {}: content {}, signature {}",
            signer_index,
            if content_matches { "matches" } else { "does not match" },
            if signature_crypto_valid {
                "valid"
            } else {
                "invalid"
            }
        );

        Ok(VerificationResult {
            signature_crypto_valid,
            content_matches,
            signing_time: signer.signing_time(),
            certificate: certificate.clone(),
            signer_index,
            additional_signers,
            digest_algorithm: signer.digest_algorithm,
        })
    }

    fn check_content(
        &self,
        container: &SignatureContainer,
        signer: &SignerInfoEntry,
        content: &[u8],
    ) -> bool {
        match &signer.signed_attributes {
            Some(attrs) => {
                let binding = ContentBinding {
                    computed: compute_digest(signer.digest_algorithm, content),
                    claimed: attrs.message_digest().map(<[u8]>::to_vec),
                };
                if binding.claimed.is_none() {
                    log::warn!("Signed attributes carry no messageDigest");
                } else {
                    log::debug!(
                        "Content {} digest: {}",
                        signer.digest_algorithm,
                        binding.computed.to_hex()
                    );
                }
                binding.matches()
            }
            // attached mode: the signature itself binds the content
            None => container
                .encapsulated_content()
                .map_or(true, |encapsulated| encapsulated == content),
        }
    }

    fn verify_signature(
        &self,
        signer: &SignerInfoEntry,
        certificate: &CertificateRecord,
        signed_bytes: &[u8],
    ) -> SigningResult<bool> {
        let algorithm = signer.signature_algorithm;
        if !algorithm.accepts_digest(signer.digest_algorithm) {
            log::debug!(
                "Signature algorithm binds {:?}, signer declares {}",
                algorithm.digest,
                signer.digest_algorithm
            );
            return Ok(false);
        }

        let key = certificate.public_key();
        let Some(key_family) = KeyFamily::from_key_oid(&key.algorithm) else {
            log::debug!("Unsupported certificate key algorithm {}", key.algorithm);
            return Ok(false);
        };
        if key_family != algorithm.family {
            log::debug!(
                "Key family {:?} does not match signature family {:?}",
                key_family,
                algorithm.family
            );
            return Ok(false);
        }

        match key_family {
            KeyFamily::Rsa | KeyFamily::Ecdsa => {
                let Some(md) = message_digest(signer.digest_algorithm) else {
                    return Ok(false);
                };
                let pkey = PKey::public_key_from_der(&key.spki_der).map_err(|e| {
                    SigningError::InvalidCertificate(format!("unreadable public key: {e}"))
                })?;
                Ok(openssl_verify(md, &pkey, signed_bytes, &signer.signature))
            }
            KeyFamily::Gost3410_2012_256 | KeyFamily::Gost3410_2012_512 => {
                let expected_digest = if key_family == KeyFamily::Gost3410_2012_512 {
                    DigestAlgorithm::Gost3411_2012_512
                } else {
                    DigestAlgorithm::Gost3411_2012_256
                };
                if signer.digest_algorithm != expected_digest {
                    return Ok(false);
                }
                let public_key = GostPublicKey::from_material(key)?;
                let digest = compute_digest(signer.digest_algorithm, signed_bytes);
                public_key.verify(digest.as_slice(), &signer.signature)
            }
        }
    }
}

fn message_digest(algorithm: DigestAlgorithm) -> Option<MessageDigest> {
    match algorithm {
        DigestAlgorithm::Md5 => Some(MessageDigest::md5()),
        DigestAlgorithm::Sha1 => Some(MessageDigest::sha1()),
        DigestAlgorithm::Sha224 => Some(MessageDigest::sha224()),
        DigestAlgorithm::Sha256 => Some(MessageDigest::sha256()),
        DigestAlgorithm::Sha384 => Some(MessageDigest::sha384()),
        DigestAlgorithm::Sha512 => Some(MessageDigest::sha512()),
        DigestAlgorithm::Gost3411_2012_256 | DigestAlgorithm::Gost3411_2012_512 => None,
    }
}

fn openssl_verify(md: MessageDigest, pkey: &PKey<Public>, data: &[u8], signature: &[u8]) -> bool {
    let result = Verifier::new(md, pkey).and_then(|mut verifier| {
        verifier.update(data)?;
        verifier.verify(signature)
    });
    match result {
        Ok(valid) => valid,
        Err(e) => {
            log::debug!("OpenSSL rejected the signature: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::time::Duration;

    use der::asn1::BitString;
    use der::{Any, Decode};
    use x509_cert::certificate::{TbsCertificate, Version};
    use x509_cert::name::Name;
    use x509_cert::serial_number::SerialNumber;
    use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
    use x509_cert::time::Validity;
    use x509_cert::Certificate;

    use super::*;
    use crate::domain::constants::*;
    use crate::domain::crypto::{PublicKeyMaterial, SignatureAlgorithm};
    use crate::domain::pkcs7::{SignedAttributes, SignerReference};
    use crate::services::gost::test_support::GostTestKey;

    const ATTRS_DER: &[u8] = &[0x31, 0x04, 0x04, 0x02, 0xca, 0xfe];

    /// Certificate carrying a GOST key; its own signature is never checked.
    fn gost_certificate(material: &PublicKeyMaterial) -> CertificateRecord {
        let name = Name::from_str("CN=GOST Test Signer").unwrap();
        let tbs = TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(&[0x42]).unwrap(),
            signature: AlgorithmIdentifierOwned {
                oid: OID_SIGNWITHDIGEST_GOST3410_2012_256,
                parameters: None,
            },
            issuer: name.clone(),
            validity: Validity::from_now(Duration::from_secs(3600)).unwrap(),
            subject: name,
            subject_public_key_info: SubjectPublicKeyInfoOwned {
                algorithm: AlgorithmIdentifierOwned {
                    oid: material.algorithm,
                    parameters: material
                        .parameters
                        .as_deref()
                        .map(|p| Any::from_der(p).unwrap()),
                },
                subject_public_key: BitString::from_bytes(&material.key_bits).unwrap(),
            },
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: None,
        };
        let cert = Certificate {
            tbs_certificate: tbs,
            signature_algorithm: AlgorithmIdentifierOwned {
                oid: OID_SIGNWITHDIGEST_GOST3410_2012_256,
                parameters: None,
            },
            signature: BitString::from_bytes(&[0u8; 64]).unwrap(),
        };
        CertificateRecord::from_certificate(&cert).unwrap()
    }

    fn gost_container(
        key: &GostTestKey,
        cert: &CertificateRecord,
        content: &[u8],
        digest_algorithm: DigestAlgorithm,
        signature_oid: der::asn1::ObjectIdentifier,
    ) -> SignatureContainer {
        let message_digest = compute_digest(digest_algorithm, content).into_vec();
        let attrs_digest = compute_digest(digest_algorithm, ATTRS_DER);
        let entry = SignerInfoEntry {
            signer: SignerReference::IssuerAndSerial {
                issuer: cert.issuer().to_string(),
                issuer_der: cert.issuer_der().to_vec(),
                serial: cert.serial_bytes().to_vec(),
            },
            digest_algorithm,
            signature_algorithm: SignatureAlgorithm::from_oid(&signature_oid).unwrap(),
            signed_attributes: Some(SignedAttributes::new(
                ATTRS_DER.to_vec(),
                Some(message_digest),
                None,
                None,
                1,
            )),
            signature: key.sign(attrs_digest.as_slice()),
        };
        SignatureContainer::new(
            vec![digest_algorithm.oid()],
            vec![cert.clone()],
            vec![entry],
            OID_DATA,
            None,
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_gost_256_detached_signature() {
        let key = GostTestKey::generate(OID_CRYPTOPRO_A);
        let cert = gost_certificate(&key.material);
        let content = [0u8; 32];
        let container = gost_container(
            &key,
            &cert,
            &content,
            DigestAlgorithm::Gost3411_2012_256,
            OID_SIGNWITHDIGEST_GOST3410_2012_256,
        );

        let validator = SignatureValidator::new();
        let result = validator.validate(&container, 0, &content, &cert).unwrap();
        assert!(result.signature_crypto_valid);
        assert!(result.content_matches);
        assert_eq!(result.additional_signers, 0);
        assert_eq!(result.digest_algorithm, DigestAlgorithm::Gost3411_2012_256);

        let mut flipped = content;
        flipped[0] ^= 0x01;
        let result = validator.validate(&container, 0, &flipped, &cert).unwrap();
        assert!(!result.content_matches);
        assert!(result.signature_crypto_valid);
    }

    #[test]
    fn test_gost_512_with_bare_key_identifier() {
        let key = GostTestKey::generate(OID_TC26_512_B);
        let cert = gost_certificate(&key.material);
        let container = gost_container(
            &key,
            &cert,
            b"document",
            DigestAlgorithm::Gost3411_2012_512,
            OID_GOST3410_2012_512,
        );
        let result = SignatureValidator::new()
            .validate(&container, 0, b"document", &cert)
            .unwrap();
        assert!(result.signature_crypto_valid);
        assert!(result.content_matches);
    }

    #[test]
    fn test_wrong_key_is_invalid_not_fault() {
        let key = GostTestKey::generate(OID_CRYPTOPRO_B);
        let cert = gost_certificate(&key.material);
        let other = GostTestKey::generate(OID_CRYPTOPRO_B);
        let other_cert = gost_certificate(&other.material);
        let container = gost_container(
            &key,
            &cert,
            b"data",
            DigestAlgorithm::Gost3411_2012_256,
            OID_SIGNWITHDIGEST_GOST3410_2012_256,
        );
        let result = SignatureValidator::new()
            .validate(&container, 0, b"data", &other_cert)
            .unwrap();
        assert!(!result.signature_crypto_valid);
        assert!(result.content_matches);
    }

    #[test]
    fn test_digest_mismatch_with_signature_algorithm() {
        let key = GostTestKey::generate(OID_CRYPTOPRO_A);
        let cert = gost_certificate(&key.material);
        // GOST-256 signature algorithm bound to the 256-bit digest, signer declares SHA-256
        let container = gost_container(
            &key,
            &cert,
            b"data",
            DigestAlgorithm::Sha256,
            OID_SIGNWITHDIGEST_GOST3410_2012_256,
        );
        let result = SignatureValidator::new()
            .validate(&container, 0, b"data", &cert)
            .unwrap();
        assert!(!result.signature_crypto_valid);
        assert!(result.content_matches);
    }

    #[test]
    fn test_signer_index_out_of_range() {
        let key = GostTestKey::generate(OID_CRYPTOPRO_A);
        let cert = gost_certificate(&key.material);
        let container = gost_container(
            &key,
            &cert,
            b"data",
            DigestAlgorithm::Gost3411_2012_256,
            OID_SIGNWITHDIGEST_GOST3410_2012_256,
        );
        assert!(matches!(
            SignatureValidator::new().validate(&container, 1, b"data", &cert),
            Err(SigningError::InvalidInput(_))
        ));
    }
}
