//! PKCS#7 / CMS `SignedData` domain model.
//!
//! A [`SignatureContainer`] is the immutable, decoded view of a detached (or
//! attached) signature. Decoding lives in [`crate::services::pkcs7`].

use std::fmt;
use std::time::SystemTime;

use der::asn1::ObjectIdentifier;

use crate::domain::crypto::{CertificateRecord, SignatureAlgorithm};
use crate::DigestAlgorithm;

pub mod attributes;

pub use attributes::SignedAttributes;

/// How a signer info names its certificate.
#[derive(Clone, PartialEq, Eq)]
pub enum SignerReference {
    IssuerAndSerial {
        /// Display form of the issuer name
        issuer: String,
        /// DER of the issuer `Name`
        issuer_der: Vec<u8>,
        serial: Vec<u8>,
    },
    SubjectKeyId(Vec<u8>),
}

impl SignerReference {
    /// Whether `cert` is the certificate this reference names.
    #[must_use]
    pub fn matches(&self, cert: &CertificateRecord) -> bool {
        match self {
            SignerReference::IssuerAndSerial {
                issuer_der, serial, ..
            } => cert.issuer_der() == issuer_der.as_slice() && cert.serial_bytes() == serial.as_slice(),
            SignerReference::SubjectKeyId(ski) => cert.subject_key_id() == Some(ski.as_slice()),
        }
    }
}

impl fmt::Debug for SignerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerReference::IssuerAndSerial { issuer, serial, .. } => {
                write!(f, "IssuerAndSerial({issuer}, {})", hex::encode_upper(serial))
            }
            SignerReference::SubjectKeyId(ski) => write!(f, "SubjectKeyId({})", hex::encode(ski)),
        }
    }
}

/// One decoded `SignerInfo`.
#[derive(Debug, Clone)]
pub struct SignerInfoEntry {
    pub signer: SignerReference,
    pub digest_algorithm: DigestAlgorithm,
    pub signature_algorithm: SignatureAlgorithm,
    pub signed_attributes: Option<SignedAttributes>,
    pub signature: Vec<u8>,
}

impl SignerInfoEntry {
    #[must_use]
    pub fn signing_time(&self) -> Option<SystemTime> {
        self.signed_attributes
            .as_ref()
            .and_then(SignedAttributes::signing_time)
    }
}

/// Decoded CMS `SignedData`.
///
/// Invariant: at least one signer info.
#[derive(Clone)]
pub struct SignatureContainer {
    digest_algorithms: Vec<ObjectIdentifier>,
    certificates: Vec<CertificateRecord>,
    signer_infos: Vec<SignerInfoEntry>,
    content_type: ObjectIdentifier,
    encapsulated_content: Option<Vec<u8>>,
    der: Vec<u8>,
}

impl SignatureContainer {
    /// Assemble a container; `None` when `signer_infos` is empty.
    #[must_use]
    pub fn new(
        digest_algorithms: Vec<ObjectIdentifier>,
        certificates: Vec<CertificateRecord>,
        signer_infos: Vec<SignerInfoEntry>,
        content_type: ObjectIdentifier,
        encapsulated_content: Option<Vec<u8>>,
        der: Vec<u8>,
    ) -> Option<Self> {
        if signer_infos.is_empty() {
            return None;
        }
        Some(Self {
            digest_algorithms,
            certificates,
            signer_infos,
            content_type,
            encapsulated_content,
            der,
        })
    }

    /// Digest algorithm identifiers listed at the `SignedData` level.
    #[must_use]
    pub fn digest_algorithms(&self) -> &[ObjectIdentifier] {
        &self.digest_algorithms
    }
    #[must_use]
    pub fn certificates(&self) -> &[CertificateRecord] {
        &self.certificates
    }
    #[must_use]
    pub fn signer_infos(&self) -> &[SignerInfoEntry] {
        &self.signer_infos
    }
    #[must_use]
    pub fn signer_info(&self, index: usize) -> Option<&SignerInfoEntry> {
        self.signer_infos.get(index)
    }
    #[must_use]
    pub fn content_type(&self) -> &ObjectIdentifier {
        &self.content_type
    }
    /// Content carried inside the container (attached mode only).
    #[must_use]
    pub fn encapsulated_content(&self) -> Option<&[u8]> {
        self.encapsulated_content.as_deref()
    }
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.encapsulated_content.is_none()
    }
    /// `signingTime` of the first signer, when present.
    #[must_use]
    pub fn signing_time(&self) -> Option<SystemTime> {
        self.signer_infos.first().and_then(SignerInfoEntry::signing_time)
    }
    /// DER of the outer `ContentInfo`.
    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Certificate that signed the signer info at `index`: the one its
    /// reference names, otherwise the first embedded certificate.
    #[must_use]
    pub fn signer_certificate(&self, index: usize) -> Option<&CertificateRecord> {
        let signer = self.signer_infos.get(index)?;
        self.certificates
            .iter()
            .find(|cert| signer.signer.matches(cert))
            .or_else(|| self.certificates.first())
    }
}

impl fmt::Debug for SignatureContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SignatureContainer(signers={}, certificates={}, detached={}, len={})",
            self.signer_infos.len(),
            self.certificates.len(),
            self.is_detached(),
            self.der.len()
        )
    }
}
