use std::fmt;
use std::time::SystemTime;

use der::asn1::{ObjectIdentifier, OctetString};
use der::{Decode, DecodePem, Encode, Tag, Tagged};
use x509_cert::name::Name;
use x509_cert::Certificate;

use crate::domain::constants::{OID_COMMON_NAME, OID_SUBJECT_KEY_IDENTIFIER};
use crate::infra::error::{SigningError, SigningResult};

/// Public key material of a certificate, kept raw for the verifier.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKeyMaterial {
    /// `SubjectPublicKeyInfo.algorithm.algorithm`
    pub algorithm: ObjectIdentifier,
    /// DER of the algorithm parameters, if any
    pub parameters: Option<Vec<u8>>,
    /// Contents of the `subjectPublicKey` BIT STRING
    pub key_bits: Vec<u8>,
    /// DER of the whole `SubjectPublicKeyInfo`
    pub spki_der: Vec<u8>,
}

impl fmt::Debug for PublicKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PublicKeyMaterial(alg={}, key_len={})",
            self.algorithm,
            self.key_bits.len()
        )
    }
}

/// Signer certificate as seen by the verifier.
///
/// Invariant: `not_before <= not_after`.
#[derive(Clone)]
pub struct CertificateRecord {
    serial: String,
    serial_bytes: Vec<u8>,
    subject: String,
    issuer: String,
    issuer_der: Vec<u8>,
    common_name: Option<String>,
    subject_key_id: Option<Vec<u8>>,
    not_before: SystemTime,
    not_after: SystemTime,
    public_key: PublicKeyMaterial,
    der: Box<[u8]>,
}

impl CertificateRecord {
    /// Build a record from a DER encoded X.509 certificate.
    pub fn from_der(der: &[u8]) -> SigningResult<Self> {
        let cert = Certificate::from_der(der)
            .map_err(|e| SigningError::InvalidCertificate(format!("undecodable certificate: {e}")))?;
        Self::from_certificate(&cert)
    }

    /// Build a record from certificate file contents, DER or PEM.
    pub fn from_bytes(bytes: &[u8]) -> SigningResult<Self> {
        let trimmed = trim_ascii_start(bytes);
        if trimmed.starts_with(b"-----BEGIN") {
            let cert = Certificate::from_pem(trimmed).map_err(|e| {
                SigningError::InvalidCertificate(format!("undecodable PEM certificate: {e}"))
            })?;
            Self::from_certificate(&cert)
        } else {
            Self::from_der(bytes)
        }
    }

    pub fn from_certificate(cert: &Certificate) -> SigningResult<Self> {
        let tbs = &cert.tbs_certificate;

        let not_before = tbs.validity.not_before.to_system_time();
        let not_after = tbs.validity.not_after.to_system_time();
        if not_before > not_after {
            return Err(SigningError::InvalidCertificate(
                "notBefore is later than notAfter".to_string(),
            ));
        }

        let spki = &tbs.subject_public_key_info;
        let parameters = spki
            .algorithm
            .parameters
            .as_ref()
            .map(Encode::to_der)
            .transpose()?;
        let public_key = PublicKeyMaterial {
            algorithm: spki.algorithm.oid,
            parameters,
            key_bits: spki.subject_public_key.raw_bytes().to_vec(),
            spki_der: spki.to_der()?,
        };

        let serial_bytes = tbs.serial_number.as_bytes().to_vec();
        let subject_key_id = tbs.extensions.as_ref().and_then(|exts| {
            exts.iter()
                .find(|ext| ext.extn_id == OID_SUBJECT_KEY_IDENTIFIER)
                .and_then(|ext| OctetString::from_der(ext.extn_value.as_bytes()).ok())
                .map(|ski| ski.as_bytes().to_vec())
        });

        Ok(Self {
            serial: format_serial(&serial_bytes),
            serial_bytes,
            subject: tbs.subject.to_string(),
            issuer: tbs.issuer.to_string(),
            issuer_der: tbs.issuer.to_der()?,
            common_name: common_name(&tbs.subject),
            subject_key_id,
            not_before,
            not_after,
            public_key,
            der: cert.to_der()?.into_boxed_slice(),
        })
    }

    /// Serial number as upper-case hex.
    #[must_use]
    pub fn serial(&self) -> &str {
        &self.serial
    }
    #[must_use]
    pub fn serial_bytes(&self) -> &[u8] {
        &self.serial_bytes
    }
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
    #[must_use]
    pub fn issuer_der(&self) -> &[u8] {
        &self.issuer_der
    }
    #[must_use]
    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }
    #[must_use]
    pub fn subject_key_id(&self) -> Option<&[u8]> {
        self.subject_key_id.as_deref()
    }
    #[must_use]
    pub fn not_before(&self) -> SystemTime {
        self.not_before
    }
    #[must_use]
    pub fn not_after(&self) -> SystemTime {
        self.not_after
    }
    #[must_use]
    pub fn public_key(&self) -> &PublicKeyMaterial {
        &self.public_key
    }
    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Display name: the subject CN when present, otherwise the full subject.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.common_name().unwrap_or(&self.subject)
    }
}

impl fmt::Debug for CertificateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CertificateRecord(serial={}, subject={}, len={})",
            self.serial,
            self.subject,
            self.der.len()
        )
    }
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

fn format_serial(bytes: &[u8]) -> String {
    // DER keeps a leading zero for positive serials with the high bit set
    let significant = match bytes {
        [0, rest @ ..] if !rest.is_empty() => rest,
        _ => bytes,
    };
    hex::encode_upper(significant)
}

fn common_name(name: &Name) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == OID_COMMON_NAME)
        .and_then(|atv| directory_string(atv.value.tag(), atv.value.value()))
}

fn directory_string(tag: Tag, value: &[u8]) -> Option<String> {
    match tag {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
            String::from_utf8(value.to_vec()).ok()
        }
        Tag::BmpString => {
            let units: Vec<u16> = value
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).ok()
        }
        _ => None,
    }
}
