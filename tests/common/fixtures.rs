//! Certificates and detached CMS signatures built with OpenSSL.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::BigNum;
use openssl::cms::{CMSOptions, CmsContentInfo};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509Builder, X509NameBuilder, X509};

pub const DAY: i64 = 86_400;

/// 2020-01-01T00:00:00Z
pub const EXPIRED_NOT_BEFORE: i64 = 1_577_836_800;
/// 2021-01-01T00:00:00Z
pub const EXPIRED_NOT_AFTER: i64 = 1_609_459_200;

/// 2099-12-31T23:59:59Z
pub const LONG_LIVED_NOT_AFTER: i64 = 4_102_444_799;

pub const DOCUMENT: &[u8] = b"%PDF-1.7\n1 0 obj << /Type /Catalog >> endobj\n%%EOF\n";

#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub enum KeyKind {
    Rsa,
    EcP256,
}

/// Key pair with a self-signed certificate.
pub struct TestSigner {
    pub cert: X509,
    pub key: PKey<Private>,
}

impl TestSigner {
    #[must_use]
    pub fn new(kind: KeyKind, common_name: &str, not_before: i64, not_after: i64) -> Self {
        let key = match kind {
            KeyKind::Rsa => PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap(),
            KeyKind::EcP256 => {
                let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
                PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
            }
        };

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", common_name).unwrap();
        name.append_entry_by_text("O", "sigstamp tests").unwrap();
        let name = name.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        let serial = Asn1Integer::from_bn(&BigNum::from_u32(0x01c0ffee).unwrap()).unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder
            .set_not_before(&Asn1Time::from_unix(not_before).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::from_unix(not_after).unwrap())
            .unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();

        Self {
            cert: builder.build(),
            key,
        }
    }

    /// RSA signer valid from yesterday for a year.
    #[must_use]
    pub fn current_rsa() -> Self {
        let now = unix_now();
        Self::new(KeyKind::Rsa, "Current Signer", now - DAY, now + 365 * DAY)
    }

    /// RSA signer whose certificate expired on 2021-01-01.
    #[must_use]
    pub fn expired_rsa() -> Self {
        Self::new(
            KeyKind::Rsa,
            "Expired Signer",
            EXPIRED_NOT_BEFORE,
            EXPIRED_NOT_AFTER,
        )
    }

    /// P-256 signer valid from yesterday for a year.
    #[must_use]
    pub fn current_ec() -> Self {
        let now = unix_now();
        Self::new(KeyKind::EcP256, "EC Signer", now - DAY, now + 365 * DAY)
    }

    /// RSA signer valid from yesterday through the end of 2099.
    #[must_use]
    pub fn long_lived_rsa() -> Self {
        Self::new(
            KeyKind::Rsa,
            "Long Lived Signer",
            unix_now() - DAY,
            LONG_LIVED_NOT_AFTER,
        )
    }

    #[must_use]
    pub fn cert_der(&self) -> Vec<u8> {
        self.cert.to_der().unwrap()
    }

    #[must_use]
    pub fn cert_pem(&self) -> Vec<u8> {
        self.cert.to_pem().unwrap()
    }

    /// Detached CMS signature over `content` with signed attributes.
    #[must_use]
    pub fn sign_detached(&self, content: &[u8], embed_certificate: bool) -> Vec<u8> {
        let mut flags = CMSOptions::DETACHED | CMSOptions::BINARY;
        if !embed_certificate {
            flags |= CMSOptions::CMS_NOCERTS;
        }
        CmsContentInfo::sign(Some(&self.cert), Some(&self.key), None, Some(content), flags)
            .unwrap()
            .to_der()
            .unwrap()
    }
}

/// PEM armour with the given label.
#[must_use]
pub fn to_pem(label: &str, der: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {label}-----\n");
    for chunk in encoded.as_bytes().chunks(64) {
        pem.push_str(std::str::from_utf8(chunk).unwrap());
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {label}-----\n"));
    pem
}

#[must_use]
pub fn to_base64(der: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(der)
}
