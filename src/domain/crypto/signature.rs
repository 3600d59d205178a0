use der::asn1::ObjectIdentifier;

use crate::domain::constants::*;
use crate::DigestAlgorithm;

/// Public key family a signature algorithm belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    Rsa,
    Ecdsa,
    Gost3410_2012_256,
    Gost3410_2012_512,
}

impl KeyFamily {
    /// Resolve the family of a `SubjectPublicKeyInfo` algorithm identifier.
    #[must_use]
    pub fn from_key_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [
            (OID_RSA_ENCRYPTION, KeyFamily::Rsa),
            (OID_EC_PUBLIC_KEY, KeyFamily::Ecdsa),
            (OID_GOST3410_2012_256, KeyFamily::Gost3410_2012_256),
            (OID_GOST3410_2012_512, KeyFamily::Gost3410_2012_512),
        ]
        .into_iter()
        .find(|(known, _)| known == oid)
        .map(|(_, family)| family)
    }

    #[must_use]
    pub fn is_gost(&self) -> bool {
        matches!(
            self,
            KeyFamily::Gost3410_2012_256 | KeyFamily::Gost3410_2012_512
        )
    }
}

const SIGNATURE_ALGORITHMS: &[(ObjectIdentifier, KeyFamily, Option<DigestAlgorithm>)] = &[
    (OID_RSA_ENCRYPTION, KeyFamily::Rsa, None),
    (OID_MD5_WITH_RSA, KeyFamily::Rsa, Some(DigestAlgorithm::Md5)),
    (OID_SHA1_WITH_RSA, KeyFamily::Rsa, Some(DigestAlgorithm::Sha1)),
    (OID_SHA224_WITH_RSA, KeyFamily::Rsa, Some(DigestAlgorithm::Sha224)),
    (OID_SHA256_WITH_RSA, KeyFamily::Rsa, Some(DigestAlgorithm::Sha256)),
    (OID_SHA384_WITH_RSA, KeyFamily::Rsa, Some(DigestAlgorithm::Sha384)),
    (OID_SHA512_WITH_RSA, KeyFamily::Rsa, Some(DigestAlgorithm::Sha512)),
    (OID_EC_PUBLIC_KEY, KeyFamily::Ecdsa, None),
    (OID_ECDSA_WITH_SHA1, KeyFamily::Ecdsa, Some(DigestAlgorithm::Sha1)),
    (OID_ECDSA_WITH_SHA224, KeyFamily::Ecdsa, Some(DigestAlgorithm::Sha224)),
    (OID_ECDSA_WITH_SHA256, KeyFamily::Ecdsa, Some(DigestAlgorithm::Sha256)),
    (OID_ECDSA_WITH_SHA384, KeyFamily::Ecdsa, Some(DigestAlgorithm::Sha384)),
    (OID_ECDSA_WITH_SHA512, KeyFamily::Ecdsa, Some(DigestAlgorithm::Sha512)),
    (OID_GOST3410_2012_256, KeyFamily::Gost3410_2012_256, None),
    (OID_GOST3410_2012_512, KeyFamily::Gost3410_2012_512, None),
    (
        OID_SIGNWITHDIGEST_GOST3410_2012_256,
        KeyFamily::Gost3410_2012_256,
        Some(DigestAlgorithm::Gost3411_2012_256),
    ),
    (
        OID_SIGNWITHDIGEST_GOST3410_2012_512,
        KeyFamily::Gost3410_2012_512,
        Some(DigestAlgorithm::Gost3411_2012_512),
    ),
];

/// Signature algorithm declared by a signer info.
///
/// `digest` is set when the identifier binds a hash (`sha256WithRSAEncryption`,
/// `ecdsa-with-SHA384`, GOST sign-with-digest); bare key identifiers leave the
/// hash to the signer info's digest algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureAlgorithm {
    pub family: KeyFamily,
    pub digest: Option<DigestAlgorithm>,
}

impl SignatureAlgorithm {
    #[must_use]
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        SIGNATURE_ALGORITHMS
            .iter()
            .find(|(known, _, _)| known == oid)
            .map(|&(_, family, digest)| Self { family, digest })
    }

    /// Whether this algorithm may be used with a signer info declaring `digest`.
    #[must_use]
    pub fn accepts_digest(&self, digest: DigestAlgorithm) -> bool {
        self.digest.map_or(true, |bound| bound == digest)
    }
}
