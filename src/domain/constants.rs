//! Centralized object identifiers for the CMS, X.509 and algorithm
//! structures this crate understands.

use der::asn1::ObjectIdentifier;

// === CMS content types and attributes ===

/// PKCS#7 `SignedData` (1.2.840.113549.1.7.2)
pub const OID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");

/// PKCS#7 `data` (1.2.840.113549.1.7.1)
pub const OID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");

/// contentType signed attribute
pub const OID_CONTENT_TYPE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");

/// messageDigest signed attribute
pub const OID_MESSAGE_DIGEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");

/// signingTime signed attribute
pub const OID_SIGNING_TIME: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");

// === X.509 ===

/// commonName attribute type
pub const OID_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// subjectKeyIdentifier extension
pub const OID_SUBJECT_KEY_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.14");

// === Digest algorithms ===

pub const OID_MD5: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.2.5");
pub const OID_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
pub const OID_SHA224: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.4");
pub const OID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
pub const OID_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
pub const OID_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

/// GOST R 34.11-2012, 256-bit (id-tc26-gost3411-12-256)
pub const OID_GOST3411_2012_256: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.643.7.1.1.2.2");

/// GOST R 34.11-2012, 512-bit (id-tc26-gost3411-12-512)
pub const OID_GOST3411_2012_512: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.643.7.1.1.2.3");

// === Signature and public key algorithms ===

pub const OID_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
pub const OID_MD5_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.4");
pub const OID_SHA1_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
pub const OID_SHA224_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.14");
pub const OID_SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
pub const OID_SHA384_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
pub const OID_SHA512_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

pub const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
pub const OID_ECDSA_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");
pub const OID_ECDSA_WITH_SHA224: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.1");
pub const OID_ECDSA_WITH_SHA256: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
pub const OID_ECDSA_WITH_SHA384: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
pub const OID_ECDSA_WITH_SHA512: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

/// GOST R 34.10-2012 public key, 256-bit
pub const OID_GOST3410_2012_256: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.643.7.1.1.1.1");
/// GOST R 34.10-2012 public key, 512-bit
pub const OID_GOST3410_2012_512: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.643.7.1.1.1.2");
/// GOST R 34.10-2012 signature with GOST R 34.11-2012 (256)
pub const OID_SIGNWITHDIGEST_GOST3410_2012_256: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.643.7.1.1.3.2");
/// GOST R 34.10-2012 signature with GOST R 34.11-2012 (512)
pub const OID_SIGNWITHDIGEST_GOST3410_2012_512: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.643.7.1.1.3.3");

// === GOST curve parameter sets ===

pub const OID_CRYPTOPRO_A: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.643.2.2.35.1");
pub const OID_CRYPTOPRO_B: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.643.2.2.35.2");
pub const OID_CRYPTOPRO_C: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.643.2.2.35.3");
pub const OID_CRYPTOPRO_XCH_A: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.643.2.2.36.0");
pub const OID_CRYPTOPRO_XCH_B: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.643.2.2.36.1");
pub const OID_TC26_256_B: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.643.7.1.2.1.1.2");
pub const OID_TC26_256_C: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.643.7.1.2.1.1.3");
pub const OID_TC26_256_D: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.643.7.1.2.1.1.4");
pub const OID_TC26_512_A: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.643.7.1.2.1.2.1");
pub const OID_TC26_512_B: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.643.7.1.2.1.2.2");
