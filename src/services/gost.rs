//! GOST R 34.10-2012 signature verification.
//!
//! OpenSSL builds without the GOST engine do not know these curves, so the
//! verification equation is evaluated directly with OpenSSL big-number and
//! prime-curve arithmetic over the published parameter sets.
//!
//! Encoding conventions (RFC 4491 / RFC 7091 as used by CryptoPro):
//! - the public key is an OCTET STRING holding `X || Y`, each little-endian
//! - the signature value is `s || r`, each big-endian
//! - the digest is read as a little-endian integer

use der::asn1::{ObjectIdentifier, OctetString};
use der::{Decode, Sequence};
use openssl::bn::{BigNum, BigNumContext, BigNumRef};
use openssl::ec::{EcGroup, EcPoint, PointConversionForm};

use crate::domain::constants::*;
use crate::domain::crypto::{KeyFamily, PublicKeyMaterial};
use crate::infra::error::{SigningError, SigningResult};

/// Prime-field curve in short Weierstrass form, hex encoded.
struct CurveParams {
    name: &'static str,
    oids: &'static [ObjectIdentifier],
    p: &'static str,
    a: &'static str,
    b: &'static str,
    q: &'static str,
    x: &'static str,
    y: &'static str,
}

const CURVES: &[CurveParams] = &[
    CurveParams {
        name: "CryptoPro-A",
        oids: &[OID_CRYPTOPRO_A, OID_CRYPTOPRO_XCH_A, OID_TC26_256_B],
        p: "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFD97",
        a: "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFD94",
        b: "A6",
        q: "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF6C611070995AD10045841B09B761B893",
        x: "01",
        y: "8D91E471E0989CDA27DF505A453F2B7635294F2DDF23E3B122ACC99C9E9F1E14",
    },
    CurveParams {
        name: "CryptoPro-B",
        oids: &[OID_CRYPTOPRO_B, OID_TC26_256_C],
        p: "8000000000000000000000000000000000000000000000000000000000000C99",
        a: "8000000000000000000000000000000000000000000000000000000000000C96",
        b: "3E1AF419A269A5F866A7D3C25C3DF80AE979259373FF2B182F49D4CE7E1BBC8B",
        q: "800000000000000000000000000000015F700CFFF1A624E5E497161BCC8A198F",
        x: "01",
        y: "3FA8124359F96680B83D1C3EB2C070E5C545C9858D03ECFB744BF8D717717EFC",
    },
    CurveParams {
        name: "CryptoPro-C",
        oids: &[OID_CRYPTOPRO_C, OID_CRYPTOPRO_XCH_B, OID_TC26_256_D],
        p: "9B9F605F5A858107AB1EC85E6B41C8AACF846E86789051D37998F7B9022D759B",
        a: "9B9F605F5A858107AB1EC85E6B41C8AACF846E86789051D37998F7B9022D7598",
        b: "805A",
        q: "9B9F605F5A858107AB1EC85E6B41C8AA582CA3511EDDFB74F02F3A6598980BB9",
        x: "00",
        y: "41ECE55743711A8C3CBF3783CD08C0EE4D4DC440D4641A8F366E550DFDB3BB67",
    },
    CurveParams {
        name: "tc26-512-A",
        oids: &[OID_TC26_512_A],
        p: "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFDC7",
        a: "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFDC4",
        b: "E8C2505DEDFC86DDC1BD0B2B6667F1DA34B82574761CB0E879BD081CFD0B6265EE3CB090F30D27614CB4574010DA90DD862EF9D4EBEE4761503190785A71C760",
        q: "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF27E69532F48D89116FF22B8D4E0560609B4B38ABFAD2B85DCACDB1411F10B275",
        x: "03",
        y: "7503CFE87A836AE3A61B8816E25450E6CE5E1C93ACF1ABC1778064FDCBEFA921DF1626BE4FD036E93D75E6A50E3A41E98028FE5FC235F5B889A589CB5215F2A4",
    },
    CurveParams {
        name: "tc26-512-B",
        oids: &[OID_TC26_512_B],
        p: "8000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000006F",
        a: "8000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000006C",
        b: "687D1B459DC841457E3E06CF6F5E2517B97C7D614AF138BCBF85DC806C4B289F3E965D2DB1416D217F8B276FAD1AB69C50F78BEE1FA3106EFB8CCBC7C5140116",
        q: "800000000000000000000000000000000000000000000000000000000000000149A1EC142565A545ACFDB77BD9D40CFA8B996712101BEA0EC6346C54374F25BD",
        x: "02",
        y: "1A8F7EDA389B094C2C071E3647A8940F3C123B697578C213BE6DD9E6C8EC7335DCB228FD1EDF4A39152CBCAAF8C0398828041055F94CEEEC7E21340780FE41BD",
    },
];

/// `GostR3410-2012-PublicKeyParameters`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub(crate) struct GostKeyParameters {
    pub public_key_param_set: ObjectIdentifier,
    pub digest_param_set: Option<ObjectIdentifier>,
    pub encryption_param_set: Option<ObjectIdentifier>,
}

/// Instantiated curve with its order and base point.
/// Group with its generator and order installed.
struct Curve {
    group: EcGroup,
    order: BigNum,
    /// Coordinate size in bytes (32 or 64)
    size: usize,
}

impl Curve {
    fn from_params(params: &CurveParams, ctx: &mut BigNumContext) -> SigningResult<Self> {
        let p = BigNum::from_hex_str(params.p)?;
        let size = usize::try_from(p.num_bytes()).unwrap_or_default();
        let mut group = EcGroup::from_components(
            p,
            BigNum::from_hex_str(params.a)?,
            BigNum::from_hex_str(params.b)?,
            ctx,
        )?;
        let gx: BigNum = BigNum::from_hex_str(params.x)?;
        let gy: BigNum = BigNum::from_hex_str(params.y)?;
        let generator = point_from_coordinates(
            &group,
            &gx,
            &gy,
            size,
            ctx,
        )?;
        let order = BigNum::from_hex_str(params.q)?;
        // every supported parameter set has cofactor 1
        group.set_generator(generator, order.to_owned()?, BigNum::from_u32(1)?)?;
        Ok(Self { group, order, size })
    }
}

/// GOST R 34.10-2012 public key bound to its curve.
pub struct GostPublicKey {
    curve: Curve,
    curve_name: &'static str,
    point: EcPoint,
}

impl std::fmt::Debug for GostPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GostPublicKey(curve={}, bits={})",
            self.curve_name,
            self.curve.size * 8
        )
    }
}

impl GostPublicKey {
    /// Load a key from certificate public key material.
    ///
    /// Fails with `InvalidCertificate` when the parameters or key bits cannot
    /// be decoded, the parameter set is unknown, or the point is not on the curve.
    pub fn from_material(material: &PublicKeyMaterial) -> SigningResult<Self> {
        let family = KeyFamily::from_key_oid(&material.algorithm)
            .filter(KeyFamily::is_gost)
            .ok_or_else(|| {
                SigningError::InvalidCertificate(format!(
                    "{} is not a GOST R 34.10-2012 key",
                    material.algorithm
                ))
            })?;

        let parameters = material.parameters.as_deref().ok_or_else(|| {
            SigningError::InvalidCertificate("GOST key without parameters".to_string())
        })?;
        let parameters = GostKeyParameters::from_der(parameters).map_err(|e| {
            SigningError::InvalidCertificate(format!("GOST key parameters: {e}"))
        })?;
        let curve_params = CURVES
            .iter()
            .find(|c| c.oids.contains(&parameters.public_key_param_set))
            .ok_or_else(|| {
                SigningError::InvalidCertificate(format!(
                    "unsupported GOST parameter set {}",
                    parameters.public_key_param_set
                ))
            })?;

        let mut ctx = BigNumContext::new()?;
        let curve = Curve::from_params(curve_params, &mut ctx)?;
        let expected_size = match family {
            KeyFamily::Gost3410_2012_512 => 64,
            _ => 32,
        };
        if curve.size != expected_size {
            return Err(SigningError::InvalidCertificate(format!(
                "parameter set {} does not match a {}-bit key",
                curve_params.name,
                expected_size * 8
            )));
        }

        let key = OctetString::from_der(&material.key_bits)
            .map_err(|e| SigningError::InvalidCertificate(format!("GOST public key: {e}")))?;
        let key = key.as_bytes();
        if key.len() != 2 * curve.size {
            return Err(SigningError::InvalidCertificate(format!(
                "GOST public key is {} bytes, expected {}",
                key.len(),
                2 * curve.size
            )));
        }
        let (x_le, y_le) = key.split_at(curve.size);
        let x = BigNum::from_slice(&reversed(x_le))?;
        let y = BigNum::from_slice(&reversed(y_le))?;
        let point = point_from_coordinates(&curve.group, &x, &y, curve.size, &mut ctx)
            .map_err(|_| {
                SigningError::InvalidCertificate("GOST public key is not on the curve".to_string())
            })?;

        log::debug!("Loaded GOST public key on {}", curve_params.name);
        Ok(Self {
            curve,
            curve_name: curve_params.name,
            point,
        })
    }

    /// Coordinate size in bytes; signatures are twice this long.
    #[must_use]
    pub fn size(&self) -> usize {
        self.curve.size
    }

    /// Check `signature` (`s || r`) over a precomputed digest.
    ///
    /// A malformed or non-verifying signature yields `Ok(false)`; errors are
    /// reserved for failures of the arithmetic backend.
    pub fn verify(&self, digest: &[u8], signature: &[u8]) -> SigningResult<bool> {
        let size = self.curve.size;
        if signature.len() != 2 * size {
            log::debug!(
                "GOST signature is {} bytes, expected {}",
                signature.len(),
                2 * size
            );
            return Ok(false);
        }
        let q = &self.curve.order;
        let s = BigNum::from_slice(&signature[..size])?;
        let r = BigNum::from_slice(&signature[size..])?;
        if !in_range(&r, q) || !in_range(&s, q) {
            return Ok(false);
        }

        let mut ctx = BigNumContext::new()?;
        let e = digest_scalar(digest, q, &mut ctx)?;

        let mut v = BigNum::new()?;
        v.mod_inverse(&e, q, &mut ctx)?;
        let mut z1 = BigNum::new()?;
        z1.mod_mul(&s, &v, q, &mut ctx)?;
        let mut minus_r = BigNum::new()?;
        minus_r.checked_sub(q, &r)?;
        let mut z2 = BigNum::new()?;
        z2.mod_mul(&minus_r, &v, q, &mut ctx)?;

        // C = z1 * G + z2 * Q
        let group = &self.curve.group;
        let mut c = EcPoint::new(group)?;
        c.mul_full(group, &z1, &self.point, &z2, &mut ctx)?;
        if c.is_infinity(group) {
            return Ok(false);
        }

        let x = x_coordinate(group, &c, size, &mut ctx)?;
        let mut big_r = BigNum::new()?;
        big_r.nnmod(&x, q, &mut ctx)?;
        Ok(big_r == r)
    }
}

fn in_range(value: &BigNumRef, order: &BigNumRef) -> bool {
    value.num_bits() > 0 && value < order
}

/// `e = LE(digest) mod q`, replaced by 1 when zero.
fn digest_scalar(digest: &[u8], q: &BigNumRef, ctx: &mut BigNumContext) -> SigningResult<BigNum> {
    let alpha = BigNum::from_slice(&reversed(digest))?;
    let mut e = BigNum::new()?;
    e.nnmod(&alpha, q, ctx)?;
    if e.num_bits() == 0 {
        e = BigNum::from_u32(1)?;
    }
    Ok(e)
}

fn reversed(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().copied().collect()
}

fn point_from_coordinates(
    group: &EcGroup,
    x: &BigNumRef,
    y: &BigNumRef,
    size: usize,
    ctx: &mut BigNumContext,
) -> SigningResult<EcPoint> {
    let size_i32 = i32::try_from(size)
        .map_err(|_| SigningError::CryptographicError("curve size out of range".to_string()))?;
    let mut encoded = Vec::with_capacity(1 + 2 * size);
    encoded.push(0x04);
    encoded.extend_from_slice(&x.to_vec_padded(size_i32)?);
    encoded.extend_from_slice(&y.to_vec_padded(size_i32)?);
    Ok(EcPoint::from_bytes(group, &encoded, ctx)?)
}

fn x_coordinate(
    group: &EcGroup,
    point: &EcPoint,
    size: usize,
    ctx: &mut BigNumContext,
) -> SigningResult<BigNum> {
    let encoded = point.to_bytes(group, PointConversionForm::UNCOMPRESSED, ctx)?;
    let x = encoded.get(1..=size).ok_or_else(|| {
        SigningError::CryptographicError("unexpected point encoding length".to_string())
    })?;
    Ok(BigNum::from_slice(x)?)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Minimal GOST R 34.10-2012 signer for exercising the verifier.

    use der::Encode;

    use super::*;

    pub(crate) struct GostTestKey {
        curve: Curve,
        private: BigNum,
        pub material: PublicKeyMaterial,
    }

    impl GostTestKey {
        /// Random key on the curve registered under `param_set`.
        pub(crate) fn generate(param_set: ObjectIdentifier) -> Self {
            let params = CURVES
                .iter()
                .find(|c| c.oids.contains(&param_set))
                .unwrap();
            let mut ctx = BigNumContext::new().unwrap();
            let curve = Curve::from_params(params, &mut ctx).unwrap();

            let mut private = BigNum::new().unwrap();
            loop {
                curve.order.rand_range(&mut private).unwrap();
                if private.num_bits() > 0 {
                    break;
                }
            }
            let mut public = EcPoint::new(&curve.group).unwrap();
            public
                .mul_generator(&curve.group, &private, &ctx)
                .unwrap();
            let encoded = public
                .to_bytes(&curve.group, PointConversionForm::UNCOMPRESSED, &mut ctx)
                .unwrap();
            let mut key = reversed(&encoded[1..=curve.size]);
            key.extend(reversed(&encoded[1 + curve.size..]));

            let (algorithm, digest_param_set) = if curve.size == 64 {
                (OID_GOST3410_2012_512, None)
            } else {
                (OID_GOST3410_2012_256, Some(OID_GOST3411_2012_256))
            };
            let parameters = GostKeyParameters {
                public_key_param_set: param_set,
                digest_param_set,
                encryption_param_set: None,
            };
            let material = PublicKeyMaterial {
                algorithm,
                parameters: Some(parameters.to_der().unwrap()),
                key_bits: OctetString::new(key).unwrap().to_der().unwrap(),
                spki_der: Vec::new(),
            };
            Self {
                curve,
                private,
                material,
            }
        }

        /// Sign a digest, returning `s || r`.
        pub(crate) fn sign(&self, digest: &[u8]) -> Vec<u8> {
            let mut ctx = BigNumContext::new().unwrap();
            let q = &self.curve.order;
            let e = digest_scalar(digest, q, &mut ctx).unwrap();
            loop {
                let mut k = BigNum::new().unwrap();
                q.rand_range(&mut k).unwrap();
                if k.num_bits() == 0 {
                    continue;
                }
                let mut c = EcPoint::new(&self.curve.group).unwrap();
                c.mul_generator(&self.curve.group, &k, &ctx).unwrap();
                let x = x_coordinate(&self.curve.group, &c, self.curve.size, &mut ctx).unwrap();
                let mut r = BigNum::new().unwrap();
                r.nnmod(&x, q, &mut ctx).unwrap();
                if r.num_bits() == 0 {
                    continue;
                }
                let mut rd = BigNum::new().unwrap();
                rd.mod_mul(&r, &self.private, q, &mut ctx).unwrap();
                let mut ke = BigNum::new().unwrap();
                ke.mod_mul(&k, &e, q, &mut ctx).unwrap();
                let mut s = BigNum::new().unwrap();
                s.mod_add(&rd, &ke, q, &mut ctx).unwrap();
                if s.num_bits() == 0 {
                    continue;
                }
                let size = i32::try_from(self.curve.size).unwrap();
                let mut signature = s.to_vec_padded(size).unwrap();
                signature.extend(r.to_vec_padded(size).unwrap());
                return signature;
            }
        }
    }
}
