//! CMS/PKCS#7 `SignedData` parsing for detached signatures.
//!
//! Decodes a signature container into a [`SignatureContainer`]:
//! - Input in DER, PEM (any label) or bare base64 text
//! - Embedded certificates as [`CertificateRecord`]s
//! - Signer infos in transmitted order, with their signed attributes kept
//!   as the exact bytes that were signed (retagged as a SET)
//!
//! BER input with indefinite or non-minimal lengths is normalized first.
//! Parsing is pure; nothing is fetched from outside the input bytes.

use std::borrow::Cow;

use base64::Engine;
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use der::asn1::{ObjectIdentifier, OctetString};
use der::asn1::AnyRef;
use der::{Any, Decode, Encode, Reader, SliceReader, Tag, Tagged};
use x509_cert::time::Time;

use crate::domain::constants::{
    OID_CONTENT_TYPE, OID_MESSAGE_DIGEST, OID_SIGNED_DATA, OID_SIGNING_TIME,
};
use crate::domain::crypto::{CertificateRecord, SignatureAlgorithm};
use crate::domain::pkcs7::{SignatureContainer, SignedAttributes, SignerInfoEntry, SignerReference};
use crate::infra::error::{SigningError, SigningResult};
use crate::services::ber;
use crate::DigestAlgorithm;

const DER_SEQUENCE: u8 = 0x30;
/// `[0] IMPLICIT SignedAttributes` inside a SignerInfo
const SIGNED_ATTRS_TAG: u8 = 0xa0;
const DER_SET: u8 = 0x31;

/// Parse a signature container.
///
/// Fails with `MalformedContainer` when the bytes are not a `ContentInfo`
/// carrying `SignedData`, `NoSignerInfo` when no signer info is present,
/// `UnsupportedAlgorithm` for digest or signature algorithms outside the
/// supported set and `InvalidCertificate` for an embedded certificate with an
/// inverted validity window.
pub fn parse(bytes: &[u8]) -> SigningResult<SignatureContainer> {
    let mut der = decode_container_bytes(bytes);
    log::debug!(
        "Parsing signature container: {} bytes (input {} bytes)",
        der.len(),
        bytes.len()
    );

    let content_info = match ContentInfo::from_der(&der) {
        Ok(info) => info,
        Err(e) => {
            let normalized = ber::to_der(&der)
                .filter(|normalized| normalized.as_slice() != der.as_ref())
                .ok_or_else(|| SigningError::MalformedContainer(format!("ContentInfo: {e}")))?;
            log::debug!("Container is BER encoded, normalized to {} DER bytes", normalized.len());
            der = Cow::Owned(normalized);
            ContentInfo::from_der(&der)
                .map_err(|e| SigningError::MalformedContainer(format!("ContentInfo: {e}")))?
        }
    };
    if content_info.content_type != OID_SIGNED_DATA {
        return Err(SigningError::MalformedContainer(format!(
            "content type {} is not signedData",
            content_info.content_type
        )));
    }
    let signed_data_der = content_info
        .content
        .to_der()
        .map_err(|e| SigningError::MalformedContainer(format!("SignedData: {e}")))?;
    let signed_data = SignedData::from_der(&signed_data_der)
        .map_err(|e| SigningError::MalformedContainer(format!("SignedData: {e}")))?;

    if signed_data.signer_infos.0.is_empty() {
        return Err(SigningError::NoSignerInfo);
    }

    let digest_algorithms = signed_data
        .digest_algorithms
        .iter()
        .map(|alg| alg.oid)
        .collect();

    let mut certificates = Vec::new();
    if let Some(set) = &signed_data.certificates {
        for choice in set.0.iter() {
            match choice {
                CertificateChoices::Certificate(cert) => {
                    certificates.push(CertificateRecord::from_certificate(cert)?);
                }
                _ => {
                    log::debug!("Skipping non-X.509 certificate choice");
                }
            }
        }
    }

    // the decoded SET is re-sorted; walk the encoding to keep transmitted order
    let signer_infos = raw_signer_infos(&signed_data_der)
        .map_err(|e| SigningError::MalformedContainer(format!("SignerInfo: {e}")))?
        .into_iter()
        .map(parse_signer_info)
        .collect::<SigningResult<Vec<_>>>()?;

    let encap = &signed_data.encap_content_info;
    let encapsulated_content = encap.econtent.as_ref().map(encapsulated_bytes).transpose()?;

    log::debug!(
        "Container: {} signer(s), {} certificate(s), {}",
        signer_infos.len(),
        certificates.len(),
        if encapsulated_content.is_some() {
            "attached"
        } else {
            "detached"
        }
    );

    SignatureContainer::new(
        digest_algorithms,
        certificates,
        signer_infos,
        encap.econtent_type,
        encapsulated_content,
        der.into_owned(),
    )
    .ok_or(SigningError::NoSignerInfo)
}

/// Normalize container input to DER.
///
/// Bytes starting with a SEQUENCE tag are DER already. PEM is unwrapped
/// regardless of its label; anything else is read as bare base64 with blank
/// and `#` comment lines skipped. Undecodable text is returned unchanged so
/// that the DER decoder reports the fault.
#[must_use]
pub fn decode_container_bytes(bytes: &[u8]) -> Cow<'_, [u8]> {
    if bytes.first() == Some(&DER_SEQUENCE) {
        return Cow::Borrowed(bytes);
    }
    let Ok(text) = std::str::from_utf8(bytes) else {
        return Cow::Borrowed(bytes);
    };

    let body: String = if text.trim_start().starts_with("-----BEGIN") {
        log::debug!("Signature container is PEM armoured");
        text.lines()
            .map(str::trim)
            .skip_while(|line| !line.starts_with("-----BEGIN"))
            .skip(1)
            .take_while(|line| !line.starts_with("-----END"))
            .filter(|line| !line.contains(':'))
            .collect()
    } else {
        log::debug!("Signature container is not DER, trying bare base64");
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect()
    };

    match base64::engine::general_purpose::STANDARD.decode(body.as_bytes()) {
        Ok(der) if !der.is_empty() => Cow::Owned(der),
        Ok(_) => Cow::Borrowed(bytes),
        Err(e) => {
            log::debug!("Base64 decoding failed ({e}), treating input as DER");
            Cow::Borrowed(bytes)
        }
    }
}

/// Encoded SignerInfo elements of a `SignedData`, in transmitted order.
fn raw_signer_infos(signed_data: &[u8]) -> der::Result<Vec<&[u8]>> {
    let fields = raw_elements(AnyRef::from_der(signed_data)?.value())?;
    match fields.last() {
        Some(signer_infos) => raw_elements(AnyRef::from_der(signer_infos)?.value()),
        None => Ok(Vec::new()),
    }
}

/// Encoded elements of a constructed value's contents.
fn raw_elements(contents: &[u8]) -> der::Result<Vec<&[u8]>> {
    let mut reader = SliceReader::new(contents)?;
    let mut elements = Vec::new();
    while !reader.is_finished() {
        let start = usize::try_from(reader.position())?;
        reader.decode::<AnyRef<'_>>()?;
        let end = usize::try_from(reader.position())?;
        elements.push(&contents[start..end]);
    }
    Ok(elements)
}

/// Signed attributes exactly as transmitted, with the implicit `[0]` tag
/// replaced by the SET tag they are signed under.
fn raw_signed_attributes(signer_info: &[u8]) -> der::Result<Option<Vec<u8>>> {
    let fields = raw_elements(AnyRef::from_der(signer_info)?.value())?;
    Ok(fields
        .into_iter()
        .skip(1)
        .find(|field| field.first() == Some(&SIGNED_ATTRS_TAG))
        .map(|field| {
            let mut set = field.to_vec();
            set[0] = DER_SET;
            set
        }))
}

fn parse_signer_info(raw: &[u8]) -> SigningResult<SignerInfoEntry> {
    let malformed = |e: der::Error| SigningError::MalformedContainer(format!("SignerInfo: {e}"));
    let info = SignerInfo::from_der(raw).map_err(malformed)?;
    let signed_attrs_der = raw_signed_attributes(raw).map_err(malformed)?;

    let digest_algorithm = DigestAlgorithm::from_oid(&info.digest_alg.oid).ok_or_else(|| {
        SigningError::UnsupportedAlgorithm(format!("digest algorithm {}", info.digest_alg.oid))
    })?;
    let signature_algorithm = SignatureAlgorithm::from_oid(&info.signature_algorithm.oid)
        .ok_or_else(|| {
            SigningError::UnsupportedAlgorithm(format!(
                "signature algorithm {}",
                info.signature_algorithm.oid
            ))
        })?;

    let signer = match &info.sid {
        SignerIdentifier::IssuerAndSerialNumber(iasn) => SignerReference::IssuerAndSerial {
            issuer: iasn.issuer.to_string(),
            issuer_der: iasn.issuer.to_der()?,
            serial: iasn.serial_number.as_bytes().to_vec(),
        },
        SignerIdentifier::SubjectKeyIdentifier(ski) => {
            SignerReference::SubjectKeyId(ski.0.as_bytes().to_vec())
        }
    };

    let signed_attributes = match (&info.signed_attrs, signed_attrs_der) {
        (Some(attrs), Some(der)) => Some(parse_signed_attributes(attrs, der)?),
        (Some(_), None) => {
            return Err(SigningError::MalformedContainer(
                "signed attributes not found in SignerInfo encoding".to_string(),
            ))
        }
        (None, _) => None,
    };

    Ok(SignerInfoEntry {
        signer,
        digest_algorithm,
        signature_algorithm,
        signed_attributes,
        signature: info.signature.as_bytes().to_vec(),
    })
}

fn parse_signed_attributes(
    attrs: &cms::signed_data::SignedAttributes,
    signed_der: Vec<u8>,
) -> SigningResult<SignedAttributes> {
    let mut message_digest = None;
    let mut signing_time = None;
    let mut content_type = None;

    for attr in attrs.iter() {
        let Some(value) = attr.values.iter().next() else {
            continue;
        };
        if attr.oid == OID_MESSAGE_DIGEST {
            let digest: OctetString = decode_attribute(value, "messageDigest")?;
            message_digest = Some(digest.as_bytes().to_vec());
        } else if attr.oid == OID_SIGNING_TIME {
            let time: Time = decode_attribute(value, "signingTime")?;
            signing_time = Some(time.to_system_time());
        } else if attr.oid == OID_CONTENT_TYPE {
            let oid: ObjectIdentifier = decode_attribute(value, "contentType")?;
            content_type = Some(oid);
        } else {
            log::debug!("Ignoring signed attribute {}", attr.oid);
        }
    }

    Ok(SignedAttributes::new(
        signed_der,
        message_digest,
        signing_time,
        content_type,
        attrs.len(),
    ))
}

fn decode_attribute<T>(value: &Any, name: &str) -> SigningResult<T>
where
    T: for<'a> Decode<'a>,
{
    decode_any(value)
        .map_err(|e| SigningError::MalformedContainer(format!("{name} attribute: {e}")))
}

fn decode_any<T>(any: &Any) -> der::Result<T>
where
    T: for<'a> Decode<'a>,
{
    T::from_der(&any.to_der()?)
}

fn encapsulated_bytes(econtent: &Any) -> SigningResult<Vec<u8>> {
    if econtent.tag() == Tag::OctetString {
        Ok(econtent.value().to_vec())
    } else {
        Ok(econtent.to_der()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_der_passes_through() {
        let der = [0x30, 0x03, 0x02, 0x01, 0x00];
        assert!(matches!(decode_container_bytes(&der), Cow::Borrowed(_)));
    }

    #[test]
    fn test_pem_unwrapped_with_any_label() {
        let pem = "-----BEGIN PKCS7-----\nMAMCAQA=\n-----END PKCS7-----\n";
        assert_eq!(
            decode_container_bytes(pem.as_bytes()).as_ref(),
            &[0x30, 0x03, 0x02, 0x01, 0x00]
        );
        let signed = "-----BEGIN SIGNED DATA-----\r\nMAMC\r\nAQA=\r\n-----END SIGNED DATA-----";
        assert_eq!(
            decode_container_bytes(signed.as_bytes()).as_ref(),
            &[0x30, 0x03, 0x02, 0x01, 0x00]
        );
    }

    #[test]
    fn test_bare_base64_skips_comments() {
        let text = "# exported by the browser\n\nMAMC\nAQA=\n";
        assert_eq!(
            decode_container_bytes(text.as_bytes()).as_ref(),
            &[0x30, 0x03, 0x02, 0x01, 0x00]
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            parse(b"definitely not a signature"),
            Err(SigningError::MalformedContainer(_))
        ));
        assert!(matches!(
            parse(&[0x30, 0x82, 0x10]),
            Err(SigningError::MalformedContainer(_))
        ));
        assert!(matches!(parse(&[]), Err(SigningError::MalformedContainer(_))));
    }

    #[test]
    fn test_non_signed_data_is_malformed() {
        // ContentInfo { id-data, [0] OCTET STRING "" }
        let data = [
            0x30, 0x0f, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01, 0xa0,
            0x02, 0x04, 0x00,
        ];
        let err = parse(&data).unwrap_err();
        assert!(matches!(err, SigningError::MalformedContainer(ref msg) if msg.contains("not signedData")));
    }
}
