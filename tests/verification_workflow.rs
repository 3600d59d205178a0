//! Verification workflow tests over OpenSSL-produced detached signatures.

use std::time::{Duration, UNIX_EPOCH};

use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use der::asn1::AnyRef;
use der::{Any, Decode, Encode, Reader, SliceReader};
use openssl::hash::MessageDigest;
use sigstamp::domain::constants::OID_SIGNED_DATA;
use sigstamp::pipelines::verify::{find_signature_for, pair_signature_by_content};
use sigstamp::services::pkcs7;
use sigstamp::{
    verify_detached_signature, CertificateStatus, ReferenceTime, SigningError, VerifyWorkflow,
};

mod common;

use common::fixtures::{
    to_base64, to_pem, TestSigner, DOCUMENT, EXPIRED_NOT_AFTER, LONG_LIVED_NOT_AFTER,
};

fn flip_byte(data: &[u8], index: usize) -> Vec<u8> {
    let mut copy = data.to_vec();
    copy[index] ^= 0x01;
    copy
}

/// Complete TLV elements of a constructed value's contents.
fn elements(contents: &[u8]) -> Vec<&[u8]> {
    let mut reader = SliceReader::new(contents).unwrap();
    let mut found = Vec::new();
    while !reader.is_finished() {
        let start = usize::try_from(reader.position()).unwrap();
        reader.decode::<AnyRef<'_>>().unwrap();
        let end = usize::try_from(reader.position()).unwrap();
        found.push(&contents[start..end]);
    }
    found
}

/// The same constructed element with an indefinite length.
fn indefinite(element: &[u8]) -> Vec<u8> {
    let contents = AnyRef::from_der(element).unwrap().value();
    let mut out = vec![element[0], 0x80];
    out.extend_from_slice(contents);
    out.extend_from_slice(&[0x00, 0x00]);
    out
}

/// Signature whose signed attributes are transmitted in reverse DER order.
///
/// Returns the container re-signed over the reordered attributes and the
/// exact SET encoding that was signed.
fn with_unsorted_signed_attributes(signer: &TestSigner, signature: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let container = pkcs7::parse(signature).unwrap();
    let attrs = container.signer_info(0).unwrap().signed_attributes.as_ref().unwrap();
    let mut transmitted = attrs.as_der().to_vec();
    transmitted[0] = 0xa0;

    let offset = signature
        .windows(transmitted.len())
        .position(|window| window == transmitted.as_slice())
        .unwrap();
    let contents = AnyRef::from_der(&transmitted).unwrap().value();
    let header_len = transmitted.len() - contents.len();
    let reversed: Vec<u8> = elements(contents).into_iter().rev().flatten().copied().collect();
    assert_ne!(reversed.as_slice(), contents);

    let mut reordered = signature.to_vec();
    reordered[offset + header_len..offset + transmitted.len()].copy_from_slice(&reversed);

    let mut signed = attrs.as_der()[..header_len].to_vec();
    signed.extend_from_slice(&reversed);
    let mut rsa = openssl::sign::Signer::new(MessageDigest::sha256(), &signer.key).unwrap();
    rsa.update(&signed).unwrap();
    let value = rsa.sign_to_vec().unwrap();

    // the signature value closes the container
    let end = reordered.len();
    reordered[end - value.len()..].copy_from_slice(&value);
    (reordered, signed)
}

/// One container carrying the signer infos and certificates of both inputs.
fn merge_signers(first: &[u8], second: &[u8]) -> Vec<u8> {
    let signed_data = |der: &[u8]| {
        let content_info = ContentInfo::from_der(der).unwrap();
        SignedData::from_der(&content_info.content.to_der().unwrap()).unwrap()
    };
    let mut merged = signed_data(first);
    let other = signed_data(second);

    let certificates = merged.certificates.as_mut().unwrap();
    for cert in other.certificates.unwrap().0.iter() {
        certificates.0.insert(cert.clone()).unwrap();
    }
    for info in other.signer_infos.0.iter() {
        merged.signer_infos.0.insert(info.clone()).unwrap();
    }

    ContentInfo {
        content_type: OID_SIGNED_DATA,
        content: Any::encode_from(&merged).unwrap(),
    }
    .to_der()
    .unwrap()
}

#[test]
fn test_valid_signature() {
    let signer = TestSigner::current_rsa();
    let signature = signer.sign_detached(DOCUMENT, true);
    assert_eq!(
        verify_detached_signature(&signature, DOCUMENT, None).unwrap(),
        CertificateStatus::Valid
    );
}

#[test]
fn test_modified_content_is_mismatch() {
    let signer = TestSigner::current_rsa();
    let signature = signer.sign_detached(DOCUMENT, true);
    let tampered = flip_byte(DOCUMENT, 10);
    assert_eq!(
        verify_detached_signature(&signature, &tampered, None).unwrap(),
        CertificateStatus::ContentMismatch
    );
}

#[test]
fn test_expired_certificate() {
    let signer = TestSigner::expired_rsa();
    let signature = signer.sign_detached(DOCUMENT, true);
    assert_eq!(
        verify_detached_signature(&signature, DOCUMENT, None).unwrap(),
        CertificateStatus::Expired
    );
}

#[test]
fn test_tampered_content_wins_over_expiry() {
    let signer = TestSigner::expired_rsa();
    let signature = signer.sign_detached(DOCUMENT, true);
    let tampered = flip_byte(DOCUMENT, 0);
    assert_eq!(
        verify_detached_signature(&signature, &tampered, None).unwrap(),
        CertificateStatus::ContentMismatch
    );
}

#[test]
fn test_expired_certificate_valid_at_reference_time() {
    let signer = TestSigner::expired_rsa();
    let signature = signer.sign_detached(DOCUMENT, true);
    let before_expiry = UNIX_EPOCH + Duration::from_secs((EXPIRED_NOT_AFTER - 86_400) as u64);
    let report = VerifyWorkflow::new()
        .with_reference_time(ReferenceTime::At(before_expiry))
        .run(&signature, DOCUMENT, None)
        .unwrap();
    assert_eq!(report.status, CertificateStatus::Valid);
}

#[test]
fn test_corrupted_signature_value() {
    let signer = TestSigner::current_rsa();
    let signature = signer.sign_detached(DOCUMENT, true);
    // the signature value is the last field of the only signer info
    let corrupted = flip_byte(&signature, signature.len() - 1);
    assert_eq!(
        verify_detached_signature(&corrupted, DOCUMENT, None).unwrap(),
        CertificateStatus::SignatureInvalid
    );
}

#[test]
fn test_truncated_container_is_malformed() {
    let signer = TestSigner::current_rsa();
    let signature = signer.sign_detached(DOCUMENT, true);
    let truncated = &signature[..signature.len() / 2];
    assert!(matches!(
        verify_detached_signature(truncated, DOCUMENT, None),
        Err(SigningError::MalformedContainer(_))
    ));
}

#[test]
fn test_external_certificate_for_certless_container() {
    let signer = TestSigner::current_rsa();
    let signature = signer.sign_detached(DOCUMENT, false);

    assert!(matches!(
        verify_detached_signature(&signature, DOCUMENT, None),
        Err(SigningError::MissingCertificate)
    ));
    assert_eq!(
        verify_detached_signature(&signature, DOCUMENT, Some(&signer.cert_der())).unwrap(),
        CertificateStatus::Valid
    );
    assert_eq!(
        verify_detached_signature(&signature, DOCUMENT, Some(&signer.cert_pem())).unwrap(),
        CertificateStatus::Valid
    );
}

#[test]
fn test_foreign_external_certificate_fails_signature() {
    let signer = TestSigner::current_rsa();
    let other = TestSigner::current_rsa();
    let signature = signer.sign_detached(DOCUMENT, true);
    assert_eq!(
        verify_detached_signature(&signature, DOCUMENT, Some(&other.cert_der())).unwrap(),
        CertificateStatus::SignatureInvalid
    );
}

#[test]
fn test_pem_and_base64_containers() {
    let signer = TestSigner::current_rsa();
    let der = signer.sign_detached(DOCUMENT, true);

    let pem = to_pem("PKCS7", &der);
    assert_eq!(
        verify_detached_signature(pem.as_bytes(), DOCUMENT, None).unwrap(),
        CertificateStatus::Valid
    );

    let bare = format!("# saved from the browser\n{}\n", to_base64(&der));
    assert_eq!(
        verify_detached_signature(bare.as_bytes(), DOCUMENT, None).unwrap(),
        CertificateStatus::Valid
    );
}

#[test]
fn test_ecdsa_signature() {
    let signer = TestSigner::current_ec();
    let signature = signer.sign_detached(DOCUMENT, true);
    assert_eq!(
        verify_detached_signature(&signature, DOCUMENT, None).unwrap(),
        CertificateStatus::Valid
    );
    assert_eq!(
        verify_detached_signature(&signature, b"other content", None).unwrap(),
        CertificateStatus::ContentMismatch
    );
}

#[test]
fn test_report_details() {
    let signer = TestSigner::current_rsa();
    let signature = signer.sign_detached(DOCUMENT, true);
    let report = VerifyWorkflow::new().run(&signature, DOCUMENT, None).unwrap();

    assert!(report.success());
    assert_eq!(report.signer_count, 1);
    assert_eq!(report.result.additional_signers, 0);
    assert_eq!(report.certificate().common_name(), Some("Current Signer"));
    assert_eq!(report.certificate().serial(), "01C0FFEE");
    assert!(report.signing_time().is_some());
}

#[test]
fn test_verification_is_repeatable() {
    let signer = TestSigner::current_rsa();
    let signature = signer.sign_detached(DOCUMENT, true);
    let first = verify_detached_signature(&signature, DOCUMENT, None).unwrap();
    let second = verify_detached_signature(&signature, DOCUMENT, None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_signer_index_out_of_range() {
    let signer = TestSigner::current_rsa();
    let signature = signer.sign_detached(DOCUMENT, true);
    let result = VerifyWorkflow::new()
        .with_signer_index(3)
        .run(&signature, DOCUMENT, None);
    assert!(matches!(result, Err(SigningError::InvalidInput(_))));

    // the index is checked before any certificate is looked up
    let certless = signer.sign_detached(DOCUMENT, false);
    let workflow = VerifyWorkflow::new().with_signer_index(1);
    assert!(matches!(
        workflow.run(&certless, DOCUMENT, None),
        Err(SigningError::InvalidInput(_))
    ));
    assert!(matches!(
        workflow.run(&certless, DOCUMENT, Some(&signer.cert_der())),
        Err(SigningError::InvalidInput(_))
    ));
}

#[test]
fn test_run_files() {
    let dir = tempfile::tempdir().unwrap();
    let signer = TestSigner::current_rsa();
    let document = dir.path().join("contract.pdf");
    let signature = dir.path().join("contract.pdf.p7s");
    std::fs::write(&document, DOCUMENT).unwrap();
    std::fs::write(&signature, signer.sign_detached(DOCUMENT, true)).unwrap();

    let report = VerifyWorkflow::new()
        .run_files(&signature, &document, None)
        .unwrap();
    assert_eq!(report.status, CertificateStatus::Valid);
    assert_eq!(find_signature_for(&document), Some(signature));
}

#[test]
fn test_unsorted_signed_attributes_verify_as_transmitted() {
    let signer = TestSigner::current_rsa();
    let signature = signer.sign_detached(DOCUMENT, true);
    let (reordered, signed) = with_unsorted_signed_attributes(&signer, &signature);

    let container = pkcs7::parse(&reordered).unwrap();
    let attrs = container.signer_info(0).unwrap().signed_attributes.as_ref().unwrap();
    assert_eq!(attrs.as_der(), signed.as_slice());
    assert!(attrs.message_digest().is_some());

    assert_eq!(
        verify_detached_signature(&reordered, DOCUMENT, None).unwrap(),
        CertificateStatus::Valid
    );
    assert_eq!(
        verify_detached_signature(&reordered, b"other content", None).unwrap(),
        CertificateStatus::ContentMismatch
    );
}

#[test]
fn test_reordering_signed_attributes_breaks_signature() {
    let signer = TestSigner::current_rsa();
    let signature = signer.sign_detached(DOCUMENT, true);
    let (reordered, _) = with_unsorted_signed_attributes(&signer, &signature);

    // original signature value over the sorted attributes
    let mut stale = reordered.clone();
    let tail = signature.len() - 256;
    stale[tail..].copy_from_slice(&signature[tail..]);
    assert_eq!(
        verify_detached_signature(&stale, DOCUMENT, None).unwrap(),
        CertificateStatus::SignatureInvalid
    );
}

#[test]
fn test_indefinite_length_container() {
    let signer = TestSigner::current_rsa();
    let der = signer.sign_detached(DOCUMENT, true);
    let fields = elements(AnyRef::from_der(&der).unwrap().value());
    assert_eq!(fields.len(), 2);

    let mut ber = vec![0x30, 0x80];
    ber.extend_from_slice(fields[0]);
    ber.extend_from_slice(&indefinite(fields[1]));
    ber.extend_from_slice(&[0x00, 0x00]);

    assert_eq!(
        verify_detached_signature(&ber, DOCUMENT, None).unwrap(),
        CertificateStatus::Valid
    );
    assert_eq!(
        verify_detached_signature(&ber, b"other content", None).unwrap(),
        CertificateStatus::ContentMismatch
    );
}

#[test]
fn test_multiple_signers() {
    let rsa = TestSigner::current_rsa();
    let ec = TestSigner::current_ec();
    let combined = merge_signers(
        &rsa.sign_detached(DOCUMENT, true),
        &ec.sign_detached(DOCUMENT, true),
    );

    let mut names = Vec::new();
    for index in 0..2 {
        let report = VerifyWorkflow::new()
            .with_signer_index(index)
            .run(&combined, DOCUMENT, None)
            .unwrap();
        assert_eq!(report.status, CertificateStatus::Valid);
        assert_eq!(report.signer_count, 2);
        assert_eq!(report.result.additional_signers, 1);
        names.push(report.certificate().common_name().unwrap().to_string());
    }
    names.sort();
    assert_eq!(names, vec!["Current Signer", "EC Signer"]);

    let report = VerifyWorkflow::new()
        .run(&combined, b"other content", None)
        .unwrap();
    assert_eq!(report.status, CertificateStatus::ContentMismatch);
    assert!(matches!(
        VerifyWorkflow::new()
            .with_signer_index(2)
            .run(&combined, DOCUMENT, None),
        Err(SigningError::InvalidInput(_))
    ));
}

#[test]
fn test_zero_document_with_long_lived_certificate() {
    let document = [0u8; 32];
    let signer = TestSigner::long_lived_rsa();
    let signature = signer.sign_detached(&document, true);

    let report = VerifyWorkflow::new().run(&signature, &document, None).unwrap();
    assert_eq!(report.status, CertificateStatus::Valid);
    assert_eq!(
        report.certificate().not_after(),
        UNIX_EPOCH + Duration::from_secs(LONG_LIVED_NOT_AFTER as u64)
    );

    let mut modified = document;
    modified[31] = 1;
    assert_eq!(
        verify_detached_signature(&signature, &modified, None).unwrap(),
        CertificateStatus::ContentMismatch
    );
}

#[test]
fn test_pair_signature_by_content() {
    let dir = tempfile::tempdir().unwrap();
    let document = dir.path().join("contract.pdf");
    std::fs::write(&document, DOCUMENT).unwrap();

    let signer = TestSigner::current_rsa();
    // sorts first but signs other content
    std::fs::write(
        dir.path().join("a_other.p7s"),
        signer.sign_detached(b"other content", true),
    )
    .unwrap();
    // no certificate, verification fails
    std::fs::write(
        dir.path().join("b_certless.sig"),
        signer.sign_detached(DOCUMENT, false),
    )
    .unwrap();
    assert_eq!(pair_signature_by_content(&document), None);

    // expired certificates still pair
    let matching = dir.path().join("c_scan.p7s");
    std::fs::write(
        &matching,
        TestSigner::expired_rsa().sign_detached(DOCUMENT, true),
    )
    .unwrap();
    assert_eq!(pair_signature_by_content(&document), Some(matching.clone()));
    assert_eq!(find_signature_for(&document), Some(matching));
}

#[test]
fn test_find_signature_with_russian_suffix_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let document = dir.path().join("contract.pdf");
    let signature = dir.path().join("contract_Файл подписи.p7s");
    std::fs::write(&document, DOCUMENT).unwrap();
    std::fs::write(
        &signature,
        TestSigner::current_rsa().sign_detached(DOCUMENT, true),
    )
    .unwrap();

    let found = find_signature_for(&document).unwrap();
    assert_eq!(found, signature);
    let report = VerifyWorkflow::new()
        .run_files(&found, &document, None)
        .unwrap();
    assert!(report.success());
}
