//! `VerifyWorkflow`: high-level facade for verifying detached signatures.
//!
//! Parses the container, picks the signer certificate, validates the
//! signature over the content and evaluates the certificate status.

use std::path::{Path, PathBuf};

use crate::{
    domain::crypto::CertificateRecord,
    domain::verification::{CertificateStatus, VerificationReport},
    services::{pkcs7, status, status::ReferenceTime, verification::SignatureValidator},
    SigningError, SigningResult,
};

/// File extensions recognised as detached signatures, in lookup order.
pub const SIGNATURE_EXTENSIONS: [&str; 5] = ["p7s", "sig", "p7m", "p7b", "p7c"];

/// Orchestrates verification of one signer of a detached signature.
pub struct VerifyWorkflow {
    validator: SignatureValidator,
    reference_time: ReferenceTime,
    signer_index: usize,
}

impl Default for VerifyWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifyWorkflow {
    #[must_use]
    pub fn new() -> Self {
        Self {
            validator: SignatureValidator::new(),
            reference_time: ReferenceTime::Now,
            signer_index: 0,
        }
    }

    /// Judge certificate validity at `reference_time` instead of now.
    #[must_use]
    pub fn with_reference_time(mut self, reference_time: ReferenceTime) -> Self {
        self.reference_time = reference_time;
        self
    }

    /// Validate signer info `index` instead of the first one.
    #[must_use]
    pub fn with_signer_index(mut self, index: usize) -> Self {
        self.signer_index = index;
        self
    }

    /// Run verification over in-memory signature and content.
    ///
    /// `external_certificate` (DER or PEM) takes precedence over certificates
    /// embedded in the container. Fails with `MissingCertificate` when
    /// neither provides one.
    pub fn run(
        &self,
        signature: &[u8],
        content: &[u8],
        external_certificate: Option<&[u8]>,
    ) -> SigningResult<VerificationReport> {
        let container = pkcs7::parse(signature)?;
        if container.signer_info(self.signer_index).is_none() {
            return Err(SigningError::InvalidInput(format!(
                "signer index {} out of range ({} signer infos)",
                self.signer_index,
                container.signer_infos().len()
            )));
        }

        let external = external_certificate
            .map(CertificateRecord::from_bytes)
            .transpose()?;
        let certificate = match external {
            Some(cert) => {
                log::debug!("Using external certificate {}", cert.display_name());
                cert
            }
            None => container
                .signer_certificate(self.signer_index)
                .cloned()
                .ok_or(SigningError::MissingCertificate)?,
        };

        let result = self
            .validator
            .validate(&container, self.signer_index, content, &certificate)?;
        let status = status::evaluate_as_of(&result, self.reference_time);

        log::info!(
            "Verification of signer {} ({}): {}",
            self.signer_index,
            result.certificate.display_name(),
            status
        );

        Ok(VerificationReport {
            status,
            result,
            signer_count: container.signer_infos().len(),
        })
    }

    /// Read the files and run verification over their contents.
    pub fn run_files(
        &self,
        signature_path: &Path,
        content_path: &Path,
        certificate_path: Option<&Path>,
    ) -> SigningResult<VerificationReport> {
        let signature = read_file(signature_path, "signature")?;
        let content = read_file(content_path, "document")?;
        let certificate = certificate_path
            .map(|path| read_file(path, "certificate"))
            .transpose()?;
        self.run(&signature, &content, certificate.as_deref())
    }
}

/// Suffix some signing tools append to the document stem.
pub const RUSSIAN_SIGNATURE_SUFFIX: &str = "_Файл подписи.p7s";

/// Locate a detached signature stored next to `document`.
///
/// Tries the conventional names first (see [`find_signature_by_name`]) and
/// falls back to [`pair_signature_by_content`].
#[must_use]
pub fn find_signature_for(document: &Path) -> Option<PathBuf> {
    find_signature_by_name(document).or_else(|| pair_signature_by_content(document))
}

/// Tries `<document>.<ext>`, then `<stem>.<ext>` for each extension of
/// [`SIGNATURE_EXTENSIONS`], then `<stem>_Файл подписи.p7s`.
#[must_use]
pub fn find_signature_by_name(document: &Path) -> Option<PathBuf> {
    let appended = SIGNATURE_EXTENSIONS.iter().map(|ext| {
        let mut name = document.as_os_str().to_os_string();
        name.push(".");
        name.push(ext);
        PathBuf::from(name)
    });
    let replaced = SIGNATURE_EXTENSIONS
        .iter()
        .map(|ext| document.with_extension(ext));
    let suffixed = document.file_stem().map(|stem| {
        let mut name = stem.to_os_string();
        name.push(RUSSIAN_SIGNATURE_SUFFIX);
        document.with_file_name(name)
    });
    appended
        .chain(replaced)
        .chain(suffixed)
        .filter(|candidate| candidate != document)
        .find(|candidate| candidate.is_file())
}

/// Find the signature in `document`'s directory that verifies over it.
///
/// Every file with a signature extension is verified against the document
/// in name order. The first one that neither fails nor reports a content
/// mismatch is returned.
#[must_use]
pub fn pair_signature_by_content(document: &Path) -> Option<PathBuf> {
    let dir = match document.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Cannot list {}: {e}", dir.display());
            return None;
        }
    };
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_signature_extension(path))
        .filter(|path| path.file_name() != document.file_name())
        .collect();
    candidates.sort();

    let workflow = VerifyWorkflow::new();
    candidates.into_iter().find(|candidate| {
        match workflow.run_files(candidate, document, None) {
            Ok(report) => {
                let paired = !matches!(
                    report.status,
                    CertificateStatus::ContentMismatch | CertificateStatus::Error(_)
                );
                log::debug!(
                    "{} against {}: {}",
                    candidate.display(),
                    document.display(),
                    report.status
                );
                paired
            }
            Err(e) => {
                log::debug!("Skipping {}: {e}", candidate.display());
                false
            }
        }
    })
}

fn has_signature_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SIGNATURE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

fn read_file(path: &Path, what: &str) -> SigningResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        SigningError::IoError(format!("Failed to read {what} file {}: {e}", path.display()))
    })
}
