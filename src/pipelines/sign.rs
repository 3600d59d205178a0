//! `BrowserSignWorkflow` signs a document through the browser plugin.
//!
//! Steps:
//! 1. Read and digest the document
//! 2. Run a remote signing session and wait for the browser
//! 3. Write the returned container next to the document as `.p7s`
//! 4. Verify the written signature against the document
//!
//! A signature that cannot be re-verified (no embedded certificate, for
//! instance) is still kept; the outcome then carries no report.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{
    adapters::browser::{SessionManager, SessionSettings, SigningRequest},
    domain::{crypto::compute_digest, verification::VerificationReport},
    pipelines::verify::VerifyWorkflow,
    DigestAlgorithm, SigningError, SigningResult,
};

/// Outcome of a browser signing run.
#[derive(Debug)]
pub struct BrowserSignOutcome {
    /// Where the detached signature was written.
    pub signature_path: PathBuf,
    /// Verification of the written signature against the document, when it
    /// could be run.
    pub report: Option<VerificationReport>,
}

pub struct BrowserSignWorkflow {
    digest_algorithm: DigestAlgorithm,
    manager: SessionManager,
    timeout: Duration,
    send_document: bool,
}

impl BrowserSignWorkflow {
    #[must_use]
    pub fn new(digest_algorithm: DigestAlgorithm, settings: SessionSettings, timeout: Duration) -> Self {
        Self {
            digest_algorithm,
            manager: SessionManager::new(settings),
            timeout,
            send_document: true,
        }
    }

    /// Send only the digest to the page, not the document bytes.
    #[must_use]
    pub fn digest_only(mut self) -> Self {
        self.send_document = false;
        self
    }

    #[must_use]
    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest_algorithm
    }

    /// Sign `document`, writing the signature to `output` or `<document>.p7s`.
    ///
    /// `on_ready` receives the page URL once the endpoint listens.
    pub async fn sign_file<F>(
        &self,
        document: &Path,
        output: Option<&Path>,
        on_ready: F,
    ) -> SigningResult<BrowserSignOutcome>
    where
        F: FnOnce(&str),
    {
        let content = std::fs::read(document).map_err(|e| {
            SigningError::IoError(format!(
                "Failed to read document {}: {e}",
                document.display()
            ))
        })?;
        let digest = compute_digest(self.digest_algorithm, &content);
        log::info!(
            "Document {} ({} bytes), {} digest {}",
            document.display(),
            content.len(),
            self.digest_algorithm,
            digest.to_hex()
        );

        let mut request = SigningRequest::new(digest);
        if self.send_document {
            let name = document
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string());
            request = request.with_document(name, content.clone());
        }

        let handle = self.manager.start(request, self.timeout).await?;
        on_ready(&handle.url());
        let container = handle.wait().await?;

        let signature_path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_signature_path(document));
        std::fs::write(&signature_path, container.as_der()).map_err(|e| {
            SigningError::IoError(format!(
                "Failed to write signature {}: {e}",
                signature_path.display()
            ))
        })?;
        log::info!("Signature written to {}", signature_path.display());

        let report = match VerifyWorkflow::new().run(container.as_der(), &content, None) {
            Ok(report) => {
                if !report.success() {
                    log::warn!("Returned signature does not verify: {}", report.status);
                }
                Some(report)
            }
            Err(e) => {
                log::warn!("Could not re-verify the returned signature: {e}");
                None
            }
        };

        Ok(BrowserSignOutcome {
            signature_path,
            report,
        })
    }
}

/// `<document>.p7s` in the document's directory.
#[must_use]
pub fn default_signature_path(document: &Path) -> PathBuf {
    let mut name = document.as_os_str().to_os_string();
    name.push(".p7s");
    PathBuf::from(name)
}
