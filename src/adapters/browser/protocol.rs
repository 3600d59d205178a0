//! JSON messages exchanged with the signing page.
//!
//! Field names are camelCase on the wire to match the page script.

use serde::{Deserialize, Serialize};

/// Status value of a successful result submission.
pub const STATUS_OK: &str = "ok";
/// Status value of a failed result submission.
pub const STATUS_ERROR: &str = "error";

/// Session parameters served to the page from `/config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    /// Echo of the session nonce.
    pub nonce: String,
    /// File name of the document being signed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    /// Base64 document bytes, for plugins that hash the content themselves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_base64: Option<String>,
    /// Base64 content digest to sign.
    pub digest_base64: String,
    /// Digest algorithm name (e.g. `GOST3411-2012-256`).
    pub digest_algorithm: String,
    /// Dotted OID of the digest algorithm.
    pub digest_algorithm_oid: String,
    /// Whether the page should poll `/logs`.
    pub log_enabled: bool,
    /// Log lines buffered before the page loaded.
    pub initial_logs: Vec<LogLine>,
    /// Id of the last line in `initial_logs`, 0 when empty.
    pub last_log_id: u64,
    /// Ordered plugin loader script URLs to try.
    pub plugin_script_sources: Vec<String>,
}

/// One diagnostic line from the session buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub id: u64,
    pub message: String,
}

/// Response of `/logs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    /// Id of the newest line in the buffer, 0 when empty.
    pub last: u64,
    /// Lines with ids greater than the requested `after`.
    pub items: Vec<LogLine>,
}

/// Result posted by the page to `/result`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSubmission {
    pub nonce: String,
    /// `ok` or `error`.
    pub status: String,
    /// Base64 detached CMS signature when `status` is `ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Human readable failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine readable failure code, see `domain::session::error_codes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Plugin script sources the page failed to load.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_sources: Vec<String>,
}

/// Body of a `/result` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

impl StatusBody {
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            status: "accepted".to_string(),
        }
    }

    #[must_use]
    pub fn rejected() -> Self {
        Self {
            status: "rejected".to_string(),
        }
    }
}
