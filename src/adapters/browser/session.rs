//! Remote signing session lifecycle.
//!
//! [`SessionManager::start`] binds a loopback endpoint for one request and
//! returns a [`SessionHandle`]. The session is shared between the handle, the
//! endpoint and a deadline watchdog; its state lives in a `watch` cell so the
//! single terminal transition is an atomic check-and-set and waiters are woken
//! without polling.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use base64::Engine;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::adapters::browser::protocol::{
    ConfigResponse, LogLine, LogsResponse, ResultSubmission, STATUS_ERROR, STATUS_OK,
};
use crate::adapters::browser::server;
use crate::domain::crypto::DigestBytes;
use crate::domain::pkcs7::SignatureContainer;
use crate::domain::session::{Nonce, Rejection, SessionFailure, SessionState};
use crate::infra::config::DEFAULT_PLUGIN_SCRIPT_SOURCES;
use crate::infra::error::{SigningError, SigningResult};
use crate::services::pkcs7;
use crate::DigestAlgorithm;

/// Extra time allowed for the endpoint to stop after the session ends.
const TEARDOWN_MARGIN: Duration = Duration::from_secs(2);

/// Per-session behaviour of the endpoint.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Expose the diagnostic log to the page through `/logs`.
    pub log_to_page: bool,
    /// Plugin loader scripts the page tries, in order.
    pub plugin_script_sources: Vec<String>,
    /// How long the endpoint keeps serving after the browser posted a result.
    pub shutdown_grace: Duration,
    /// Maximum number of buffered log lines.
    pub log_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            log_to_page: true,
            plugin_script_sources: DEFAULT_PLUGIN_SCRIPT_SOURCES
                .iter()
                .map(ToString::to_string)
                .collect(),
            shutdown_grace: Duration::from_millis(1500),
            log_capacity: 500,
        }
    }
}

/// What the browser is asked to sign.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    digest: DigestBytes,
    document: Option<(String, Vec<u8>)>,
}

impl SigningRequest {
    #[must_use]
    pub fn new(digest: DigestBytes) -> Self {
        Self {
            digest,
            document: None,
        }
    }

    /// Also hand the document itself to the page, for plugins that hash it.
    #[must_use]
    pub fn with_document(mut self, name: impl Into<String>, content: Vec<u8>) -> Self {
        self.document = Some((name.into(), content));
        self
    }

    #[must_use]
    pub fn digest(&self) -> &DigestBytes {
        &self.digest
    }

    #[must_use]
    pub fn document_name(&self) -> Option<&str> {
        self.document.as_ref().map(|(name, _)| name.as_str())
    }
}

struct LogBuffer {
    lines: VecDeque<LogLine>,
    last_id: u64,
    capacity: usize,
}

impl LogBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            last_id: 0,
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, message: String) {
        self.last_id += 1;
        self.lines.push_back(LogLine {
            id: self.last_id,
            message,
        });
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    fn since(&self, after: u64) -> LogsResponse {
        LogsResponse {
            last: self.last_id,
            items: self
                .lines
                .iter()
                .filter(|line| line.id > after)
                .cloned()
                .collect(),
        }
    }
}

/// State shared by the handle, the endpoint and the watchdog.
pub(crate) struct SigningSession {
    nonce: Nonce,
    request: SigningRequest,
    settings: SessionSettings,
    created: Instant,
    deadline: Instant,
    state: watch::Sender<SessionState>,
    logs: Mutex<LogBuffer>,
    port: OnceLock<u16>,
}

impl SigningSession {
    pub(crate) fn new(request: SigningRequest, settings: SessionSettings, timeout: Duration) -> Self {
        let created = Instant::now();
        let (state, _) = watch::channel(SessionState::Pending);
        let logs = Mutex::new(LogBuffer::new(settings.log_capacity));
        Self {
            nonce: Nonce::generate(),
            request,
            settings,
            created,
            deadline: created + timeout,
            state,
            logs,
            port: OnceLock::new(),
        }
    }

    pub(crate) fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    pub(crate) fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }

    pub(crate) fn port(&self) -> Option<u16> {
        self.port.get().copied()
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Log a diagnostic line and append it to the page buffer.
    pub(crate) fn record(&self, level: log::Level, message: impl Into<String>) {
        let message = message.into();
        log::log!(level, "{message}");
        let elapsed = self.created.elapsed().as_secs_f32();
        if let Ok(mut logs) = self.logs.lock() {
            logs.push(format!("[{elapsed:7.2}s] {level}: {message}"));
        }
    }

    pub(crate) fn logs_since(&self, after: u64) -> LogsResponse {
        match self.logs.lock() {
            Ok(logs) => logs.since(after),
            Err(_) => LogsResponse {
                last: 0,
                items: Vec::new(),
            },
        }
    }

    pub(crate) fn config_response(&self) -> ConfigResponse {
        let b64 = base64::engine::general_purpose::STANDARD;
        let digest = self.request.digest();
        let (initial_logs, last_log_id) = if self.settings.log_to_page {
            let logs = self.logs_since(0);
            (logs.items, logs.last)
        } else {
            (Vec::new(), 0)
        };
        ConfigResponse {
            nonce: self.nonce.as_str().to_string(),
            document_name: self.request.document_name().map(ToString::to_string),
            content_base64: self
                .request
                .document
                .as_ref()
                .map(|(_, content)| b64.encode(content)),
            digest_base64: b64.encode(digest.as_slice()),
            digest_algorithm: digest.algorithm().as_str().to_string(),
            digest_algorithm_oid: digest.algorithm().oid().to_string(),
            log_enabled: self.settings.log_to_page,
            initial_logs,
            last_log_id,
            plugin_script_sources: self.settings.plugin_script_sources.clone(),
        }
    }

    /// Move to a terminal state unless one was already reached.
    ///
    /// On refusal the error names the state that won.
    pub(crate) fn transition(&self, next: SessionState) -> Result<(), Rejection> {
        let mut current = "pending";
        let changed = self.state.send_if_modified(|state| {
            if state.is_terminal() {
                current = state.label();
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            Ok(())
        } else {
            Err(Rejection::SessionReplay(current))
        }
    }

    /// Apply a result posted by the page.
    ///
    /// Checks run in order: nonce, session still pending, body well formed.
    /// Only the first accepted submission changes the state.
    pub(crate) fn submit_result(&self, submission: ResultSubmission) -> Result<(), Rejection> {
        if !self.nonce.matches(&submission.nonce) {
            return Err(Rejection::NonceMismatch);
        }

        if Instant::now() >= self.deadline {
            self.expire();
        }
        let state = self.state();
        if state.is_terminal() {
            return Err(Rejection::SessionReplay(state.label()));
        }

        let next = match submission.status.as_str() {
            STATUS_OK => {
                let encoded = submission
                    .signature
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| Rejection::Malformed("no signature".to_string()))?;
                let signature = base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| Rejection::Malformed(format!("bad signature encoding: {e}")))?;
                if signature.is_empty() {
                    return Err(Rejection::Malformed("empty signature".to_string()));
                }
                SessionState::Completed(signature)
            }
            STATUS_ERROR => SessionState::Failed(SessionFailure::from_browser(
                submission.error_code.as_deref(),
                submission.error.as_deref(),
                submission.failed_sources,
            )),
            other => return Err(Rejection::Malformed(format!("unknown status {other:?}"))),
        };

        let outcome = match &next {
            SessionState::Completed(signature) => {
                format!("Browser returned a signature ({} bytes)", signature.len())
            }
            SessionState::Failed(failure) => format!("Browser reported a failure: {failure}"),
            _ => String::new(),
        };
        self.transition(next)?;
        self.record(log::Level::Info, outcome);
        Ok(())
    }

    pub(crate) fn cancel(&self) {
        match self.transition(SessionState::Failed(SessionFailure::UserCancelled)) {
            Ok(()) => self.record(log::Level::Info, "Signing session cancelled"),
            Err(e) => log::debug!("Cancel ignored: {e}"),
        }
    }

    pub(crate) fn expire(&self) {
        match self.transition(SessionState::Expired) {
            Ok(()) => self.record(
                log::Level::Warn,
                format!(
                    "No result from the browser after {:.0} s, session expired",
                    (self.deadline - self.created).as_secs_f32()
                ),
            ),
            Err(e) => log::debug!("Expiry ignored: {e}"),
        }
    }
}

/// Resolve once the session reaches a terminal state.
pub(crate) async fn terminal_state(rx: &mut watch::Receiver<SessionState>) -> SessionState {
    loop {
        {
            let state = rx.borrow_and_update();
            if state.is_terminal() {
                return state.clone();
            }
        }
        if rx.changed().await.is_err() {
            return rx.borrow().clone();
        }
    }
}

/// Starts signing sessions with shared settings.
#[derive(Debug, Clone, Default)]
pub struct SessionManager {
    settings: SessionSettings,
}

impl SessionManager {
    #[must_use]
    pub fn new(settings: SessionSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Bind a fresh loopback endpoint for `request` and start the deadline.
    ///
    /// Must be called within a tokio runtime.
    pub async fn start(&self, request: SigningRequest, timeout: Duration) -> SigningResult<SessionHandle> {
        if timeout.is_zero() {
            return Err(SigningError::InvalidInput(
                "session timeout must be greater than zero".to_string(),
            ));
        }
        if request.digest().algorithm() == DigestAlgorithm::Md5 {
            return Err(SigningError::InvalidInput(
                "MD5 is accepted for verification only".to_string(),
            ));
        }

        let session = Arc::new(SigningSession::new(request, self.settings.clone(), timeout));
        let (addr, server) = server::bind(session.clone())?;
        // set once, before anyone can read it
        let _ = session.port.set(addr.port());
        let server = tokio::spawn(server);

        session.record(
            log::Level::Info,
            format!(
                "Signing endpoint listening on {addr}, waiting up to {} s",
                timeout.as_secs()
            ),
        );

        let watchdog = tokio::spawn(watch_deadline(session.clone()));

        Ok(SessionHandle {
            session,
            server: Some(server),
            watchdog: Some(watchdog),
        })
    }
}

async fn watch_deadline(session: Arc<SigningSession>) {
    let mut rx = session.subscribe();
    let deadline = tokio::time::Instant::from_std(session.deadline());
    tokio::select! {
        () = tokio::time::sleep_until(deadline) => session.expire(),
        _ = terminal_state(&mut rx) => {}
    }
}

/// Owner of a running session.
///
/// Dropping a handle whose session is still pending cancels it.
pub struct SessionHandle {
    session: Arc<SigningSession>,
    server: Option<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Page URL to open in the browser.
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "http://127.0.0.1:{}/?nonce={}",
            self.port(),
            self.session.nonce().as_str()
        )
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.session.port().unwrap_or_default()
    }

    #[must_use]
    pub fn nonce(&self) -> &str {
        self.session.nonce().as_str()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Force the session into `Failed(UserCancelled)` if still pending.
    pub fn cancel(&self) {
        self.session.cancel();
    }

    /// Cancellation token usable after the handle moved into `wait`.
    #[must_use]
    pub fn canceller(&self) -> SessionCanceller {
        SessionCanceller {
            session: self.session.clone(),
        }
    }

    /// Wait for the session outcome and parse the returned signature.
    ///
    /// Fails with `RemoteSigning` carrying the recorded reason when the
    /// session expired, was cancelled or the browser reported an error; the
    /// endpoint is stopped before returning in those cases.
    pub async fn wait(mut self) -> SigningResult<SignatureContainer> {
        let mut rx = self.session.subscribe();
        let state = terminal_state(&mut rx).await;
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }

        match state {
            SessionState::Completed(signature) => {
                log::debug!("Parsing signature returned by the browser");
                pkcs7::parse(&signature)
            }
            SessionState::Failed(failure) => {
                self.stop_endpoint().await;
                Err(SigningError::RemoteSigning(failure))
            }
            SessionState::Expired => {
                self.stop_endpoint().await;
                Err(SigningError::RemoteSigning(SessionFailure::SessionExpired))
            }
            SessionState::Pending => Err(SigningError::RemoteSigning(SessionFailure::Browser(
                "session ended without a result".to_string(),
            ))),
        }
    }

    async fn stop_endpoint(&mut self) {
        let Some(server) = self.server.take() else {
            return;
        };
        let limit = self.session.settings().shutdown_grace + TEARDOWN_MARGIN;
        match tokio::time::timeout(limit, server).await {
            Ok(Ok(())) => log::debug!("Signing endpoint stopped"),
            Ok(Err(e)) => log::warn!("Signing endpoint task failed: {e}"),
            Err(_) => log::warn!("Signing endpoint did not stop within {limit:?}"),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if !self.session.state().is_terminal() {
            log::debug!("Session handle dropped while pending");
            self.session.cancel();
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("port", &self.port())
            .field("state", &self.session.state().label())
            .finish_non_exhaustive()
    }
}

/// Cancels a session from another task.
#[derive(Clone)]
pub struct SessionCanceller {
    session: Arc<SigningSession>,
}

impl SessionCanceller {
    pub fn cancel(&self) {
        self.session.cancel();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.session.state().is_terminal()
    }
}
