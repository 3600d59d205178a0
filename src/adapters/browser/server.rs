//! Loopback HTTP endpoint of a signing session.
//!
//! Routes:
//! - `GET /?nonce=` serves the bridge page
//! - `GET /config?nonce=` returns the session parameters
//! - `GET /logs?nonce=&after=` returns buffered diagnostic lines
//! - `POST /result` accepts the browser outcome once
//!
//! Refusals carry a minimal body; the reason goes to the session log.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use warp::hyper::body::Bytes;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Reply};

use crate::adapters::browser::protocol::{ResultSubmission, StatusBody};
use crate::adapters::browser::session::{terminal_state, SigningSession};
use crate::domain::session::{Rejection, SessionFailure, SessionState};
use crate::infra::error::SigningResult;

/// Bridge page served at `/`.
pub const INDEX_HTML: &str = include_str!("web/index.html");

/// Upper bound for a posted result body.
const MAX_RESULT_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
struct SessionQuery {
    nonce: Option<String>,
    after: Option<String>,
}

/// Bind the endpoint on an ephemeral loopback port.
///
/// The returned future serves requests until the session is terminal, then
/// stops: immediately after expiry or cancellation, after the configured grace
/// period when the browser posted the outcome.
pub(crate) fn bind(
    session: Arc<SigningSession>,
) -> SigningResult<(SocketAddr, impl Future<Output = ()> + Send + 'static)> {
    let routes = build_routes(session.clone());
    let (addr, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(([127, 0, 0, 1], 0), shutdown_signal(session))?;
    Ok((addr, server))
}

async fn shutdown_signal(session: Arc<SigningSession>) {
    let mut rx = session.subscribe();
    let grace = match terminal_state(&mut rx).await {
        SessionState::Completed(_) => session.settings().shutdown_grace,
        SessionState::Failed(SessionFailure::UserCancelled) | SessionState::Expired => {
            Duration::ZERO
        }
        SessionState::Failed(_) => session.settings().shutdown_grace,
        SessionState::Pending => Duration::ZERO,
    };
    if !grace.is_zero() {
        tokio::time::sleep(grace).await;
    }
    log::debug!("Shutting down signing endpoint");
}

/// Build all endpoint routes.
pub(crate) fn build_routes(
    session: Arc<SigningSession>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let page = page_route(session.clone());
    let config = config_route(session.clone());
    let logs = logs_route(session.clone());
    let result = result_route(session);

    page.or(config).or(logs).or(result)
}

fn page_route(
    session: Arc<SigningSession>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .and(warp::addr::remote())
        .and(warp::query::<SessionQuery>())
        .and(with_session(session))
        .and_then(handle_page_request)
}

fn config_route(
    session: Arc<SigningSession>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("config")
        .and(warp::get())
        .and(warp::addr::remote())
        .and(warp::query::<SessionQuery>())
        .and(with_session(session))
        .and_then(handle_config_request)
}

fn logs_route(
    session: Arc<SigningSession>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("logs")
        .and(warp::get())
        .and(warp::addr::remote())
        .and(warp::query::<SessionQuery>())
        .and(with_session(session))
        .and_then(handle_logs_request)
}

fn result_route(
    session: Arc<SigningSession>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("result")
        .and(warp::post())
        .and(warp::addr::remote())
        .and(warp::body::content_length_limit(MAX_RESULT_BYTES))
        .and(warp::body::bytes())
        .and(with_session(session))
        .and_then(handle_result_request)
}

/// Inject the session into handlers.
fn with_session(
    session: Arc<SigningSession>,
) -> impl Filter<Extract = (Arc<SigningSession>,), Error = Infallible> + Clone {
    warp::any().map(move || session.clone())
}

/// Loopback peer and matching nonce, in that order.
fn authorize(
    session: &SigningSession,
    peer: Option<SocketAddr>,
    nonce: Option<&str>,
) -> Result<(), Rejection> {
    check_peer(peer)?;
    match nonce {
        Some(nonce) if session.nonce().matches(nonce) => Ok(()),
        _ => Err(Rejection::NonceMismatch),
    }
}

fn check_peer(peer: Option<SocketAddr>) -> Result<(), Rejection> {
    match peer {
        Some(addr) if addr.ip().is_loopback() => Ok(()),
        Some(addr) => Err(Rejection::ForeignPeer(addr.ip().to_string())),
        None => Err(Rejection::ForeignPeer("unknown".to_string())),
    }
}

fn refuse(session: &SigningSession, path: &str, rejection: &Rejection) -> Response {
    let status = match rejection {
        Rejection::NonceMismatch | Rejection::ForeignPeer(_) => StatusCode::FORBIDDEN,
        Rejection::SessionReplay(_) => StatusCode::CONFLICT,
        Rejection::Malformed(_) => StatusCode::BAD_REQUEST,
    };
    session.record(
        log::Level::Warn,
        format!("Refused {path} ({}): {rejection}", status.as_u16()),
    );
    warp::reply::with_status(warp::reply::json(&StatusBody::rejected()), status).into_response()
}

async fn handle_page_request(
    peer: Option<SocketAddr>,
    query: SessionQuery,
    session: Arc<SigningSession>,
) -> Result<Response, Infallible> {
    if let Err(rejection) = authorize(&session, peer, query.nonce.as_deref()) {
        return Ok(refuse(&session, "/", &rejection));
    }
    session.record(log::Level::Info, "Signing page opened");
    Ok(warp::reply::html(INDEX_HTML).into_response())
}

async fn handle_config_request(
    peer: Option<SocketAddr>,
    query: SessionQuery,
    session: Arc<SigningSession>,
) -> Result<Response, Infallible> {
    if let Err(rejection) = authorize(&session, peer, query.nonce.as_deref()) {
        return Ok(refuse(&session, "/config", &rejection));
    }
    log::debug!("Serving session configuration");
    Ok(warp::reply::with_status(
        warp::reply::json(&session.config_response()),
        StatusCode::OK,
    )
    .into_response())
}

async fn handle_logs_request(
    peer: Option<SocketAddr>,
    query: SessionQuery,
    session: Arc<SigningSession>,
) -> Result<Response, Infallible> {
    if let Err(rejection) = authorize(&session, peer, query.nonce.as_deref()) {
        return Ok(refuse(&session, "/logs", &rejection));
    }
    if !session.settings().log_to_page {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    let after = query
        .after
        .as_deref()
        .and_then(|after| after.trim().parse::<u64>().ok())
        .unwrap_or(0);
    Ok(warp::reply::json(&session.logs_since(after)).into_response())
}

async fn handle_result_request(
    peer: Option<SocketAddr>,
    body: Bytes,
    session: Arc<SigningSession>,
) -> Result<Response, Infallible> {
    if let Err(rejection) = check_peer(peer) {
        return Ok(refuse(&session, "/result", &rejection));
    }

    let submission: ResultSubmission = match serde_json::from_slice(&body) {
        Ok(submission) => submission,
        Err(e) => {
            let rejection = Rejection::Malformed(format!("invalid JSON: {e}"));
            return Ok(refuse(&session, "/result", &rejection));
        }
    };

    log::debug!(
        "Result submission: status={}, signature={} chars",
        submission.status,
        submission.signature.as_ref().map_or(0, String::len)
    );

    match session.submit_result(submission) {
        Ok(()) => Ok(warp::reply::with_status(
            warp::reply::json(&StatusBody::accepted()),
            StatusCode::OK,
        )
        .into_response()),
        Err(rejection) => Ok(refuse(&session, "/result", &rejection)),
    }
}
