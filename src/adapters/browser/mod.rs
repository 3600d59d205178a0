//! Browser-mediated remote signing.
//!
//! A short-lived loopback endpoint hands a digest to a page running the
//! CryptoPro browser plugin and accepts exactly one result back.

pub mod protocol;
pub mod server;
pub mod session;

pub use session::{SessionCanceller, SessionHandle, SessionManager, SessionSettings, SigningRequest};
