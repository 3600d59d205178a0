//! Workflow pipelines orchestrating stateless services.

pub mod sign;
pub mod verify;

pub use sign::{BrowserSignOutcome, BrowserSignWorkflow};
pub use verify::VerifyWorkflow;
