//! Adapters to collaborators outside the process.

pub mod browser;
