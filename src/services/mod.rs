//! Service layer module root.
//! Stateless parsing, validation and status evaluation over domain types.

pub mod ber;
pub mod gost;
pub mod pkcs7;
pub mod status;
pub mod verification;

pub use gost::GostPublicKey;
pub use status::{evaluate, evaluate_as_of, ReferenceTime};
pub use verification::SignatureValidator;
