//! Domain types: cryptographic artifacts, CMS containers, verification
//! outcomes and remote signing session state.

pub mod constants;
pub mod crypto;
pub mod pkcs7;
pub mod session;
pub mod verification;
