//! claimscope-common — shared error type, NCBI credential handling, and the
//! sandboxed HTTP client used by the other claimscope crates.

pub mod credentials;
pub mod error;
pub mod sandbox;

pub use credentials::NcbiCredentials;
pub use error::{ClaimscopeError, Result};
pub use sandbox::SandboxClient;
