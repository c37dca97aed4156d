//! # Data Models
//!
//! Typed records the operator keeps about its unit: credentials received over
//! relations and the status last reported to the host.

pub mod credentials;
pub mod status;

pub use credentials::{
    CredentialStore, DatabaseCredentials, IdentityCredentials, IncompleteCredentials,
};
pub use status::UnitStatus;
