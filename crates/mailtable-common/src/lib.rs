//! mailtable Common - Shared types and utilities
//!
//! This crate provides the lookup-backend contract, expansion types,
//! configuration, and error handling shared by all mailtable backends.

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use backend::LookupBackend;
pub use config::Config;
pub use error::{Error, Result};
pub use types::{EmailAddress, ExpansionList, ExpansionNode, LookupService, ServiceSet};
