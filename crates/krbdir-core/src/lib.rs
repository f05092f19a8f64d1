//! # krbdir-core
//!
//! Core types and collaborator contracts for administering principals in a
//! Kerberos-style authentication realm.
//!
//! This crate provides the error taxonomy, principal records, field masks and the
//! [`service::AdminService`] seam that both the directory client and the in-memory
//! reference store are built around.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy, administration-service status mapping and message rendering
//! - [`name`] - Realm-qualified principal names
//! - [`principal`] - Principal records, seeds and attribute flags
//! - [`mask`] - Field masks for partial updates
//! - [`config`] - Session configuration
//! - [`service`] - Administration service and connection traits

#![deny(missing_docs)]
#![cfg_attr(any(test, feature = "mock"), allow(missing_docs))]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod mask;
pub mod name;
pub mod principal;
pub mod service;

// Re-export commonly used types
pub use config::{Credential, SessionConfig};
pub use error::{render_error, AdminStatus, Error, Result};
pub use mask::FieldMask;
pub use name::PrincipalName;
pub use principal::{Principal, PrincipalFlag, PrincipalFlags, PrincipalSeed};
pub use service::{AdminConnection, AdminService, NameList};
