//! In-memory reference administration service.
//!
//! [`ReferenceStore`] implements [`AdminService`](krbdir_core::AdminService) over a table loaded
//! from a fixture file, so the directory client can be exercised without a live realm.

#![deny(missing_docs)]

mod config;
mod fixture;
mod pattern;
mod store;

pub use config::{StoreConfig, DEFAULT_CAPACITY, DEFAULT_REALM};
pub use fixture::FixtureError;
pub use store::{ReferenceConnection, ReferenceStore};
