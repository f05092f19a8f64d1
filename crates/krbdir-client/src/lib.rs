//! Directory client for Kerberos-style principal administration.
//!
//! A [`Session`] authenticates an administrative identity against any
//! [`AdminService`](krbdir_core::AdminService) and holds the resulting connection. Directory
//! operations are issued through the [`DirectoryClient`] borrowed from it.

#![deny(missing_docs)]

mod client;
mod filter;
mod page;
mod session;

pub use client::{DirectoryClient, WILDCARD};
pub use filter::NameFilter;
pub use page::{paginate, PageWindow, SearchPage};
pub use session::Session;

/// Convenient result alias that reuses the core error type.
pub type Result<T> = krbdir_core::Result<T>;
