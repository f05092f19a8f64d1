//! Reference store configuration.

use std::path::PathBuf;
use validator::Validate;

/// Realm served when none is configured.
pub const DEFAULT_REALM: &str = "EXAMPLE.COM";
/// Maximum number of principals held when none is configured.
pub const DEFAULT_CAPACITY: usize = 128;

/// Where the reference store loads its records from and which realm it serves.
#[derive(Debug, Clone, Validate)]
pub struct StoreConfig {
    /// Fixture file path.
    pub fixture: PathBuf,

    /// The single realm served by the store.
    #[validate(length(min = 1))]
    pub realm: String,

    /// Maximum number of principals.
    #[validate(range(min = 1))]
    pub capacity: usize,
}

impl StoreConfig {
    /// Creates a configuration for `fixture` with the default realm and capacity.
    #[must_use]
    pub fn new(fixture: impl Into<PathBuf>) -> Self {
        Self {
            fixture: fixture.into(),
            realm: DEFAULT_REALM.to_string(),
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Overrides the realm.
    #[must_use]
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Overrides the capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}
