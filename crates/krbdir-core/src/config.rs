//! Session configuration.
//!
//! A [`SessionConfig`] names the administrative identity, the credential used to prove it and
//! the optional realm to operate in. The same value is used for the first login and for every
//! renewal.

use secrecy::SecretString;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::error::{Error, Result};

/// Default timeout applied to every administration-service call (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 15;

/// Proof of identity for the administrative principal.
///
/// Exactly one kind of credential is carried at a time.
#[derive(Clone)]
pub enum Credential {
    /// A plaintext password.
    Password(SecretString),
    /// A keytab file on disk.
    Keytab(PathBuf),
}

impl Credential {
    /// Short label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::Keytab(_) => "keytab",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password([REDACTED])"),
            Self::Keytab(path) => f.debug_tuple("Keytab").field(path).finish(),
        }
    }
}

/// Parameters for establishing an administrative session.
#[derive(Debug, Clone, Validate)]
pub struct SessionConfig {
    /// Administrative principal, optionally realm-qualified.
    #[validate(length(min = 1))]
    pub admin_identity: String,

    /// Realm to operate in; the service default is used when absent.
    #[validate(length(min = 1))]
    pub realm: Option<String>,

    /// Credential for the administrative principal.
    pub credential: Option<Credential>,

    /// Timeout for each administration-service call in seconds.
    #[validate(range(min = 1, max = 300))]
    pub operation_timeout_secs: u64,

    /// Lifetime of the administrative credential in seconds; 0 means unbounded and disables
    /// session reuse.
    pub credential_lifetime_secs: u64,
}

impl SessionConfig {
    /// Creates a configuration for `admin_identity` with no credential set.
    #[must_use]
    pub fn new(admin_identity: impl Into<String>) -> Self {
        Self {
            admin_identity: admin_identity.into(),
            realm: None,
            credential: None,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            credential_lifetime_secs: 0,
        }
    }

    /// Sets the realm to operate in.
    #[must_use]
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Authenticates with a password. Replaces any keytab.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.credential = Some(Credential::Password(SecretString::from(password.into())));
        self
    }

    /// Authenticates with a keytab file. Replaces any password.
    #[must_use]
    pub fn with_keytab(mut self, path: impl Into<PathBuf>) -> Self {
        self.credential = Some(Credential::Keytab(path.into()));
        self
    }

    /// Overrides the per-call timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }

    /// Sets the expected credential lifetime in seconds.
    #[must_use]
    pub const fn with_credential_lifetime_secs(mut self, seconds: u64) -> Self {
        self.credential_lifetime_secs = seconds;
        self
    }

    /// Returns the per-call timeout.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Returns the credential lifetime, if bounded.
    #[must_use]
    pub const fn credential_lifetime(&self) -> Option<Duration> {
        if self.credential_lifetime_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.credential_lifetime_secs))
        }
    }

    /// Validates field ranges and that a credential is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if any field is out of range or no credential was
    /// provided.
    pub fn validate_credentials(&self) -> Result<&Credential> {
        self.validate()?;
        self.credential.as_ref().ok_or_else(|| {
            Error::ConfigurationError(
                "either a password or a keytab must be provided".to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults() {
        let config = SessionConfig::new("admin/admin");
        assert_eq!(config.operation_timeout(), Duration::from_secs(15));
        assert!(config.realm.is_none());
        assert!(config.credential_lifetime().is_none());
    }

    #[test]
    fn missing_credential_is_configuration_error() {
        let err = SessionConfig::new("admin").validate_credentials().unwrap_err();
        assert!(matches!(err, Error::ConfigurationError(_)));
    }

    #[test]
    fn last_credential_wins() {
        let config = SessionConfig::new("admin")
            .with_keytab("/etc/admin.keytab")
            .with_password("hunter2");
        match config.validate_credentials().unwrap() {
            Credential::Password(secret) => assert_eq!(secret.expose_secret(), "hunter2"),
            Credential::Keytab(_) => panic!("expected password"),
        }
    }

    #[test]
    fn out_of_range_values_rejected() {
        let config = SessionConfig::new("admin")
            .with_password("pw")
            .with_operation_timeout_secs(0);
        assert!(matches!(
            config.validate_credentials(),
            Err(Error::ConfigurationError(_))
        ));

        let config = SessionConfig::new("").with_password("pw");
        assert!(config.validate_credentials().is_err());

        let config = SessionConfig::new("admin").with_password("pw").with_realm("");
        assert!(config.validate_credentials().is_err());
    }

    #[test]
    fn debug_does_not_leak_password() {
        let config = SessionConfig::new("admin").with_password("hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn bounded_lifetime() {
        let config = SessionConfig::new("admin").with_credential_lifetime_secs(60);
        assert_eq!(config.credential_lifetime(), Some(Duration::from_secs(60)));
    }
}
