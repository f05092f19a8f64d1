//! Administration service and connection traits.
//!
//! [`AdminService`] is the authority that owns principal records. Authenticating against it
//! yields an [`AdminConnection`] through which every read and mutation is issued. The directory
//! client only ever talks to these traits, so a remote service and the in-memory reference
//! store are interchangeable.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::config::Credential;
use crate::error::Result;
use crate::mask::FieldMask;
use crate::name::PrincipalName;
use crate::principal::{Principal, PrincipalSeed};

/// Result of a wildcard listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameList {
    /// Matching realm-qualified names in the service's natural order.
    pub names: Vec<String>,
    /// Number of matches reported by the service.
    pub count: usize,
}

impl NameList {
    /// Builds a list whose count matches its length.
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let count = names.len();
        Self { names, count }
    }
}

/// An authenticated administration connection.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait AdminConnection: Send {
    /// Fetches a principal by exact name.
    async fn get_principal(&mut self, name: &PrincipalName) -> Result<Principal>;

    /// Creates `name` from the masked fields of `seed`, optionally with an initial secret.
    async fn create_principal(
        &mut self,
        name: &PrincipalName,
        seed: &PrincipalSeed,
        mask: FieldMask,
        secret: Option<SecretString>,
    ) -> Result<()>;

    /// Applies the masked fields of `seed` to an existing principal.
    async fn modify_principal(
        &mut self,
        name: &PrincipalName,
        seed: &PrincipalSeed,
        mask: FieldMask,
    ) -> Result<()>;

    /// Removes a principal.
    async fn delete_principal(&mut self, name: &PrincipalName) -> Result<()>;

    /// Renames a principal.
    async fn rename_principal(&mut self, old: &PrincipalName, new: &PrincipalName) -> Result<()>;

    /// Replaces a principal's secret.
    async fn change_secret(&mut self, name: &PrincipalName, secret: &SecretString) -> Result<()>;

    /// Lists names matching a glob pattern; `None` lists everything.
    async fn list_principals(&mut self, pattern: Option<String>) -> Result<NameList>;

    /// Releases the connection.
    async fn close(&mut self) -> Result<()>;
}

/// Authority that issues administration connections.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait AdminService: Send + Sync {
    /// Authenticates `identity` in `realm` and returns a live connection.
    async fn authenticate(
        &self,
        identity: &str,
        credential: &Credential,
        realm: &str,
    ) -> Result<Box<dyn AdminConnection>>;

    /// Returns the realm used when a session does not name one.
    async fn default_realm(&self) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn name_list_counts_names() {
        let list = NameList::new(vec!["a@R".to_string(), "b@R".to_string()]);
        assert_eq!(list.count, 2);
        assert_eq!(NameList::default().count, 0);
    }

    #[tokio::test]
    async fn mock_service_hands_out_connections() {
        let mut service = MockAdminService::new();
        service.expect_authenticate().returning(|_, _, _| {
            let mut connection = MockAdminConnection::new();
            connection
                .expect_get_principal()
                .returning(|name| Err(Error::NotFound(name.to_string())));
            Ok(Box::new(connection))
        });

        let credential = Credential::Keytab("/etc/krb5.keytab".into());
        let mut connection = service
            .authenticate("admin", &credential, "EXAMPLE.COM")
            .await
            .unwrap();
        let err = connection
            .get_principal(&PrincipalName::new("ghost", "EXAMPLE.COM"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
