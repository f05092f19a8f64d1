//! In-memory reference administration service.

use async_trait::async_trait;
use chrono::Utc;
use krbdir_core::{
    AdminConnection, AdminService, Credential, Error, FieldMask, NameList, Principal,
    PrincipalName, PrincipalSeed, Result,
};
use secrecy::{ExposeSecret, SecretString};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use validator::Validate;

use crate::config::StoreConfig;
use crate::fixture::{read_fixture, FixtureError};
use crate::pattern::{compile_query, NAME_MATCH};

#[derive(Debug)]
struct Entry {
    record: Principal,
    secret: Option<SecretString>,
}

#[derive(Debug)]
struct StoreInner {
    realm: String,
    capacity: usize,
    admin: PrincipalName,
    admin_secret: Option<SecretString>,
    table: Mutex<Vec<Entry>>,
}

/// Fixture-loaded stand-in for a remote administration service.
///
/// All records live in one table guarded by a single lock, so every operation is atomic with
/// respect to every other. Records keep insertion order; reads return copies. The first fixture
/// record is the administrative principal.
///
/// Cloning yields another handle to the same table.
#[derive(Debug, Clone)]
pub struct ReferenceStore {
    inner: Arc<StoreInner>,
}

impl ReferenceStore {
    /// Loads the fixture named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] for an invalid configuration or unreadable file
    /// and [`Error::BadData`] for a malformed or empty fixture.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let file = File::open(&config.fixture).map_err(|source| FixtureError::Open {
            path: config.fixture.clone(),
            source,
        })?;
        let store = Self::from_reader(BufReader::new(file), &config.realm, config.capacity)?;
        info!(
            fixture = %config.fixture.display(),
            realm = %config.realm,
            principals = store.len(),
            "reference store loaded"
        );
        Ok(store)
    }

    /// Loads records from any fixture reader.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError`] if the fixture is malformed or holds no records.
    pub fn from_reader(
        reader: impl BufRead,
        realm: &str,
        capacity: usize,
    ) -> std::result::Result<Self, FixtureError> {
        let records = read_fixture(reader, capacity)?;

        let mut table = Vec::with_capacity(records.len());
        for row in records {
            let mut builder = Principal::builder(PrincipalName::new(row.name, realm))
                .attributes(row.attributes);
            if let Some(policy) = row.policy {
                builder = builder.policy(policy);
            }
            if let Some(by) = row.modified_by {
                let by = PrincipalName::parse(&by, realm).map_err(|err| FixtureError::Parse {
                    line: row.line,
                    message: err.to_string(),
                })?;
                builder = builder.modified_by(by);
            }
            if let Some(at) = row.modified_at {
                builder = builder.modified_at(at);
            }
            table.push(Entry {
                record: builder.build(),
                secret: row.secret.map(SecretString::from),
            });
        }

        let admin = table
            .first()
            .map(|entry| entry.record.name.clone())
            .ok_or(FixtureError::Empty)?;
        let admin_secret = table.first().and_then(|entry| entry.secret.clone());

        Ok(Self {
            inner: Arc::new(StoreInner {
                realm: realm.to_string(),
                capacity,
                admin,
                admin_secret,
                table: Mutex::new(table),
            }),
        })
    }

    /// The realm this store serves.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.inner.realm
    }

    /// Maximum number of principals.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// The administrative principal.
    #[must_use]
    pub fn admin(&self) -> &PrincipalName {
        &self.inner.admin
    }

    /// Number of principals currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Returns true if no principals are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Copies of all records in table order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Principal> {
        self.table().iter().map(|entry| entry.record.clone()).collect()
    }

    /// Returns true if `secret` is the current secret of `name`.
    #[must_use]
    pub fn verify_secret(&self, name: &PrincipalName, secret: &str) -> bool {
        let table = self.table();
        position(&table, name)
            .and_then(|index| table[index].secret.as_ref())
            .is_some_and(|stored| stored.expose_secret() == secret)
    }

    /// Fetches a copy of a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `name` is not stored.
    pub fn get(&self, name: &PrincipalName) -> Result<Principal> {
        let table = self.table();
        position(&table, name)
            .map(|index| table[index].record.clone())
            .ok_or_else(|| not_found(name))
    }

    /// Adds a record built from the masked fields of `seed`, stamped with `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the mask lacks the principal identity or names both
    /// policy bits, [`Error::AlreadyExists`], [`Error::CapacityExceeded`] and
    /// [`Error::BadRealm`], checked in that order.
    pub fn create(
        &self,
        actor: &PrincipalName,
        name: &PrincipalName,
        seed: &PrincipalSeed,
        mask: FieldMask,
        secret: Option<SecretString>,
    ) -> Result<()> {
        if !mask.contains(FieldMask::PRINCIPAL) {
            return Err(Error::InvalidInput(
                "principal identity missing from create mask".to_string(),
            ));
        }
        let mask = mask.check_policy()?;

        let mut table = self.table();
        if position(&table, name).is_some() {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        if table.len() >= self.inner.capacity {
            return Err(Error::CapacityExceeded(format!(
                "store holds at most {} principals",
                self.inner.capacity
            )));
        }
        self.check_realm(name)?;

        let mut record = Principal::builder(name.clone()).build();
        record.apply_seed(name, seed, mask);
        record.stamp(actor, Utc::now());
        table.push(Entry { record, secret });
        debug!(principal = %name, by = %actor, "principal created");
        Ok(())
    }

    /// Applies the masked fields of `seed` to an existing record and restamps it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an identity or contradictory policy mask and
    /// [`Error::NotFound`] if `name` is not stored.
    pub fn modify(
        &self,
        actor: &PrincipalName,
        name: &PrincipalName,
        seed: &PrincipalSeed,
        mask: FieldMask,
    ) -> Result<()> {
        let mask = mask.for_modify()?;

        let mut table = self.table();
        let index = position(&table, name).ok_or_else(|| not_found(name))?;
        let record = &mut table[index].record;
        record.apply_seed(name, seed, mask);
        record.stamp(actor, Utc::now());
        debug!(principal = %name, by = %actor, mask = mask.bits(), "principal modified");
        Ok(())
    }

    /// Removes a record, keeping the order of the rest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `name` is not stored.
    pub fn delete(&self, name: &PrincipalName) -> Result<()> {
        let mut table = self.table();
        let index = position(&table, name).ok_or_else(|| not_found(name))?;
        table.remove(index);
        debug!(principal = %name, "principal deleted");
        Ok(())
    }

    /// Renames a record in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if `new` is taken, then [`Error::NotFound`] if `old` is
    /// not stored, then [`Error::BadRealm`] if `new` lies outside the store realm.
    pub fn rename(&self, old: &PrincipalName, new: &PrincipalName) -> Result<()> {
        let mut table = self.table();
        if position(&table, new).is_some() {
            return Err(Error::AlreadyExists(new.to_string()));
        }
        let index = position(&table, old).ok_or_else(|| not_found(old))?;
        self.check_realm(new)?;
        table[index].record.name = new.clone();
        debug!(from = %old, to = %new, "principal renamed");
        Ok(())
    }

    /// Replaces a record's secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `name` is not stored.
    pub fn change_secret(&self, name: &PrincipalName, secret: &SecretString) -> Result<()> {
        let mut table = self.table();
        let index = position(&table, name).ok_or_else(|| not_found(name))?;
        table[index].secret = Some(secret.clone());
        debug!(principal = %name, "secret changed");
        Ok(())
    }

    /// Lists `name@realm` strings matching a shell wildcard pattern, in table order.
    ///
    /// `*` and `?` also match `/`, and a `[` with no closing bracket matches itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the pattern cannot be compiled.
    pub fn list(&self, pattern: Option<&str>) -> Result<NameList> {
        let pattern = pattern
            .map(compile_query)
            .transpose()
            .map_err(|err| Error::InvalidInput(format!("invalid search pattern: {err}")))?;

        let names = self
            .table()
            .iter()
            .map(|entry| entry.record.name.to_string())
            .filter(|name| {
                pattern
                    .as_ref()
                    .map_or(true, |p| p.matches_with(name, NAME_MATCH))
            })
            .collect::<Vec<_>>();
        Ok(NameList::new(names))
    }

    fn check_realm(&self, name: &PrincipalName) -> Result<()> {
        if name.in_realm(&self.inner.realm) {
            Ok(())
        } else {
            Err(Error::BadRealm(format!(
                "{name} is not in realm {}",
                self.inner.realm
            )))
        }
    }

    fn table(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.inner
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn position(table: &[Entry], name: &PrincipalName) -> Option<usize> {
    table.iter().position(|entry| &entry.record.name == name)
}

fn not_found(name: &PrincipalName) -> Error {
    Error::NotFound(name.to_string())
}

#[async_trait]
impl AdminService for ReferenceStore {
    async fn authenticate(
        &self,
        identity: &str,
        credential: &Credential,
        realm: &str,
    ) -> Result<Box<dyn AdminConnection>> {
        if realm != self.realm() {
            return Err(Error::BadRealm(format!(
                "store serves {}, not {realm}",
                self.realm()
            )));
        }
        let actor = PrincipalName::parse(identity, realm)?;
        if &actor != self.admin() {
            return Err(Error::AuthError(format!("login failed for {actor}")));
        }

        match credential {
            Credential::Password(password) => match &self.inner.admin_secret {
                Some(expected) if expected.expose_secret() == password.expose_secret() => {}
                Some(_) => return Err(Error::AuthError(format!("login failed for {actor}"))),
                None => {
                    return Err(Error::AuthError(format!(
                        "{actor} has no password; use key material"
                    )))
                }
            },
            Credential::Keytab(_) => {}
        }

        debug!(identity = %actor, "reference connection opened");
        Ok(Box::new(ReferenceConnection {
            store: self.clone(),
            actor,
            open: true,
        }))
    }

    async fn default_realm(&self) -> Result<String> {
        Ok(self.realm().to_string())
    }
}

/// Connection to a [`ReferenceStore`], acting as the authenticated administrator.
#[derive(Debug)]
pub struct ReferenceConnection {
    store: ReferenceStore,
    actor: PrincipalName,
    open: bool,
}

impl ReferenceConnection {
    fn store(&self) -> Result<&ReferenceStore> {
        if self.open {
            Ok(&self.store)
        } else {
            Err(Error::ConnectionError("connection is closed".to_string()))
        }
    }
}

#[async_trait]
impl AdminConnection for ReferenceConnection {
    async fn get_principal(&mut self, name: &PrincipalName) -> Result<Principal> {
        self.store()?.get(name)
    }

    async fn create_principal(
        &mut self,
        name: &PrincipalName,
        seed: &PrincipalSeed,
        mask: FieldMask,
        secret: Option<SecretString>,
    ) -> Result<()> {
        self.store()?.create(&self.actor, name, seed, mask, secret)
    }

    async fn modify_principal(
        &mut self,
        name: &PrincipalName,
        seed: &PrincipalSeed,
        mask: FieldMask,
    ) -> Result<()> {
        self.store()?.modify(&self.actor, name, seed, mask)
    }

    async fn delete_principal(&mut self, name: &PrincipalName) -> Result<()> {
        self.store()?.delete(name)
    }

    async fn rename_principal(&mut self, old: &PrincipalName, new: &PrincipalName) -> Result<()> {
        self.store()?.rename(old, new)
    }

    async fn change_secret(&mut self, name: &PrincipalName, secret: &SecretString) -> Result<()> {
        self.store()?.change_secret(name, secret)
    }

    async fn list_principals(&mut self, pattern: Option<String>) -> Result<NameList> {
        self.store()?.list(pattern.as_deref())
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}
