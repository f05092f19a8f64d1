//! Directory client operations.

use krbdir_core::name::has_realm;
use krbdir_core::{Error, FieldMask, Principal, PrincipalName, PrincipalSeed, Result};
use secrecy::SecretString;
use tracing::{debug, info};

use crate::page::{paginate, SearchPage};
use crate::session::{with_timeout, Live, Session};

/// Character that switches [`DirectoryClient::search`] to glob matching.
pub const WILDCARD: char = '*';

/// Request layer over a live [`Session`].
///
/// The client borrows the session for its own lifetime and never retains the connection beyond
/// a call. Every operation fails with [`Error::AuthError`] without contacting the service when
/// the session has no connection.
#[derive(Debug)]
pub struct DirectoryClient<'a> {
    session: &'a mut Session,
}

impl<'a> DirectoryClient<'a> {
    pub(crate) fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    /// Fetches a principal, qualifying `name` with the session realm when it has none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the principal does not exist.
    pub async fn get(&mut self, name: &str) -> Result<Principal> {
        let mut live = self.session.live()?;
        let name = qualify(&live, name)?;
        debug!(principal = %name, "fetching principal");
        with_timeout(live.timeout, live.connection.get_principal(&name)).await
    }

    /// Creates a principal from the masked fields of `seed`.
    ///
    /// The mask is extended with [`FieldMask::PRINCIPAL`]. A `POLICY` request without a policy
    /// value is sent as `POLICY_CLEAR`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a contradictory mask, [`Error::AlreadyExists`] if the
    /// name is taken and [`Error::BadRealm`] if the seed names a foreign realm.
    pub async fn create(
        &mut self,
        seed: &PrincipalSeed,
        mask: FieldMask,
        secret: Option<SecretString>,
    ) -> Result<()> {
        let mut live = self.session.live()?;
        let mask = mask.for_create()?.resolve_policy(seed.policy.is_some());
        let name = qualify(&live, &seed.name)?;
        info!(principal = %name, mask = mask.bits(), "creating principal");
        with_timeout(
            live.timeout,
            live.connection.create_principal(&name, seed, mask, secret),
        )
        .await
    }

    /// Applies the masked fields of `seed` to an existing principal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the mask names the principal identity or both policy
    /// bits, and [`Error::NotFound`] if the principal does not exist.
    pub async fn modify(&mut self, seed: &PrincipalSeed, mask: FieldMask) -> Result<()> {
        let mut live = self.session.live()?;
        let mask = mask.for_modify()?.resolve_policy(seed.policy.is_some());
        let name = qualify(&live, &seed.name)?;
        info!(principal = %name, mask = mask.bits(), "modifying principal");
        with_timeout(
            live.timeout,
            live.connection.modify_principal(&name, seed, mask),
        )
        .await
    }

    /// Deletes a principal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the principal does not exist, including on a repeated
    /// delete.
    pub async fn delete(&mut self, name: &str) -> Result<()> {
        let mut live = self.session.live()?;
        let name = qualify(&live, name)?;
        info!(principal = %name, "deleting principal");
        with_timeout(live.timeout, live.connection.delete_principal(&name)).await
    }

    /// Renames a principal. Both names are qualified before the service sees them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if `new_name` is taken, otherwise [`Error::NotFound`] if
    /// `old_name` does not exist.
    pub async fn rename(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        let mut live = self.session.live()?;
        let old = qualify(&live, old_name)?;
        let new = qualify(&live, new_name)?;
        info!(from = %old, to = %new, "renaming principal");
        with_timeout(live.timeout, live.connection.rename_principal(&old, &new)).await
    }

    /// Replaces a principal's secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the principal does not exist.
    pub async fn change_credential(&mut self, name: &str, secret: &SecretString) -> Result<()> {
        let mut live = self.session.live()?;
        let name = qualify(&live, name)?;
        info!(principal = %name, "changing principal secret");
        with_timeout(live.timeout, live.connection.change_secret(&name, secret)).await
    }

    /// Searches for principals and returns one page of fully fetched records.
    ///
    /// A query containing [`WILDCARD`], or no query at all, is matched as a glob against
    /// `name@realm`; the session realm is appended when the query has none, and every record in
    /// the page is fetched afterwards. Any other query is a single exact lookup whose record is
    /// returned as is, and a missing principal yields an empty page rather than an error.
    ///
    /// `page_size` 0 means unbounded. Returns `Ok(None)` when `offset` lies beyond the last
    /// match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadData`] if the service reports more matches than it lists, and
    /// propagates failures of the listing or of any per-record fetch.
    pub async fn search(
        &mut self,
        query: Option<&str>,
        page_size: usize,
        offset: usize,
    ) -> Result<Option<SearchPage>> {
        let mut live = self.session.live()?;
        if let Some(query) = query.filter(|query| !query.contains(WILDCARD)) {
            let found = exact_match(&mut live, query).await?;
            return Ok(paginate(found.len(), page_size, offset).map(|window| SearchPage {
                principals: found[window.range()].to_vec(),
                remaining: window.remaining,
            }));
        }

        let matches = glob_matches(&mut live, query).await?;
        let Some(window) = paginate(matches.len(), page_size, offset) else {
            debug!(total = matches.len(), offset, "page offset beyond end of matches");
            return Ok(None);
        };

        let mut principals = Vec::with_capacity(window.len);
        for name in &matches[window.range()] {
            principals.push(with_timeout(live.timeout, live.connection.get_principal(name)).await?);
        }
        debug!(
            total = matches.len(),
            returned = principals.len(),
            remaining = window.remaining,
            "search complete"
        );
        Ok(Some(SearchPage {
            principals,
            remaining: window.remaining,
        }))
    }
}

fn qualify(live: &Live<'_>, name: &str) -> Result<PrincipalName> {
    Ok(PrincipalName::parse(name, live.realm)?)
}

async fn exact_match(live: &mut Live<'_>, query: &str) -> Result<Vec<Principal>> {
    let name = qualify(live, query)?;
    match with_timeout(live.timeout, live.connection.get_principal(&name)).await {
        Ok(principal) => Ok(vec![principal]),
        Err(Error::NotFound(_)) => Ok(Vec::new()),
        Err(err) => Err(err),
    }
}

async fn glob_matches(live: &mut Live<'_>, query: Option<&str>) -> Result<Vec<PrincipalName>> {
    let pattern = query.map(|query| {
        if has_realm(query) {
            query.to_string()
        } else {
            format!("{query}@{}", live.realm)
        }
    });
    debug!(pattern = pattern.as_deref().unwrap_or("<all>"), "listing principals");

    let list = with_timeout(live.timeout, live.connection.list_principals(pattern)).await?;
    if list.names.len() < list.count {
        return Err(Error::BadData(format!(
            "service reported {} matches but returned {}",
            list.count,
            list.names.len()
        )));
    }

    list.names
        .iter()
        .take(list.count)
        .map(|name| PrincipalName::parse_qualified(name).map_err(Error::from))
        .collect()
}
