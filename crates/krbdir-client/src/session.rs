//! Administrative session lifecycle.

use krbdir_core::{
    render_error, AdminConnection, AdminService, Error, Result, SessionConfig,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::client::DirectoryClient;

/// An authenticated session against an [`AdminService`].
///
/// The session owns the authentication context (the service handle and resolved realm) and at
/// most one live administration connection. [`Session::renew`] replaces the connection in place;
/// [`Session::destroy`] releases everything.
pub struct Session {
    service: Option<Arc<dyn AdminService>>,
    realm: Option<String>,
    connection: Option<Box<dyn AdminConnection>>,
    operation_timeout: Duration,
    credential_lifetime: Option<Duration>,
    authenticated_at: Option<Instant>,
}

/// Borrowed view of a connected session, valid for a single client call.
pub(crate) struct Live<'a> {
    pub(crate) connection: &'a mut dyn AdminConnection,
    pub(crate) realm: &'a str,
    pub(crate) timeout: Duration,
}

impl Session {
    /// Validates `config`, then authenticates against `service`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if no credential is configured and
    /// [`Error::AuthError`] if the service rejects the identity or secret.
    pub async fn init(service: Arc<dyn AdminService>, config: &SessionConfig) -> Result<Self> {
        config.validate_credentials()?;

        let mut session = Self {
            service: Some(service),
            realm: None,
            connection: None,
            operation_timeout: config.operation_timeout(),
            credential_lifetime: config.credential_lifetime(),
            authenticated_at: None,
        };
        session.renew(config).await?;
        Ok(session)
    }

    /// Re-establishes the administration connection with a possibly updated configuration.
    ///
    /// The previous connection is closed first. When `config` names no realm, the realm already
    /// held by the session is kept. On failure the session has no connection but can be renewed
    /// again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthError`] if the session has been destroyed or authentication fails,
    /// and [`Error::ConfigurationError`] for an invalid configuration.
    pub async fn renew(&mut self, config: &SessionConfig) -> Result<()> {
        self.release_connection().await;

        let service = self
            .service
            .clone()
            .ok_or_else(|| Error::AuthError("session has been destroyed".to_string()))?;
        let credential = config.validate_credentials()?;
        self.operation_timeout = config.operation_timeout();
        self.credential_lifetime = config.credential_lifetime();

        let realm = match (&config.realm, &self.realm) {
            (Some(realm), _) => realm.clone(),
            (None, Some(realm)) => realm.clone(),
            (None, None) => with_timeout(self.operation_timeout, service.default_realm()).await?,
        };
        if self.realm.as_deref() != Some(realm.as_str()) {
            debug!(realm = %realm, "using realm");
            self.realm = Some(realm.clone());
        }

        let connection = with_timeout(
            self.operation_timeout,
            service.authenticate(&config.admin_identity, credential, &realm),
        )
        .await
        .map_err(|err| {
            warn!("authentication as {} failed: {err}", config.admin_identity);
            err
        })?;

        info!(
            identity = %config.admin_identity,
            realm = %realm,
            credential = credential.kind(),
            "administrative session established"
        );
        self.connection = Some(connection);
        self.authenticated_at = Some(Instant::now());
        Ok(())
    }

    /// Releases the connection, then the authentication context. Safe to call repeatedly.
    pub async fn destroy(&mut self) {
        self.release_connection().await;
        if self.service.take().is_some() {
            debug!("authentication context released");
        }
        self.realm = None;
    }

    /// Returns a directory client bound to this session for the duration of the borrow.
    pub fn client(&mut self) -> DirectoryClient<'_> {
        DirectoryClient::new(self)
    }

    /// The realm the session operates in.
    #[must_use]
    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    /// Returns true while a live administration connection is held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Decides whether an idle session may be reused.
    ///
    /// A session is reusable only while it holds a connection and its bounded credential
    /// lifetime has not run out. An unbounded lifetime (0) disables reuse. Directory operations
    /// themselves are not subject to the lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthError`] when the session must not be reused.
    pub fn check_alive(&self) -> Result<()> {
        self.ensure_connected()?;
        let (Some(lifetime), Some(at)) = (self.credential_lifetime, self.authenticated_at) else {
            return Err(Error::AuthError(
                "no session reuse with credential lifetime 0".to_string(),
            ));
        };
        if at.elapsed() >= lifetime {
            info!(
                elapsed_secs = at.elapsed().as_secs(),
                max_secs = lifetime.as_secs(),
                "credential lifetime ended"
            );
            return Err(Error::AuthError(
                "administrative credentials have expired".to_string(),
            ));
        }
        Ok(())
    }

    /// Renders `err` for display, with details only while connected.
    #[must_use]
    pub fn describe_error(&self, err: &Error) -> String {
        render_error(err, self.is_connected())
    }

    pub(crate) fn live(&mut self) -> Result<Live<'_>> {
        self.ensure_connected()?;
        let realm = self
            .realm
            .as_deref()
            .ok_or_else(|| Error::AuthError("session has no realm".to_string()))?;
        let connection = self
            .connection
            .as_deref_mut()
            .ok_or_else(|| Error::AuthError("no administration connection".to_string()))?;
        Ok(Live {
            connection,
            realm,
            timeout: self.operation_timeout,
        })
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connection.is_none() {
            return Err(Error::AuthError(
                "no administration connection; renew the session".to_string(),
            ));
        }
        Ok(())
    }

    async fn release_connection(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };
        self.authenticated_at = None;
        match timeout(self.operation_timeout, connection.close()).await {
            Ok(Ok(())) => debug!("administration connection closed"),
            Ok(Err(err)) => warn!("failed to close administration connection: {err}"),
            Err(_) => warn!("timed out closing administration connection"),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("realm", &self.realm)
            .field("connected", &self.connection.is_some())
            .field("destroyed", &self.service.is_none())
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

/// Runs an administration-service call under the session timeout.
pub(crate) async fn with_timeout<F, T>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    timeout(limit, fut).await?
}
