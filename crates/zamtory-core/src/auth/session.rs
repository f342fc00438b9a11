//! Session manager: the single authority for authentication state.
//!
//! Owns the current user, persists tokens through the `TokenVault`, keeps
//! the auth client's bearer token in sync, and runs the automatic refresh
//! timer while a user is signed in.
//!
//! Session mutations are serialized through a commit lock guarding an
//! epoch counter. Login, logout and a failed restore bump the epoch when
//! they commit; a refresh records the epoch when it starts and only commits
//! if nothing newer has been applied in the meantime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::credentials::Credentials;
use super::state::{SessionEvent, SessionSnapshot, SessionState};
use super::timer::RefreshTimer;
use crate::api::{AuthApi, HttpAuthClient, MockAuthClient};
use crate::config::{Config, DurableBackend};
use crate::error::SessionError;
use crate::models::{AuthGrant, TokenPair, UserRecord};
use crate::store::{FileStore, KeyValueStore, KeyringStore, MemoryStore, TokenVault};

/// Buffer size for the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Automatic refresh period.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub refresh_interval: Duration,
    /// Route announced after a successful login
    pub landing_route: String,
    /// Route announced after logout
    pub entry_route: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            landing_route: "/editor".to_string(),
            entry_route: "/login".to_string(),
        }
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            refresh_interval: config.refresh_interval(),
            landing_route: config.landing_route.clone(),
            entry_route: config.entry_route.clone(),
        }
    }
}

/// Handle to a session. Clone is cheap; all clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    me: Weak<Inner>,
    vault: TokenVault,
    client: Arc<dyn AuthApi>,
    settings: SessionSettings,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    epoch: Mutex<u64>,
    timer: RefreshTimer,
}

impl SessionManager {
    pub fn new(vault: TokenVault, client: Arc<dyn AuthApi>, settings: SessionSettings) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let timer = RefreshTimer::new(settings.refresh_interval);

        let inner = Arc::new_cyclic(|me| Inner {
            me: me.clone(),
            vault,
            client,
            settings,
            state,
            events,
            epoch: Mutex::new(0),
            timer,
        });
        Self { inner }
    }

    /// Wire up storage tiers and the auth client described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let durable: Arc<dyn KeyValueStore> = match config.durable_backend {
            DurableBackend::File => {
                let path = config.session_file()?;
                debug!(path = %path.display(), "Using file-backed durable token store");
                Arc::new(FileStore::new(path))
            }
            DurableBackend::Keyring => {
                debug!("Using keychain-backed durable token store");
                Arc::new(KeyringStore::default())
            }
        };
        let vault = TokenVault::new(durable, Arc::new(MemoryStore::new()));

        let client: Arc<dyn AuthApi> = if config.use_mock_authentication {
            info!("Mock authentication enabled, no auth requests will be sent");
            Arc::new(MockAuthClient::default())
        } else {
            Arc::new(
                HttpAuthClient::new(&config.api_base_url, config.request_timeout())
                    .context("Failed to create auth client")?,
            )
        };

        Ok(Self::new(vault, client, SessionSettings::from(config)))
    }

    // ===== Read surface =====

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn user(&self) -> Option<UserRecord> {
        self.inner.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().snapshot()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Receiver for discrete session events, including navigation requests.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_refresh_timer_armed(&self) -> bool {
        self.inner.timer.is_armed()
    }

    pub fn vault(&self) -> &TokenVault {
        &self.inner.vault
    }

    // ===== Commands =====

    /// Restore the session from storage. Never fails; any problem leaves the
    /// session signed out with storage wiped. Always clears `is_loading`.
    pub async fn check_auth(&self) {
        self.inner.check_auth().await
    }

    /// Sign in. Credentials are validated before any request is sent.
    pub async fn login(&self, credentials: &Credentials) -> Result<UserRecord, SessionError> {
        self.inner.login(credentials).await
    }

    /// Sign out locally, whatever happens to the remote logout call.
    pub async fn logout(&self) {
        self.inner.logout().await
    }

    /// Force a token refresh.
    pub async fn refresh(&self) -> Result<(), SessionError> {
        self.inner.refresh().await.map(|_| ())
    }
}

impl Inner {
    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_epoch(&self) -> u64 {
        *self.lock_epoch()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|state| {
            if state.is_loading == loading {
                false
            } else {
                state.is_loading = loading;
                true
            }
        });
    }

    /// Replace the user and arm or disarm the refresh timer to match.
    /// Callers hold the epoch lock.
    fn install_user(&self, user: Option<UserRecord>) {
        let present = user.is_some();
        self.state.send_modify(|state| state.user = user);
        if present {
            self.arm_timer();
        } else {
            self.timer.disarm();
        }
    }

    fn arm_timer(&self) {
        let me = self.me.clone();
        self.timer.arm(move || {
            let me = me.clone();
            async move {
                match me.upgrade() {
                    Some(inner) => inner.auto_refresh().await,
                    None => false,
                }
            }
        });
    }

    /// Drop everything: storage in every tier, the client token, the user.
    /// Callers hold the epoch lock.
    fn wipe(&self) {
        if let Err(e) = self.vault.clear() {
            warn!(error = %e, "Failed to clear stored session");
        }
        self.client.set_access_token(None);
        self.install_user(None);
    }

    /// Wipe the session unless a newer change has already been committed.
    fn expire(&self, ticket: u64) {
        {
            let mut epoch = self.lock_epoch();
            if *epoch != ticket {
                debug!("Session changed meanwhile, not clearing it");
                return;
            }
            *epoch += 1;
            self.wipe();
        }
        self.emit(SessionEvent::Expired);
    }

    // ===== check_auth =====

    async fn check_auth(&self) {
        let ticket = self.current_epoch();
        match self.restore(ticket).await {
            Ok(true) => info!("Session restored"),
            Ok(false) => debug!("No stored session"),
            Err(SessionError::Superseded) => debug!("Session restore superseded"),
            Err(e) => {
                warn!(error = %e, "Session check failed, clearing stored session");
                self.expire(ticket);
            }
        }
        self.set_loading(false);
    }

    async fn restore(&self, ticket: u64) -> Result<bool, SessionError> {
        let access_token = self.vault.access_token()?;
        let cached_user = self.vault.user()?;

        if let (Some(token), Some(user)) = (access_token, cached_user) {
            let epoch = self.lock_epoch();
            if *epoch != ticket {
                return Err(SessionError::Superseded);
            }
            // Trusted as-is, the next refresh will catch a dead token
            debug!(user_id = %user.id, "Restoring cached session");
            self.client.set_access_token(Some(token));
            self.install_user(Some(user));
            return Ok(true);
        }

        if self.vault.refresh_token()?.is_some() {
            self.refresh().await?;
            return Ok(true);
        }
        Ok(false)
    }

    // ===== login =====

    async fn login(&self, credentials: &Credentials) -> Result<UserRecord, SessionError> {
        self.set_loading(true);
        let result = self.authenticate(credentials).await;
        self.set_loading(false);

        match &result {
            Ok(user) => info!(
                user_id = %user.id,
                remember_me = credentials.remember_me,
                "Login successful"
            ),
            Err(e) => error!(error = %e, "Login failed"),
        }
        result
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<UserRecord, SessionError> {
        credentials.validate()?;

        let grant = self
            .client
            .authenticate(&credentials.email, &credentials.password)
            .await
            .map_err(SessionError::from_login)?;
        let user = grant.user.clone();

        {
            let mut epoch = self.lock_epoch();
            if let Err(e) = self.persist_grant(&grant, credentials.remember_me) {
                // A half-written grant must not be restorable later
                if let Err(clear_err) = self.vault.clear() {
                    warn!(error = %clear_err, "Failed to discard partially stored login");
                }
                return Err(e);
            }
            *epoch += 1;
            self.client.set_access_token(Some(grant.access_token.clone()));
            self.install_user(Some(user.clone()));
        }

        self.emit(SessionEvent::SignedIn(user.clone()));
        self.emit(SessionEvent::Navigate(self.settings.landing_route.clone()));
        Ok(user)
    }

    fn persist_grant(&self, grant: &AuthGrant, remember_me: bool) -> Result<(), SessionError> {
        self.vault.save_tokens(&grant.token_pair(remember_me))?;
        self.vault.save_user(&grant.user, remember_me)
    }

    // ===== logout =====

    async fn logout(&self) {
        if let Err(e) = self.client.logout().await {
            warn!(error = %e, "Remote logout failed, signing out locally anyway");
        }

        {
            let mut epoch = self.lock_epoch();
            *epoch += 1;
            self.wipe();
        }
        info!("Logged out");

        self.emit(SessionEvent::SignedOut);
        self.emit(SessionEvent::Navigate(self.settings.entry_route.clone()));
    }

    // ===== refresh =====

    async fn refresh(&self) -> Result<UserRecord, SessionError> {
        let ticket = self.current_epoch();
        let refresh_token = self
            .vault
            .refresh_token()?
            .ok_or(SessionError::MissingRefreshToken)?;

        match self.exchange(ticket, &refresh_token).await {
            Ok(user) => {
                debug!(user_id = %user.id, "Token refreshed");
                Ok(user)
            }
            Err(SessionError::Superseded) => {
                debug!("Discarding refresh result, session changed meanwhile");
                Err(SessionError::Superseded)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, dropping session");
                self.expire(ticket);
                Err(e)
            }
        }
    }

    async fn exchange(&self, ticket: u64, refresh_token: &str) -> Result<UserRecord, SessionError> {
        let refreshed = self
            .client
            .refresh_access_token(refresh_token)
            .await
            .map_err(SessionError::from_refresh)?;

        {
            let epoch = self.lock_epoch();
            if *epoch != ticket {
                return Err(SessionError::Superseded);
            }
            // Only sessions holding a refresh token get here, so they are
            // persisted as remembered
            self.vault.save_tokens(&TokenPair {
                access_token: refreshed.access_token.clone(),
                refresh_token: refresh_token.to_string(),
                remember_me: true,
            })?;
            self.client.set_access_token(Some(refreshed.access_token));
        }

        let user = self
            .client
            .fetch_current_user()
            .await
            .map_err(SessionError::from_refresh)?;

        {
            let epoch = self.lock_epoch();
            if *epoch != ticket {
                return Err(SessionError::Superseded);
            }
            self.vault.save_user(&user, true)?;
            self.install_user(Some(user.clone()));
        }

        self.emit(SessionEvent::Refreshed(user.clone()));
        Ok(user)
    }

    /// Timer tick. Failures are logged, never raised. Returns whether the
    /// timer should keep running.
    async fn auto_refresh(&self) -> bool {
        debug!("Automatic token refresh");
        match self.refresh().await {
            Ok(_) | Err(SessionError::Superseded) => {}
            Err(e) => warn!(error = %e, "Automatic token refresh failed"),
        }
        let signed_in = self.state.borrow().is_authenticated();
        signed_in
    }
}
