use crate::constants::{EXPIRY_MARGIN_SECS, RENEWAL_INTERVAL_SECS, RENEWAL_MARGIN_SECS};
use crate::error::{AppError, AppResult};
use crate::models::TokenSet;
use crate::modules::auth::issuer::CredentialIssuer;
use crate::modules::auth::probe::{ProbeOutcome, SessionProbe};
use crate::modules::auth::token_store::TokenStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owns the credential lifecycle: load/validate at startup, serialized
/// refresh, periodic background renewal and the one-shot session-expired
/// signal. Every caller either gets a usable bearer token or a deterministic
/// "must re-authenticate" error; there is no silent-failure path.
pub struct SessionManager<I, P> {
    issuer: Arc<I>,
    probe: Arc<P>,
    store: Arc<TokenStore>,
    state: Arc<RwLock<Option<TokenSet>>>,
    /// Serializes refreshes so at most one token exchange is in flight.
    refresh_gate: Arc<tokio::sync::Mutex<()>>,
    expired_fired: Arc<AtomicBool>,
    expiry_tx: Arc<watch::Sender<bool>>,
    renewal_task: Arc<parking_lot::Mutex<Option<JoinHandle<()>>>>,
}

impl<I, P> Clone for SessionManager<I, P> {
    fn clone(&self) -> Self {
        Self {
            issuer: self.issuer.clone(),
            probe: self.probe.clone(),
            store: self.store.clone(),
            state: self.state.clone(),
            refresh_gate: self.refresh_gate.clone(),
            expired_fired: self.expired_fired.clone(),
            expiry_tx: self.expiry_tx.clone(),
            renewal_task: self.renewal_task.clone(),
        }
    }
}

impl<I: CredentialIssuer, P: SessionProbe> SessionManager<I, P> {
    pub fn new(issuer: I, probe: P, store: TokenStore) -> Self {
        let (expiry_tx, _rx) = watch::channel(false);
        Self {
            issuer: Arc::new(issuer),
            probe: Arc::new(probe),
            store: Arc::new(store),
            state: Arc::new(RwLock::new(None)),
            refresh_gate: Arc::new(tokio::sync::Mutex::new(())),
            expired_fired: Arc::new(AtomicBool::new(false)),
            expiry_tx: Arc::new(expiry_tx),
            renewal_task: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    /// Loads the persisted credential and proves it usable, refreshing when
    /// it is expired-with-margin or rejected by the session probe. Starts
    /// the background renewal on success.
    pub async fn load_and_validate(&self) -> AppResult<()> {
        let loaded = match self.store.load() {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Error loading persisted credential: {}", e);
                self.store.delete();
                return Err(AppError::NotAuthenticated);
            }
        };
        let Some(tokens) = loaded else {
            return Err(AppError::NotAuthenticated);
        };

        let expiring = tokens.is_expiring_within(EXPIRY_MARGIN_SECS);
        *self.state.write().await = Some(tokens.clone());

        if expiring {
            debug!("Persisted token expired or expiring, refreshing before use");
            self.force_refresh().await?;
        } else if self.probe.validate(tokens.access_token()).await == ProbeOutcome::Invalid {
            debug!("Persisted token rejected by session probe, refreshing");
            self.force_refresh().await?;
        }

        self.arm_session();
        info!("Session validated");
        Ok(())
    }

    /// Interactive (re-)login with the password grant. Resets a previously
    /// fired session-expired signal.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<()> {
        let _gate = self.refresh_gate.lock().await;
        let grant = self.issuer.password_grant(username, password).await?;
        let tokens = TokenSet::from_grant(grant);
        self.store.save(&tokens.grant)?;

        if self.probe.validate(tokens.access_token()).await == ProbeOutcome::Invalid {
            warn!("Freshly issued token failed validation");
            self.fail_closed().await;
            return Err(AppError::NotAuthenticated);
        }

        *self.state.write().await = Some(tokens);
        drop(_gate);
        self.arm_session();
        info!("Login successful");
        Ok(())
    }

    /// Refreshes unless another caller already rotated the credential while
    /// we waited on the gate. Concurrent callers therefore collapse onto a
    /// single token exchange and all observe its outcome.
    pub async fn refresh_if_stale(&self, margin_secs: i64) -> AppResult<()> {
        let _gate = self.refresh_gate.lock().await;
        let current = self.state.read().await.clone();
        let Some(tokens) = current else {
            return Err(AppError::NotAuthenticated);
        };
        if !tokens.is_expiring_within(margin_secs) {
            debug!("Token already fresh, skipping refresh");
            return Ok(());
        }
        self.refresh_locked(tokens).await
    }

    /// Unconditional refresh, for when an unexpired token was rejected.
    pub async fn force_refresh(&self) -> AppResult<()> {
        let _gate = self.refresh_gate.lock().await;
        let current = self.state.read().await.clone();
        let Some(tokens) = current else {
            return Err(AppError::NotAuthenticated);
        };
        self.refresh_locked(tokens).await
    }

    /// Must be called with the refresh gate held. Fail-closed: any failure
    /// deletes the persisted credential so a half-rotated token pair can
    /// never be picked up on the next start.
    async fn refresh_locked(&self, tokens: TokenSet) -> AppResult<()> {
        match self.issuer.refresh_grant(tokens.refresh_token()).await {
            Ok(grant) => {
                let new_tokens = TokenSet::from_grant(grant);
                if let Err(e) = self.store.save(&new_tokens.grant) {
                    warn!("Failed to persist refreshed credential: {}", e);
                    self.fail_closed().await;
                    return Err(e);
                }
                if self.probe.validate(new_tokens.access_token()).await == ProbeOutcome::Invalid {
                    warn!("New token failed validation after refresh");
                    self.fail_closed().await;
                    return Err(AppError::SessionExpired);
                }
                *self.state.write().await = Some(new_tokens);
                debug!("Token refresh successful");
                Ok(())
            }
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                self.fail_closed().await;
                Err(e)
            }
        }
    }

    async fn fail_closed(&self) {
        self.store.delete();
        *self.state.write().await = None;
    }

    /// Snapshot of the current access token. Callers must re-check the
    /// expiry margin before sending a request; the token may have been
    /// rotated concurrently.
    pub async fn bearer_token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|t| t.access_token().to_string())
    }

    /// True when there is no token or it expires within `margin_secs`.
    pub async fn is_expiring_within(&self, margin_secs: i64) -> bool {
        self.state
            .read()
            .await
            .as_ref()
            .map_or(true, |t| t.is_expiring_within(margin_secs))
    }

    /// One-shot session-expired signal. Returns true for the caller that
    /// actually fired it; later calls are no-ops until the next login.
    pub fn fire_session_expired(&self) -> bool {
        if self
            .expired_fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        warn!("Session expired - re-login required");
        self.stop_renewal();
        // send_replace keeps the value even when nobody subscribed yet, so a
        // late subscriber still observes the expiry.
        self.expiry_tx.send_replace(true);
        true
    }

    pub fn session_expired(&self) -> bool {
        self.expired_fired.load(Ordering::Acquire)
    }

    /// Receiver flips to true when the session expires and back to false on
    /// a successful login/validation.
    pub fn subscribe_expiry(&self) -> watch::Receiver<bool> {
        self.expiry_tx.subscribe()
    }

    fn arm_session(&self) {
        self.expired_fired.store(false, Ordering::Release);
        self.expiry_tx.send_replace(false);
        self.start_renewal();
    }

    /// Periodic renewal keeping the credential fresh for the lifetime of the
    /// process. The first unrecoverable failure fires the expired signal and
    /// ends the task.
    fn start_renewal(&self) {
        self.stop_renewal();
        // The task's clone gets an empty handle slot of its own; if it shared
        // ours it would keep its own JoinHandle alive and the drop check
        // below could never see the last user-held clone go away.
        let manager = Self {
            issuer: self.issuer.clone(),
            probe: self.probe.clone(),
            store: self.store.clone(),
            state: self.state.clone(),
            refresh_gate: self.refresh_gate.clone(),
            expired_fired: self.expired_fired.clone(),
            expiry_tx: self.expiry_tx.clone(),
            renewal_task: Arc::new(parking_lot::Mutex::new(None)),
        };
        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(RENEWAL_INTERVAL_SECS));
            // Consume the immediate first tick.
            interval.tick().await;
            loop {
                interval.tick().await;
                if manager.session_expired() {
                    break;
                }
                if !manager.is_expiring_within(RENEWAL_MARGIN_SECS).await {
                    debug!("Token still valid, skipping renewal");
                    continue;
                }
                info!("Background token renewal starting");
                if let Err(e) = manager.refresh_if_stale(RENEWAL_MARGIN_SECS).await {
                    warn!("Background token renewal failed: {}", e);
                    manager.fire_session_expired();
                    break;
                }
            }
        });
        *self.renewal_task.lock() = Some(handle);
    }

    fn stop_renewal(&self) {
        if let Some(handle) = self.renewal_task.lock().take() {
            handle.abort();
        }
    }

    /// Best-effort revoke, then unconditionally drop the local credential.
    pub async fn logout(&self) {
        self.stop_renewal();
        let token = self.bearer_token().await;
        if let Some(token) = token {
            if let Err(e) = self.issuer.revoke(&token).await {
                warn!("Error during token revocation: {}", e);
            }
        }
        let _gate = self.refresh_gate.lock().await;
        self.fail_closed().await;
        info!("Logged out");
    }
}

/// Startup bootstrap: reuse the persisted credential when possible, fall
/// back to environment credentials for headless setups. A stored credential
/// whose refresh failed has already been deleted fail-closed, so a fresh
/// login is the only remaining path for it too.
pub async fn establish_session<I, P>(session: &SessionManager<I, P>) -> AppResult<()>
where
    I: CredentialIssuer,
    P: SessionProbe,
{
    match session.load_and_validate().await {
        Ok(()) => return Ok(()),
        Err(AppError::NotAuthenticated) => info!("No stored session"),
        Err(e) => warn!("Stored session unusable: {}", e),
    }
    let (Ok(username), Ok(password)) = (
        std::env::var("DRAFTHUD_USERNAME"),
        std::env::var("DRAFTHUD_PASSWORD"),
    ) else {
        return Err(AppError::Config(
            "no usable session; set DRAFTHUD_USERNAME and DRAFTHUD_PASSWORD".to_string(),
        ));
    };
    info!("Logging in with environment credentials");
    session.login(&username, &password).await
}

impl<I, P> Drop for SessionManager<I, P> {
    fn drop(&mut self) {
        // Last clone going away must not leave the renewal timer firing
        // against a dead session.
        if Arc::strong_count(&self.renewal_task) == 1 {
            if let Some(handle) = self.renewal_task.lock().take() {
                handle.abort();
            }
        }
    }
}
