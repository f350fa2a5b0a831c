//! Session store: owns the signed-in identity and its lifecycle.
//!
//! ARCHITECTURE
//! ============
//! `Uninitialized` until the first [`SessionStore::ready`] rehydrates from
//! storage, then `Authenticated` or `Unauthenticated` until `login`/`logout`.
//! Identity is always derived from a `/profiles/me/` fetch made through the
//! authorization pipeline; the store never attaches tokens itself.
//!
//! Any validation failure (401, transport error, bad body) collapses to a
//! forced logout. With `RefreshPolicy::Redeem`, a 401 first gets one refresh
//! redemption and one retry before that fallback.
//!
//! ORDERING
//! ========
//! Every mutation takes a new epoch under `epoch`. A validation result is only
//! committed if its epoch is still the newest, so the most recently started
//! login/logout wins and a stale failure never wipes a newer login's tokens.
//! Storage writes and state publication happen under the same lock, keeping
//! "authenticated iff a token is stored" true for every observer.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{OnceCell, watch};
use tracing::{debug, error, info, warn};

use super::state::SessionState;
use crate::config::RefreshPolicy;
use crate::net::api::ApiError;
use crate::net::auth::SessionApi;
use crate::net::types::{CredentialPair, RefreshedToken, User};
use crate::storage::{StorageError, TokenKey, TokenStorage};

/// Why a `login` did not end authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    /// Validation failed; tokens were erased and the session is signed out.
    #[error("not authenticated")]
    NotAuthenticated,
    /// A newer login or logout started before this one resolved; its outcome
    /// was discarded.
    #[error("superseded by a newer session operation")]
    Superseded,
}

#[derive(Debug, thiserror::Error)]
enum ValidationError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("no refresh token stored")]
    MissingRefreshToken,
    #[error("superseded")]
    Superseded,
}

struct Inner {
    storage: Arc<dyn TokenStorage>,
    api: Arc<dyn SessionApi>,
    refresh_policy: RefreshPolicy,
    state: watch::Sender<SessionState>,
    epoch: Mutex<u64>,
    rehydrated: OnceCell<()>,
}

/// Cloneable handle to the process-wide session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Create a store in the `Uninitialized` phase. Nothing is read until
    /// [`SessionStore::ready`] or [`SessionStore::login`].
    #[must_use]
    pub fn new(storage: Arc<dyn TokenStorage>, api: Arc<dyn SessionApi>, refresh_policy: RefreshPolicy) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            inner: Arc::new(Inner {
                storage,
                api,
                refresh_policy,
                state,
                epoch: Mutex::new(0),
                rehydrated: OnceCell::new(),
            }),
        }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Rehydrate on first call, then wait until the state has resolved.
    ///
    /// Concurrent callers share one rehydration; later callers never trigger
    /// another.
    pub async fn ready(&self) -> SessionState {
        self.inner.rehydrated.get_or_init(|| self.rehydrate()).await;
        let mut rx = self.subscribe();
        let resolved = rx.wait_for(SessionState::is_ready).await.map(|s| s.clone());
        resolved.unwrap_or_else(|_| self.state())
    }

    /// Persist `credentials` and validate them against the profile endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::NotAuthenticated`] when validation fails (the
    /// session is then signed out with both tokens erased), or
    /// [`LoginError::Superseded`] when a newer login/logout overtook this one.
    pub async fn login(&self, credentials: CredentialPair) -> Result<User, LoginError> {
        // An explicit login replaces startup rehydration.
        if self.inner.rehydrated.set(()).is_err() {
            debug!("login while rehydration started or done");
        }

        let (epoch, stored) = self.begin_with(|storage| storage.store_pair(&credentials));
        if let Err(e) = stored {
            warn!(error = %e, "failed to persist credentials; clearing session");
            return self.fail(epoch);
        }
        self.validate(epoch).await
    }

    /// Erase both tokens and drop identity. Idempotent; never fails.
    pub fn logout(&self) {
        let mut epoch = self.lock_epoch();
        *epoch += 1;
        self.sign_out_locked();
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    async fn rehydrate(&self) {
        let (epoch, token) = self.begin_with(|storage| storage.access_token());
        let token = token.unwrap_or_else(|e| {
            warn!(error = %e, "token storage unavailable; treating as signed out");
            None
        });

        if token.is_none() {
            let committed = self.commit(epoch, || {
                self.publish(SessionState::Unauthenticated);
            });
            if committed {
                info!("no stored credential; session unauthenticated");
            }
            return;
        }

        debug!("stored credential found; validating");
        if let Err(e) = self.validate(epoch).await {
            debug!(error = %e, "rehydration did not authenticate");
        }
    }

    async fn validate(&self, epoch: u64) -> Result<User, LoginError> {
        match self.fetch_identity(epoch).await {
            Ok(user) => {
                let committed = self.commit(epoch, || {
                    self.publish(SessionState::Authenticated(user.clone()));
                });
                if committed {
                    info!(username = %user.username, "session authenticated");
                    Ok(user)
                } else {
                    debug!(username = %user.username, "stale validation result dropped");
                    Err(LoginError::Superseded)
                }
            }
            Err(ValidationError::Superseded) => {
                debug!("validation superseded during refresh");
                Err(LoginError::Superseded)
            }
            Err(e) => {
                warn!(error = %e, "profile validation failed; clearing session");
                self.fail(epoch)
            }
        }
    }

    async fn fetch_identity(&self, epoch: u64) -> Result<User, ValidationError> {
        match self.inner.api.fetch_my_profile().await {
            Ok(profile) => Ok(profile.into()),
            Err(e) if e.is_unauthorized() && self.inner.refresh_policy == RefreshPolicy::Redeem => {
                debug!("access token rejected; redeeming refresh token");
                self.redeem_and_refetch(epoch).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn redeem_and_refetch(&self, epoch: u64) -> Result<User, ValidationError> {
        let refresh = self
            .inner
            .storage
            .refresh_token()?
            .ok_or(ValidationError::MissingRefreshToken)?;
        let redeemed = self.inner.api.redeem_refresh(&refresh).await?;
        self.store_redeemed(epoch, &redeemed)?;
        info!(rotated = redeemed.refresh.is_some(), "access token refreshed");

        let profile = self.inner.api.fetch_my_profile().await?;
        Ok(profile.into())
    }

    fn store_redeemed(&self, epoch: u64, redeemed: &RefreshedToken) -> Result<(), ValidationError> {
        let guard = self.lock_epoch();
        if *guard != epoch {
            return Err(ValidationError::Superseded);
        }
        self.inner.storage.set(TokenKey::Access, &redeemed.access)?;
        if let Some(refresh) = &redeemed.refresh {
            self.inner.storage.set(TokenKey::Refresh, refresh)?;
        }
        Ok(())
    }

    fn fail(&self, epoch: u64) -> Result<User, LoginError> {
        if self.commit(epoch, || self.sign_out_locked()) {
            Err(LoginError::NotAuthenticated)
        } else {
            Err(LoginError::Superseded)
        }
    }

    // =========================================================================
    // EPOCH HELPERS
    // =========================================================================

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.inner
            .epoch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new mutation and run `f` against storage while it is the newest.
    fn begin_with<T, F>(&self, f: F) -> (u64, T)
    where
        F: FnOnce(&dyn TokenStorage) -> T,
    {
        let mut epoch = self.lock_epoch();
        *epoch += 1;
        let out = f(self.inner.storage.as_ref());
        (*epoch, out)
    }

    /// Run `apply` only if no newer mutation has started since `epoch`.
    fn commit<F: FnOnce()>(&self, epoch: u64, apply: F) -> bool {
        let guard = self.lock_epoch();
        if *guard != epoch {
            return false;
        }
        apply();
        true
    }

    /// Caller must hold the epoch lock.
    fn sign_out_locked(&self) {
        if let Err(e) = self.inner.storage.clear() {
            error!(error = %e, "failed to erase stored credentials");
        }
        if self.publish(SessionState::Unauthenticated) {
            info!("session signed out");
        }
    }

    /// Publish `next`, returning whether the phase or identity changed.
    fn publish(&self, next: SessionState) -> bool {
        let previous = self.inner.state.send_replace(next);
        previous != *self.inner.state.borrow()
    }
}
