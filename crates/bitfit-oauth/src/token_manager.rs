//! Token lifecycle: load, proactive refresh, persist.
//!
//! A [`TokenManager`] owns the one [`TokenRecord`] shared by every request
//! made through a transport. Reads go through an `RwLock` so callers holding
//! a fresh token never wait on each other; the decide-refresh-replace-persist
//! sequence is serialized by a per-manager mutex and re-checks the record
//! after acquiring it, so a burst of callers on a stale token yields exactly
//! one refresh. A refreshed record that could not be saved is written again
//! before any further token is handed out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::error::{OAuthError, Result};
use crate::oauth::TokenRefresher;
use crate::store::TokenStore;
use crate::token::{ClientCredentials, TokenRecord};

/// How far ahead of expiration a token is refreshed. Longer than any single
/// request round trip, so a token never expires mid-flight.
pub const DEFAULT_LOOKAHEAD: Duration = Duration::from_secs(10 * 60);

/// Observable state of a manager's token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Expiration is comfortably in the future.
    Valid,
    /// Expiration falls inside the lookahead window; the next request refreshes.
    NearExpiry,
    /// The last refresh attempt failed; the next request tries again.
    Failed,
}

/// Shared, cheaply clonable handle to the token lifecycle.
#[derive(Debug, Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    record: RwLock<TokenRecord>,
    refresh_lock: Mutex<()>,
    credentials: ClientCredentials,
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    lookahead: TimeDelta,
    last_refresh_failed: AtomicBool,
    pending_persist: AtomicBool,
}

/// Construction parameters for a [`TokenManager`].
#[derive(Debug, Clone)]
pub struct TokenManagerOptions {
    pub credentials: ClientCredentials,
    pub store: Arc<dyn TokenStore>,
    pub refresher: Arc<dyn TokenRefresher>,
    pub lookahead: Duration,
}

impl TokenManagerOptions {
    pub fn new(
        credentials: ClientCredentials,
        store: Arc<dyn TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            credentials,
            store,
            refresher,
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }

    pub fn with_lookahead(mut self, lookahead: Duration) -> Self {
        self.lookahead = lookahead;
        self
    }
}

impl TokenManager {
    /// Load the stored record, refreshing once if it has already expired.
    ///
    /// Fails if the load fails or the forced refresh fails.
    pub async fn initialize(options: TokenManagerOptions) -> Result<Self> {
        let record = options.store.load().await?;
        Self::from_record(options, record).await
    }

    /// Like [`initialize`](Self::initialize), but when nothing is stored yet
    /// the given refresh token is exchanged and the result persisted first.
    pub async fn bootstrap(options: TokenManagerOptions, refresh_token: &str) -> Result<Self> {
        if options.store.exists().await {
            return Self::initialize(options).await;
        }

        tracing::info!("No stored tokens, exchanging initial refresh token");
        Self::from_record(options, TokenRecord::uninitialized(refresh_token)).await
    }

    async fn from_record(options: TokenManagerOptions, record: TokenRecord) -> Result<Self> {
        let lookahead = TimeDelta::from_std(options.lookahead)
            .map_err(|e| OAuthError::Config(format!("invalid lookahead: {}", e)))?;

        let manager = Self {
            inner: Arc::new(Inner {
                record: RwLock::new(record),
                refresh_lock: Mutex::new(()),
                credentials: options.credentials,
                store: options.store,
                refresher: options.refresher,
                lookahead,
                last_refresh_failed: AtomicBool::new(false),
                pending_persist: AtomicBool::new(false),
            }),
        };

        let expired = manager.inner.record.read().await.is_expired(Utc::now());
        if expired {
            tracing::info!("Loaded tokens have expired, refreshing before first use");
            manager.inner.refresh_when(|record, now| record.is_expired(now)).await?;
        }

        Ok(manager)
    }

    /// Return an access token that will not expire within the lookahead
    /// window, refreshing and persisting first if needed.
    ///
    /// The refresh runs on its own task: if the caller is cancelled the new
    /// pair is still stored, and only the caller's result is dropped. While
    /// a refreshed record remains unsaved every call retries the save and
    /// fails if it fails again.
    pub async fn access_token(&self) -> Result<String> {
        if !self.inner.pending_persist.load(Ordering::SeqCst) {
            let record = self.inner.record.read().await;
            if !self.inner.needs_refresh(&record, Utc::now()) {
                return Ok(record.access.clone());
            }
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let lookahead = inner.lookahead;
            inner
                .refresh_when(move |record, now| record.expires_within(lookahead, now))
                .await
        })
        .await
        .map_err(|e| OAuthError::Internal(format!("token refresh task failed: {}", e)))?
    }

    /// Current state of the held token.
    pub async fn state(&self) -> TokenState {
        let record = self.inner.record.read().await;
        if !self.inner.needs_refresh(&record, Utc::now()) {
            TokenState::Valid
        } else if self.inner.last_refresh_failed.load(Ordering::SeqCst) {
            TokenState::Failed
        } else {
            TokenState::NearExpiry
        }
    }

    /// Copy of the held record.
    pub async fn snapshot(&self) -> TokenRecord {
        self.inner.record.read().await.clone()
    }

    pub fn lookahead(&self) -> Duration {
        self.inner.lookahead.to_std().unwrap_or(DEFAULT_LOOKAHEAD)
    }
}

impl Inner {
    fn needs_refresh(&self, record: &TokenRecord, now: DateTime<Utc>) -> bool {
        record.expires_within(self.lookahead, now)
    }

    /// Refresh under the lock if `stale` still holds once the lock is taken.
    async fn refresh_when<F>(&self, stale: F) -> Result<String>
    where
        F: Fn(&TokenRecord, DateTime<Utc>) -> bool,
    {
        let _guard = self.refresh_lock.lock().await;

        if self.pending_persist.load(Ordering::SeqCst) {
            let held = self.record.read().await.clone();
            tracing::info!("Retrying save of refreshed tokens");
            self.persist(&held).await?;
        }

        let current = self.record.read().await.clone();
        if !stale(&current, Utc::now()) {
            tracing::debug!("Token already refreshed by a concurrent request");
            return Ok(current.access);
        }

        tracing::info!(expiration = %current.expiration, "Refreshing access token");
        let mut fresh = match self
            .refresher
            .refresh(&self.credentials, &current.refresh)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                self.last_refresh_failed.store(true, Ordering::SeqCst);
                if e.requires_reauthorization() {
                    tracing::error!(error = %e, "Refresh token rejected; re-authorization required");
                } else {
                    tracing::warn!(error = %e, "Token refresh failed, keeping previous tokens");
                }
                return Err(e);
            }
        };

        // Some providers omit the refresh token when it is not rotated.
        if fresh.refresh.is_empty() {
            fresh.refresh = current.refresh;
        }

        // Replace in memory before persisting: the old refresh token may
        // already be spent, so the new pair must not be lost on a write error.
        *self.record.write().await = fresh.clone();
        self.last_refresh_failed.store(false, Ordering::SeqCst);

        self.persist(&fresh).await?;

        tracing::info!(expiration = %fresh.expiration, "Access token refreshed");
        Ok(fresh.access)
    }

    /// Save `record`, remembering a failure so the next caller retries.
    async fn persist(&self, record: &TokenRecord) -> Result<()> {
        match self.store.save(record).await {
            Ok(()) => {
                self.pending_persist.store(false, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                self.pending_persist.store(true, Ordering::SeqCst);
                tracing::error!(error = %e, "Refreshed tokens could not be persisted");
                Err(e)
            }
        }
    }
}
