//! Outstanding browser authorizations.
//!
//! A code is recorded when `login_user` starts a browser authorization and is
//! removed once the backend reports it approved or denied. Codes also expire:
//! expired entries are purged on every access and by an optional sweeper task.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::types::AuthCode;

/// A browser authorization awaiting the user.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAuth {
    pub code: AuthCode,
    pub auth_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingAuth {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whole seconds left before expiry (zero once expired).
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}

/// Result of looking a code up.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingLookup {
    Active(PendingAuth),
    Expired,
    Unknown,
}

/// Process-wide store of pending authorization codes.
#[derive(Debug)]
pub struct PendingAuthStore {
    ttl: Duration,
    entries: Mutex<HashMap<AuthCode, PendingAuth>>,
}

impl PendingAuthStore {
    /// `ttl` caps how long any code is honoured, whatever the backend says.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record a freshly issued code.
    pub async fn insert(
        &self,
        code: AuthCode,
        auth_url: String,
        backend_expires_in: Option<u64>,
    ) -> PendingAuth {
        self.insert_at(code, auth_url, backend_expires_in, Utc::now())
            .await
    }

    async fn insert_at(
        &self,
        code: AuthCode,
        auth_url: String,
        backend_expires_in: Option<u64>,
        now: DateTime<Utc>,
    ) -> PendingAuth {
        let lifetime = match backend_expires_in {
            Some(secs) => self.ttl.min(Duration::from_secs(secs)),
            None => self.ttl,
        };
        let lifetime = chrono::Duration::from_std(lifetime).unwrap_or(chrono::Duration::zero());

        let pending = PendingAuth {
            code: code.clone(),
            auth_url,
            created_at: now,
            expires_at: now + lifetime,
        };

        let mut entries = self.entries.lock().await;
        Self::purge_locked(&mut entries, now);
        entries.insert(code, pending.clone());
        pending
    }

    /// Look a code up. Distinguishes a code that expired from one never issued.
    pub async fn lookup(&self, code: &AuthCode) -> PendingLookup {
        self.lookup_at(code, Utc::now()).await
    }

    async fn lookup_at(&self, code: &AuthCode, now: DateTime<Utc>) -> PendingLookup {
        let mut entries = self.entries.lock().await;
        if let Some(pending) = entries.get(code) {
            if pending.is_expired_at(now) {
                entries.remove(code);
                Self::purge_locked(&mut entries, now);
                return PendingLookup::Expired;
            }
        }
        Self::purge_locked(&mut entries, now);
        match entries.get(code) {
            Some(pending) => PendingLookup::Active(pending.clone()),
            None => PendingLookup::Unknown,
        }
    }

    /// Forget a code (approved, denied, or superseded).
    pub async fn remove(&self, code: &AuthCode) -> Option<PendingAuth> {
        self.entries.lock().await.remove(code)
    }

    /// Number of codes currently tracked (expired ones included until purged).
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drop every expired code. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        Self::purge_locked(&mut entries, Utc::now())
    }

    fn purge_locked(entries: &mut HashMap<AuthCode, PendingAuth>, now: DateTime<Utc>) -> usize {
        let before = entries.len();
        entries.retain(|_, pending| !pending.is_expired_at(now));
        before - entries.len()
    }

    /// Periodically purge expired codes until `cancel` fires.
    pub fn spawn_sweeper(
        store: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(every);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.purge_expired().await;
                        if removed > 0 {
                            tracing::debug!(removed, "pending_auth_swept");
                        }
                    }
                    _ = cancel.cancelled() => {
                        tracing::debug!("pending_auth_sweeper_stopped");
                        break;
                    }
                }
            }
        })
    }
}
