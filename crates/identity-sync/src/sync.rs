//! Best-effort synchronization of the authenticated user into the profile
//! store.
//!
//! The console treats the profile store as a downstream mirror: after every
//! login and startup verification the current user is upserted, keyed by the
//! external user id. Failures are logged and swallowed so they can never
//! break the session flow.

use crate::client::{CachedProfile, ProfileStoreClient};
use crate::SyncResult;
use chrono::Utc;
use credential_store::AuthUser;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Outcome of one background sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    Failed,
}

/// Service mirroring the authenticated user into the profile store.
///
/// Holds the last successfully synchronized row so callers can show profile
/// data without another round trip.
pub struct IdentitySync {
    client: Arc<ProfileStoreClient>,
    is_syncing: AtomicBool,
    cached_profile: Mutex<Option<CachedProfile>>,
}

impl IdentitySync {
    /// Create a sync service over the given profile store client.
    pub fn new(client: Arc<ProfileStoreClient>) -> Self {
        Self {
            client,
            is_syncing: AtomicBool::new(false),
            cached_profile: Mutex::new(None),
        }
    }

    /// Upsert the user's profile row and cache the stored representation.
    ///
    /// Looks the row up by external user id first: a missing row is inserted
    /// with the full field set, an existing row is patched with contact and
    /// bookkeeping fields only.
    pub async fn sync_identity(&self, user: &AuthUser) -> SyncResult<CachedProfile> {
        let now = Utc::now().to_rfc3339();

        let existing = self.client.fetch_profile(&user.id).await?;
        let profile = match existing {
            Some(_) => {
                self.client
                    .update_profile(&user.id, &update_payload(user, &now))
                    .await?
            }
            None => {
                self.client
                    .insert_profile(&insert_payload(user, &now))
                    .await?
            }
        };

        *self.cached_profile.lock().unwrap() = Some(profile.clone());
        debug!(user_id = %user.id, "Identity profile synchronized");
        Ok(profile)
    }

    /// Fire-and-forget variant of [`sync_identity`](Self::sync_identity).
    ///
    /// Spawns the sync on the runtime and returns immediately. Errors are
    /// logged, never propagated; the returned receiver reports the outcome
    /// for callers (tests, status displays) that care, and may be dropped.
    pub fn sync_in_background(self: &Arc<Self>, user: AuthUser) -> oneshot::Receiver<SyncStatus> {
        let (tx, rx) = oneshot::channel();
        let service = Arc::clone(self);

        // Raise the flag before the task is scheduled so is_syncing() is
        // true as soon as this returns.
        service.is_syncing.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let status = match service.sync_identity(&user).await {
                Ok(_) => SyncStatus::Synced,
                Err(e) => {
                    warn!(user_id = %user.id, "Identity sync failed: {}", e);
                    SyncStatus::Failed
                }
            };
            service.is_syncing.store(false, Ordering::SeqCst);
            let _ = tx.send(status);
        });

        rx
    }

    /// Whether a background sync is currently in flight.
    pub fn is_syncing(&self) -> bool {
        self.is_syncing.load(Ordering::SeqCst)
    }

    /// The last successfully synchronized profile row, if any.
    pub fn cached_profile(&self) -> Option<CachedProfile> {
        self.cached_profile.lock().unwrap().clone()
    }

    /// Drop the cached row. Called on logout.
    pub fn clear_cached_profile(&self) {
        *self.cached_profile.lock().unwrap() = None;
    }
}

/// Payload for a brand-new profile row.
fn insert_payload(user: &AuthUser, now: &str) -> Value {
    json!({
        "zo_user_id": user.id,
        "zo_ref": user.id,
        "mobile_number": user.mobile_number,
        "mobile_country_code": user.mobile_country_code,
        "email": user.email(),
        "full_name": user.full_name(),
        "zo_synced_at": now,
        "zo_sync_status": "synced",
        "last_seen_at": now,
    })
}

/// Payload for refreshing an existing row: contact fields plus bookkeeping.
/// Identity keys (`zo_user_id`, `zo_ref`) are never rewritten.
fn update_payload(user: &AuthUser, now: &str) -> Value {
    json!({
        "mobile_number": user.mobile_number,
        "mobile_country_code": user.mobile_country_code,
        "email": user.email(),
        "full_name": user.full_name(),
        "zo_synced_at": now,
        "zo_sync_status": "synced",
        "last_seen_at": now,
        "updated_at": now,
    })
}
