//! REST client for the secondary profile store.
//!
//! The profile store is a PostgREST-style API: rows live in a `profiles`
//! table and are addressed with column filters (`?zo_user_id=eq.<id>`).
//! Writes ask for `Prefer: return=representation` so the synchronized row
//! comes back in the response body.

use crate::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Table holding one row per console user.
const PROFILES_TABLE: &str = "profiles";

/// A row in the profile store.
///
/// Every column except the external user id is nullable; the store schema
/// grows independently of the console, so unknown columns are simply not
/// modeled here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedProfile {
    /// Store-assigned row id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// External user id from the auth backend. The upsert key.
    pub zo_user_id: String,
    /// Reference field, mirrors the external user id.
    #[serde(default)]
    pub zo_ref: Option<String>,
    #[serde(default)]
    pub mobile_number: Option<String>,
    #[serde(default)]
    pub mobile_country_code: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    /// When the console last pushed this row (RFC 3339).
    #[serde(default)]
    pub zo_synced_at: Option<String>,
    /// Sync bookkeeping status, "synced" after a successful push.
    #[serde(default)]
    pub zo_sync_status: Option<String>,
    #[serde(default)]
    pub last_seen_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// HTTP client for the profile store REST API.
pub struct ProfileStoreClient {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl ProfileStoreClient {
    /// Create a new client for the given store URL and public API key.
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Build a REST endpoint URL for a table.
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url.trim_end_matches('/'), table)
    }

    /// Fetch the profile row for a user, if one exists.
    pub async fn fetch_profile(&self, zo_user_id: &str) -> SyncResult<Option<CachedProfile>> {
        let response = self
            .http_client
            .get(self.rest_url(PROFILES_TABLE))
            .query(&[
                ("zo_user_id", format!("eq.{}", zo_user_id).as_str()),
                ("limit", "1"),
            ])
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let rows: Vec<CachedProfile> = Self::read_rows(response).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert a fresh profile row and return the stored representation.
    pub async fn insert_profile(&self, payload: &Value) -> SyncResult<CachedProfile> {
        let response = self
            .http_client
            .post(self.rest_url(PROFILES_TABLE))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Prefer", "return=representation")
            .json(payload)
            .send()
            .await?;

        let rows: Vec<CachedProfile> = Self::read_rows(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| SyncError::Malformed("insert returned no rows".to_string()))
    }

    /// Patch the existing profile row for a user and return the stored
    /// representation.
    pub async fn update_profile(
        &self,
        zo_user_id: &str,
        payload: &Value,
    ) -> SyncResult<CachedProfile> {
        let response = self
            .http_client
            .patch(self.rest_url(PROFILES_TABLE))
            .query(&[("zo_user_id", format!("eq.{}", zo_user_id))])
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Prefer", "return=representation")
            .json(payload)
            .send()
            .await?;

        let rows: Vec<CachedProfile> = Self::read_rows(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| SyncError::Malformed("update matched no rows".to_string()))
    }

    /// Turn a store response into rows, or a [`SyncError::Store`] carrying
    /// whatever error text the store produced.
    async fn read_rows(response: reqwest::Response) -> SyncResult<Vec<CachedProfile>> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::Store {
                status: status.as_u16(),
                message,
            });
        }

        debug!(status = %status, "Profile store request succeeded");
        let rows = response.json().await?;
        Ok(rows)
    }
}
