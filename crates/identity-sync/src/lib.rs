//! Fire-and-forget mirroring of the authenticated user into the secondary
//! profile store.
//!
//! The profile store is not authoritative for anything the console needs;
//! sync failures are logged and swallowed so the session flow is never
//! affected.

mod client;
mod error;
mod sync;

pub use client::{CachedProfile, ProfileStoreClient};
pub use error::{SyncError, SyncResult};
pub use sync::{IdentitySync, SyncStatus};
