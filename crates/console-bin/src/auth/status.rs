//! Session status command.

use chrono::{TimeZone, Utc};

use crate::state::ConsoleState;

/// Run the startup check, then print what the controller settled on.
pub async fn run(state: &ConsoleState) -> anyhow::Result<()> {
    state.controller.initialize().await?;

    println!("State:      {:?}", state.controller.state());
    println!("Logged in:  {}", state.controller.is_logged_in());

    if let Some(user) = state.controller.current_user() {
        println!("User:       {}", user.id);
        println!(
            "Mobile:     +{} {}",
            user.mobile_country_code, user.mobile_number
        );
        if let Some(email) = user.email() {
            println!("Email:      {}", email);
        }
    }

    if let Some(valid_till_ms) = state.credentials.get_valid_till()? {
        let expiry = Utc
            .timestamp_millis_opt(valid_till_ms)
            .single()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| valid_till_ms.to_string());
        let expired = state.credentials.is_session_expired()?;
        println!(
            "Expires:    {}{}",
            expiry,
            if expired { " (expired)" } else { "" }
        );
    }

    let identity = state.credentials.device_identity()?;
    println!("Device:     {}", identity.device_id);

    if state.syncer.is_syncing() {
        println!("Profile:    syncing...");
    } else if let Some(profile) = state.syncer.cached_profile() {
        println!(
            "Profile:    {} ({})",
            profile.zo_user_id,
            profile.zo_sync_status.as_deref().unwrap_or("unknown")
        );
    }

    Ok(())
}
