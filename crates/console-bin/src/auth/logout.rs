//! Logout command.

use crate::state::ConsoleState;

/// Clear the stored session. Device identity is kept so the next login is
/// recognized as the same device.
pub async fn run(state: &ConsoleState) -> anyhow::Result<()> {
    let had_session = state.credentials.has_session()?;
    state.controller.logout()?;

    if had_session {
        println!("Logged out.");
    } else {
        println!("No session to clear.");
    }
    Ok(())
}
