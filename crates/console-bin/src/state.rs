//! Shared wiring for the console commands.

use std::sync::Arc;

use auth_engine::SessionController;
use console_config_and_utils::{Config, Paths};
use credential_store::{create_credential_manager, CredentialManager};
use http_gateway::{HttpGateway, UnauthorizedHandler};
use identity_sync::{IdentitySync, ProfileStoreClient};

/// Everything a command needs, built once at startup.
pub struct ConsoleState {
    pub config: Config,
    pub credentials: Arc<CredentialManager>,
    pub gateway: Arc<HttpGateway>,
    pub syncer: Arc<IdentitySync>,
    pub controller: Arc<SessionController>,
}

impl ConsoleState {
    /// Wire the stack: store, gateway, synchronizer, controller.
    pub fn build(config: Config, paths: &Paths) -> anyhow::Result<Self> {
        paths.ensure_dirs()?;

        let credentials = Arc::new(create_credential_manager(paths)?);
        let gateway = Arc::new(HttpGateway::new(
            &config.api_base_url,
            &config.client_key,
            credentials.clone(),
            Arc::new(ReturnToLoginNotice),
        ));
        let syncer = Arc::new(IdentitySync::new(Arc::new(ProfileStoreClient::new(
            &config.profile_api_url,
            &config.profile_api_key,
        ))));
        let controller = Arc::new(SessionController::new(
            credentials.clone(),
            gateway.clone(),
            Some(syncer.clone()),
        ));

        Ok(Self {
            config,
            credentials,
            gateway,
            syncer,
            controller,
        })
    }
}

/// The console's "hard navigation to the entry point": tell the operator to
/// log in again. The gateway has already cleared the session keys.
pub struct ReturnToLoginNotice;

impl UnauthorizedHandler for ReturnToLoginNotice {
    fn on_unauthorized(&self) {
        eprintln!("Your session is no longer valid. Run `zo-console login` to sign in again.");
    }
}
