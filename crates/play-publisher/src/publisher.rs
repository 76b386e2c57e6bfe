use play_publisher_api::PublisherClient;
use play_publisher_auth::resolve_credential;
use play_publisher_config::Config;
use play_publisher_types::{AccountConfig, Endpoints, PublishError};
use tracing::info;

use crate::edit::EditSession;

/// Message used when no application id is configured.
pub const NO_APPLICATION_ID_MESSAGE: &str = "No application id provided.";

/// Resolve the account credential and build an authenticated client.
///
/// Nothing is sent over the network here; the first API call performs the
/// token exchange.
pub fn build_client(account: &AccountConfig, endpoints: &Endpoints) -> Result<PublisherClient, PublishError> {
    let mut credential = resolve_credential(account)?;
    if let Some(token_uri) = &endpoints.token_uri {
        credential = credential.with_token_uri(token_uri.clone());
    }
    info!(
        source = %credential.source(),
        api_base = %endpoints.api_base,
        "built publishing client"
    );
    PublisherClient::with_base_url(credential, &endpoints.api_base)
}

/// Build the edit session described by a loaded configuration.
pub fn session_from_config(config: &Config) -> Result<EditSession<PublisherClient>, PublishError> {
    let application_id = config
        .application_id()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| PublishError::configuration(NO_APPLICATION_ID_MESSAGE))?;

    let client = build_client(config.account(), &config.endpoints())?;
    Ok(EditSession::new(client, application_id).with_abandon_policy(config.abandon_policy()))
}
