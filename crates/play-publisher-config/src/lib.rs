//! Configuration file handling for play-publisher.
//!
//! This crate loads `.play-publisher.toml` files and merges them with
//! command-line overrides. Relative key paths are resolved against the
//! directory that holds the configuration file.
//!
//! # Example
//!
//! ```
//! use play_publisher_config::load_config;
//! use std::path::Path;
//!
//! // Load config from a directory (looks for .play-publisher.toml)
//! let config = load_config(Path::new(".")).expect("load config");
//!
//! if let Some(app) = config.application_id() {
//!     println!("Application: {}", app);
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use play_publisher_types::{AbandonPolicy, AccountConfig, DEFAULT_API_BASE, Endpoints};
use serde::{Deserialize, Serialize};

/// File name searched for in each directory
pub const CONFIG_FILE: &str = ".play-publisher.toml";

/// Path of the config file inside `dir`
pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

/// Complete play-publisher configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Package name of the application to publish
    #[serde(default, skip_serializing_if = "Option::is_none")]
    application_id: Option<String>,
    /// Service account settings
    #[serde(default)]
    account: AccountConfig,
    /// Edit transaction behaviour
    #[serde(default)]
    edits: EditsConfig,
    /// Remote endpoint overrides
    #[serde(default)]
    endpoints: EndpointsConfig,
}

/// Edit transaction configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditsConfig {
    /// What to do with an edit that is not committed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abandon: Option<AbandonPolicy>,
}

/// Endpoint overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Publishing API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// OAuth2 token endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
}

impl Config {
    /// Empty config: no application id, no credentials, default endpoints
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the application id
    pub fn application_id(&self) -> Option<&str> {
        self.application_id.as_deref()
    }

    /// Get the account configuration
    pub fn account(&self) -> &AccountConfig {
        &self.account
    }

    /// Get the abandoned-edit policy
    pub fn abandon_policy(&self) -> AbandonPolicy {
        self.edits.abandon.unwrap_or_default()
    }

    /// Effective endpoints, with defaults filled in
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            api_base: self
                .endpoints
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            token_uri: self.endpoints.token_uri.clone(),
        }
    }

    /// Set the application id
    #[must_use]
    pub fn with_application_id(mut self, application_id: impl Into<String>) -> Self {
        self.application_id = Some(application_id.into());
        self
    }

    /// Replace the account configuration
    #[must_use]
    pub fn with_account(mut self, account: AccountConfig) -> Self {
        self.account = account;
        self
    }

    /// Set the abandoned-edit policy
    #[must_use]
    pub fn with_abandon_policy(mut self, policy: AbandonPolicy) -> Self {
        self.edits.abandon = Some(policy);
        self
    }

    /// Set the API base URL
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.endpoints.api_base = Some(api_base.into());
        self
    }

    /// Set the token endpoint
    #[must_use]
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.endpoints.token_uri = Some(token_uri.into());
        self
    }

    /// Layer `other` on top of this config; set values in `other` win.
    ///
    /// Account settings are taken as a whole from `other` when it names any
    /// credential, so a JSON key from the file never mixes with a PKCS12
    /// override from the command line.
    pub fn merge(&self, other: &Config) -> Config {
        Config {
            application_id: other
                .application_id
                .as_ref()
                .or(self.application_id.as_ref())
                .cloned(),
            account: if other.account.is_empty() {
                self.account.clone()
            } else {
                other.account.clone()
            },
            edits: EditsConfig {
                abandon: other.edits.abandon.or(self.edits.abandon),
            },
            endpoints: EndpointsConfig {
                api_base: other
                    .endpoints
                    .api_base
                    .as_ref()
                    .or(self.endpoints.api_base.as_ref())
                    .cloned(),
                token_uri: other
                    .endpoints
                    .token_uri
                    .as_ref()
                    .or(self.endpoints.token_uri.as_ref())
                    .cloned(),
            },
        }
    }

    /// Resolve relative key paths against `base`.
    fn resolve_paths(mut self, base: &Path) -> Self {
        let absolutize = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
        self.account.json_file = self.account.json_file.map(absolutize);
        self.account.pk12_file = self.account.pk12_file.map(absolutize);
        self
    }
}

/// Load `.play-publisher.toml` from `dir`, or defaults when it is absent
pub fn load_config(dir: &Path) -> Result<Config> {
    let path = config_path(dir);
    if !path.exists() {
        return Ok(Config::default());
    }

    load_config_from_file(&path)
}

/// Load an explicit config file; a missing file is an error
pub fn load_config_from_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.resolve_paths(base))
}

/// Nearest `.play-publisher.toml` in `start_dir` or any of its parents
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;

    loop {
        let config_file = current.join(CONFIG_FILE);
        if config_file.exists() {
            return Some(config_file);
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}
