//! Per-target configuration and credential profiles.
//!
//! Both files are YAML mappings keyed by name. `config.yaml` maps a target
//! name to a [`TargetConfig`]; `credentials.yaml` maps an account profile
//! name to [`Credentials`]. Only the requested entry is deserialized, so a
//! malformed section for another target does not break this one.
//!
//! ```yaml
//! prismstone_info:
//!   base_url: https://www.example.jp/shop/
//!   top_url: info.html
//!   target: prismstone_info
//!   account: shop_bot
//!   debug_account: shop_bot_sandbox
//!   tweet_template: '{date} {header}\n{body}\n{url}'
//! ```

use crate::scrapers::{VariantKind, resolve_in_dir};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("credential profile `{0}` not found")]
    MissingProfile(String),
}

/// Settings for one scraping target.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Site root, used to resolve relative links.
    pub base_url: String,
    /// Listing page path relative to `base_url`.
    pub top_url: String,
    /// Logical name; selects the parsing rules and the store collection.
    pub target: String,
    /// Credential profile used for posting.
    pub account: String,
    /// Credential profile used with `--debug`.
    pub debug_account: String,
    /// Post template with `{date}`, `{header}`, `{body}` and `{url}`.
    pub tweet_template: String,
    /// Explicit parsing rules; inferred from `target` when absent.
    #[serde(default)]
    pub variant: Option<VariantKind>,
}

impl TargetConfig {
    /// Absolute URL of the listing page.
    pub fn page_url(&self) -> Result<Url, url::ParseError> {
        resolve_in_dir(&self.base_url, &self.top_url)
    }

    /// Parsing rules for this target.
    pub fn variant_kind(&self) -> VariantKind {
        self.variant
            .unwrap_or_else(|| VariantKind::infer_from_target(&self.target))
    }

    /// Credential profile name, honouring the sandbox switch.
    pub fn account_name(&self, debug: bool) -> &str {
        if debug {
            &self.debug_account
        } else {
            &self.account
        }
    }
}

/// API credentials for one account profile.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    /// OAuth 2.0 user-context access token.
    pub bearer_token: String,
}

fn read_yaml_map(path: &Path) -> Result<HashMap<String, serde_yaml::Value>, ConfigError> {
    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
        path: display,
        source,
    })
}

/// Load the section for `name` from a config file.
///
/// # Arguments
///
/// * `path` - YAML file mapping target names to sections
/// * `name` - Target to look up
///
/// # Returns
///
/// `Ok(None)` when the file parses but has no such section.
///
/// # Errors
///
/// [`ConfigError::Read`] if the file cannot be read, [`ConfigError::Yaml`]
/// if it is not a mapping or the section does not fit [`TargetConfig`].
#[instrument(level = "debug", skip_all, fields(path = %path.display(), %name))]
pub fn load_target(path: &Path, name: &str) -> Result<Option<TargetConfig>, ConfigError> {
    let mut sections = read_yaml_map(path)?;
    let Some(section) = sections.remove(name) else {
        debug!("Target section not found");
        return Ok(None);
    };
    let config = serde_yaml::from_value(section).map_err(|source| ConfigError::Yaml {
        path: path.display().to_string(),
        source,
    })?;
    Ok(Some(config))
}

/// Load the credentials for account profile `account`.
///
/// # Errors
///
/// [`ConfigError::MissingProfile`] when the file has no such profile, plus
/// the read and YAML errors of [`load_target`].
#[instrument(level = "debug", skip_all, fields(path = %path.display(), %account))]
pub fn load_credentials(path: &Path, account: &str) -> Result<Credentials, ConfigError> {
    let mut profiles = read_yaml_map(path)?;
    let profile = profiles
        .remove(account)
        .ok_or_else(|| ConfigError::MissingProfile(account.to_string()))?;
    serde_yaml::from_value(profile).map_err(|source| ConfigError::Yaml {
        path: path.display().to_string(),
        source,
    })
}
