//! Layered configuration for shelf.
//!
//! Sources are merged in increasing order of precedence:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. `config.{toml,yaml,json}` in the platform configuration directory.
//! 3. An explicitly requested file (`--config`), format chosen by extension.
//! 4. `SHELF_*` environment variables, with `__` separating nested keys
//!    (e.g. `SHELF_MATCHING__MIN_ID_LENGTH=10`).
//!
//! The merged result is validated before it is handed out, so that a bad
//! threshold fails at startup instead of halfway through a library run.

pub mod error;
mod models;

pub use crate::models::{AcquireConfig, Config, LibraryConfig, MatchingConfig, NamingConfig, ToolsConfig};

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "SHELF_";

/// Platform configuration directory (e.g. `~/.config/shelf` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "shelf").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Builds the [`Figment`] without extracting it; exposed for callers that
/// want to merge additional providers on top.
pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(dir) = config_dir() {
        tracing::trace!(dir = %dir.display(), "Looking for configuration files");
        figment = figment
            .merge(Toml::file(dir.join("config.toml")))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Json::file(dir.join("config.json")));
    }
    if let Some(path) = explicit {
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        figment = match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("toml") => figment.merge(Toml::file(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        };
    }
    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

/// Loads and validates the configuration.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let config: Config = figment(explicit)?.extract().or_raise(|| ErrorKind::Parse)?;
    config.validate()?;
    tracing::debug!(dir = %config.library.dir.display(), profile = %config.tools.profile, "Configuration loaded");
    Ok(config)
}
