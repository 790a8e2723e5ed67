//! Service configuration, read from TOML.
//!
//! Every field has a default, so an empty file (or none at all) is a valid
//! configuration. A malformed file is reported and replaced by the defaults.
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [folders]
//! rules = "rules"
//! text = "textfiles"
//!
//! [filter]
//! decolor = true
//! spam_filter = true
//! command_list = ["msg", "tell"]
//!
//! [points]
//! enabled = true
//! leak = { points = 1, interval = 30 }
//!
//! [points.thresholds.warn]
//! points = 10
//! actions.ascending = ["respond You are close to being kicked."]
//! actions.descending = ["respond You're back in good standing."]
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default configuration file name, relative to the service base directory.
pub const DEFAULT_CONFIG_FILE: &str = "chatsieve.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub logging: LoggingConfig,
    pub folders: Folders,
    pub filter: FilterOptions,
    pub points: PointsConfig,
    pub messages: Messages,
    pub cache: CacheConfig,
}

impl FilterConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|error| ConfigError::Io { path: path.to_path_buf(), error })?;
        content.parse()
    }

    /// Load `path`, falling back to defaults when it is missing or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::from_file(path) {
            Ok(config) => config,
            Err(ConfigError::Io { error, .. }) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no configuration file; using defaults");
                Self::default()
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "using default configuration");
                Self::default()
            }
        }
    }
}

impl FromStr for FilterConfig {
    type Err = ConfigError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(source)?)
    }
}

// --- Sections ----------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level rule log entries are emitted at.
    pub level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Folders {
    /// Rule files; every `*.txt` inside becomes a chain named after its stem.
    pub rules: PathBuf,
    /// Files read by `respondfile` and `broadcastfile`.
    pub text: PathBuf,
}

impl Default for Folders {
    fn default() -> Self {
        Folders { rules: PathBuf::from("rules"), text: PathBuf::from("textfiles") }
    }
}

impl Folders {
    pub fn rules_dir(&self, base: &Path) -> Result<PathBuf, ConfigError> {
        resolve_dir(base, &self.rules)
    }

    pub fn text_dir(&self, base: &Path) -> Result<PathBuf, ConfigError> {
        resolve_dir(base, &self.text)
    }
}

/// Absolute paths are kept, relative ones are joined to `base`; either way
/// the directory is created if missing.
pub(crate) fn resolve_dir(base: &Path, dir: &Path) -> Result<PathBuf, ConfigError> {
    let path = if dir.is_absolute() { dir.to_path_buf() } else { base.join(dir) };
    if !path.is_dir() {
        fs::create_dir_all(&path).map_err(|error| ConfigError::Directory { path: path.clone(), error })?;
        tracing::info!(path = %path.display(), "created directory");
    }
    Ok(path)
}

/// Switches for the per-category front ends.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Strip colour codes from chat unless the actor may use colour.
    pub decolor: bool,
    /// Cancel a chat line identical to the actor's previous one.
    pub spam_filter: bool,
    /// Same, for commands.
    pub command_spam_filter: bool,
    pub command_filter: bool,
    pub sign_filter: bool,
    pub console_filter: bool,
    /// When non-empty, only these commands are filtered.
    pub command_list: Vec<String>,
    /// Commands never filtered.
    pub command_blacklist: Vec<String>,
    /// Commands whose arguments go through the chat chain (`me`, `say`, ...).
    pub command_as_chat: Vec<String>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions {
            decolor: false,
            spam_filter: false,
            command_spam_filter: false,
            command_filter: true,
            sign_filter: true,
            console_filter: false,
            command_list: Vec::new(),
            command_blacklist: Vec::new(),
            command_as_chat: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PointsConfig {
    pub enabled: bool,
    pub leak: LeakConfig,
    pub thresholds: BTreeMap<String, ThresholdConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LeakConfig {
    /// Points removed from every score per tick.
    pub points: f64,
    /// Seconds between ticks.
    pub interval: u64,
}

impl Default for LeakConfig {
    fn default() -> Self {
        LeakConfig { points: 1.0, interval: 30 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub points: f64,
    pub actions: ThresholdActions,
}

/// Action lines, written exactly as after `then` in a rule.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThresholdActions {
    pub ascending: Vec<String>,
    pub descending: Vec<String>,
}

/// Default texts for actions and front-end notices.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub kick: String,
    pub kill: String,
    pub burn: String,
    pub fine: String,
    pub mute: String,
    pub global_mute: String,
    pub spam: String,
    pub sign_broken: String,
}

impl Default for Messages {
    fn default() -> Self {
        Messages {
            kick: "You have been kicked for your language.".into(),
            kill: "%player% died of a filthy mouth.".into(),
            burn: "&cWatch your language!".into(),
            fine: "&cYou have been fined for your language.".into(),
            mute: "&cYou have been muted.".into(),
            global_mute: "&cChat is currently muted.".into(),
            spam: "&cRepeating the same message is not allowed.".into(),
            sign_broken: "&cYour sign broke, there's something wrong with it.".into(),
        }
    }
}

/// Bounds for the last-message cache.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    /// Seconds an entry lives.
    pub ttl: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { capacity: 1024, ttl: 300 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_is_all_defaults() {
        let config: FilterConfig = "".parse().unwrap();
        assert_eq!(config, FilterConfig::default());
        assert_eq!(config.points.leak, LeakConfig { points: 1.0, interval: 30 });
        assert!(config.filter.command_filter);
        assert!(!config.points.enabled);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn parses_every_section() {
        let config: FilterConfig = r#"
            [logging]
            level = "debug"

            [folders]
            rules = "/srv/rules"

            [filter]
            decolor = true
            command_list = ["msg", "tell"]
            command_as_chat = ["me"]

            [points]
            enabled = true
            leak = { points = 2.5, interval = 10 }

            [points.thresholds.warn]
            points = 10
            actions.ascending = ["respond careful", "log %player% warned"]

            [messages]
            kick = "bye"

            [cache]
            ttl = 5
        "#
        .parse()
        .unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.folders.rules, PathBuf::from("/srv/rules"));
        assert_eq!(config.folders.text, PathBuf::from("textfiles"));
        assert!(config.filter.decolor);
        assert_eq!(config.filter.command_list, ["msg", "tell"]);
        assert_eq!(config.points.leak.points, 2.5);
        let warn = &config.points.thresholds["warn"];
        assert_eq!(warn.points, 10.0);
        assert_eq!(warn.actions.ascending.len(), 2);
        assert!(warn.actions.descending.is_empty());
        assert_eq!(config.messages.kick, "bye");
        assert_eq!(config.messages.mute, Messages::default().mute);
        assert_eq!(config.cache.ttl(), Duration::from_secs(5));
        assert_eq!(config.cache.capacity, 1024);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "[points\nenabled = ").unwrap();

        assert!(matches!(FilterConfig::from_file(&path), Err(ConfigError::Parse(_))));
        assert_eq!(FilterConfig::load_or_default(&path), FilterConfig::default());
        assert_eq!(FilterConfig::load_or_default(dir.path().join("missing.toml")), FilterConfig::default());
    }

    #[test]
    fn relative_folders_are_created_under_base() {
        let dir = tempfile::tempdir().unwrap();
        let folders = Folders::default();
        let rules = folders.rules_dir(dir.path()).unwrap();
        assert_eq!(rules, dir.path().join("rules"));
        assert!(rules.is_dir());

        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();
        let nested = Folders { text: blocker.join("text"), ..Folders::default() };
        assert!(matches!(nested.text_dir(dir.path()), Err(ConfigError::Directory { .. })));
    }
}
