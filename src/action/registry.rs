use super::kinds::{self, Action};
use crate::config::Messages;
use crate::engine::split_first_word;
use crate::error::{ActionError, UnknownActionError};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub(crate) type ParseFn = fn(&str, &LoadEnv) -> Result<Action, String>;

/// Builds an action from its raw parameter string. An `Err` message becomes
/// an `ActionError::InvalidParameters` naming the keyword.
pub type ActionFactory = Arc<dyn Fn(&str, &LoadEnv) -> Result<Action, String> + Send + Sync>;

/// Load-time inputs available to action parsers.
#[derive(Debug, Clone, Default)]
pub struct LoadEnv {
    /// Directory `respondfile` / `broadcastfile` read from.
    pub text_dir: Option<PathBuf>,
    /// Default messages for actions written without one.
    pub messages: Messages,
}

const BUILTINS: &[(&str, ParseFn)] = action_table![
    ["deny", "cancel"] => kinds::parse_cancel,
    ["abort", "halt"] => kinds::parse_halt,
    ["rewrite", "replace"] => kinds::parse_rewrite,
    ["randrep"] => kinds::parse_random_replace,
    ["lower"] => kinds::parse_lower,
    ["upper"] => kinds::parse_upper,
    ["log"] => kinds::parse_log,
    ["respond", "message", "warn"] => kinds::parse_respond,
    ["respondfile"] => kinds::parse_respond_file,
    ["broadcast"] => kinds::parse_broadcast,
    ["broadcastfile"] => kinds::parse_broadcast_file,
    ["notify"] => kinds::parse_notify,
    ["kick"] => kinds::parse_kick,
    ["kill"] => kinds::parse_kill,
    ["burn"] => kinds::parse_burn,
    ["cmd", "cmdchain"] => kinds::parse_command,
    ["console", "consolechain"] => kinds::parse_console_command,
    ["fine"] => kinds::parse_fine,
    ["mute"] => kinds::parse_mute,
    ["points"] => kinds::parse_points,
];

/// Keyword → action factory lookup. Keywords are case-insensitive.
#[derive(Clone)]
pub struct ActionRegistry {
    factories: HashMap<String, ActionFactory>,
}

impl ActionRegistry {
    pub fn empty() -> Self {
        ActionRegistry { factories: HashMap::new() }
    }

    /// Registry preloaded with every built-in keyword.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for &(keyword, parse) in BUILTINS {
            let factory: ActionFactory = Arc::new(parse);
            registry.factories.insert(keyword.to_string(), factory);
        }
        registry
    }

    /// Add or replace a keyword, returning the factory it displaced.
    pub fn register<F>(&mut self, keyword: &str, factory: F) -> Option<ActionFactory>
    where
        F: Fn(&str, &LoadEnv) -> Result<Action, String> + Send + Sync + 'static,
    {
        self.factories.insert(keyword.to_ascii_lowercase(), Arc::new(factory))
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.factories.contains_key(&keyword.to_ascii_lowercase())
    }

    /// Registered keywords, sorted.
    pub fn keywords(&self) -> Vec<&str> {
        let mut keywords: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keywords.sort_unstable();
        keywords
    }

    pub fn construct(&self, keyword: &str, params: &str, env: &LoadEnv) -> Result<Action, ActionError> {
        let key = keyword.to_ascii_lowercase();
        let factory = self.factories.get(&key).ok_or_else(|| UnknownActionError { keyword: keyword.to_string() })?;
        factory(params.trim(), env).map_err(|message| ActionError::InvalidParameters { keyword: key, message })
    }

    /// Construct from a whole `keyword params...` line.
    pub fn construct_line(&self, line: &str, env: &LoadEnv) -> Result<Action, ActionError> {
        let (keyword, params) = split_first_word(line);
        self.construct(keyword, params, env)
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry").field("keywords", &self.keywords()).finish()
    }
}
