extern crate self as chatsieve;

#[macro_use]
mod macros;
mod action;
mod api;
mod cache;
mod client;
mod color;
mod config;
mod context;
mod engine;
mod error;
mod host;
mod points;
mod tags;

pub use action::{Action, ActionEnv, ActionFactory, ActionRegistry, CustomAction, EffectOutcome, LoadEnv, Signals};
pub use api::{FilterService, Verdict, VerboseVerdict};
pub use cache::{MuteList, TtlCache};
pub use client::{BYPASS_CHAT, BYPASS_COMMANDS, BYPASS_MUTE, BYPASS_SIGNS, BYPASS_SPAM, COLOR, SignVerdict};
pub use color::{strip_colors, translate_color_codes};
pub use config::{
    CacheConfig, DEFAULT_CONFIG_FILE, FilterConfig, FilterOptions, Folders, LeakConfig, LogLevel, LoggingConfig, Messages, PointsConfig,
    ThresholdActions, ThresholdConfig,
};
pub use context::{ContextState, EvaluationContext};
pub use engine::{ChainMetrics, ChainRegistry, Compiled, Condition, Guard, Rule, RuleChain, RuleLabel};
pub use error::{ActionError, CompileError, ConfigError, EffectFailure, UnknownActionError};
pub use host::Host;
pub use points::{Crossing, PointManager, PointRecord, Threshold};
pub use tags::replace_tags;

use std::fmt;

// --- Core identities ---------------------------------------------------------

/// Stable identity of whoever produced a piece of text.
///
/// Hosts typically use a UUID string; the console has a reserved id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(String);

impl ActorId {
    const CONSOLE: &'static str = "CONSOLE";

    pub fn new(id: impl Into<String>) -> Self {
        ActorId(id.into())
    }

    pub fn console() -> Self {
        ActorId(Self::CONSOLE.to_string())
    }

    pub fn is_console(&self) -> bool {
        self.0 == Self::CONSOLE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        ActorId::new(id)
    }
}

/// Event category a chain is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Chat,
    Command,
    Sign,
    Console,
}

impl ListenerKind {
    pub const ALL: [ListenerKind; 4] = [ListenerKind::Chat, ListenerKind::Command, ListenerKind::Sign, ListenerKind::Console];

    /// Name used in logs, `%event%` and `events` rule guards.
    pub fn short_name(self) -> &'static str {
        match self {
            ListenerKind::Chat => "CHAT",
            ListenerKind::Command => "COMMAND",
            ListenerKind::Sign => "SIGN",
            ListenerKind::Console => "CONSOLE",
        }
    }

    /// Name of the chain (and rule file stem) the listener evaluates.
    pub fn chain_name(self) -> &'static str {
        match self {
            ListenerKind::Chat => "chat",
            ListenerKind::Command => "command",
            ListenerKind::Sign => "sign",
            ListenerKind::Console => "console",
        }
    }

    /// Accepts either the chain name or the short name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.chain_name().eq_ignore_ascii_case(name) || kind.short_name().eq_ignore_ascii_case(name))
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ListenerKind::Chat => 0,
            ListenerKind::Command => 1,
            ListenerKind::Sign => 2,
            ListenerKind::Console => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_names() {
        let cases = vec![("chat", Some(ListenerKind::Chat)), ("COMMAND", Some(ListenerKind::Command)), ("Sign", Some(ListenerKind::Sign)), ("console", Some(ListenerKind::Console)), ("book", None)];
        for (name, expected) in cases {
            assert_eq!(ListenerKind::from_name(name), expected, "{name}");
        }
        assert!(ActorId::console().is_console());
        assert!(!ActorId::new("console").is_console());
    }
}
