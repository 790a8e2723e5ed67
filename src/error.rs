//! Error taxonomy.
//!
//! Nothing here is fatal to the engine: compile errors drop a single rule,
//! effect failures are logged into the evaluation context, and configuration
//! errors fall back to defaults. Only directory setup errors are handed back
//! to the embedding host, which decides whether they are fatal.

use std::path::PathBuf;

/// An action keyword with no registered factory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action `{keyword}`")]
pub struct UnknownActionError {
    pub keyword: String,
}

/// Failure to construct an action from its keyword and parameter string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Unknown(#[from] UnknownActionError),
    #[error("invalid parameters for `{keyword}`: {message}")]
    InvalidParameters { keyword: String, message: String },
}

/// A load-time problem with one rule. The rule is skipped; the chain is not.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("line {line}: invalid condition `{expression}`: {message}")]
    InvalidCondition { line: usize, expression: String, message: String },
    #[error("line {line}: {error}")]
    Action { line: usize, error: ActionError },
    #[error("line {line}: `{directive}` has no rule to attach to")]
    Orphan { line: usize, directive: String },
    #[error("line {line}: invalid `{directive}` directive: {message}")]
    InvalidDirective { line: usize, directive: String, message: String },
}

impl CompileError {
    /// Source line (1-based) the diagnostic refers to.
    pub fn line(&self) -> usize {
        match self {
            CompileError::InvalidCondition { line, .. }
            | CompileError::Action { line, .. }
            | CompileError::Orphan { line, .. }
            | CompileError::InvalidDirective { line, .. } => *line,
        }
    }
}

/// A host effect that did not happen.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EffectFailure {
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("no economy service available")]
    EconomyUnavailable,
    #[error("actor is not available")]
    ActorUnavailable,
    #[error("{0} is disabled")]
    ServiceDisabled(&'static str),
    #[error("not supported by host")]
    Unsupported,
    #[error("{0}")]
    Host(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {error}")]
    Io { path: PathBuf, error: std::io::Error },
    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unable to create or access directory {path}: {error}")]
    Directory { path: PathBuf, error: std::io::Error },
}
