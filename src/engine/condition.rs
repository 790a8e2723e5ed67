//! Rule conditions and guards.
//!
//! A condition decides whether a rule fires; guards decide whether the rule
//! is even considered for this actor, text and listener. Guards run first, so
//! a guarded-out rule never sets `%string%` or enters the context.

use super::compile::{split_first_word, unquote};
use crate::action::ActionEnv;
use crate::context::EvaluationContext;
use regex::{Regex, RegexBuilder};

/// The regex half of a rule. Matching is case-insensitive.
#[derive(Debug, Clone)]
pub struct Condition {
    pattern: Regex,
    negated: bool,
    source: String,
}

impl Condition {
    /// Parse `[not|!] match|matches <regex>` or `[not|!] contains <literal>`.
    pub fn parse(expression: &str) -> Result<Self, String> {
        let source = expression.trim();
        let (negated, rest) = strip_negation(source);
        let (kind, argument) = split_first_word(rest);
        let raw = match kind.to_ascii_lowercase().as_str() {
            "match" | "matches" => unquote(argument),
            "contains" => regex::escape(&unquote(argument)),
            other => return Err(format!("expected `match` or `contains`, found `{other}`")),
        };
        if raw.is_empty() {
            return Err("empty pattern".to_string());
        }
        let pattern = RegexBuilder::new(&raw).case_insensitive(true).build().map_err(|e| e.to_string())?;
        Ok(Condition { pattern, negated, source: source.to_string() })
    }

    /// Test `text`, returning the matched substring on success.
    ///
    /// A negated condition succeeds when the pattern is absent and reports an
    /// empty match.
    pub fn test(&self, text: &str) -> Option<String> {
        match (self.pattern.find(text), self.negated) {
            (Some(m), false) => Some(m.as_str().to_string()),
            (None, true) => Some(String::new()),
            _ => None,
        }
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// The expression as written in the rule source.
    pub fn source(&self) -> &str {
        &self.source
    }
}

fn strip_negation(expression: &str) -> (bool, &str) {
    if let Some(rest) = expression.strip_prefix('!') {
        return (true, rest.trim_start());
    }
    let (first, rest) = split_first_word(expression);
    if first.eq_ignore_ascii_case("not") { (true, rest) } else { (false, expression) }
}

/// A pre-condition on who or what a rule applies to.
#[derive(Debug, Clone)]
pub enum Guard {
    IgnorePermission(String),
    RequirePermission(String),
    IgnoreString(Regex),
    RequireString(Regex),
    /// Listener short names (`CHAT`, `SIGN`, ...) the rule is limited to.
    Events(Vec<String>),
}

impl Guard {
    /// Parse the remainder of an `ignore` / `require` line, e.g.
    /// `permission chatsieve.trusted` or `string ^!`.
    pub(crate) fn parse_filter(require: bool, rest: &str) -> Result<Self, String> {
        let (kind, argument) = split_first_word(rest);
        let argument = unquote(argument);
        if argument.is_empty() {
            return Err(format!("missing argument after `{kind}`"));
        }
        match (kind.to_ascii_lowercase().as_str(), require) {
            ("permission" | "permissions", false) => Ok(Guard::IgnorePermission(argument)),
            ("permission" | "permissions", true) => Ok(Guard::RequirePermission(argument)),
            ("string" | "strings", require) => {
                let re = RegexBuilder::new(&argument).case_insensitive(true).build().map_err(|e| e.to_string())?;
                Ok(if require { Guard::RequireString(re) } else { Guard::IgnoreString(re) })
            }
            (other, _) => Err(format!("expected `permission` or `string`, found `{other}`")),
        }
    }

    /// Parse the remainder of an `events` line: `chat,sign` or `chat sign`.
    pub(crate) fn parse_events(rest: &str) -> Result<Self, String> {
        let events: Vec<String> = rest
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_uppercase)
            .collect();
        if events.is_empty() { Err("expected one or more event names".to_string()) } else { Ok(Guard::Events(events)) }
    }

    pub fn allows(&self, ctx: &EvaluationContext, env: &ActionEnv<'_>) -> bool {
        match self {
            Guard::IgnorePermission(p) => !env.host.actor_has_permission(ctx.actor(), p),
            Guard::RequirePermission(p) => env.host.actor_has_permission(ctx.actor(), p),
            Guard::IgnoreString(re) => !re.is_match(ctx.current_text()),
            Guard::RequireString(re) => re.is_match(ctx.current_text()),
            Guard::Events(events) => events.iter().any(|e| e.eq_ignore_ascii_case(ctx.listener())),
        }
    }
}

/// `rule <id> <description>` header of a block rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleLabel {
    pub id: String,
    pub description: String,
}
