//! Rule source compilation.
//!
//! Turns rule text into a `RuleChain`. Compilation never fails as a whole:
//! every problem is tied to one rule, that rule is dropped, and a
//! `CompileError` naming the source line is returned beside the chain.
//!
//! ## Line grammar
//!
//! ```text
//! # comment
//! rule <id> [description]          starts a labelled rule
//! [not|!] match <regex> [then ..]  starts a rule (or completes a `rule` header)
//! [not|!] contains <literal>
//! then <keyword> <params> [then ..]
//! ignore|require permission <perm>
//! ignore|require string <regex>
//! events <listener>[,<listener>..]
//! ```
//!
//! A rule runs from its header or condition line until the next header or
//! condition line. `then` may appear inline or on its own line.
//!
//! ## Invariants
//!
//! - Rules keep their source order.
//! - After the first error in a rule the rest of that rule is consumed
//!   silently, so one mistake yields one diagnostic.

use super::chain::{Rule, RuleChain};
use super::condition::{Condition, Guard, RuleLabel};
use crate::action::{Action, ActionRegistry, LoadEnv};
use crate::error::CompileError;

/// A compiled chain plus the per-rule problems found on the way.
#[derive(Debug)]
pub struct Compiled {
    pub chain: RuleChain,
    pub diagnostics: Vec<CompileError>,
}

pub(crate) fn compile(name: &str, source: &str, registry: &ActionRegistry, env: &LoadEnv) -> Compiled {
    let mut compiler = Compiler { registry, env, rules: Vec::new(), diagnostics: Vec::new(), pending: None };
    for (index, line) in source.lines().enumerate() {
        compiler.line(index + 1, line);
    }
    compiler.flush();

    for diagnostic in &compiler.diagnostics {
        tracing::warn!(chain = name, "{diagnostic}");
    }
    tracing::debug!(chain = name, rules = compiler.rules.len(), dropped = compiler.diagnostics.len(), "compiled chain");

    Compiled { chain: RuleChain::new(name, compiler.rules), diagnostics: compiler.diagnostics }
}

// --- Compiler state ------------------------------------------------------------

#[derive(Debug)]
struct Pending {
    line: usize,
    label: Option<RuleLabel>,
    condition: Option<Condition>,
    guards: Vec<Guard>,
    actions: Vec<Action>,
    poisoned: bool,
    /// Set by a `rule` header until the next condition line claims it.
    awaiting_condition: bool,
}

impl Pending {
    fn new(line: usize) -> Self {
        Pending {
            line,
            label: None,
            condition: None,
            guards: Vec::new(),
            actions: Vec::new(),
            poisoned: false,
            awaiting_condition: false,
        }
    }
}

struct Compiler<'a> {
    registry: &'a ActionRegistry,
    env: &'a LoadEnv,
    rules: Vec<Rule>,
    diagnostics: Vec<CompileError>,
    pending: Option<Pending>,
}

impl Compiler<'_> {
    fn line(&mut self, no: usize, text: &str) {
        let text = text.trim();
        if text.is_empty() || text.starts_with('#') {
            return;
        }
        let (word, rest) = split_first_word(text);
        match word.to_ascii_lowercase().as_str() {
            "rule" => self.header(no, rest),
            "then" => self.then_line(no, rest),
            "ignore" => self.guard(no, "ignore", Guard::parse_filter(false, rest)),
            "require" => self.guard(no, "require", Guard::parse_filter(true, rest)),
            "events" => self.guard(no, "events", Guard::parse_events(rest)),
            _ => self.condition_line(no, text),
        }
    }

    fn header(&mut self, no: usize, rest: &str) {
        self.flush();
        let (id, description) = split_first_word(rest);
        let mut pending = Pending::new(no);
        pending.awaiting_condition = true;
        if id.is_empty() {
            pending.poisoned = true;
            self.diagnostics.push(CompileError::InvalidDirective {
                line: no,
                directive: "rule".into(),
                message: "missing rule id".into(),
            });
        } else {
            pending.label = Some(RuleLabel { id: id.to_string(), description: description.to_string() });
        }
        self.pending = Some(pending);
    }

    fn condition_line(&mut self, no: usize, text: &str) {
        let mut segments = split_then(text).into_iter();
        let expression = segments.next().unwrap_or_default();

        let completes_header = matches!(&self.pending, Some(p) if p.awaiting_condition);
        if completes_header {
            if let Some(header) = self.pending.as_mut() {
                header.awaiting_condition = false;
            }
        } else {
            self.flush();
            self.pending = Some(Pending::new(no));
        }

        match Condition::parse(expression) {
            Ok(condition) => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.condition = Some(condition);
                }
            }
            Err(message) => {
                self.fail(CompileError::InvalidCondition { line: no, expression: expression.to_string(), message })
            }
        }
        for segment in segments {
            self.action(no, segment);
        }
    }

    fn then_line(&mut self, no: usize, rest: &str) {
        if self.pending.is_none() {
            self.diagnostics.push(CompileError::Orphan { line: no, directive: "then".into() });
            return;
        }
        for segment in split_then(rest) {
            self.action(no, segment);
        }
    }

    fn action(&mut self, no: usize, segment: &str) {
        if self.pending.as_ref().is_none_or(|p| p.poisoned) {
            return;
        }
        if segment.is_empty() {
            self.fail(CompileError::InvalidDirective {
                line: no,
                directive: "then".into(),
                message: "missing action keyword".into(),
            });
            return;
        }
        match self.registry.construct_line(segment, self.env) {
            Ok(action) => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.actions.push(action);
                }
            }
            Err(error) => self.fail(CompileError::Action { line: no, error }),
        }
    }

    fn guard(&mut self, no: usize, directive: &str, parsed: Result<Guard, String>) {
        let Some(pending) = self.pending.as_mut() else {
            self.diagnostics.push(CompileError::Orphan { line: no, directive: directive.to_string() });
            return;
        };
        if pending.poisoned {
            return;
        }
        match parsed {
            Ok(guard) => pending.guards.push(guard),
            Err(message) => {
                self.fail(CompileError::InvalidDirective { line: no, directive: directive.to_string(), message })
            }
        }
    }

    fn fail(&mut self, error: CompileError) {
        self.diagnostics.push(error);
        if let Some(pending) = self.pending.as_mut() {
            pending.poisoned = true;
        }
    }

    fn flush(&mut self) {
        let Some(pending) = self.pending.take() else { return };
        if pending.poisoned {
            return;
        }
        let Some(condition) = pending.condition else {
            self.diagnostics.push(CompileError::InvalidDirective {
                line: pending.line,
                directive: "rule".into(),
                message: "no condition follows the rule header".into(),
            });
            return;
        };
        let mut rule = Rule::new(condition, pending.actions, pending.line).with_guards(pending.guards);
        if let Some(label) = pending.label {
            rule = rule.with_label(label);
        }
        self.rules.push(rule);
    }
}

// --- Tokenizing helpers --------------------------------------------------------

/// Split on whitespace-bounded `then` (any case) outside double quotes.
pub(crate) fn split_then(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_quotes => {
                i += 2;
                continue;
            }
            b'"' => in_quotes = !in_quotes,
            b't' | b'T' if !in_quotes && then_at(bytes, i) => {
                parts.push(line[start..i].trim());
                i += 4;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(line[start..].trim());
    parts
}

fn then_at(bytes: &[u8], i: usize) -> bool {
    let bounded_before = i == 0 || bytes[i - 1].is_ascii_whitespace();
    let bounded_after = bytes.get(i + 4).is_none_or(|b| b.is_ascii_whitespace());
    bounded_before && bounded_after && bytes.get(i..i + 4).is_some_and(|w| w.eq_ignore_ascii_case(b"then"))
}

/// Strip one pair of surrounding double quotes, unescaping `\"` inside.
/// Unquoted input is only trimmed.
pub(crate) fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    match raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\""),
        None => raw.to_string(),
    }
}

/// `("keyword", "rest of line")`, both trimmed.
pub(crate) fn split_first_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.find(char::is_whitespace) {
        Some(at) => (&text[..at], text[at..].trim_start()),
        None => (text, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_default(source: &str) -> Compiled {
        compile("test", source, &ActionRegistry::with_builtins(), &LoadEnv::default())
    }

    #[test]
    fn then_split_respects_quotes_and_word_bounds() {
        assert_eq!(split_then("match x then deny THEN log"), ["match x", "deny", "log"]);
        assert_eq!(split_then("match authentic then rewrite \"and then some\""), [
            "match authentic",
            "rewrite \"and then some\""
        ]);
        assert_eq!(split_then("contains thence"), ["contains thence"]);
    }

    #[test]
    fn unquote_keeps_interior_whitespace() {
        assert_eq!(unquote("  \"/msg \"  "), "/msg ");
        assert_eq!(unquote("\"say \\\"hi\\\"\""), "say \"hi\"");
        assert_eq!(unquote("plain words "), "plain words");
        assert_eq!(unquote("\""), "\"");
    }

    #[test]
    fn block_and_inline_forms_agree() {
        let compiled = compile_default(
            "# inline\n\
             match foo then deny then log\n\
             \n\
             rule R2 Block form\n\
             contains bar\n\
             ignore permission chatsieve.trusted\n\
             events chat\n\
             then deny\n\
             then log \"blocked %string%\"\n",
        );
        assert!(compiled.diagnostics.is_empty(), "{:?}", compiled.diagnostics);
        let rules = compiled.chain.rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].source_line(), 2);
        assert_eq!(rules[0].actions().len(), 2);
        assert_eq!(rules[1].id(), Some("R2"));
        assert_eq!(rules[1].label().map(|l| l.description.as_str()), Some("Block form"));
        assert_eq!(rules[1].guards().len(), 2);
        assert_eq!(rules[1].actions().len(), 2);
    }

    #[test]
    fn one_bad_rule_does_not_sink_the_chain() {
        let compiled = compile_default(
            "match ok then deny\n\
             match (broken then deny\n\
             then log never parsed\n\
             match also-ok then log\n",
        );
        assert_eq!(compiled.chain.rule_count(), 2);
        assert_eq!(compiled.diagnostics.len(), 1);
        assert!(matches!(compiled.diagnostics[0], CompileError::InvalidCondition { line: 2, .. }));
    }

    #[test]
    fn broken_condition_does_not_swallow_the_next_rule() {
        let compiled = compile_default(
            "match (broken then deny\n\
             match darn then rewrite heck\n\
             rule R3 after\n\
             match [oops\n\
             contains fine then log\n",
        );
        let lines: Vec<usize> = compiled.chain.rules().iter().map(Rule::source_line).collect();
        assert_eq!(lines, [2, 5]);
        assert_eq!(compiled.diagnostics.len(), 2);
        assert!(matches!(compiled.diagnostics[0], CompileError::InvalidCondition { line: 1, .. }));
        assert!(matches!(compiled.diagnostics[1], CompileError::InvalidCondition { line: 4, .. }));
        assert_eq!(compiled.chain.rules()[1].id(), None);
    }

    #[test]
    fn directives_without_a_rule_are_orphans() {
        let compiled = compile_default("then deny\nignore permission x\n");
        assert_eq!(compiled.chain.rule_count(), 0);
        assert_eq!(compiled.diagnostics, vec![
            CompileError::Orphan { line: 1, directive: "then".into() },
            CompileError::Orphan { line: 2, directive: "ignore".into() },
        ]);
    }

    #[test]
    fn header_without_condition_is_reported() {
        let compiled = compile_default("rule R1 lonely\nrule\nmatch x\n");
        assert_eq!(compiled.chain.rule_count(), 0);
        let lines: Vec<usize> = compiled.diagnostics.iter().map(CompileError::line).collect();
        assert_eq!(lines, [1, 2]);
    }
}
