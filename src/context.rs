//! Per-event evaluation state.
//!
//! A context is created once per external event, threaded through exactly one
//! chain run and then read by the caller. It is never shared across events.
//!
//! ```text
//! Created ──rule matches──▶ Matched ──(more rules)──▶ Matched
//!    │                                                   │
//!    └──────────────── chain returns ───────────────────┴──▶ Finalized
//! ```

use crate::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Created,
    Matched,
    Finalized,
}

#[derive(Debug, Clone)]
pub struct EvaluationContext {
    actor: ActorId,
    original_text: String,
    current_text: String,
    cancelled: bool,
    halted: bool,
    log_entries: Vec<String>,
    listener: String,
    matched: Option<String>,
    rule_id: Option<String>,
    state: ContextState,
}

impl EvaluationContext {
    /// Start evaluating `text` produced by `actor`, reported by `listener`
    /// (a short name such as `CHAT`).
    pub fn new(actor: ActorId, text: impl Into<String>, listener: impl Into<String>) -> Self {
        let text = text.into();
        EvaluationContext {
            actor,
            current_text: text.clone(),
            original_text: text,
            cancelled: false,
            halted: false,
            log_entries: Vec::new(),
            listener: listener.into(),
            matched: None,
            rule_id: None,
            state: ContextState::Created,
        }
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn current_text(&self) -> &str {
        &self.current_text
    }

    /// Replace the working text. Later rules see the new value.
    pub fn set_current_text(&mut self, text: impl Into<String>) {
        self.current_text = text.into();
    }

    pub fn text_changed(&self) -> bool {
        self.current_text != self.original_text
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Mark the originating event as cancelled. There is no way back.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Whether an action asked the chain to stop evaluating further rules.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub(crate) fn halt(&mut self) {
        self.halted = true;
    }

    pub fn log_entries(&self) -> &[String] {
        &self.log_entries
    }

    pub fn add_log(&mut self, entry: impl Into<String>) {
        self.log_entries.push(entry.into());
    }

    pub fn listener(&self) -> &str {
        &self.listener
    }

    /// Text matched by the most recent matching rule (empty for negated rules).
    pub fn matched_text(&self) -> Option<&str> {
        self.matched.as_deref()
    }

    /// Id of the labelled rule whose actions are currently running.
    pub fn rule_id(&self) -> Option<&str> {
        self.rule_id.as_deref()
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub(crate) fn enter_rule(&mut self, rule_id: Option<&str>, matched: String) {
        self.rule_id = rule_id.map(str::to_string);
        self.matched = Some(matched);
        self.state = ContextState::Matched;
    }

    pub(crate) fn finalize(&mut self) {
        self.rule_id = None;
        self.state = ContextState::Finalized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_starts_unchanged() {
        let ctx = EvaluationContext::new(ActorId::new("alice"), "hello", "CHAT");
        assert_eq!(ctx.original_text(), "hello");
        assert_eq!(ctx.current_text(), "hello");
        assert!(!ctx.text_changed());
        assert!(!ctx.is_cancelled());
        assert_eq!(ctx.state(), ContextState::Created);
        assert!(ctx.log_entries().is_empty());
    }

    #[test]
    fn rewriting_keeps_the_original() {
        let mut ctx = EvaluationContext::new(ActorId::new("alice"), "hello", "CHAT");
        ctx.set_current_text("HELLO");
        ctx.set_current_text("hi");
        assert_eq!(ctx.original_text(), "hello");
        assert_eq!(ctx.current_text(), "hi");
        assert!(ctx.text_changed());
    }

    #[test]
    fn lifecycle_moves_forward_only() {
        let mut ctx = EvaluationContext::new(ActorId::console(), "stop", "CONSOLE");
        ctx.enter_rule(Some("r1"), "stop".into());
        assert_eq!(ctx.state(), ContextState::Matched);
        assert_eq!(ctx.rule_id(), Some("r1"));
        assert_eq!(ctx.matched_text(), Some("stop"));

        ctx.cancel();
        ctx.finalize();
        assert_eq!(ctx.state(), ContextState::Finalized);
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.rule_id(), None);
    }
}
