//! Rules and the chain that runs them.

use super::compile::{self, Compiled};
use super::condition::{Condition, Guard, RuleLabel};
use super::metrics::ChainMetrics;
use crate::action::{Action, ActionEnv, ActionRegistry, LoadEnv, Signals};
use crate::context::{ContextState, EvaluationContext};
use std::time::Instant;

/// One condition and the actions it triggers. Immutable once compiled.
#[derive(Debug, Clone)]
pub struct Rule {
    condition: Condition,
    actions: Vec<Action>,
    guards: Vec<Guard>,
    label: Option<RuleLabel>,
    source_line: usize,
}

impl Rule {
    pub fn new(condition: Condition, actions: Vec<Action>, source_line: usize) -> Self {
        Rule { condition, actions, guards: Vec::new(), label: None, source_line }
    }

    pub fn with_guards(mut self, guards: Vec<Guard>) -> Self {
        self.guards = guards;
        self
    }

    pub fn with_label(mut self, label: RuleLabel) -> Self {
        self.label = Some(label);
        self
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn label(&self) -> Option<&RuleLabel> {
        self.label.as_ref()
    }

    pub fn id(&self) -> Option<&str> {
        self.label.as_ref().map(|l| l.id.as_str())
    }

    pub fn source_line(&self) -> usize {
        self.source_line
    }

    /// Guards first, then the condition against the current text.
    fn applies(&self, ctx: &EvaluationContext, env: &ActionEnv<'_>) -> Option<String> {
        if !self.guards.iter().all(|g| g.allows(ctx, env)) {
            return None;
        }
        self.condition.test(ctx.current_text())
    }
}

/// An ordered, immutable list of rules bound to one event category.
///
/// Chains are shared across threads behind an `Arc`; evaluation only reads
/// them, so any number of contexts may run through one chain at once.
#[derive(Debug, Clone)]
pub struct RuleChain {
    name: String,
    rules: Vec<Rule>,
}

impl RuleChain {
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        RuleChain { name: name.into(), rules }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// Compile rule source text. See `compile.rs` for the grammar.
    pub fn compile(name: &str, source: &str, registry: &ActionRegistry, env: &LoadEnv) -> Compiled {
        compile::compile(name, source, registry, env)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Run every rule, in order, against `ctx`.
    ///
    /// A halt lets the rest of the current rule's actions run and then stops;
    /// a cancel only marks the context. The context is finalized on return
    /// and a finalized context is left untouched.
    pub fn execute(&self, ctx: &mut EvaluationContext, env: &ActionEnv<'_>) {
        let mut metrics = ChainMetrics::default();
        self.run(ctx, env, &mut metrics);
    }

    pub fn execute_with_metrics(&self, ctx: &mut EvaluationContext, env: &ActionEnv<'_>) -> ChainMetrics {
        let start = Instant::now();
        let mut metrics = ChainMetrics::default();
        self.run(ctx, env, &mut metrics);
        metrics.total = start.elapsed();
        metrics
    }

    fn run(&self, ctx: &mut EvaluationContext, env: &ActionEnv<'_>, metrics: &mut ChainMetrics) {
        if ctx.state() == ContextState::Finalized {
            tracing::debug!(chain = %self.name, "context already finalized; skipping");
            return;
        }

        for rule in &self.rules {
            metrics.rules_evaluated += 1;
            let Some(matched) = rule.applies(ctx, env) else { continue };

            tracing::debug!(chain = %self.name, line = rule.source_line, rule = rule.id(), matched = %matched, "rule matched");
            ctx.enter_rule(rule.id(), matched);
            metrics.rules_matched += 1;
            metrics.matched_lines.push(rule.source_line);

            for action in &rule.actions {
                let outcome = action.execute(ctx, env, Some(rule.condition.pattern()));
                metrics.actions_executed += 1;
                if outcome.signals.contains(Signals::CANCEL) {
                    ctx.cancel();
                }
                if outcome.signals.contains(Signals::HALT) {
                    ctx.halt();
                }
                if let Some(failure) = outcome.failure {
                    tracing::warn!(chain = %self.name, line = rule.source_line, action = action.keyword(), %failure, "action failed");
                    ctx.add_log(format!("{} failed: {failure}", action.keyword()));
                    metrics.failures += 1;
                }
            }

            if ctx.is_halted() {
                tracing::debug!(chain = %self.name, line = rule.source_line, "halted");
                break;
            }
        }

        ctx.finalize();
    }
}
