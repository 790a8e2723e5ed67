//! Rule engine: compile rule text into chains and run contexts through them.
//!
//! ## How the parts work together
//!
//! ```text
//! rule source ──┐
//!               │  RuleChain::compile            (compile.rs)
//!               │    - split lines / `then` segments
//!               │    - Condition::parse, Guard::parse_*   (condition.rs)
//!               │    - ActionRegistry::construct_line     (action/registry.rs)
//!               └───────────────┬──────────────
//!                               │ Compiled { chain, diagnostics }
//!                               v
//!                  ChainRegistry::publish (registry.rs, Arc swap)
//!                               │
//! EvaluationContext ────────────┤
//!                               v
//!                     RuleChain::execute (chain.rs)
//!                       - for each rule, in order:
//!                           guards → condition on current text
//!                           run actions, fold their Signals
//!                       - stop after a rule that halted
//!                               │
//!                               v
//!                     finalized EvaluationContext
//! ```
//!
//! ## Responsibilities by module
//!
//! - `compile.rs`: line grammar, per-rule diagnostics, quote handling.
//! - `condition.rs`: `Condition` (regex + negation), `Guard`, `RuleLabel`.
//! - `chain.rs`: `Rule` and `RuleChain`, the evaluation loop.
//! - `registry.rs`: named chains behind an `RwLock`, replaced atomically.
//! - `metrics.rs`: optional counters and timing for a run.
//!
//! ## Debugging
//!
//! Run with `RUST_LOG=chatsieve=debug` to trace every matched rule.

#[path = "engine/chain.rs"]
mod chain;
#[path = "engine/compile.rs"]
mod compile;
#[path = "engine/condition.rs"]
mod condition;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/registry.rs"]
mod registry;
#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

pub use chain::{Rule, RuleChain};
pub use compile::Compiled;
pub use condition::{Condition, Guard, RuleLabel};
pub use metrics::ChainMetrics;
pub use registry::ChainRegistry;

pub(crate) use compile::{split_first_word, unquote};
