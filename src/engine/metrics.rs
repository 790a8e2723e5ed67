//! Chain run metrics.
//!
//! - `RuleChain::execute` for normal operation.
//! - `RuleChain::execute_with_metrics` for the CLI report and for tests that
//!   need to see which rules fired.
//!
//! Collection is opt-in; the plain path only keeps throwaway counters.

use std::time::Duration;

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChainMetrics {
    /// Total elapsed time for [`RuleChain::execute_with_metrics`](super::RuleChain::execute_with_metrics).
    pub total: Duration,
    /// Rules whose guards and condition were tested.
    pub rules_evaluated: usize,
    /// Rules whose condition matched.
    pub rules_matched: usize,
    pub actions_executed: usize,
    /// Actions that reported an `EffectFailure`.
    pub failures: usize,
    /// Source lines of the matched rules, in firing order.
    pub matched_lines: Vec<usize>,
}
