use super::threshold::{Crossing, Threshold};
use crate::ActorId;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// One actor's score. Only the `PointManager` mutates records.
#[derive(Debug, Clone)]
pub struct PointRecord {
    actor: ActorId,
    score: f64,
    last_decay: DateTime<Utc>,
    /// Names of the thresholds this actor is currently at or above.
    above: HashSet<String>,
}

impl PointRecord {
    pub(crate) fn new(actor: ActorId) -> Self {
        PointRecord { actor, score: 0.0, last_decay: Utc::now(), above: HashSet::new() }
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn last_decay(&self) -> DateTime<Utc> {
        self.last_decay
    }

    pub fn is_above(&self, threshold: &str) -> bool {
        self.above.contains(threshold)
    }

    /// Nothing left worth keeping.
    pub(crate) fn is_idle(&self) -> bool {
        self.score <= 0.0 && self.above.is_empty()
    }

    pub(crate) fn apply(&mut self, delta: f64) -> f64 {
        self.score = (self.score + delta).max(0.0);
        self.score
    }

    pub(crate) fn decay(&mut self, amount: f64, now: DateTime<Utc>) -> f64 {
        self.last_decay = now;
        self.apply(-amount)
    }

    /// Update the above/below state against `thresholds` (sorted by level)
    /// and return the crossings in firing order.
    pub(crate) fn crossings(&mut self, thresholds: &[Arc<Threshold>]) -> Vec<(Arc<Threshold>, Crossing)> {
        let mut rising = Vec::new();
        let mut falling = Vec::new();
        for threshold in thresholds {
            let now_above = self.score >= threshold.level();
            let was_above = self.above.contains(threshold.name());
            match (was_above, now_above) {
                (false, true) => {
                    self.above.insert(threshold.name().to_string());
                    rising.push((Arc::clone(threshold), Crossing::Ascending));
                }
                (true, false) => {
                    self.above.remove(threshold.name());
                    falling.push((Arc::clone(threshold), Crossing::Descending));
                }
                _ => {}
            }
        }
        falling.reverse();
        rising.extend(falling);
        rising
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(levels: &[(&str, f64)]) -> Vec<Arc<Threshold>> {
        levels.iter().map(|&(name, level)| Arc::new(Threshold::new(name, level, Vec::new(), Vec::new()))).collect()
    }

    #[test]
    fn score_clamps_at_zero() {
        let mut record = PointRecord::new(ActorId::new("alice"));
        assert_eq!(record.apply(3.0), 3.0);
        assert_eq!(record.apply(-5.0), 0.0);
        assert!(record.is_idle());
    }

    #[test]
    fn crossings_fire_once_in_level_order() {
        let thresholds = levels(&[("low", 5.0), ("high", 10.0)]);
        let mut record = PointRecord::new(ActorId::new("alice"));

        record.apply(12.0);
        let up: Vec<(String, Crossing)> =
            record.crossings(&thresholds).into_iter().map(|(t, c)| (t.name().to_string(), c)).collect();
        assert_eq!(up, [("low".to_string(), Crossing::Ascending), ("high".to_string(), Crossing::Ascending)]);
        assert!(record.crossings(&thresholds).is_empty());

        record.decay(12.0, Utc::now());
        let down: Vec<String> = record.crossings(&thresholds).iter().map(|(t, _)| t.name().to_string()).collect();
        assert_eq!(down, ["high", "low"]);
        assert!(record.is_idle());
    }
}
