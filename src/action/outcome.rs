use crate::error::EffectFailure;

bitflags::bitflags! {
    /// What an action did to the evaluation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Signals: u8 {
        /// The context's current text was replaced.
        const TEXT_CHANGED = 1 << 0;
        /// The originating event should be cancelled.
        const CANCEL       = 1 << 1;
        /// Stop evaluating further rules after this one.
        const HALT         = 1 << 2;
        /// An externally visible host effect was performed.
        const EFFECT       = 1 << 3;
    }
}

/// Result of running one action.
///
/// A host failure (e.g. insufficient funds) is reported separately from the
/// signals, so the chain can log it without treating it as a match error or
/// implying cancellation.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectOutcome {
    pub signals: Signals,
    pub failure: Option<EffectFailure>,
}

impl EffectOutcome {
    pub fn noop() -> Self {
        EffectOutcome { signals: Signals::empty(), failure: None }
    }

    pub fn signal(signals: Signals) -> Self {
        EffectOutcome { signals, failure: None }
    }

    pub fn effect() -> Self {
        Self::signal(Signals::EFFECT)
    }

    pub fn failed(failure: EffectFailure) -> Self {
        EffectOutcome { signals: Signals::empty(), failure: Some(failure) }
    }

    /// `EFFECT` on success, the failure otherwise.
    pub fn from_result(result: Result<(), EffectFailure>) -> Self {
        match result {
            Ok(()) => Self::effect(),
            Err(failure) => Self::failed(failure),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.signals.is_empty() && self.failure.is_none()
    }

    pub fn text_changed(&self) -> bool {
        self.signals.contains(Signals::TEXT_CHANGED)
    }
}
