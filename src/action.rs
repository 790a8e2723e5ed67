//! Actions: the side-effecting half of a rule.
//!
//! An action is parsed once, when its rule is compiled, from a keyword and a
//! raw parameter string. At evaluation time it runs against the current
//! `EvaluationContext` and reports what happened through an `EffectOutcome`.
//!
//! ## How the parts work together
//!
//! ```text
//! "then fine 5 Watch it"
//!        │
//!        ▼
//! ActionRegistry::construct("fine", "5 Watch it", &LoadEnv)   (registry.rs)
//!        │  keyword → factory (built-in table or host-registered)
//!        ▼
//! Action::Fine { amount: 5.0, message: "Watch it" }            (kinds.rs)
//!        │
//!        ▼  at evaluation time
//! Action::execute(&mut ctx, &ActionEnv, pattern) -> EffectOutcome   (outcome.rs)
//! ```
//!
//! ## Extension points
//!
//! - Built-in keywords live in the `BUILTINS` table in `registry.rs`.
//! - Hosts add their own variants with [`ActionRegistry::register`], returning
//!   `Action::Custom` wrapping a [`CustomAction`].

#[path = "action/kinds.rs"]
mod kinds;
#[path = "action/outcome.rs"]
mod outcome;
#[path = "action/registry.rs"]
mod registry;

pub use kinds::{Action, CustomAction};
pub use outcome::{EffectOutcome, Signals};
pub use registry::{ActionFactory, ActionRegistry, LoadEnv};

pub(crate) use registry::ParseFn;

use crate::cache::MuteList;
use crate::host::Host;
use crate::points::PointManager;

/// Services an action may reach while it runs.
#[derive(Clone, Copy)]
pub struct ActionEnv<'a> {
    pub host: &'a dyn Host,
    /// `None` when the point system is disabled (or inside threshold actions).
    pub points: Option<&'a PointManager>,
    pub mutes: Option<&'a MuteList>,
}

impl<'a> ActionEnv<'a> {
    pub fn new(host: &'a dyn Host) -> Self {
        ActionEnv { host, points: None, mutes: None }
    }

    pub fn with_points(mut self, points: &'a PointManager) -> Self {
        self.points = Some(points);
        self
    }

    pub fn with_mutes(mut self, mutes: &'a MuteList) -> Self {
        self.mutes = Some(mutes);
        self
    }
}

impl std::fmt::Debug for ActionEnv<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionEnv")
            .field("host", &"<host>")
            .field("points", &self.points.is_some())
            .field("mutes", &self.mutes.is_some())
            .finish()
    }
}
