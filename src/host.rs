//! The callback surface the embedding platform implements.
//!
//! The engine never talks to a game server, economy or network directly; it
//! only calls these methods. They may be invoked from any thread that
//! evaluates a chain (chat, command and sign events usually arrive on
//! different threads) and from the point-decay worker. Implementations that
//! mutate caller-visible state must either be safe to call off the owning
//! thread or redispatch internally, and must bound their own latency: the
//! engine imposes no timeout.

use crate::ActorId;
use crate::error::EffectFailure;
use std::time::Duration;

pub trait Host: Send + Sync {
    fn send_message(&self, actor: &ActorId, text: &str);

    fn broadcast(&self, lines: &[String]);

    fn kick(&self, actor: &ActorId, reason: &str) -> Result<(), EffectFailure>;

    /// Run `command_line` as `actor`, or as the console when `actor` is `None`.
    fn execute_command(&self, actor: Option<&ActorId>, command_line: &str) -> Result<(), EffectFailure>;

    fn withdraw_currency(&self, actor: &ActorId, amount: f64) -> Result<(), EffectFailure>;

    fn actor_world_name(&self, actor: &ActorId) -> String;

    fn actor_has_permission(&self, actor: &ActorId, permission: &str) -> bool;

    /// Display name for `%player%`. Defaults to the raw id.
    fn actor_name(&self, actor: &ActorId) -> String {
        actor.as_str().to_string()
    }

    /// Message everyone holding `permission`.
    fn notify(&self, _permission: &str, _text: &str) -> Result<(), EffectFailure> {
        Err(EffectFailure::Unsupported)
    }

    /// Kill the actor, showing `death_message` in place of the normal one.
    fn kill(&self, _actor: &ActorId, _death_message: &str) -> Result<(), EffectFailure> {
        Err(EffectFailure::Unsupported)
    }

    fn burn(&self, _actor: &ActorId, _duration: Duration) -> Result<(), EffectFailure> {
        Err(EffectFailure::Unsupported)
    }
}
