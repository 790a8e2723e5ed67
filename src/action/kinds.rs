use super::ActionEnv;
use super::outcome::{EffectOutcome, Signals};
use super::registry::LoadEnv;
use crate::color::translate_color_codes;
use crate::context::EvaluationContext;
use crate::engine::{split_first_word, unquote};
use crate::error::EffectFailure;
use crate::tags::replace_tags;
use rand::seq::SliceRandom;
use regex::{Captures, Regex};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Template used by a bare `then log`.
const DEFAULT_LOG_TEMPLATE: &str = "%event% %player% matched \"%string%\": %rawmessage%";

/// A host-defined action registered through `ActionRegistry::register`.
pub trait CustomAction: Send + Sync + fmt::Debug {
    fn keyword(&self) -> &str;

    fn execute(&self, ctx: &mut EvaluationContext, env: &ActionEnv<'_>) -> EffectOutcome;
}

/// One parsed action. Parameters are fixed at load time; templates are
/// expanded against the context every time the action runs.
#[derive(Debug, Clone)]
pub enum Action {
    Cancel,
    Halt,
    /// Replace every match of the rule pattern. `$1`-style groups expand.
    Rewrite(String),
    RandomReplace(Vec<String>),
    Lower,
    Upper,
    Log(String),
    Message(String),
    MessageFile(Vec<String>),
    Broadcast(Vec<String>),
    BroadcastFile(Vec<String>),
    Notify { permission: String, message: String },
    Kick(String),
    Kill(String),
    Burn { duration: Duration, message: String },
    Command(Vec<String>),
    ConsoleCommand(Vec<String>),
    Fine { amount: f64, message: String },
    Mute { duration: Duration, message: String },
    Points(f64),
    Custom(Arc<dyn CustomAction>),
}

impl Action {
    /// Canonical keyword, used in logs and diagnostics.
    pub fn keyword(&self) -> &str {
        match self {
            Action::Cancel => "deny",
            Action::Halt => "abort",
            Action::Rewrite(_) => "rewrite",
            Action::RandomReplace(_) => "randrep",
            Action::Lower => "lower",
            Action::Upper => "upper",
            Action::Log(_) => "log",
            Action::Message(_) => "respond",
            Action::MessageFile(_) => "respondfile",
            Action::Broadcast(_) => "broadcast",
            Action::BroadcastFile(_) => "broadcastfile",
            Action::Notify { .. } => "notify",
            Action::Kick(_) => "kick",
            Action::Kill(_) => "kill",
            Action::Burn { .. } => "burn",
            Action::Command(_) => "cmd",
            Action::ConsoleCommand(_) => "console",
            Action::Fine { .. } => "fine",
            Action::Mute { .. } => "mute",
            Action::Points(_) => "points",
            Action::Custom(custom) => custom.keyword(),
        }
    }

    /// Run the action against `ctx`.
    ///
    /// `pattern` is the owning rule's condition pattern; text-mutating actions
    /// operate on its matches and do nothing without one (threshold actions).
    pub fn execute(&self, ctx: &mut EvaluationContext, env: &ActionEnv<'_>, pattern: Option<&Regex>) -> EffectOutcome {
        match self {
            Action::Cancel => EffectOutcome::signal(Signals::CANCEL),
            Action::Halt => EffectOutcome::signal(Signals::HALT),
            Action::Rewrite(template) => {
                let Some(re) = pattern else { return EffectOutcome::noop() };
                let updated = re
                    .replace_all(ctx.current_text(), |caps: &Captures<'_>| {
                        let mut expanded = String::new();
                        caps.expand(template, &mut expanded);
                        replace_tags(&expanded, ctx, env)
                    })
                    .into_owned();
                set_text(ctx, updated)
            }
            Action::RandomReplace(options) => {
                let Some(re) = pattern else { return EffectOutcome::noop() };
                let mut rng = rand::thread_rng();
                let updated = re
                    .replace_all(ctx.current_text(), |_: &Captures<'_>| {
                        let choice = options.choose(&mut rng).map(String::as_str).unwrap_or("");
                        replace_tags(choice, ctx, env)
                    })
                    .into_owned();
                set_text(ctx, updated)
            }
            Action::Lower | Action::Upper => {
                let Some(re) = pattern else { return EffectOutcome::noop() };
                let upper = matches!(self, Action::Upper);
                let updated = re
                    .replace_all(ctx.current_text(), |caps: &Captures<'_>| {
                        if upper { caps[0].to_uppercase() } else { caps[0].to_lowercase() }
                    })
                    .into_owned();
                set_text(ctx, updated)
            }
            Action::Log(template) => {
                let entry = replace_tags(template, ctx, env);
                ctx.add_log(entry);
                EffectOutcome::noop()
            }
            Action::Message(template) => {
                let text = translate_color_codes(&replace_tags(template, ctx, env));
                env.host.send_message(ctx.actor(), &text);
                EffectOutcome::effect()
            }
            Action::MessageFile(lines) => {
                for line in lines {
                    let text = translate_color_codes(&replace_tags(line, ctx, env));
                    env.host.send_message(ctx.actor(), &text);
                }
                EffectOutcome::effect()
            }
            Action::Broadcast(lines) | Action::BroadcastFile(lines) => {
                let prepared: Vec<String> =
                    lines.iter().map(|line| translate_color_codes(&replace_tags(line, ctx, env))).collect();
                let Some(first) = prepared.first() else { return EffectOutcome::noop() };
                let more = if prepared.len() > 1 { "..." } else { "" };
                ctx.add_log(format!("Broadcasted: {first}{more}"));
                env.host.broadcast(&prepared);
                EffectOutcome::effect()
            }
            Action::Notify { permission, message } => {
                let text = translate_color_codes(&replace_tags(message, ctx, env));
                EffectOutcome::from_result(env.host.notify(permission, &text))
            }
            Action::Kick(reason) => {
                if ctx.actor().is_console() {
                    return EffectOutcome::failed(EffectFailure::ActorUnavailable);
                }
                let reason = translate_color_codes(&replace_tags(reason, ctx, env));
                let outcome = EffectOutcome::from_result(env.host.kick(ctx.actor(), &reason));
                if outcome.failure.is_none() {
                    ctx.add_log(format!("Kicked {}: {}", env.host.actor_name(ctx.actor()), reason));
                }
                outcome
            }
            Action::Kill(message) => {
                if ctx.actor().is_console() {
                    return EffectOutcome::failed(EffectFailure::ActorUnavailable);
                }
                let message = translate_color_codes(&replace_tags(message, ctx, env));
                let outcome = EffectOutcome::from_result(env.host.kill(ctx.actor(), &message));
                if outcome.failure.is_none() {
                    ctx.add_log(format!("Killed {}: {}", env.host.actor_name(ctx.actor()), message));
                }
                outcome
            }
            Action::Burn { duration, message } => {
                if ctx.actor().is_console() {
                    return EffectOutcome::failed(EffectFailure::ActorUnavailable);
                }
                if let Err(failure) = env.host.burn(ctx.actor(), *duration) {
                    return EffectOutcome::failed(failure);
                }
                let text = translate_color_codes(&replace_tags(message, ctx, env));
                env.host.send_message(ctx.actor(), &text);
                ctx.add_log(format!("Burned {} for {}s", env.host.actor_name(ctx.actor()), duration.as_secs()));
                EffectOutcome::effect()
            }
            Action::Command(commands) | Action::ConsoleCommand(commands) => {
                let as_console = matches!(self, Action::ConsoleCommand(_));
                for command in commands {
                    let line = replace_tags(command, ctx, env);
                    let line = line.trim_start_matches('/');
                    let actor = if as_console { None } else { Some(ctx.actor()) };
                    if let Err(failure) = env.host.execute_command(actor, line) {
                        return EffectOutcome::failed(failure);
                    }
                    let runner = if as_console { "console".to_string() } else { env.host.actor_name(ctx.actor()) };
                    ctx.add_log(format!("Executed command as {runner}: {line}"));
                }
                EffectOutcome::effect()
            }
            Action::Fine { amount, message } => {
                if ctx.actor().is_console() {
                    return EffectOutcome::failed(EffectFailure::ActorUnavailable);
                }
                if let Err(failure) = env.host.withdraw_currency(ctx.actor(), *amount) {
                    return EffectOutcome::failed(failure);
                }
                ctx.add_log(format!("Fined {}: {:.2}", env.host.actor_name(ctx.actor()), amount));
                let text = translate_color_codes(&replace_tags(message, ctx, env));
                env.host.send_message(ctx.actor(), &text);
                EffectOutcome::effect()
            }
            Action::Mute { duration, message } => {
                let Some(mutes) = env.mutes else {
                    return EffectOutcome::failed(EffectFailure::ServiceDisabled("mutes"));
                };
                if ctx.actor().is_console() {
                    return EffectOutcome::failed(EffectFailure::ActorUnavailable);
                }
                let text = translate_color_codes(&replace_tags(message, ctx, env));
                mutes.insert_for(ctx.actor().clone(), text.clone(), *duration);
                env.host.send_message(ctx.actor(), &text);
                ctx.add_log(format!("Muted {} for {}s", env.host.actor_name(ctx.actor()), duration.as_secs()));
                EffectOutcome::effect()
            }
            Action::Points(delta) => {
                let Some(points) = env.points else {
                    return EffectOutcome::failed(EffectFailure::ServiceDisabled("points"));
                };
                let total = points.add_points(ctx.actor(), *delta);
                ctx.add_log(format!("Points {:+} for {}: now {:.2}", delta, env.host.actor_name(ctx.actor()), total));
                EffectOutcome::effect()
            }
            Action::Custom(custom) => custom.execute(ctx, env),
        }
    }
}

fn set_text(ctx: &mut EvaluationContext, updated: String) -> EffectOutcome {
    if updated == ctx.current_text() {
        return EffectOutcome::noop();
    }
    ctx.set_current_text(updated);
    EffectOutcome::signal(Signals::TEXT_CHANGED)
}

// --- Parameter parsing -------------------------------------------------------

pub(crate) fn parse_cancel(_params: &str, _env: &LoadEnv) -> Result<Action, String> {
    Ok(Action::Cancel)
}

pub(crate) fn parse_halt(_params: &str, _env: &LoadEnv) -> Result<Action, String> {
    Ok(Action::Halt)
}

pub(crate) fn parse_rewrite(params: &str, _env: &LoadEnv) -> Result<Action, String> {
    Ok(Action::Rewrite(unquote(params)))
}

pub(crate) fn parse_random_replace(params: &str, _env: &LoadEnv) -> Result<Action, String> {
    let raw = unquote(params);
    if raw.is_empty() {
        return Err("expected `|`-separated replacements".to_string());
    }
    Ok(Action::RandomReplace(raw.split('|').map(str::to_string).collect()))
}

pub(crate) fn parse_lower(_params: &str, _env: &LoadEnv) -> Result<Action, String> {
    Ok(Action::Lower)
}

pub(crate) fn parse_upper(_params: &str, _env: &LoadEnv) -> Result<Action, String> {
    Ok(Action::Upper)
}

pub(crate) fn parse_log(params: &str, _env: &LoadEnv) -> Result<Action, String> {
    let template = unquote(params);
    if template.is_empty() { Ok(Action::Log(DEFAULT_LOG_TEMPLATE.to_string())) } else { Ok(Action::Log(template)) }
}

pub(crate) fn parse_respond(params: &str, _env: &LoadEnv) -> Result<Action, String> {
    Ok(Action::Message(required_text(params, "a message")?))
}

pub(crate) fn parse_respond_file(params: &str, env: &LoadEnv) -> Result<Action, String> {
    Ok(Action::MessageFile(read_text_file(env, params)?))
}

pub(crate) fn parse_broadcast(params: &str, _env: &LoadEnv) -> Result<Action, String> {
    let text = required_text(params, "a message")?;
    Ok(Action::Broadcast(text.split("\\n").map(str::to_string).collect()))
}

pub(crate) fn parse_broadcast_file(params: &str, env: &LoadEnv) -> Result<Action, String> {
    Ok(Action::BroadcastFile(read_text_file(env, params)?))
}

pub(crate) fn parse_notify(params: &str, _env: &LoadEnv) -> Result<Action, String> {
    let (permission, rest) = split_first_word(params);
    let message = unquote(rest);
    if permission.is_empty() || message.is_empty() {
        return Err("expected `<permission> <message>`".to_string());
    }
    Ok(Action::Notify { permission: permission.to_string(), message })
}

pub(crate) fn parse_kick(params: &str, env: &LoadEnv) -> Result<Action, String> {
    Ok(Action::Kick(or_default(params, &env.messages.kick)))
}

pub(crate) fn parse_kill(params: &str, env: &LoadEnv) -> Result<Action, String> {
    Ok(Action::Kill(or_default(params, &env.messages.kill)))
}

pub(crate) fn parse_burn(params: &str, env: &LoadEnv) -> Result<Action, String> {
    let (seconds, rest) = split_first_word(params);
    Ok(Action::Burn { duration: parse_seconds(seconds)?, message: or_default(rest, &env.messages.burn) })
}

pub(crate) fn parse_command(params: &str, _env: &LoadEnv) -> Result<Action, String> {
    Ok(Action::Command(command_list(params)?))
}

pub(crate) fn parse_console_command(params: &str, _env: &LoadEnv) -> Result<Action, String> {
    Ok(Action::ConsoleCommand(command_list(params)?))
}

pub(crate) fn parse_fine(params: &str, env: &LoadEnv) -> Result<Action, String> {
    let (amount, rest) = split_first_word(params);
    let amount: f64 = amount.parse().map_err(|_| format!("expected an amount, found `{amount}`"))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(format!("fine amount must be a non-negative number, found {amount}"));
    }
    Ok(Action::Fine { amount, message: or_default(rest, &env.messages.fine) })
}

pub(crate) fn parse_mute(params: &str, env: &LoadEnv) -> Result<Action, String> {
    let (seconds, rest) = split_first_word(params);
    Ok(Action::Mute { duration: parse_seconds(seconds)?, message: or_default(rest, &env.messages.mute) })
}

pub(crate) fn parse_points(params: &str, _env: &LoadEnv) -> Result<Action, String> {
    let raw = params.trim();
    let delta: f64 = raw.parse().map_err(|_| format!("expected a point amount, found `{raw}`"))?;
    if !delta.is_finite() {
        return Err(format!("point amount must be finite, found {delta}"));
    }
    Ok(Action::Points(delta))
}

fn required_text(params: &str, what: &str) -> Result<String, String> {
    let text = unquote(params);
    if text.is_empty() { Err(format!("expected {what}")) } else { Ok(text) }
}

fn or_default(params: &str, default: &str) -> String {
    let text = unquote(params);
    if text.is_empty() { default.to_string() } else { text }
}

/// Ten years; longer mutes and burns are rejected at load.
const MAX_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let seconds = raw.parse::<u64>().map_err(|_| format!("expected a duration in seconds, found `{raw}`"))?;
    if seconds > MAX_SECONDS {
        return Err(format!("duration {seconds}s exceeds the maximum of {MAX_SECONDS}s"));
    }
    Ok(Duration::from_secs(seconds))
}

fn command_list(params: &str) -> Result<Vec<String>, String> {
    let commands: Vec<String> =
        unquote(params).split('|').map(str::trim).filter(|c| !c.is_empty()).map(str::to_string).collect();
    if commands.is_empty() { Err("expected one or more `|`-separated commands".to_string()) } else { Ok(commands) }
}

fn read_text_file(env: &LoadEnv, params: &str) -> Result<Vec<String>, String> {
    let name = unquote(params);
    if name.is_empty() {
        return Err("expected a file name".to_string());
    }
    let dir = env.text_dir.as_deref().ok_or_else(|| "no text directory configured".to_string())?;
    let path = dir.join(&name);
    let contents = std::fs::read_to_string(&path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let lines: Vec<String> = contents.lines().map(str::to_string).collect();
    if lines.is_empty() { Err(format!("{} is empty", path.display())) } else { Ok(lines) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActorId;
    use crate::cache::MuteList;
    use crate::host::testing::{HostEvent, RecordingHost};

    fn ctx(text: &str) -> EvaluationContext {
        EvaluationContext::new(ActorId::new("alice"), text, "CHAT")
    }

    #[test]
    fn fine_requires_a_numeric_amount() {
        let env = LoadEnv::default();
        assert!(parse_fine("lots", &env).is_err());
        assert!(parse_fine("-5", &env).is_err());
        match parse_fine("2.5", &env).unwrap() {
            Action::Fine { amount, message } => {
                assert_eq!(amount, 2.5);
                assert_eq!(message, env.messages.fine);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn durations_must_be_whole_seconds() {
        let env = LoadEnv::default();
        assert!(parse_mute("soon", &env).is_err());
        assert!(parse_burn("", &env).is_err());
        assert!(matches!(
            parse_mute("30 \"Quiet, %player%\"", &env).unwrap(),
            Action::Mute { duration, ref message } if duration == Duration::from_secs(30) && message == "Quiet, %player%"
        ));
    }

    #[test]
    fn durations_are_capped() {
        let env = LoadEnv::default();
        assert!(parse_mute("18446744073709551615", &env).is_err());
        assert!(parse_burn("315360001", &env).is_err());
        assert!(matches!(
            parse_mute(&MAX_SECONDS.to_string(), &env).unwrap(),
            Action::Mute { duration, .. } if duration == Duration::from_secs(MAX_SECONDS)
        ));
    }

    #[test]
    fn rewrite_expands_groups_and_tags() {
        let host = RecordingHost::new();
        let env = ActionEnv::new(&host);
        let re = Regex::new("(?i)hello (\\w+)").unwrap();
        let mut c = ctx("hello bob, hello carol");

        let outcome = Action::Rewrite("hi $1 from %player%".into()).execute(&mut c, &env, Some(&re));

        assert!(outcome.text_changed());
        assert_eq!(c.current_text(), "hi bob from alice, hi carol from alice");
    }

    #[test]
    fn text_actions_need_a_pattern() {
        let host = RecordingHost::new();
        let env = ActionEnv::new(&host);
        let mut c = ctx("hello");
        assert!(Action::Upper.execute(&mut c, &env, None).is_noop());
        assert_eq!(c.current_text(), "hello");
    }

    #[test]
    fn random_replace_uses_one_of_the_options() {
        let host = RecordingHost::new();
        let env = ActionEnv::new(&host);
        let re = Regex::new("darn").unwrap();
        let mut c = ctx("darn it");

        Action::RandomReplace(vec!["gosh".into(), "golly".into()]).execute(&mut c, &env, Some(&re));

        assert!(c.current_text() == "gosh it" || c.current_text() == "golly it");
    }

    #[test]
    fn failed_fine_reports_failure_without_cancelling() {
        let host = RecordingHost::with_balance(1.0);
        let env = ActionEnv::new(&host);
        let mut c = ctx("pay up");

        let outcome = Action::Fine { amount: 5.0, message: "fined".into() }.execute(&mut c, &env, None);

        assert_eq!(outcome.failure, Some(EffectFailure::InsufficientFunds));
        assert!(!outcome.signals.contains(Signals::CANCEL));
        assert!(host.messages_to("alice").is_empty());
    }

    #[test]
    fn successful_fine_logs_and_messages() {
        let host = RecordingHost::with_balance(10.0);
        let env = ActionEnv::new(&host);
        let mut c = ctx("pay up");

        let outcome = Action::Fine { amount: 5.0, message: "&cFined".into() }.execute(&mut c, &env, None);

        assert!(outcome.failure.is_none());
        assert_eq!(c.log_entries(), ["Fined alice: 5.00"]);
        assert_eq!(host.messages_to("alice"), ["§cFined"]);
    }

    #[test]
    fn console_cannot_be_kicked() {
        let host = RecordingHost::new();
        let env = ActionEnv::new(&host);
        let mut c = EvaluationContext::new(ActorId::console(), "stop", "CONSOLE");

        let outcome = Action::Kick("bye".into()).execute(&mut c, &env, None);

        assert_eq!(outcome.failure, Some(EffectFailure::ActorUnavailable));
        assert!(host.events().is_empty());
    }

    #[test]
    fn commands_run_in_order_without_leading_slash() {
        let host = RecordingHost::new();
        let env = ActionEnv::new(&host);
        let mut c = ctx("hi");

        let action = parse_console_command("/say %player% | /warn %player%", &LoadEnv::default()).unwrap();
        action.execute(&mut c, &env, None);

        assert_eq!(
            host.events(),
            vec![
                HostEvent::Command { actor: None, line: "say alice".into() },
                HostEvent::Command { actor: None, line: "warn alice".into() },
            ]
        );
    }

    #[test]
    fn mute_records_actor() {
        let host = RecordingHost::new();
        let mutes = MuteList::default();
        let env = ActionEnv::new(&host).with_mutes(&mutes);
        let mut c = ctx("spam");

        Action::Mute { duration: Duration::from_secs(60), message: "Muted".into() }.execute(&mut c, &env, None);

        assert_eq!(mutes.get(&ActorId::new("alice")).as_deref(), Some("Muted"));
    }

    #[test]
    fn points_without_manager_fail_softly() {
        let host = RecordingHost::new();
        let env = ActionEnv::new(&host);
        let mut c = ctx("x");
        let outcome = Action::Points(5.0).execute(&mut c, &env, None);
        assert_eq!(outcome.failure, Some(EffectFailure::ServiceDisabled("points")));
    }

    #[test]
    fn broadcast_file_reads_text_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rules.txt"), "Be nice\nNo spam\n").unwrap();
        let env = LoadEnv { text_dir: Some(dir.path().to_path_buf()), ..LoadEnv::default() };

        let action = parse_broadcast_file("rules.txt", &env).unwrap();
        assert!(matches!(&action, Action::BroadcastFile(lines) if lines.len() == 2));
        assert!(parse_broadcast_file("missing.txt", &env).is_err());

        let host = RecordingHost::new();
        let mut c = ctx("rules?");
        action.execute(&mut c, &ActionEnv::new(&host), None);
        assert_eq!(c.log_entries(), ["Broadcasted: Be nice..."]);
        assert_eq!(host.events(), vec![HostEvent::Broadcast(vec!["Be nice".into(), "No spam".into()])]);
    }
}
