//! `%tag%` expansion for action templates.
//!
//! | tag            | value                                              |
//! |----------------|----------------------------------------------------|
//! | `%player%`     | actor display name (from the host)                 |
//! | `%world%`      | actor's world name (from the host)                 |
//! | `%message%`    | current, possibly rewritten, text                  |
//! | `%rawmessage%` | text as it arrived                                 |
//! | `%command%`    | first word of the current text                     |
//! | `%event%`      | listener short name (`CHAT`, `COMMAND`, ...)       |
//! | `%string%`     | text matched by the current rule                   |
//! | `%points%`     | actor's point score, when the point system is on   |
//! | `%ruleid%`     | id of the labelled rule being run                  |
//! | `%time%`       | local wall-clock time, `HH:MM:SS`                  |
//!
//! Unknown tags are left in place so templates containing stray `%` signs
//! survive untouched. A `%` that does not open a known tag may still close
//! one: `%foo%player%` expands to `%foo` followed by the player name.

use crate::action::ActionEnv;
use crate::context::EvaluationContext;

pub fn replace_tags(template: &str, ctx: &EvaluationContext, env: &ActionEnv<'_>) -> String {
    if !template.contains('%') {
        return template.to_string();
    }
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let name_len = after.find(|c: char| !(c.is_ascii_alphabetic() || c == '_')).unwrap_or(after.len());
        if name_len > 0 && after[name_len..].starts_with('%') {
            if let Some(value) = tag_value(&after[..name_len], ctx, env) {
                out.push_str(&value);
                rest = &after[name_len + 1..];
                continue;
            }
        }
        out.push('%');
        rest = after;
    }
    out.push_str(rest);
    out
}

fn tag_value(tag: &str, ctx: &EvaluationContext, env: &ActionEnv<'_>) -> Option<String> {
    let value = match tag.to_ascii_lowercase().as_str() {
        "player" => env.host.actor_name(ctx.actor()),
        "world" => env.host.actor_world_name(ctx.actor()),
        "message" => ctx.current_text().to_string(),
        "rawmessage" => ctx.original_text().to_string(),
        "command" => ctx.current_text().split_whitespace().next().unwrap_or("").to_string(),
        "event" => ctx.listener().to_string(),
        "string" => ctx.matched_text().unwrap_or("").to_string(),
        "points" => {
            let points = env.points?;
            format!("{:.2}", points.current_score(ctx.actor()))
        }
        "ruleid" => ctx.rule_id().unwrap_or("").to_string(),
        "time" => chrono::Local::now().format("%H:%M:%S").to_string(),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActorId;
    use crate::host::testing::RecordingHost;

    fn ctx() -> EvaluationContext {
        let mut ctx = EvaluationContext::new(ActorId::new("alice"), "/tell bob hi", "COMMAND");
        ctx.set_current_text("/msg bob hi");
        ctx.enter_rule(Some("tell-alias"), "/tell ".into());
        ctx
    }

    #[test]
    fn expands_known_tags() {
        let host = RecordingHost::new();
        let env = ActionEnv::new(&host);
        let out = replace_tags("%player%@%world% %event% [%ruleid%] %command% | %rawmessage% | %string%", &ctx(), &env);
        assert_eq!(out, "alice@overworld COMMAND [tell-alias] /msg | /tell bob hi | /tell ");
    }

    #[test]
    fn unknown_tags_and_stray_percent_survive() {
        let host = RecordingHost::new();
        let env = ActionEnv::new(&host);
        assert_eq!(replace_tags("100% sure, %nope% %message%", &ctx(), &env), "100% sure, %nope% /msg bob hi");
    }

    #[test]
    fn unknown_tag_does_not_eat_the_next_opening_percent() {
        let host = RecordingHost::new();
        let env = ActionEnv::new(&host);
        assert_eq!(replace_tags("%foo%player%", &ctx(), &env), "%fooalice");
        assert_eq!(replace_tags("%%player%%", &ctx(), &env), "%alice%");
        assert_eq!(replace_tags("%points% %player%", &ctx(), &env), "%points% alice");
        assert_eq!(replace_tags("trailing %", &ctx(), &env), "trailing %");
    }

    #[test]
    fn points_tag_needs_the_point_system() {
        let host = RecordingHost::new();
        let env = ActionEnv::new(&host);
        assert_eq!(replace_tags("%points%", &ctx(), &env), "%points%");
    }

    #[test]
    fn time_tag_is_clock_shaped() {
        let host = RecordingHost::new();
        let env = ActionEnv::new(&host);
        let out = replace_tags("%time%", &ctx(), &env);
        assert!(regex!(r"^\d{2}:\d{2}:\d{2}$").is_match(&out), "{out}");
    }
}
