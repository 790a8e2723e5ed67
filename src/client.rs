//! Front ends, one per event category.
//!
//! Each `handle_*` method is what a host calls from its event listener. On
//! top of [`FilterService::evaluate`] they apply the category switch, bypass
//! permissions, mutes, the repeat filter and category-specific shaping of
//! the text (command lists, sign lines).
//!
//! | permission                   | effect                                   |
//! |------------------------------|------------------------------------------|
//! | `chatsieve.bypass.chat`      | chat is never filtered                   |
//! | `chatsieve.bypass.commands`  | commands are never filtered              |
//! | `chatsieve.bypass.signs`     | signs are never filtered                 |
//! | `chatsieve.bypass.mute`      | global mute does not apply               |
//! | `chatsieve.bypass.spam`      | repeat filter does not apply             |
//! | `chatsieve.color`            | colour codes survive `decolor`           |

use crate::api::{FilterService, Verdict};
use crate::color::{strip_colors, translate_color_codes};
use crate::{ActorId, ListenerKind};
use std::sync::PoisonError;

pub const BYPASS_CHAT: &str = "chatsieve.bypass.chat";
pub const BYPASS_COMMANDS: &str = "chatsieve.bypass.commands";
pub const BYPASS_SIGNS: &str = "chatsieve.bypass.signs";
pub const BYPASS_MUTE: &str = "chatsieve.bypass.mute";
pub const BYPASS_SPAM: &str = "chatsieve.bypass.spam";
pub const COLOR: &str = "chatsieve.color";

const SIGN_LINES: usize = 4;
const SIGN_LINE_WIDTH: usize = 15;

/// Outcome of filtering a sign.
#[derive(Debug, Clone, PartialEq)]
pub struct SignVerdict {
    /// Always four lines, at most fifteen characters each when changed.
    pub lines: Vec<String>,
    pub changed: bool,
    pub cancelled: bool,
    pub log: Vec<String>,
}

impl FilterService {
    /// Filter a chat line. A changed line has its `&` colour codes translated.
    pub fn handle_chat(&self, actor: &ActorId, message: &str) -> Verdict {
        if !self.is_enabled(ListenerKind::Chat) || self.host.actor_has_permission(actor, BYPASS_CHAT) {
            return Verdict::unchanged(message);
        }
        if let Some(blocked) = self.muted(actor, message) {
            return blocked;
        }
        let spam_filter = self.config.read().unwrap_or_else(PoisonError::into_inner).filter.spam_filter;
        if spam_filter && self.is_repeat(ListenerKind::Chat, actor, message) {
            return Verdict::blocked(message);
        }
        self.filter_as_chat(actor, message)
    }

    /// Filter a command line (with or without its leading `/`).
    ///
    /// Commands listed under `command_as_chat` go through the chat chain.
    /// A command rewritten to nothing is cancelled.
    pub fn handle_command(&self, actor: &ActorId, command_line: &str) -> Verdict {
        if !self.is_enabled(ListenerKind::Command) || self.host.actor_has_permission(actor, BYPASS_COMMANDS) {
            return Verdict::unchanged(command_line);
        }
        let options = self.config.read().unwrap_or_else(PoisonError::into_inner).filter.clone();
        let command = command_name(command_line);

        let mut verdict = if contains_command(&options.command_as_chat, &command) {
            if let Some(blocked) = self.muted(actor, command_line) {
                return blocked;
            }
            if options.command_spam_filter && self.is_repeat(ListenerKind::Command, actor, command_line) {
                return Verdict::blocked(command_line);
            }
            self.filter_as_chat(actor, command_line)
        } else {
            if !options.command_list.is_empty() && !contains_command(&options.command_list, &command) {
                return Verdict::unchanged(command_line);
            }
            if contains_command(&options.command_blacklist, &command) {
                return Verdict::unchanged(command_line);
            }
            self.evaluate(ListenerKind::Command, actor, command_line)
        };

        if verdict.changed && verdict.text.trim().is_empty() {
            verdict.cancelled = true;
        }
        verdict
    }

    /// Filter the lines of a sign as one tab-joined text.
    pub fn handle_sign(&self, actor: &ActorId, lines: &[String]) -> SignVerdict {
        let unchanged = || SignVerdict { lines: pad_sign(lines), changed: false, cancelled: false, log: Vec::new() };
        if !self.is_enabled(ListenerKind::Sign) || self.host.actor_has_permission(actor, BYPASS_SIGNS) {
            return unchanged();
        }

        let joined = lines.join("\t");
        let joined = joined.trim();
        let mut verdict = self.evaluate(ListenerKind::Sign, actor, joined);

        let mut out = SignVerdict { lines: pad_sign(lines), changed: verdict.changed, cancelled: verdict.cancelled, log: Vec::new() };
        if verdict.changed {
            let decolor = self.config.read().unwrap_or_else(PoisonError::into_inner).filter.decolor;
            let text = if decolor && !self.host.actor_has_permission(actor, COLOR) {
                strip_colors(&verdict.text)
            } else {
                verdict.text.clone()
            };
            let split: Vec<String> = text.split('\t').map(|line| line.chars().take(SIGN_LINE_WIDTH).collect()).collect();
            out.lines = pad_sign(&split);
        }
        if verdict.cancelled {
            let notice = self.config.read().unwrap_or_else(PoisonError::into_inner).messages.sign_broken.clone();
            self.host.send_message(actor, &translate_color_codes(&notice));
            verdict.log.push(format!("SIGN {} sign text: {}", self.host.actor_name(actor), joined));
        }
        out.log = verdict.log;
        out
    }

    /// Filter a console command. A command rewritten to nothing is cancelled.
    pub fn handle_console(&self, command_line: &str) -> Verdict {
        if !self.is_enabled(ListenerKind::Console) {
            return Verdict::unchanged(command_line);
        }
        let mut verdict = self.evaluate(ListenerKind::Console, &ActorId::console(), command_line);
        if verdict.changed && verdict.text.trim().is_empty() {
            verdict.cancelled = true;
        }
        verdict
    }

    // --- Shared steps ------------------------------------------------------------

    /// Global mute (unless bypassed) or a personal mute from the `mute` action.
    fn muted(&self, actor: &ActorId, text: &str) -> Option<Verdict> {
        if self.is_globally_muted() && !self.host.actor_has_permission(actor, BYPASS_MUTE) {
            let notice = self.config.read().unwrap_or_else(PoisonError::into_inner).messages.global_mute.clone();
            self.host.send_message(actor, &translate_color_codes(&notice));
            return Some(Verdict::blocked(text));
        }
        if let Some(reason) = self.mutes.get(actor) {
            self.host.send_message(actor, &reason);
            return Some(Verdict::blocked(text));
        }
        None
    }

    /// Record `text` as the actor's latest and report whether it repeats the
    /// previous one.
    fn is_repeat(&self, kind: ListenerKind, actor: &ActorId, text: &str) -> bool {
        if self.host.actor_has_permission(actor, BYPASS_SPAM) {
            return false;
        }
        let previous = self.last_messages().insert((actor.clone(), kind), text.to_string());
        if previous.as_deref() != Some(text) {
            return false;
        }
        let notice = self.config.read().unwrap_or_else(PoisonError::into_inner).messages.spam.clone();
        self.host.send_message(actor, &translate_color_codes(&notice));
        tracing::debug!(actor = %actor, listener = kind.short_name(), "repeated message blocked");
        true
    }

    /// Optional decolour, then the chat chain; changed text gets its colour
    /// codes translated.
    fn filter_as_chat(&self, actor: &ActorId, text: &str) -> Verdict {
        let decolor = self.config.read().unwrap_or_else(PoisonError::into_inner).filter.decolor;
        let input = if decolor && !self.host.actor_has_permission(actor, COLOR) { strip_colors(text) } else { text.to_string() };

        let mut verdict = self.evaluate(ListenerKind::Chat, actor, &input);
        verdict.changed = verdict.text != text;
        if verdict.changed {
            verdict.text = translate_color_codes(&verdict.text);
        }
        verdict
    }
}

/// Lower-cased command word without its `/`.
fn command_name(command_line: &str) -> String {
    command_line.trim_start().trim_start_matches('/').split_whitespace().next().unwrap_or("").to_ascii_lowercase()
}

fn contains_command(list: &[String], command: &str) -> bool {
    list.iter().any(|c| c.trim_start_matches('/').eq_ignore_ascii_case(command))
}

fn pad_sign(lines: &[String]) -> Vec<String> {
    (0..SIGN_LINES).map(|i| lines.get(i).cloned().unwrap_or_default()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::host::Host;
    use crate::host::testing::RecordingHost;
    use std::sync::Arc;
    use std::time::Duration;

    fn service(config: FilterConfig, rules: &[(&str, &str)]) -> (FilterService, Arc<RecordingHost>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(RecordingHost::new());
        let shared: Arc<dyn Host> = host.clone();
        let service = FilterService::new(shared, dir.path(), config).unwrap();
        for (name, source) in rules {
            assert!(service.load_chain(name, source).is_empty());
        }
        (service, host, dir)
    }

    #[test]
    fn chat_bypass_and_mutes() {
        let (service, host, _dir) = service(FilterConfig::default(), &[("chat", "contains darn then deny")]);
        let alice = ActorId::new("alice");
        let bob = ActorId::new("bob");
        host.grant("bob", BYPASS_CHAT);

        assert!(service.handle_chat(&alice, "darn").cancelled);
        assert!(!service.handle_chat(&bob, "darn").cancelled);

        service.set_global_mute(true);
        assert!(service.handle_chat(&alice, "hello").cancelled);
        assert_eq!(host.messages_to("alice").len(), 1);
        host.grant("alice", BYPASS_MUTE);
        assert!(!service.handle_chat(&alice, "hello").cancelled);
        service.set_global_mute(false);

        service.mute_list().insert_for(alice.clone(), "hush".into(), Duration::from_secs(60));
        assert!(service.handle_chat(&alice, "hello").cancelled);
        assert_eq!(host.messages_to("alice").last().map(String::as_str), Some("hush"));
    }

    #[test]
    fn mute_action_silences_following_lines() {
        let (service, _host, _dir) = service(FilterConfig::default(), &[("chat", "contains spam then mute 60 then deny")]);
        let alice = ActorId::new("alice");
        assert!(service.handle_chat(&alice, "spam spam").cancelled);
        assert!(service.handle_chat(&alice, "sorry").cancelled);
        assert!(!service.handle_chat(&ActorId::new("bob"), "hi").cancelled);
    }

    #[test]
    fn repeat_filter_blocks_duplicates_until_disconnect() {
        let mut config = FilterConfig::default();
        config.filter.spam_filter = true;
        let (service, _host, _dir) = service(config, &[]);
        let alice = ActorId::new("alice");

        assert!(!service.handle_chat(&alice, "hi").cancelled);
        assert!(service.handle_chat(&alice, "hi").cancelled);
        assert!(!service.handle_chat(&alice, "hi there").cancelled);

        service.actor_disconnected(&alice);
        assert!(!service.handle_chat(&alice, "hi there").cancelled);
    }

    #[test]
    fn oversized_cache_ttl_keeps_repeat_filter_working() {
        let mut config = FilterConfig::default();
        config.filter.spam_filter = true;
        config.cache.ttl = u64::MAX;
        let (service, _host, _dir) = service(config, &[]);
        let alice = ActorId::new("alice");

        assert!(!service.handle_chat(&alice, "hi").cancelled);
        assert!(service.handle_chat(&alice, "hi").cancelled);
    }

    #[test]
    fn oversized_mute_is_rejected_at_load() {
        let (service, _host, _dir) = service(FilterConfig::default(), &[]);
        let diagnostics = service.load_chain("chat", "contains spam then mute 18446744073709551615 then deny");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line(), 1);
        assert!(!service.handle_chat(&ActorId::new("alice"), "spam").cancelled);
    }

    #[test]
    fn decolor_strips_then_translates_rewrites() {
        let mut config = FilterConfig::default();
        config.filter.decolor = true;
        let (service, host, _dir) = service(config, &[("chat", "contains warn then rewrite \"&cwarn\"")]);
        let alice = ActorId::new("alice");

        let verdict = service.handle_chat(&alice, "&ahello");
        assert_eq!(verdict.text, "hello");
        assert!(verdict.changed);

        assert_eq!(service.handle_chat(&alice, "a warn").text, "a §cwarn");

        host.grant("bob", COLOR);
        let verdict = service.handle_chat(&ActorId::new("bob"), "&ahello");
        assert_eq!(verdict.text, "&ahello");
        assert!(!verdict.changed);
    }

    #[test]
    fn command_lists_and_command_as_chat() {
        let mut config = FilterConfig::default();
        config.filter.command_list = vec!["tell".into(), "me".into(), "spawn".into()];
        config.filter.command_blacklist = vec!["spawn".into()];
        config.filter.command_as_chat = vec!["me".into()];
        let (service, _host, _dir) = service(config, &[
            ("command", "matches \"^/tell \" then rewrite \"/msg \"\nmatch ^/spawn then deny\nmatch ^/home then deny"),
            ("chat", "contains darn then rewrite heck"),
        ]);
        let alice = ActorId::new("alice");

        assert_eq!(service.handle_command(&alice, "/tell bob hi").text, "/msg bob hi");
        assert!(!service.handle_command(&alice, "/home").cancelled, "not in command_list");
        assert!(!service.handle_command(&alice, "/spawn").cancelled, "blacklisted");
        assert_eq!(service.handle_command(&alice, "/me says darn").text, "/me says heck");
    }

    #[test]
    fn command_rewritten_to_nothing_is_cancelled() {
        let (service, _host, _dir) = service(FilterConfig::default(), &[("command", "match \"^/nuke.*\" then rewrite \"\"")]);
        let verdict = service.handle_command(&ActorId::new("alice"), "/nuke all");
        assert_eq!(verdict.text, "");
        assert!(verdict.cancelled);
    }

    #[test]
    fn sign_lines_are_split_and_truncated() {
        let (service, _host, _dir) = service(FilterConfig::default(), &[("sign", "contains darn then rewrite \"a very long replacement\"")]);
        let lines = vec!["hello".to_string(), "darn".to_string()];

        let verdict = service.handle_sign(&ActorId::new("alice"), &lines);
        assert!(verdict.changed);
        assert_eq!(verdict.lines, ["hello", "a very long rep", "", ""]);
    }

    #[test]
    fn cancelled_sign_breaks_with_notice() {
        let (service, host, _dir) = service(FilterConfig::default(), &[("sign", "contains darn then deny")]);
        let lines = vec!["darn".to_string()];

        let verdict = service.handle_sign(&ActorId::new("alice"), &lines);
        assert!(verdict.cancelled);
        assert_eq!(verdict.lines, ["darn", "", "", ""]);
        assert_eq!(host.messages_to("alice").len(), 1);
        assert_eq!(verdict.log, ["SIGN alice sign text: darn"]);
    }

    #[test]
    fn console_needs_its_switch() {
        let (service, _host, _dir) = service(FilterConfig::default(), &[("console", "match ^stop then deny")]);
        assert!(!service.handle_console("stop").cancelled);

        let mut config = FilterConfig::default();
        config.filter.console_filter = true;
        service.apply_config(config).unwrap();
        service.enable_clients();
        assert!(service.handle_console("stop").cancelled);
    }
}
