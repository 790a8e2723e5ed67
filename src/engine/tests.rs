use super::{ChainRegistry, RuleChain};
use crate::action::{ActionEnv, ActionRegistry, LoadEnv};
use crate::context::{ContextState, EvaluationContext};
use crate::error::{ActionError, CompileError};
use crate::host::testing::{HostEvent, RecordingHost};
use crate::ActorId;
use std::sync::Arc;

fn chain(source: &str) -> RuleChain {
    let compiled = RuleChain::compile("chat", source, &ActionRegistry::with_builtins(), &LoadEnv::default());
    assert!(compiled.diagnostics.is_empty(), "{:?}", compiled.diagnostics);
    compiled.chain
}

fn run(chain: &RuleChain, host: &RecordingHost, text: &str) -> EvaluationContext {
    let mut ctx = EvaluationContext::new(ActorId::new("alice"), text, "CHAT");
    chain.execute(&mut ctx, &ActionEnv::new(host));
    ctx
}

#[test]
fn empty_chain_is_identity() {
    let host = RecordingHost::new();
    let ctx = run(&RuleChain::empty("chat"), &host, "hello world");
    assert_eq!(ctx.current_text(), "hello world");
    assert!(!ctx.is_cancelled());
    assert!(ctx.log_entries().is_empty());
    assert_eq!(ctx.state(), ContextState::Finalized);
    assert!(host.events().is_empty());
}

#[test]
fn rules_run_in_declaration_order_on_current_text() {
    let chain = chain(
        "match cat then rewrite dog\n\
         match dog then rewrite wolf\n\
         match wolf then log saw %string%\n",
    );
    let host = RecordingHost::new();
    let ctx = run(&chain, &host, "my cat");
    assert_eq!(ctx.current_text(), "my wolf");
    assert_eq!(ctx.original_text(), "my cat");
    assert_eq!(ctx.log_entries(), ["saw wolf"]);
}

#[test]
fn rewrite_then_halt_is_idempotent() {
    let chain = chain("contains darn then rewrite heck then log \"fixed %string%\" then abort\n");
    let host = RecordingHost::new();

    let first = run(&chain, &host, "darn it, darn");
    assert_eq!(first.current_text(), "heck it, heck");
    assert!(first.is_halted());
    assert_eq!(first.log_entries().len(), 1);

    let mut second = EvaluationContext::new(ActorId::new("alice"), first.current_text(), "CHAT");
    let metrics = chain.execute_with_metrics(&mut second, &ActionEnv::new(&host));
    assert_eq!(metrics.rules_matched, 0);
    assert!(second.log_entries().is_empty());
    assert!(!second.text_changed());
    assert_eq!(second.current_text(), first.current_text());
}

#[test]
fn badword_is_cancelled_and_logged() {
    let chain = chain("contains \"badword\" then cancel then log \"blocked\"");
    let host = RecordingHost::new();
    let ctx = run(&chain, &host, "you BADWORD you");
    assert!(ctx.is_cancelled());
    assert_eq!(ctx.log_entries(), ["blocked"]);
    assert_eq!(ctx.current_text(), "you BADWORD you");
}

#[test]
fn tell_is_rewritten_to_msg() {
    let chain = chain("matches \"^/tell \" then rewrite \"/msg \"");
    let host = RecordingHost::new();
    let ctx = run(&chain, &host, "/tell bob hi");
    assert_eq!(ctx.current_text(), "/msg bob hi");
    assert!(ctx.text_changed());
}

#[test]
fn unknown_action_drops_only_its_rule() {
    let compiled = RuleChain::compile(
        "chat",
        "match a then log first\nmatch b then frobnicate x\nmatch c then log third\n",
        &ActionRegistry::with_builtins(),
        &LoadEnv::default(),
    );
    assert_eq!(compiled.chain.rule_count(), 2);
    assert_eq!(compiled.diagnostics.len(), 1);
    let diagnostic = &compiled.diagnostics[0];
    assert_eq!(diagnostic.line(), 2);
    assert!(matches!(
        diagnostic,
        CompileError::Action { error: ActionError::Unknown(e), .. } if e.keyword == "frobnicate"
    ));
}

#[test]
fn halt_finishes_current_rule_but_cancel_does_not_stop() {
    let cases: Vec<(&str, &str, bool, Vec<&str>)> = vec![
        // (rules, input, cancelled, log)
        ("match x then cancel then log one\nmatch x then log two", "x", true, vec!["one", "two"]),
        ("match x then abort then log one\nmatch x then log two", "x", false, vec!["one"]),
        ("match x then halt then cancel\nmatch x then log two", "x", true, vec![]),
        ("match y then abort\nmatch x then log two", "x", false, vec!["two"]),
    ];
    let host = RecordingHost::new();
    for (rules, input, cancelled, log) in cases {
        let ctx = run(&chain(rules), &host, input);
        assert_eq!(ctx.is_cancelled(), cancelled, "{rules}");
        assert_eq!(ctx.log_entries(), log.as_slice(), "{rules}");
    }
}

#[test]
fn negated_rule_matches_absence() {
    let chain = chain("not match ^/ then log plain [%string%]");
    let host = RecordingHost::new();
    assert_eq!(run(&chain, &host, "hi").log_entries(), ["plain []"]);
    assert!(run(&chain, &host, "/help").log_entries().is_empty());
}

#[test]
fn guards_filter_actors_and_events() {
    let chain = chain(
        "rule caps No shouting\n\
         match \"[A-Z]{5,}\"\n\
         ignore permission chatsieve.caps\n\
         events chat\n\
         then lower\n\
         then log %ruleid% %player%\n",
    );
    let host = RecordingHost::new();
    host.grant("bob", "chatsieve.caps");

    let alice = run(&chain, &host, "HELLO there");
    assert_eq!(alice.current_text(), "hello there");
    assert_eq!(alice.log_entries(), ["caps alice"]);

    let mut bob = EvaluationContext::new(ActorId::new("bob"), "HELLO there", "CHAT");
    chain.execute(&mut bob, &ActionEnv::new(&host));
    assert_eq!(bob.current_text(), "HELLO there");

    let mut sign = EvaluationContext::new(ActorId::new("alice"), "HELLO there", "SIGN");
    chain.execute(&mut sign, &ActionEnv::new(&host));
    assert_eq!(sign.current_text(), "HELLO there");
}

#[test]
fn effect_failures_are_logged_and_evaluation_continues() {
    let chain = chain("match pay then fine 5 then log after");
    let host = RecordingHost::with_balance(1.0);
    let ctx = run(&chain, &host, "pay me");
    assert!(!ctx.is_cancelled());
    assert_eq!(ctx.log_entries(), ["fine failed: insufficient funds", "after"]);
}

#[test]
fn metrics_track_matches() {
    let chain = chain("match a then log\nmatch zzz then log\nmatch b then respond hi then log");
    let host = RecordingHost::new();
    let mut ctx = EvaluationContext::new(ActorId::new("alice"), "a b", "CHAT");
    let metrics = chain.execute_with_metrics(&mut ctx, &ActionEnv::new(&host));
    assert_eq!(metrics.rules_evaluated, 3);
    assert_eq!(metrics.rules_matched, 2);
    assert_eq!(metrics.actions_executed, 3);
    assert_eq!(metrics.matched_lines, [1, 3]);
    assert_eq!(host.messages_to("alice"), ["hi"]);
}

#[test]
fn finalized_context_is_not_reevaluated() {
    let chain = chain("match a then log hit");
    let host = RecordingHost::new();
    let mut ctx = run(&chain, &host, "a");
    chain.execute(&mut ctx, &ActionEnv::new(&host));
    assert_eq!(ctx.log_entries(), ["hit"]);
}

#[test]
fn chains_evaluate_concurrently() {
    let registry = Arc::new(ChainRegistry::new());
    registry.publish(chain("match (\\d+) then rewrite \"<$1>\" then console say %player% %message%"));
    let host = Arc::new(RecordingHost::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let host = Arc::clone(&host);
            std::thread::spawn(move || {
                let chain = registry.get("chat").unwrap();
                let mut ctx = EvaluationContext::new(ActorId::new(format!("actor{i}")), format!("n {i}"), "CHAT");
                chain.execute(&mut ctx, &ActionEnv::new(host.as_ref()));
                ctx.current_text().to_string()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!("n <{i}>"));
    }
    let commands = host.events().into_iter().filter(|e| matches!(e, HostEvent::Command { .. })).count();
    assert_eq!(commands, 8);
}
