mod debug_report;

use chatsieve::{
    ActionEnv, ActionRegistry, ActorId, EffectFailure, EvaluationContext, FilterConfig, Host, ListenerKind, LoadEnv,
    MuteList, PointManager, RuleChain,
};
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const DEFAULT_ACTOR: &str = "player";

fn main() {
    init_tracing();

    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(&config) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr so the report on stdout stays clean.
/// `RUST_LOG` overrides the default `warn` filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer().with_writer(io::stderr));
    if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: tracing already initialized: {error}");
    }
}

fn run(cli: &CliConfig) -> Result<(), String> {
    let source =
        std::fs::read_to_string(&cli.rules).map_err(|err| format!("failed to read {}: {err}", cli.rules.display()))?;
    let config = match &cli.config {
        Some(path) => FilterConfig::from_file(path).map_err(|err| err.to_string())?,
        None => FilterConfig::default(),
    };

    let base = cli.rules.parent().unwrap_or(Path::new("."));
    let load_env = LoadEnv { text_dir: Some(base.join(&config.folders.text)), messages: config.messages.clone() };
    let registry = ActionRegistry::with_builtins();
    let compiled = RuleChain::compile(cli.event.chain_name(), &source, &registry, &load_env);

    let host = Arc::new(ConsoleHost::default());
    let mutes = Arc::new(MuteList::default());
    let points = PointManager::manual(config.points.leak.points, host.clone(), mutes.clone());
    for (name, threshold) in &config.points.thresholds {
        let build = |lines: &[String]| -> Result<Vec<_>, String> {
            lines.iter().map(|line| registry.construct_line(line, &load_env).map_err(|err| format!("threshold {name}: {err}"))).collect()
        };
        points.add_threshold(name.as_str(), threshold.points, build(&threshold.actions.ascending)?, build(&threshold.actions.descending)?);
    }

    let actor = if cli.event == ListenerKind::Console { ActorId::console() } else { ActorId::new(cli.actor.as_str()) };
    let env = ActionEnv::new(host.as_ref()).with_points(&points).with_mutes(&mutes);
    let mut ctx = EvaluationContext::new(actor.clone(), cli.input.as_str(), cli.event.short_name());
    let metrics = compiled.chain.execute_with_metrics(&mut ctx, &env);

    let report = debug_report::Report {
        rules_path: &cli.rules,
        compiled: &compiled,
        ctx: &ctx,
        metrics: &metrics,
        effects: host.effects(),
        score: points.current_score(&actor),
    };
    debug_report::print_run(&report, cli.color);
    Ok(())
}

// --- Host ----------------------------------------------------------------------

/// Host that performs nothing and remembers what it was asked to do.
#[derive(Debug, Default)]
struct ConsoleHost {
    effects: Mutex<Vec<String>>,
}

impl ConsoleHost {
    fn record(&self, effect: String) {
        self.effects.lock().unwrap_or_else(PoisonError::into_inner).push(effect);
    }

    fn effects(&self) -> Vec<String> {
        self.effects.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Host for ConsoleHost {
    fn send_message(&self, actor: &ActorId, text: &str) {
        self.record(format!("message → {actor}: {text}"));
    }

    fn broadcast(&self, lines: &[String]) {
        self.record(format!("broadcast: {}", lines.join(" / ")));
    }

    fn kick(&self, actor: &ActorId, reason: &str) -> Result<(), EffectFailure> {
        self.record(format!("kick {actor}: {reason}"));
        Ok(())
    }

    fn execute_command(&self, actor: Option<&ActorId>, command_line: &str) -> Result<(), EffectFailure> {
        let runner = actor.map_or_else(|| "console".to_string(), ActorId::to_string);
        self.record(format!("command as {runner}: /{command_line}"));
        Ok(())
    }

    fn withdraw_currency(&self, actor: &ActorId, amount: f64) -> Result<(), EffectFailure> {
        self.record(format!("withdraw {amount:.2} from {actor}"));
        Ok(())
    }

    fn actor_world_name(&self, _actor: &ActorId) -> String {
        "world".to_string()
    }

    fn actor_has_permission(&self, _actor: &ActorId, _permission: &str) -> bool {
        false
    }

    fn notify(&self, permission: &str, text: &str) -> Result<(), EffectFailure> {
        self.record(format!("notify [{permission}]: {text}"));
        Ok(())
    }

    fn kill(&self, actor: &ActorId, death_message: &str) -> Result<(), EffectFailure> {
        self.record(format!("kill {actor}: {death_message}"));
        Ok(())
    }

    fn burn(&self, actor: &ActorId, duration: Duration) -> Result<(), EffectFailure> {
        self.record(format!("burn {actor} for {}s", duration.as_secs()));
        Ok(())
    }
}

// --- Arguments -----------------------------------------------------------------

struct CliConfig {
    rules: PathBuf,
    config: Option<PathBuf>,
    actor: String,
    event: ListenerKind,
    input: String,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut rules: Option<PathBuf> = None;
    let mut config: Option<PathBuf> = None;
    let mut actor = DEFAULT_ACTOR.to_string();
    let mut event = ListenerKind::Chat;
    let mut input: Option<String> = None;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("chatsieve {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--rules" | "-r" => rules = Some(PathBuf::from(expect_value(&mut args, "--rules")?)),
            "--config" | "-c" => config = Some(PathBuf::from(expect_value(&mut args, "--config")?)),
            "--actor" | "-a" => actor = expect_value(&mut args, "--actor")?,
            "--event" | "-e" => event = parse_event(&expect_value(&mut args, "--event")?)?,
            "--input" | "-i" => set_input(&mut input, expect_value(&mut args, "--input")?)?,
            "--" => {
                let rest = args.collect::<Vec<_>>().join(" ");
                if !rest.trim().is_empty() {
                    set_input(&mut input, rest)?;
                }
                break;
            }
            _ if arg.starts_with("--rules=") => rules = Some(PathBuf::from(arg.trim_start_matches("--rules="))),
            _ if arg.starts_with("--config=") => config = Some(PathBuf::from(arg.trim_start_matches("--config="))),
            _ if arg.starts_with("--actor=") => actor = arg.trim_start_matches("--actor=").to_string(),
            _ if arg.starts_with("--event=") => event = parse_event(arg.trim_start_matches("--event="))?,
            _ if arg.starts_with("--input=") => set_input(&mut input, arg.trim_start_matches("--input=").to_string())?,
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                let rest = std::iter::once(arg).chain(args).collect::<Vec<_>>().join(" ");
                set_input(&mut input, rest)?;
                break;
            }
        }
    }

    let rules = rules.ok_or_else(|| format!("error: --rules is required\n\n{}", help_text()))?;
    let input = match input {
        Some(value) => value,
        None => read_stdin_input()?,
    };
    let input = input.trim_end_matches(['\r', '\n']).to_string();

    if input.trim().is_empty() {
        return Err(format!("error: no input provided\n\n{}", help_text()));
    }

    Ok(CliConfig { rules, config, actor, event, input, color })
}

fn expect_value(args: &mut impl Iterator<Item = String>, option: &str) -> Result<String, String> {
    args.next().ok_or_else(|| format!("error: {option} expects a value"))
}

fn set_input(input: &mut Option<String>, value: String) -> Result<(), String> {
    if input.is_some() {
        return Err("error: input provided multiple times".to_string());
    }
    *input = Some(value);
    Ok(())
}

fn parse_event(value: &str) -> Result<ListenerKind, String> {
    ListenerKind::from_name(value)
        .ok_or_else(|| format!("error: invalid --event '{value}' (expected chat, command, sign or console)"))
}

fn read_stdin_input() -> Result<String, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    Ok(buffer)
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "chatsieve {version}

Run a line of text through a rule file and report what happened.

Usage:
  chatsieve --rules <file> [OPTIONS] [--] <input...>
  chatsieve --rules <file> [OPTIONS] --input <text>

Options:
  -r, --rules <file>         Rule file to compile.
  -c, --config <file>        TOML configuration (messages, points, folders).
  -a, --actor <name>         Actor producing the text. Default: {default_actor}
  -e, --event <kind>         chat, command, sign or console. Default: chat
  -i, --input <text>         Input text. If omitted, reads remaining args
                             or stdin when no args are provided.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Environment:
  RUST_LOG                   Log filter for stderr, e.g. chatsieve=debug.

Exit codes:
  0  Success.
  1  Rule file, configuration or threshold error.
  2  Invalid arguments or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
        default_actor = DEFAULT_ACTOR
    )
}
