use chatsieve::{ChainMetrics, Compiled, EvaluationContext, Rule};
use std::path::Path;

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub struct Report<'a> {
    pub rules_path: &'a Path,
    pub compiled: &'a Compiled,
    pub ctx: &'a EvaluationContext,
    pub metrics: &'a ChainMetrics,
    pub effects: Vec<String>,
    pub score: f64,
}

pub fn print_run(report: &Report<'_>, color: bool) {
    let palette = ansi::Palette::new(color);
    let ctx = report.ctx;
    println!(
        "\n{}",
        palette.bold(palette.paint(format!("⚙  {} {}: \"{}\"", ctx.listener(), ctx.actor(), ctx.original_text()), ansi::CYAN))
    );

    println!("\n{}", palette.paint("━━━ Chain ━━━", ansi::GRAY));
    print_chain(report, &palette);

    println!("\n{}", palette.paint("━━━ Matches ━━━", ansi::GRAY));
    if report.metrics.matched_lines.is_empty() {
        println!("{}", palette.dim("  No rule matched"));
    } else {
        for line in &report.metrics.matched_lines {
            match report.compiled.chain.rules().iter().find(|rule| rule.source_line() == *line) {
                Some(rule) => print_rule(rule, &palette),
                None => println!("  {}", palette.paint(format!("line {line}"), ansi::YELLOW)),
            }
        }
    }

    if !report.effects.is_empty() {
        println!("\n{}", palette.paint("━━━ Effects ━━━", ansi::GRAY));
        for effect in &report.effects {
            println!("  {} {}", palette.paint("•", ansi::BLUE), effect);
        }
    }

    if !ctx.log_entries().is_empty() {
        println!("\n{}", palette.paint("━━━ Log ━━━", ansi::GRAY));
        for entry in ctx.log_entries() {
            println!("  {}", palette.dim(entry));
        }
    }

    println!("\n{}", palette.paint("━━━ Result ━━━", ansi::GRAY));
    print_result(report, &palette);

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Total: {}  │  Evaluated: {}  │  Matched: {}  │  Actions: {}",
        palette.paint(format!("{:?}", report.metrics.total), ansi::GREEN),
        palette.paint(report.metrics.rules_evaluated.to_string(), ansi::CYAN),
        palette.paint(report.metrics.rules_matched.to_string(), ansi::CYAN),
        palette.dim(report.metrics.actions_executed.to_string()),
    );
    println!();
}

fn print_chain(report: &Report<'_>, palette: &ansi::Palette) {
    println!(
        "  {} {}  {} {}",
        palette.paint(report.compiled.chain.name(), ansi::BLUE),
        palette.dim(format!("({})", report.rules_path.display())),
        palette.dim("rules:"),
        palette.paint(report.compiled.chain.rule_count().to_string(), ansi::YELLOW)
    );
    for diagnostic in &report.compiled.diagnostics {
        println!("  {} {}", palette.paint("✗", ansi::RED), palette.paint(diagnostic.to_string(), ansi::YELLOW));
    }
}

fn print_rule(rule: &Rule, palette: &ansi::Palette) {
    let keywords = rule.actions().iter().map(|action| action.keyword()).collect::<Vec<_>>().join(", ");
    println!(
        "  {} {} {} {}",
        palette.paint(format!("[line {}]", rule.source_line()), ansi::GRAY),
        palette.bold(palette.paint(rule.condition().source(), ansi::GREEN)),
        palette.dim("│"),
        palette.paint(keywords, ansi::CYAN),
    );
    if let Some(label) = rule.label() {
        println!("      {} {}  {}", palette.dim("id:"), palette.paint(&label.id, ansi::BLUE), palette.dim(&label.description));
    }
}

fn print_result(report: &Report<'_>, palette: &ansi::Palette) {
    let ctx = report.ctx;
    let text = if ctx.text_changed() { palette.paint(ctx.current_text(), ansi::GREEN) } else { palette.dim(ctx.current_text()) };
    println!("  {} {}", palette.dim("text:"), text);

    let flag = |set: bool, label: &str| if set { palette.paint(label, ansi::RED) } else { palette.dim(format!("not {label}")) };
    println!("  {}  │  {}", flag(ctx.is_cancelled(), "cancelled"), flag(ctx.is_halted(), "halted"));

    if report.metrics.failures > 0 {
        println!("  {}", palette.paint(format!("{} action(s) failed", report.metrics.failures), ansi::YELLOW));
    }
    if report.score > 0.0 {
        println!("  {} {}", palette.dim("points:"), palette.paint(format!("{:.2}", report.score), ansi::YELLOW));
    }
}
