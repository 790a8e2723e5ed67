use crate::action::{Action, ActionEnv, ActionRegistry, LoadEnv};
use crate::cache::{MuteList, TtlCache};
use crate::config::{DEFAULT_CONFIG_FILE, FilterConfig, LogLevel};
use crate::context::EvaluationContext;
use crate::engine::{ChainMetrics, ChainRegistry, RuleChain};
use crate::error::{CompileError, ConfigError};
use crate::host::Host;
use crate::points::PointManager;
use crate::{ActorId, ListenerKind};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Last text seen per actor and category, for the repeat filter.
pub(crate) type LastMessages = TtlCache<(ActorId, ListenerKind), String>;

/// Outcome of running one piece of text through a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// Text after every rewrite.
    pub text: String,
    /// Whether `text` differs from what was submitted.
    pub changed: bool,
    pub cancelled: bool,
    /// Whether a rule stopped evaluation early.
    pub halted: bool,
    /// Entries added by `log` and other actions.
    pub log: Vec<String>,
}

impl Verdict {
    /// Pass-through verdict for text no chain looked at.
    pub fn unchanged(text: &str) -> Self {
        Verdict { text: text.to_string(), changed: false, cancelled: false, halted: false, log: Vec::new() }
    }

    pub(crate) fn blocked(text: &str) -> Self {
        Verdict { cancelled: true, ..Self::unchanged(text) }
    }

    fn from_context(ctx: EvaluationContext) -> Self {
        Verdict {
            changed: ctx.text_changed(),
            cancelled: ctx.is_cancelled(),
            halted: ctx.is_halted(),
            text: ctx.current_text().to_string(),
            log: ctx.log_entries().to_vec(),
        }
    }
}

/// Result from [`FilterService::evaluate_verbose`].
#[derive(Debug, Clone)]
pub struct VerboseVerdict {
    pub verdict: Verdict,
    /// Name of the chain that ran, if one was loaded for the category.
    pub chain: Option<String>,
    pub rule_count: usize,
    pub metrics: ChainMetrics,
}

/// The filter as one owned service: chains, actions, points, mutes and the
/// per-category switches.
///
/// # Example
/// ```
/// use chatsieve::{ActorId, EffectFailure, FilterConfig, FilterService, Host, ListenerKind};
/// use std::sync::Arc;
///
/// struct Quiet;
///
/// impl Host for Quiet {
///     fn send_message(&self, _: &ActorId, _: &str) {}
///     fn broadcast(&self, _: &[String]) {}
///     fn kick(&self, _: &ActorId, _: &str) -> Result<(), EffectFailure> { Ok(()) }
///     fn execute_command(&self, _: Option<&ActorId>, _: &str) -> Result<(), EffectFailure> { Ok(()) }
///     fn withdraw_currency(&self, _: &ActorId, _: f64) -> Result<(), EffectFailure> { Ok(()) }
///     fn actor_world_name(&self, _: &ActorId) -> String { "world".into() }
///     fn actor_has_permission(&self, _: &ActorId, _: &str) -> bool { false }
/// }
///
/// let base = std::env::temp_dir().join("chatsieve-doc");
/// let service = FilterService::new(Arc::new(Quiet), &base, FilterConfig::default())?;
/// service.load_chain("chat", "contains darn then rewrite \"d**n\"");
///
/// let verdict = service.evaluate(ListenerKind::Chat, &ActorId::new("alice"), "darn it");
/// assert_eq!(verdict.text, "d**n it");
/// # Ok::<(), chatsieve::ConfigError>(())
/// ```
pub struct FilterService {
    pub(crate) host: Arc<dyn Host>,
    base_dir: PathBuf,
    pub(crate) config: RwLock<FilterConfig>,
    load_env: RwLock<LoadEnv>,
    actions: ActionRegistry,
    chains: ChainRegistry,
    points: RwLock<Option<Arc<PointManager>>>,
    pub(crate) mutes: Arc<MuteList>,
    last_messages: RwLock<Arc<LastMessages>>,
    global_mute: AtomicBool,
    enabled: [AtomicBool; 4],
}

impl FilterService {
    /// Build a service with the built-in actions, load the rule folder and
    /// enable the configured front ends.
    pub fn new(host: Arc<dyn Host>, base_dir: impl AsRef<Path>, config: FilterConfig) -> Result<Self, ConfigError> {
        Self::with_registry(host, base_dir, config, ActionRegistry::with_builtins())
    }

    /// Like [`new`](Self::new), with a registry that may hold custom actions.
    pub fn with_registry(
        host: Arc<dyn Host>,
        base_dir: impl AsRef<Path>,
        config: FilterConfig,
        actions: ActionRegistry,
    ) -> Result<Self, ConfigError> {
        let service = FilterService {
            host,
            base_dir: base_dir.as_ref().to_path_buf(),
            config: RwLock::new(FilterConfig::default()),
            load_env: RwLock::new(LoadEnv::default()),
            actions,
            chains: ChainRegistry::new(),
            points: RwLock::new(None),
            mutes: Arc::new(MuteList::default()),
            last_messages: RwLock::new(Arc::new(LastMessages::default())),
            global_mute: AtomicBool::new(false),
            enabled: Default::default(),
        };
        service.apply_config(config)?;
        service.load_rules_dir()?;
        service.enable_clients();
        Ok(service)
    }

    // --- Configuration ----------------------------------------------------------

    /// Install `config`: resolve folders, rebuild caches and restart the
    /// point system. Chains already loaded are kept.
    pub fn apply_config(&self, config: FilterConfig) -> Result<(), ConfigError> {
        config.folders.rules_dir(&self.base_dir)?;
        let text_dir = config.folders.text_dir(&self.base_dir)?;
        let load_env = LoadEnv { text_dir: Some(text_dir), messages: config.messages.clone() };

        let cache = LastMessages::new(config.cache.capacity, config.cache.ttl());
        *self.last_messages.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(cache);

        self.stop_points();
        if config.points.enabled {
            let points = PointManager::setup(
                config.points.leak.points,
                config.points.leak.interval,
                Arc::clone(&self.host),
                Arc::clone(&self.mutes),
            );
            for (name, threshold) in &config.points.thresholds {
                let ascending = self.threshold_actions(name, &threshold.actions.ascending, &load_env);
                let descending = self.threshold_actions(name, &threshold.actions.descending, &load_env);
                points.add_threshold(name.as_str(), threshold.points, ascending, descending);
            }
            *self.points.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(points));
        }

        *self.load_env.write().unwrap_or_else(PoisonError::into_inner) = load_env;
        tracing::info!(points = config.points.enabled, level = ?config.logging.level, "configuration applied");
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }

    fn threshold_actions(&self, threshold: &str, lines: &[String], env: &LoadEnv) -> Vec<Action> {
        lines
            .iter()
            .filter_map(|line| match self.actions.construct_line(line, env) {
                Ok(action) => Some(action),
                Err(error) => {
                    tracing::warn!(threshold, %error, "skipping threshold action");
                    None
                }
            })
            .collect()
    }

    pub fn config(&self) -> FilterConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    pub fn points(&self) -> Option<Arc<PointManager>> {
        self.points.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn mute_list(&self) -> &MuteList {
        &self.mutes
    }

    pub(crate) fn last_messages(&self) -> Arc<LastMessages> {
        Arc::clone(&self.last_messages.read().unwrap_or_else(PoisonError::into_inner))
    }

    // --- Rule loading -----------------------------------------------------------

    /// Compile `source` and publish it as chain `name`, returning the
    /// diagnostics for rules that were dropped.
    pub fn load_chain(&self, name: &str, source: &str) -> Vec<CompileError> {
        let env = self.load_env.read().unwrap_or_else(PoisonError::into_inner).clone();
        let compiled = RuleChain::compile(name, source, &self.actions, &env);
        tracing::info!(chain = name, rules = compiled.chain.rule_count(), errors = compiled.diagnostics.len(), "loaded chain");
        self.chains.publish(compiled.chain);
        compiled.diagnostics
    }

    /// Load one rule file as the chain named after its file stem.
    pub fn load_chain_file(&self, path: impl AsRef<Path>) -> Result<(String, Vec<CompileError>), ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|error| ConfigError::Io { path: path.to_path_buf(), error })?;
        let name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let diagnostics = self.load_chain(&name, &source);
        Ok((name, diagnostics))
    }

    /// Load every `*.txt` in the rules folder and drop chains with no file.
    pub fn load_rules_dir(&self) -> Result<BTreeMap<String, Vec<CompileError>>, ConfigError> {
        let dir = self.config.read().unwrap_or_else(PoisonError::into_inner).folders.rules_dir(&self.base_dir)?;
        let entries = fs::read_dir(&dir).map_err(|error| ConfigError::Directory { path: dir.clone(), error })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt")))
            .collect();
        files.sort();

        let mut loaded = BTreeMap::new();
        for path in files {
            match self.load_chain_file(&path) {
                Ok((name, diagnostics)) => {
                    loaded.insert(name, diagnostics);
                }
                Err(error) => tracing::warn!(%error, "skipping rule file"),
            }
        }
        for stale in self.chains.retain(|name| loaded.contains_key(name)) {
            tracing::info!(chain = %stale, "removed chain with no rule file");
        }
        Ok(loaded)
    }

    // --- Evaluation -------------------------------------------------------------

    /// Run `text` through the chain for `kind`. Front-end switches, bypass
    /// permissions and mutes are not consulted here; see the `handle_*`
    /// methods for that.
    pub fn evaluate(&self, kind: ListenerKind, actor: &ActorId, text: &str) -> Verdict {
        self.evaluate_verbose(kind, actor, text).verdict
    }

    pub fn evaluate_verbose(&self, kind: ListenerKind, actor: &ActorId, text: &str) -> VerboseVerdict {
        let Some(chain) = self.chains.get(kind.chain_name()) else {
            return VerboseVerdict {
                verdict: Verdict::unchanged(text),
                chain: None,
                rule_count: 0,
                metrics: ChainMetrics::default(),
            };
        };

        let points = self.points();
        let mut env = ActionEnv::new(self.host.as_ref()).with_mutes(&self.mutes);
        if let Some(points) = points.as_deref() {
            env = env.with_points(points);
        }

        let mut ctx = EvaluationContext::new(actor.clone(), text, kind.short_name());
        let metrics = chain.execute_with_metrics(&mut ctx, &env);

        let level = self.config.read().unwrap_or_else(PoisonError::into_inner).logging.level;
        for entry in ctx.log_entries() {
            emit_rule_log(level, kind.short_name(), entry);
        }

        VerboseVerdict {
            verdict: Verdict::from_context(ctx),
            chain: Some(chain.name().to_string()),
            rule_count: chain.rule_count(),
            metrics,
        }
    }

    // --- Lifecycle ----------------------------------------------------------------

    /// Turn on the front ends the configuration asks for. Chat is always on.
    pub fn enable_clients(&self) {
        let options = self.config.read().unwrap_or_else(PoisonError::into_inner).filter.clone();
        for kind in ListenerKind::ALL {
            let on = match kind {
                ListenerKind::Chat => true,
                ListenerKind::Command => options.command_filter,
                ListenerKind::Sign => options.sign_filter,
                ListenerKind::Console => options.console_filter,
            };
            self.enabled[kind.index()].store(on, Ordering::Release);
            tracing::debug!(listener = kind.short_name(), enabled = on, "client state");
        }
    }

    pub fn disable_clients(&self) {
        for flag in &self.enabled {
            flag.store(false, Ordering::Release);
        }
        tracing::debug!("clients disabled");
    }

    pub fn is_enabled(&self, kind: ListenerKind) -> bool {
        self.enabled[kind.index()].load(Ordering::Acquire)
    }

    /// Disable, re-read the configuration file, reload the rule folder and
    /// enable again. On error the front ends stay disabled.
    pub fn reload(&self) -> Result<(), ConfigError> {
        self.disable_clients();
        let config = FilterConfig::load_or_default(self.base_dir.join(DEFAULT_CONFIG_FILE));
        self.apply_config(config)?;
        let loaded = self.load_rules_dir()?;
        self.enable_clients();
        tracing::info!(chains = loaded.len(), "reloaded");
        Ok(())
    }

    /// Stop the point worker, drop transient state and disable every front end.
    pub fn shutdown(&self) {
        self.disable_clients();
        self.stop_points();
        self.mutes.clear();
        self.last_messages().clear();
        tracing::info!("filter shut down");
    }

    fn stop_points(&self) {
        let previous = self.points.write().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(points) = previous {
            points.shutdown();
        }
    }

    pub fn set_global_mute(&self, muted: bool) {
        self.global_mute.store(muted, Ordering::Release);
        tracing::info!(muted, "global mute");
    }

    /// Flip the global mute, returning the new state.
    pub fn toggle_global_mute(&self) -> bool {
        let muted = !self.global_mute.fetch_xor(true, Ordering::AcqRel);
        tracing::info!(muted, "global mute");
        muted
    }

    pub fn is_globally_muted(&self) -> bool {
        self.global_mute.load(Ordering::Acquire)
    }

    /// Scroll every client's chat window clear with a run of blank lines.
    pub fn clear_chat(&self, by: &str) {
        tracing::info!(by, "chat screen cleared");
        self.host.broadcast(&vec![String::new(); CLEAR_CHAT_LINES]);
    }

    /// Forget repeat-filter state for an actor who left. Mutes outlive the
    /// session and expire on their own.
    pub fn actor_disconnected(&self, actor: &ActorId) {
        let cache = self.last_messages();
        for kind in ListenerKind::ALL {
            cache.remove(&(actor.clone(), kind));
        }
    }
}

impl std::fmt::Debug for FilterService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterService")
            .field("base_dir", &self.base_dir)
            .field("chains", &self.chains.names())
            .field("points", &self.points().is_some())
            .field("global_mute", &self.is_globally_muted())
            .finish()
    }
}

const CLEAR_CHAT_LINES: usize = 120;

fn emit_rule_log(level: LogLevel, listener: &str, entry: &str) {
    match level {
        LogLevel::Trace => tracing::trace!(target: "chatsieve::rules", listener, "{entry}"),
        LogLevel::Debug => tracing::debug!(target: "chatsieve::rules", listener, "{entry}"),
        LogLevel::Info => tracing::info!(target: "chatsieve::rules", listener, "{entry}"),
        LogLevel::Warn => tracing::warn!(target: "chatsieve::rules", listener, "{entry}"),
        LogLevel::Error => tracing::error!(target: "chatsieve::rules", listener, "{entry}"),
    }
}
