//! Duet entrypoint: wires the button poll thread, the command channel, the
//! vote worker, and the window into the single-threaded dispatcher loop.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use core_actions::{ControlAction, DispatchContext, DispatchResult, dispatch, translate};
use core_config::{Config, GalleryMode, load_from};
use core_events::{
    COMMANDS_DROPPED_FULL, COMMANDS_ENQUEUED, Command, CommandReceiver, CommandSender,
    PRESSES_ACCEPTED, PRESSES_DEBOUNCED, READ_FAILURES, ShutdownFlag, Side, VOTES_ENQUEUED,
    VOTES_FAILED, command_channel,
};
use core_gallery::{Gallery, Item, ItemId, NavMode, VoteSink};
use core_input::{PollSettings, SysfsButtonSource, spawn_button_poll};
use core_remote::{HttpCoordinator, RemoteCoordinator, RemoteSettings, spawn_vote_worker};
use core_render::{AssetCache, compose_empty, compose_pair, compose_single, warm_paths};
use core_store::AssetStore;
use core_surface::{DisplaySurface, KioskWindow, SurfaceSettings};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Once};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// Sleep between dispatcher iterations; keeps the foreground loop polite
/// without adding perceptible input latency.
const LOOP_SLEEP: Duration = Duration::from_millis(1);

/// Upper bound on waiting for a background task at shutdown. A task that
/// is still mid-request after this is detached, not awaited.
const JOIN_WAIT: Duration = Duration::from_millis(500);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "duet", version, about = "Two-button image pair kiosk")]
struct Args {
    /// Configuration file path (overrides discovery of `duet.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Asset directory (overrides the configured store location).
    #[arg(long = "assets")]
    assets: Option<PathBuf>,
    /// Skip server sync and voting; run purely from local assets.
    #[arg(long)]
    offline: bool,
    /// Start windowed even when the config asks for fullscreen.
    #[arg(long)]
    windowed: bool,
    /// Navigation mode override.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Sequential,
    RandomNoRepeat,
}

fn resolve_mode(override_mode: Option<ModeArg>, file_mode: GalleryMode) -> NavMode {
    match override_mode {
        Some(ModeArg::Sequential) => NavMode::Sequential,
        Some(ModeArg::RandomNoRepeat) => NavMode::RandomNoRepeat,
        None => match file_mode {
            GalleryMode::Sequential => NavMode::Sequential,
            GalleryMode::RandomNoRepeat => NavMode::RandomNoRepeat,
        },
    }
}

/// Physical button wiring per mode. The slideshow navigates with the
/// buttons; the pair kiosk votes with them.
fn button_bindings(mode: NavMode) -> [Command; 2] {
    match mode {
        NavMode::Sequential => [Command::Next, Command::Previous],
        NavMode::RandomNoRepeat => [
            Command::VoteAndAdvance(Side::Right),
            Command::VoteAndAdvance(Side::Left),
        ],
    }
}

fn base_title(mode: NavMode) -> &'static str {
    match mode {
        NavMode::Sequential => "Image Viewer",
        NavMode::RandomNoRepeat => "Image Pair Viewer",
    }
}

/// Title line for the current gallery state. The slideshow shows its
/// position; the pair kiosk shows the active id alone.
fn window_title(gallery: &Gallery) -> String {
    let base = base_title(gallery.mode());
    match (gallery.current(), gallery.cursor()) {
        (Some(item), Some(index)) => match gallery.mode() {
            NavMode::Sequential => {
                format!("{base} | {}/{} | {}", index + 1, gallery.len(), item.id())
            }
            NavMode::RandomNoRepeat => format!("{base} | {}", item.id()),
        },
        _ => base.to_string(),
    }
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

/// Everything startup resolves before the runtime exists.
struct Bootstrap {
    config: Config,
    mode: NavMode,
    assets_dir: PathBuf,
    api_key: Option<String>,
    window: KioskWindow,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn run(&mut self, args: &Args) -> Result<Bootstrap> {
        self.configure_logging()?;
        Self::install_panic_hook();

        info!(target: "runtime", "startup");

        let config = load_from(args.config.clone())?;
        let mode = resolve_mode(args.mode, config.file.gallery.mode);
        let assets_dir = args
            .assets
            .clone()
            .unwrap_or_else(|| config.file.store.assets_dir.clone());
        let fullscreen = config.file.display.fullscreen && !args.windowed;

        let api_key = if args.offline {
            info!(target: "runtime.startup", "remote_disabled_offline_flag");
            None
        } else {
            let key = config.api_key();
            if key.is_none() {
                warn!(target: "runtime.startup", "api_key_missing_remote_disabled");
            }
            key
        };

        // Display init is the only fatal startup path.
        let window = KioskWindow::open(&SurfaceSettings {
            title: base_title(mode).to_string(),
            fullscreen,
            width: config.file.display.window_width,
            height: config.file.display.window_height,
        })?;

        let config_source = config
            .source
            .as_ref()
            .map(|path| path.display().to_string());
        info!(
            target: "runtime.startup",
            config_source = config_source.as_deref(),
            mode = ?mode,
            fullscreen,
            assets_dir = %assets_dir.display(),
            remote_enabled = api_key.is_some(),
            "bootstrap_complete"
        );

        Ok(Bootstrap {
            config,
            mode,
            assets_dir,
            api_key,
            window,
        })
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("duet.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "duet.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global tracing subscriber already installed; drop guard so writer shuts down.
            }
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

/// Sink used when the server is unreachable by choice: offline flag or no
/// API key. Votes are acknowledged in the log and go nowhere.
struct DisabledVotes;

impl VoteSink for DisabledVotes {
    fn record_vote(&self, id: &ItemId, option: u8) {
        debug!(target: "remote.vote", id = %id, option, "vote_skipped_remote_disabled");
    }
}

fn build_remote(bootstrap: &Bootstrap) -> Option<Arc<dyn RemoteCoordinator>> {
    let api_key = bootstrap.api_key.clone()?;
    let settings = RemoteSettings {
        server_url: bootstrap.config.file.remote.server_url.clone(),
        asset_base_url: bootstrap.config.file.remote.asset_base_url.clone(),
        api_key,
    };
    match HttpCoordinator::new(settings) {
        Ok(http) => Some(Arc::new(http)),
        Err(error) => {
            warn!(target: "remote.http", error = %error, "http_client_init_failed");
            None
        }
    }
}

/// Reconciles the store against the server id list. Every failure inside
/// is logged and absorbed; a sync that goes wrong leaves the local assets
/// as they were.
fn sync_store(store: &AssetStore, remote: &dyn RemoteCoordinator) {
    if let Err(error) = store.ensure_root() {
        warn!(target: "store.sync", error = %error, "assets_dir_create_failed");
        return;
    }
    let ids = match remote.list_known_ids() {
        Ok(ids) => ids,
        Err(error) => {
            warn!(target: "store.sync", error = %error, "id_list_fetch_failed");
            return;
        }
    };
    let plan = store.plan_reconcile(&ids);
    if plan.is_empty() {
        return;
    }
    store.apply_reconcile(&plan, |id, slot| remote.fetch_asset(id, slot));
}

fn scan_collection(store: &AssetStore, mode: NavMode) -> Vec<Item> {
    match mode {
        NavMode::Sequential => store.scan_singles(),
        NavMode::RandomNoRepeat => store.load_pairs(&mut rand::thread_rng()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownReason {
    CommandQuit,
    ShutdownFlag,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::CommandQuit => "command_quit",
            ShutdownReason::ShutdownFlag => "shutdown_flag",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

/// Joins a background task, waiting at most [`JOIN_WAIT`]. A task that
/// does not finish in time is detached and reported.
fn join_task(task: JoinHandle<()>, name: &'static str, reason: ShutdownReason) {
    let deadline = Instant::now() + JOIN_WAIT;
    while !task.is_finished() {
        if Instant::now() >= deadline {
            warn!(
                target: "runtime.shutdown",
                task = name,
                reason = reason.as_str(),
                "task_join_timeout"
            );
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    match task.join() {
        Ok(()) => trace!(
            target: "runtime.shutdown",
            task = name,
            reason = reason.as_str(),
            "task_joined"
        ),
        Err(_) => error!(
            target: "runtime.shutdown",
            task = name,
            reason = reason.as_str(),
            "task_panicked"
        ),
    }
}

/// Parts the runtime is assembled from, built in `main` (or a test).
struct RuntimeContext<S: DisplaySurface> {
    surface: S,
    gallery: Gallery,
    store: AssetStore,
    rng: StdRng,
    mode: NavMode,
    settle_delay: Duration,
    sender: CommandSender,
    receiver: CommandReceiver,
    shutdown: ShutdownFlag,
    votes: Box<dyn VoteSink>,
    remote: Option<Arc<dyn RemoteCoordinator>>,
    poll_task: Option<JoinHandle<()>>,
    vote_worker: Option<JoinHandle<()>>,
}

struct KioskRuntime<S: DisplaySurface> {
    surface: S,
    gallery: Gallery,
    store: AssetStore,
    cache: AssetCache,
    rng: StdRng,
    mode: NavMode,
    settle_delay: Duration,
    sender: Option<CommandSender>,
    receiver: CommandReceiver,
    shutdown: ShutdownFlag,
    votes: Box<dyn VoteSink>,
    remote: Option<Arc<dyn RemoteCoordinator>>,
    poll_task: Option<JoinHandle<()>>,
    vote_worker: Option<JoinHandle<()>>,
    warm_task: Option<JoinHandle<()>>,
}

/// Side effects the dispatcher drives, borrowed from the runtime for one
/// dispatch.
struct RuntimeEffects<'a, S: DisplaySurface> {
    surface: &'a mut S,
    cache: &'a mut AssetCache,
    store: &'a AssetStore,
    remote: Option<Arc<dyn RemoteCoordinator>>,
    settle_delay: Duration,
    mode: NavMode,
    warm_task: &'a mut Option<JoinHandle<()>>,
}

impl<S: DisplaySurface> RuntimeEffects<'_, S> {
    fn warm_neighbors(&mut self, gallery: &Gallery) {
        if self
            .warm_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            return;
        }
        let paths = gallery.neighbor_paths();
        if paths.is_empty() {
            return;
        }
        match warm_paths(paths) {
            Ok(task) => *self.warm_task = Some(task),
            Err(error) => warn!(target: "render.cache", error = %error, "warm_spawn_failed"),
        }
    }
}

impl<S: DisplaySurface> DispatchContext for RuntimeEffects<'_, S> {
    fn redraw(&mut self, gallery: &Gallery) {
        let (width, height) = self.surface.size();
        let frame = match gallery.current() {
            None => compose_empty(width, height),
            Some(Item::Pair { left, right, .. }) => {
                let left = self.cache.load(left);
                let right = self.cache.load(right);
                compose_pair(
                    width,
                    height,
                    left.as_deref(),
                    right.as_deref(),
                    gallery.selection(),
                )
            }
            Some(Item::Single { path, .. }) => {
                let image = self.cache.load(path);
                compose_single(width, height, image.as_deref())
            }
        };
        if let Err(error) = self.surface.present(&frame) {
            warn!(target: "render", error = %error, "present_failed");
        }
        self.surface.set_title(&window_title(gallery));
        self.warm_neighbors(gallery);

        // Decoded pixels stay cached only for the on-screen item and its
        // neighbors; everything else is re-decoded on demand.
        let mut keep = gallery.neighbor_paths();
        if let Some(item) = gallery.current() {
            keep.extend(item.asset_paths().iter().map(|path| path.to_path_buf()));
        }
        self.cache.retain_only(&keep);
    }

    fn settle(&mut self) {
        debug!(
            target: "runtime",
            delay_ms = self.settle_delay.as_millis() as u64,
            "vote_settle"
        );
        thread::sleep(self.settle_delay);
    }

    fn sync_collection(&mut self) -> Vec<Item> {
        if let Some(remote) = &self.remote {
            sync_store(self.store, remote.as_ref());
        }
        self.cache.clear();
        scan_collection(self.store, self.mode)
    }
}

impl<S: DisplaySurface> KioskRuntime<S> {
    fn new(context: RuntimeContext<S>) -> Self {
        let RuntimeContext {
            surface,
            gallery,
            store,
            rng,
            mode,
            settle_delay,
            sender,
            receiver,
            shutdown,
            votes,
            remote,
            poll_task,
            vote_worker,
        } = context;
        Self {
            surface,
            gallery,
            store,
            cache: AssetCache::default(),
            rng,
            mode,
            settle_delay,
            sender: Some(sender),
            receiver,
            shutdown,
            votes,
            remote,
            poll_task,
            vote_worker,
            warm_task: None,
        }
    }

    fn run(&mut self) -> Result<()> {
        self.present_current();

        let reason = loop {
            if self.shutdown.is_set() {
                break ShutdownReason::ShutdownFlag;
            }

            for event in self.surface.pump_ui_events() {
                match translate(event) {
                    Some(ControlAction::Command(command)) => {
                        if let Some(sender) = &self.sender {
                            sender.send(command);
                        }
                    }
                    Some(ControlAction::ToggleFullscreen) => self.surface.toggle_fullscreen(),
                    None => {}
                }
            }

            // Exactly one command per iteration; a burst stays queued and
            // the window keeps pumping between commands.
            if let Some(command) = self.receiver.try_next() {
                let result = self.dispatch_one(command);
                if result.quit {
                    break ShutdownReason::CommandQuit;
                }
                if result.reloaded {
                    info!(
                        target: "runtime",
                        items = self.gallery.len(),
                        "collection_reloaded"
                    );
                }
            }

            thread::sleep(LOOP_SLEEP);
        };

        self.finalize_shutdown(reason);
        Ok(())
    }

    fn dispatch_one(&mut self, command: Command) -> DispatchResult {
        let mut effects = RuntimeEffects {
            surface: &mut self.surface,
            cache: &mut self.cache,
            store: &self.store,
            remote: self.remote.clone(),
            settle_delay: self.settle_delay,
            mode: self.mode,
            warm_task: &mut self.warm_task,
        };
        dispatch(
            command,
            &mut self.gallery,
            self.votes.as_ref(),
            &mut self.rng,
            &mut effects,
        )
    }

    fn present_current(&mut self) {
        let mut effects = RuntimeEffects {
            surface: &mut self.surface,
            cache: &mut self.cache,
            store: &self.store,
            remote: self.remote.clone(),
            settle_delay: self.settle_delay,
            mode: self.mode,
            warm_task: &mut self.warm_task,
        };
        effects.redraw(&self.gallery);
    }

    fn finalize_shutdown(&mut self, reason: ShutdownReason) {
        log_shutdown_stage(reason, "begin");
        self.shutdown.trigger();

        if let Some(sender) = self.sender.take() {
            trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "dropping_command_sender"
            );
            drop(sender);
        }

        if let Some(task) = self.poll_task.take() {
            join_task(task, "button-poll", reason);
        }

        // Dropping the sink's vote handle disconnects the worker queue.
        self.votes = Box::new(DisabledVotes);
        if let Some(task) = self.vote_worker.take() {
            join_task(task, "vote-worker", reason);
        }

        if let Some(task) = self.warm_task.take() {
            join_task(task, "cache-warm", reason);
        }

        info!(
            target: "runtime.shutdown",
            commands_enqueued = COMMANDS_ENQUEUED.load(Ordering::Relaxed),
            commands_dropped = COMMANDS_DROPPED_FULL.load(Ordering::Relaxed),
            presses_accepted = PRESSES_ACCEPTED.load(Ordering::Relaxed),
            presses_debounced = PRESSES_DEBOUNCED.load(Ordering::Relaxed),
            read_failures = READ_FAILURES.load(Ordering::Relaxed),
            votes_enqueued = VOTES_ENQUEUED.load(Ordering::Relaxed),
            votes_failed = VOTES_FAILED.load(Ordering::Relaxed),
            pending_commands = self.receiver.pending(),
            "telemetry_summary"
        );

        log_shutdown_stage(reason, "complete");
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut startup = AppStartup::new();
    let bootstrap = startup.run(&args)?;

    let (sender, receiver) = command_channel();
    let shutdown = ShutdownFlag::new();

    let pins = bootstrap.config.file.input.pins;
    SysfsButtonSource::export(pins);
    let poll_task = spawn_button_poll(
        SysfsButtonSource::new(pins),
        sender.clone(),
        shutdown.clone(),
        PollSettings {
            poll_interval: bootstrap.config.effective_poll_interval,
            debounce: bootstrap.config.effective_debounce,
            error_backoff: bootstrap.config.error_backoff(),
            bindings: button_bindings(bootstrap.mode),
        },
    )?;

    let remote = build_remote(&bootstrap);
    let (votes, vote_worker): (Box<dyn VoteSink>, Option<JoinHandle<()>>) = match &remote {
        Some(remote) => {
            let (handle, worker) = spawn_vote_worker(Arc::clone(remote))?;
            (Box::new(handle), Some(worker))
        }
        None => (Box::new(DisabledVotes), None),
    };

    let store = AssetStore::new(bootstrap.assets_dir.clone());
    if let Err(error) = store.ensure_root() {
        warn!(target: "store.sync", error = %error, "assets_dir_create_failed");
    }
    if let Some(remote) = &remote {
        sync_store(&store, remote.as_ref());
    }

    let mut rng = StdRng::from_entropy();
    let mut gallery = Gallery::new(bootstrap.mode, bootstrap.config.effective_history_depth);
    gallery.reload(scan_collection(&store, bootstrap.mode), &mut rng);
    info!(
        target: "runtime.startup",
        items = gallery.len(),
        "collection_loaded"
    );

    let mut runtime = KioskRuntime::new(RuntimeContext {
        surface: bootstrap.window,
        gallery,
        store,
        rng,
        mode: bootstrap.mode,
        settle_delay: bootstrap.config.settle_delay(),
        sender,
        receiver,
        shutdown,
        votes,
        remote,
        poll_task: Some(poll_task),
        vote_worker,
    });
    runtime.run()
}
