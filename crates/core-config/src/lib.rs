//! Kiosk configuration: `duet.toml` discovery, TOML parsing, and clamping
//! of runtime timings to workable floors.
//!
//! Every field has a default, so a missing file or a failed parse always
//! yields a runnable configuration. Parse failures are logged and the
//! defaults used; configuration is never a fatal path. The raw parsed
//! values are retained alongside the clamped effective ones so a later
//! reload could re-derive them.

use anyhow::Result;
use serde::Deserialize;
use std::{env, fs, path::PathBuf, time::Duration};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "duet.toml";
pub const API_KEY_ENV: &str = "API_KEY";

/// `[input]`: button sampling cadence and wiring.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct InputSection {
    #[serde(default = "InputSection::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "InputSection::default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "InputSection::default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// BCM line numbers, channel order `[right button, left button]`.
    #[serde(default = "InputSection::default_pins")]
    pub pins: [u32; 2],
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            debounce_ms: Self::default_debounce_ms(),
            error_backoff_ms: Self::default_error_backoff_ms(),
            pins: Self::default_pins(),
        }
    }
}

impl InputSection {
    const fn default_poll_interval_ms() -> u64 {
        10
    }
    const fn default_debounce_ms() -> u64 {
        50
    }
    const fn default_error_backoff_ms() -> u64 {
        100
    }
    const fn default_pins() -> [u32; 2] {
        [10, 4]
    }
}

/// Navigation policy for the gallery engine.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum GalleryMode {
    Sequential,
    RandomNoRepeat,
}

/// `[gallery]`: navigation mode and vote pacing.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct GallerySection {
    #[serde(default = "GallerySection::default_mode")]
    pub mode: GalleryMode,
    #[serde(default = "GallerySection::default_history_depth")]
    pub history_depth: usize,
    #[serde(default = "GallerySection::default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for GallerySection {
    fn default() -> Self {
        Self {
            mode: Self::default_mode(),
            history_depth: Self::default_history_depth(),
            settle_delay_ms: Self::default_settle_delay_ms(),
        }
    }
}

impl GallerySection {
    const fn default_mode() -> GalleryMode {
        GalleryMode::RandomNoRepeat
    }
    const fn default_history_depth() -> usize {
        5
    }
    const fn default_settle_delay_ms() -> u64 {
        500
    }
}

/// `[display]`: window geometry and fullscreen preference.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DisplaySection {
    #[serde(default = "DisplaySection::default_fullscreen")]
    pub fullscreen: bool,
    #[serde(default = "DisplaySection::default_window_width")]
    pub window_width: u32,
    #[serde(default = "DisplaySection::default_window_height")]
    pub window_height: u32,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            fullscreen: Self::default_fullscreen(),
            window_width: Self::default_window_width(),
            window_height: Self::default_window_height(),
        }
    }
}

impl DisplaySection {
    const fn default_fullscreen() -> bool {
        true
    }
    const fn default_window_width() -> u32 {
        640
    }
    const fn default_window_height() -> u32 {
        480
    }
}

/// `[store]`: where assets live on disk.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct StoreSection {
    #[serde(default = "StoreSection::default_assets_dir")]
    pub assets_dir: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            assets_dir: Self::default_assets_dir(),
        }
    }
}

impl StoreSection {
    fn default_assets_dir() -> PathBuf {
        PathBuf::from("images")
    }
}

/// `[remote]`: vote server and asset host. The API key may live here,
/// but the `API_KEY` environment variable wins when both are set.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RemoteSection {
    #[serde(default = "RemoteSection::default_server_url")]
    pub server_url: String,
    #[serde(default = "RemoteSection::default_asset_base_url")]
    pub asset_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            server_url: Self::default_server_url(),
            asset_base_url: Self::default_asset_base_url(),
            api_key: None,
        }
    }
}

impl RemoteSection {
    fn default_server_url() -> String {
        "https://this-or-that-machine-server.noshado.ws".to_string()
    }
    fn default_asset_base_url() -> String {
        "https://ykqtmmyiqcezkfafikuq.supabase.co/storage/v1/object/public/images".to_string()
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub input: InputSection,
    #[serde(default)]
    pub gallery: GallerySection,
    #[serde(default)]
    pub display: DisplaySection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub remote: RemoteSection,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed (or default) sections with their raw values.
    pub file: ConfigFile,
    /// The file actually read, `None` when running on defaults.
    pub source: Option<PathBuf>,
    pub effective_poll_interval: Duration,
    pub effective_debounce: Duration,
    pub effective_history_depth: usize,
}

/// Best-effort config path: `duet.toml` in the working directory first,
/// then the platform config dir (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("duet").join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let mut config = if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Config {
                file,
                source: Some(path),
                ..Config::default()
            },
            Err(error) => {
                warn!(
                    target: "config",
                    path = %path.display(),
                    %error,
                    "config_parse_failed"
                );
                Config::default()
            }
        }
    } else {
        Config::default()
    };
    config.apply_floors();
    Ok(config)
}

impl Config {
    /// Clamps runtime timings to their floors: poll interval at least
    /// 1 ms, debounce at least one poll interval, history depth at
    /// least 1. Logs each clamp that took effect.
    pub fn apply_floors(&mut self) {
        let raw_poll = self.file.input.poll_interval_ms;
        let poll = raw_poll.max(1);
        if poll != raw_poll {
            info!(target: "config", raw = raw_poll, clamped = poll, "poll_interval_clamped");
        }

        let raw_debounce = self.file.input.debounce_ms;
        let debounce = raw_debounce.max(poll);
        if debounce != raw_debounce {
            info!(
                target: "config",
                raw = raw_debounce,
                clamped = debounce,
                floor = poll,
                "debounce_clamped"
            );
        }

        let raw_depth = self.file.gallery.history_depth;
        let depth = raw_depth.max(1);
        if depth != raw_depth {
            info!(target: "config", raw = raw_depth, clamped = depth, "history_depth_clamped");
        }

        self.effective_poll_interval = Duration::from_millis(poll);
        self.effective_debounce = Duration::from_millis(debounce);
        self.effective_history_depth = depth;
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.file.input.error_backoff_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.file.gallery.settle_delay_ms)
    }

    /// Resolved API key: environment first, config file second. `None`
    /// disables remote calls.
    pub fn api_key(&self) -> Option<String> {
        pick_api_key(
            env::var(API_KEY_ENV).ok(),
            self.file.remote.api_key.as_deref(),
        )
    }
}

fn pick_api_key(env_value: Option<String>, file_value: Option<&str>) -> Option<String> {
    match env_value {
        Some(key) if !key.is_empty() => Some(key),
        _ => file_value.map(str::to_string),
    }
}
