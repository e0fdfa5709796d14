use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use crate::viewer::{
    DEFAULT_CACHE_SIZE, DEFAULT_PREFETCH_RADIUS, DEFAULT_WORKERS, LayoutMode, ViewerConfig, Zoom,
};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "comicview";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_initial_scale")]
    pub initial_scale: f32,

    #[serde(default)]
    pub layout_mode: LayoutMode,

    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    #[serde(default = "default_preload_radius")]
    pub preload_radius: usize,

    #[serde(default = "default_render_workers")]
    pub render_workers: usize,

    #[serde(default = "default_transition_ms")]
    pub transition_ms: u64,

    #[serde(default = "default_header_timeout_ms")]
    pub header_timeout_ms: u64,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_initial_scale() -> f32 {
    Zoom::DEFAULT_SCALE
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_preload_radius() -> usize {
    DEFAULT_PREFETCH_RADIUS
}

fn default_render_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_transition_ms() -> u64 {
    300
}

fn default_header_timeout_ms() -> u64 {
    3000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            initial_scale: default_initial_scale(),
            layout_mode: LayoutMode::default(),
            cache_size: default_cache_size(),
            preload_radius: default_preload_radius(),
            render_workers: default_render_workers(),
            transition_ms: default_transition_ms(),
            header_timeout_ms: default_header_timeout_ms(),
        }
    }
}

impl Settings {
    /// Controller configuration derived from these settings
    pub fn viewer_config(&self) -> ViewerConfig {
        ViewerConfig {
            initial_scale: self.initial_scale,
            layout_mode: self.layout_mode,
            cache_size: self.cache_size.max(1),
            preload_radius: self.preload_radius,
            render_workers: self.render_workers.max(1),
            transition: Duration::from_millis(self.transition_ms),
            header_timeout: Duration::from_millis(self.header_timeout_ms),
            ..ViewerConfig::default()
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the default location, creating the file with
/// defaults when it does not exist yet
pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };

    if path.exists() {
        load_settings_from_path(&path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
    }
}

/// Load settings from an explicit file. Parse errors keep the current settings.
pub fn load_settings_from_path(path: &Path) {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here:
    // if settings.version < 2 {
    //     migrate_v1_to_v2(settings);
    // }

    settings.version = CURRENT_VERSION;
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let content = generate_settings_yaml(settings);

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(SETTINGS_HEADER);
    content.push_str(&format!("version: {}\n", settings.version));
    content.push_str(&format!("initial_scale: {}\n", settings.initial_scale));
    content.push_str(&format!("layout_mode: {}\n", settings.layout_mode.as_str()));
    content.push_str(&format!("cache_size: {}\n", settings.cache_size));
    content.push_str(&format!("preload_radius: {}\n", settings.preload_radius));
    content.push_str(&format!("render_workers: {}\n", settings.render_workers));
    content.push_str(&format!("transition_ms: {}\n", settings.transition_ms));
    content.push_str(&format!(
        "header_timeout_ms: {}\n",
        settings.header_timeout_ms
    ));

    content
}

const SETTINGS_HEADER: &str = r#"# comicview settings
#
# initial_scale:     zoom used when a document opens (0.5 - 3.0)
# layout_mode:       single | double
# cache_size:        rendered pages kept in memory
# preload_radius:    pages warmed ahead of and behind the current spread
# render_workers:    render threads
# transition_ms:     fade/flip duration, 0 disables animations
# header_timeout_ms: idle time before the header hides

"#;

// Public API for accessing settings

pub fn get_settings() -> Settings {
    SETTINGS
        .read()
        .map(|s| s.clone())
        .unwrap_or_default()
}
