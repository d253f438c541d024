//! Application-level configuration loading, including timing windows and
//! scoring display tunables.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "HIVEMIND_BACK_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Minutes before an unpublished draft expires.
    pub draft_ttl_minutes: u64,
    /// Shortest guessing window a host may pick.
    pub min_duration_minutes: u64,
    /// Longest guessing window a host may pick.
    pub max_duration_minutes: u64,
    /// Minutes between guessing close and archival.
    pub reveal_window_minutes: u64,
    /// Seconds between lifecycle scheduler ticks.
    pub tick_interval_secs: u64,
    /// Number of fixed-width buckets in the results histogram.
    pub histogram_buckets: usize,
    /// Spectrum catalog file location.
    pub catalog_path: PathBuf,
    /// Minutes the spectrum catalog cache stays fresh.
    pub catalog_ttl_minutes: u64,
    /// Base URL of the post platform; local refs are fabricated when unset.
    pub publisher_base_url: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in defaults when the file is missing or malformed.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Draft TTL as a duration.
    pub fn draft_ttl(&self) -> Duration {
        Duration::from_secs(self.draft_ttl_minutes * 60)
    }

    /// Reveal window as a duration.
    pub fn reveal_window(&self) -> Duration {
        Duration::from_secs(self.reveal_window_minutes * 60)
    }

    /// Scheduler tick period as a duration.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }

    /// Catalog cache TTL as a duration.
    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_minutes * 60)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            draft_ttl_minutes: 15,
            min_duration_minutes: 5,
            max_duration_minutes: 24 * 60,
            reveal_window_minutes: 60,
            tick_interval_secs: 60,
            histogram_buckets: 10,
            catalog_path: PathBuf::from("config/spectra.json"),
            catalog_ttl_minutes: 30,
            publisher_base_url: None,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file; every field optional.
struct RawConfig {
    draft_ttl_minutes: Option<u64>,
    min_duration_minutes: Option<u64>,
    max_duration_minutes: Option<u64>,
    reveal_window_minutes: Option<u64>,
    tick_interval_secs: Option<u64>,
    histogram_buckets: Option<usize>,
    catalog_path: Option<PathBuf>,
    catalog_ttl_minutes: Option<u64>,
    publisher_base_url: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            draft_ttl_minutes: raw.draft_ttl_minutes.unwrap_or(defaults.draft_ttl_minutes),
            min_duration_minutes: raw
                .min_duration_minutes
                .unwrap_or(defaults.min_duration_minutes),
            max_duration_minutes: raw
                .max_duration_minutes
                .unwrap_or(defaults.max_duration_minutes),
            reveal_window_minutes: raw
                .reveal_window_minutes
                .unwrap_or(defaults.reveal_window_minutes),
            tick_interval_secs: raw.tick_interval_secs.unwrap_or(defaults.tick_interval_secs),
            histogram_buckets: raw
                .histogram_buckets
                .filter(|count| *count > 0)
                .unwrap_or(defaults.histogram_buckets),
            catalog_path: raw.catalog_path.unwrap_or(defaults.catalog_path),
            catalog_ttl_minutes: raw
                .catalog_ttl_minutes
                .unwrap_or(defaults.catalog_ttl_minutes),
            publisher_base_url: raw.publisher_base_url,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
