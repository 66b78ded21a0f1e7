//! Application-level configuration loading: countdown pacing, store timeouts and seed data.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

use crate::dao::models::SeedData;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LIVE_TRIVIA_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Ticks announced for each question.
    pub countdown_ticks: u32,
    /// Duration of one tick.
    pub tick_interval: Duration,
    /// Upper bound for every durable store call.
    pub store_timeout: Duration,
    /// Period of the `game_stats` broadcast.
    pub stats_interval: Duration,
    /// How long past its deadline a countdown still counts as live when its owner went silent.
    pub expiry_grace: Duration,
    /// Capacity of the local broadcast channel.
    pub hub_capacity: usize,
    /// Attempts of a snapshot compare-and-swap loop before giving up.
    pub cas_max_attempts: u32,
    /// Games, questions and links loaded into the in-memory backend.
    pub seed_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        countdown_ticks = app_config.countdown_ticks,
                        tick_interval_ms = app_config.tick_interval.as_millis() as u64,
                        "loaded configuration"
                    );
                    app_config
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

    /// Read the seed file named by `seed_path`, if any. Failures are logged and yield no seed.
    pub fn load_seed(&self) -> Option<SeedData> {
        let path = self.seed_path.as_ref()?;
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read seed data");
                return None;
            }
        };
        match serde_json::from_str::<SeedData>(&contents) {
            Ok(seed) => {
                info!(
                    path = %path.display(),
                    games = seed.games.len(),
                    questions = seed.questions.len(),
                    links = seed.links.len(),
                    "loaded seed data"
                );
                Some(seed)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to parse seed data");
                None
            }
        }
    }

    /// Total countdown length.
    pub fn countdown_length(&self) -> Duration {
        self.tick_interval * self.countdown_ticks
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    countdown_ticks: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    tick_interval_ms: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    store_timeout_ms: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    stats_interval_ms: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    expiry_grace_ms: Duration,
    hub_capacity: usize,
    cas_max_attempts: u32,
    seed_path: Option<PathBuf>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            countdown_ticks: 10,
            tick_interval_ms: Duration::from_millis(1000),
            store_timeout_ms: Duration::from_millis(5000),
            stats_interval_ms: Duration::from_millis(2000),
            expiry_grace_ms: Duration::from_millis(2000),
            hub_capacity: 256,
            cas_max_attempts: 16,
            seed_path: None,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            countdown_ticks: value.countdown_ticks.max(1),
            tick_interval: value.tick_interval_ms.max(Duration::from_millis(1)),
            store_timeout: value.store_timeout_ms,
            stats_interval: value.stats_interval_ms.max(Duration::from_millis(1)),
            expiry_grace: value.expiry_grace_ms,
            hub_capacity: value.hub_capacity.max(1),
            cas_max_attempts: value.cas_max_attempts.max(1),
            seed_path: value.seed_path,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let raw: RawConfig = serde_json::from_str(r#"{"tickIntervalMs": 250}"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.countdown_ticks, 10);
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.countdown_length(), Duration::from_millis(2500));
        assert!(config.seed_path.is_none());
    }

    #[test]
    fn degenerate_values_are_clamped() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"countdownTicks": 0, "hubCapacity": 0, "casMaxAttempts": 0}"#)
                .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.countdown_ticks, 1);
        assert_eq!(config.hub_capacity, 1);
        assert_eq!(config.cas_max_attempts, 1);
    }
}
