//! Player tuning and application paths.
//!
//! `PlayerConfig` holds the engine constants (tick cap, quantum, throttle,
//! registry sweep). It is read from `trackplay.json` in the config directory
//! when present; CLI flags override individual fields afterwards.
//!
//! Directory priority:
//! 1. CLI `--config-dir`
//! 2. `TRACKPLAY_CONFIG_DIR` environment variable
//! 3. Current folder IF it already holds trackplay.json / trackplay.log
//! 4. Platform directory from dirs-next
//!
//! Platform paths:
//! - Linux: ~/.config/trackplay/{name}, ~/.local/share/trackplay/{name}
//! - macOS: ~/Library/Application Support/trackplay/{name}
//! - Windows: %APPDATA%\trackplay\{name}

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "trackplay";
pub const CONFIG_FILE: &str = "trackplay.json";
pub const LOG_FILE: &str = "trackplay.log";
pub const CONFIG_DIR_ENV: &str = "TRACKPLAY_CONFIG_DIR";

/// Engine tuning constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    /// Cap on a single tick's real elapsed time (host suspended, tab hidden)
    pub max_frame_delta_ms: f64,
    /// Minimum accumulated advance before a tick does work
    pub quantum_ms: f64,
    /// stateChange minimum spacing
    pub state_throttle_ms: u64,
    /// currentTime jump that always emits stateChange
    pub significant_jump_ms: f64,
    /// Registry sweep period
    pub sweep_interval_ms: u64,
    /// Deferred event queue size (0 disables)
    pub event_queue_capacity: usize,
    pub default_speed: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_frame_delta_ms: 100.0,
            quantum_ms: 1000.0 / 60.0,
            state_throttle_ms: 100,
            significant_jump_ms: 500.0,
            sweep_interval_ms: 30_000,
            event_queue_capacity: 1000,
            default_speed: 1.0,
        }
    }
}

impl PlayerConfig {
    /// Read from a JSON file. Missing fields take defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let cfg: PlayerConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// `trackplay.json` from the resolved config dir, or defaults if absent.
    pub fn load(paths: &PathConfig) -> Result<Self> {
        let path = config_file(CONFIG_FILE, paths);
        if !path.exists() {
            return Ok(Self::default());
        }
        let cfg = Self::from_file(&path)?;
        info!("Loaded player config from {}", path.display());
        Ok(cfg)
    }

    /// Replace out-of-range values with defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        let positive = |v: f64| v.is_finite() && v > 0.0;

        if !positive(self.max_frame_delta_ms) {
            warn!("Invalid maxFrameDeltaMs {}, using {}", self.max_frame_delta_ms, defaults.max_frame_delta_ms);
            self.max_frame_delta_ms = defaults.max_frame_delta_ms;
        }
        if !positive(self.quantum_ms) {
            warn!("Invalid quantumMs {}, using {}", self.quantum_ms, defaults.quantum_ms);
            self.quantum_ms = defaults.quantum_ms;
        }
        if !(self.significant_jump_ms.is_finite() && self.significant_jump_ms >= 0.0) {
            warn!("Invalid significantJumpMs {}, using {}", self.significant_jump_ms, defaults.significant_jump_ms);
            self.significant_jump_ms = defaults.significant_jump_ms;
        }
        if self.sweep_interval_ms == 0 {
            warn!("Invalid sweepIntervalMs 0, using {}", defaults.sweep_interval_ms);
            self.sweep_interval_ms = defaults.sweep_interval_ms;
        }
        if !positive(self.default_speed) {
            warn!("Invalid defaultSpeed {}, using {}", self.default_speed, defaults.default_speed);
            self.default_speed = defaults.default_speed;
        }
        self
    }
}

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (TRACKPLAY_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }
}

/// Path to a configuration file
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

/// Path to a data file (logs)
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    get_data_dir(config).join(name)
}

/// Create config and data directories if missing.
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_config_dir(config);
    let data_dir = get_data_dir(config);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    }

    // Only create data_dir if it's different from config_dir
    if data_dir != config_dir && !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    }

    Ok(())
}

fn has_local_config_files(dir: &Path) -> bool {
    [CONFIG_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

/// Shared resolution for both dirs; `platform` picks the dirs-next base.
fn resolve_dir(config: &PathConfig, platform: fn() -> Option<PathBuf>) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }

    if let Ok(current_dir) = std::env::current_dir()
        && has_local_config_files(&current_dir)
    {
        return current_dir;
    }

    if let Some(dir) = platform() {
        return dir.join(APP_DIR);
    }

    PathBuf::from(".")
}

fn get_config_dir(config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::config_dir)
}

fn get_data_dir(config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::data_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };
        assert_eq!(config_file("test.json", &config), PathBuf::from("/custom/test.json"));
        assert_eq!(data_file("trackplay.log", &config), PathBuf::from("/custom/trackplay.log"));
    }

    #[test]
    fn test_cli_dir_wins_over_env() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/from/cli")));
        assert_eq!(config.config_dir, Some(PathBuf::from("/from/cli")));
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let cfg: PlayerConfig = serde_json::from_str(r#"{ "quantumMs": 10.0 }"#).unwrap();
        assert_eq!(cfg.quantum_ms, 10.0);
        assert_eq!(cfg.max_frame_delta_ms, 100.0);
        assert_eq!(cfg.state_throttle_ms, 100);
    }

    #[test]
    fn test_sanitized_replaces_bad_values() {
        let cfg = PlayerConfig {
            quantum_ms: -1.0,
            default_speed: f64::NAN,
            sweep_interval_ms: 0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(cfg, PlayerConfig::default());
    }

    #[test]
    fn test_load_from_custom_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{ "stateThrottleMs": 250 }"#).unwrap();

        let paths = PathConfig {
            config_dir: Some(dir.path().to_path_buf()),
        };
        let cfg = PlayerConfig::load(&paths).unwrap();
        assert_eq!(cfg.state_throttle_ms, 250);

        let empty = tempfile::tempdir().unwrap();
        let paths = PathConfig {
            config_dir: Some(empty.path().to_path_buf()),
        };
        assert_eq!(PlayerConfig::load(&paths).unwrap(), PlayerConfig::default());
    }

    #[test]
    fn test_invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        let err = PlayerConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
