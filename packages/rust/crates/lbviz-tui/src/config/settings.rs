//! Runtime settings loader for lbviz.
//!
//! Loads and merges:
//! - System defaults: `<PRJ_ROOT>/packages/conf/settings.yaml`
//! - User overrides:  `<PRJ_CONFIG_HOME>/lbviz/settings.yaml`
//!
//! Merge precedence is user over system. CLI flags are applied on top by the
//! binary.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use serde::Deserialize;

use lbviz_client::DecisionClientConfig;
use lbviz_sim::ControllerConfig;
use lbviz_types::{DEFAULT_RUN_DURATION_SECS, MAX_RATE_PER_SECOND, MIN_RATE_PER_SECOND};

const DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH: &str = "packages/conf/settings.yaml";
const DEFAULT_USER_SETTINGS_RELATIVE_PATH: &str = "lbviz/settings.yaml";
const DEFAULT_CONFIG_HOME_RELATIVE_PATH: &str = ".config";
const DEFAULT_TICK_RATE_MS: u64 = 250;
static CONFIG_HOME_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Merged settings file contents. Every field is optional; accessors apply
/// defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LbvizSettings {
    /// Decision service connection.
    #[serde(default)]
    pub decision: DecisionSettings,
    /// Load run defaults.
    #[serde(default)]
    pub run: RunSettings,
    /// Initial topology.
    #[serde(default)]
    pub topology: TopologySettings,
    /// Result log.
    #[serde(default)]
    pub results: ResultsSettings,
    /// Terminal UI.
    #[serde(default)]
    pub ui: UiSettings,
}

/// `decision:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecisionSettings {
    /// Service root, e.g. `http://127.0.0.1:5000`.
    pub base_url: Option<String>,
    /// Per-request timeout; 0 disables it.
    pub request_timeout_ms: Option<u64>,
}

/// `run:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunSettings {
    /// Requests per second for a load run.
    pub rate_per_second: Option<f64>,
    /// Load run length in seconds.
    pub duration_seconds: Option<f64>,
}

/// `topology:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopologySettings {
    /// Number of targets the service starts with.
    pub initial_targets: Option<u32>,
}

/// `results:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultsSettings {
    /// Ring buffer size of the result log.
    pub capacity: Option<usize>,
}

/// `ui:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UiSettings {
    /// Redraw / input poll interval.
    pub tick_rate_ms: Option<u64>,
}

impl LbvizSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            decision: self.decision.merge(overlay.decision),
            run: self.run.merge(overlay.run),
            topology: TopologySettings {
                initial_targets: overlay
                    .topology
                    .initial_targets
                    .or(self.topology.initial_targets),
            },
            results: ResultsSettings {
                capacity: overlay.results.capacity.or(self.results.capacity),
            },
            ui: UiSettings {
                tick_rate_ms: overlay.ui.tick_rate_ms.or(self.ui.tick_rate_ms),
            },
        }
    }

    /// Decision client config; `base_url_override` (the `--base-url` flag) wins.
    #[must_use]
    pub fn client_config(&self, base_url_override: Option<&str>) -> DecisionClientConfig {
        let defaults = DecisionClientConfig::default();
        DecisionClientConfig {
            base_url: base_url_override
                .map(str::to_string)
                .or_else(|| self.decision.base_url.clone())
                .unwrap_or(defaults.base_url),
            request_timeout_ms: self
                .decision
                .request_timeout_ms
                .unwrap_or(defaults.request_timeout_ms),
        }
    }

    /// Run controller config.
    #[must_use]
    pub fn controller_config(&self) -> ControllerConfig {
        let defaults = ControllerConfig::default();
        ControllerConfig {
            initial_targets: self
                .topology
                .initial_targets
                .unwrap_or(defaults.initial_targets),
            result_capacity: self.results.capacity.unwrap_or(defaults.result_capacity),
            ..defaults
        }
    }

    /// Default rate, clamped to the accepted range.
    #[must_use]
    pub fn rate_per_second(&self) -> f64 {
        self.run
            .rate_per_second
            .filter(|rate| rate.is_finite())
            .unwrap_or(MIN_RATE_PER_SECOND)
            .clamp(MIN_RATE_PER_SECOND, MAX_RATE_PER_SECOND)
    }

    /// Default run length in seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        self.run
            .duration_seconds
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .unwrap_or(DEFAULT_RUN_DURATION_SECS)
    }

    /// UI tick interval (at least 10ms).
    #[must_use]
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.ui.tick_rate_ms.unwrap_or(DEFAULT_TICK_RATE_MS).max(10))
    }
}

impl DecisionSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            base_url: overlay.base_url.or(self.base_url),
            request_timeout_ms: overlay.request_timeout_ms.or(self.request_timeout_ms),
        }
    }
}

impl RunSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            rate_per_second: overlay.rate_per_second.or(self.rate_per_second),
            duration_seconds: overlay.duration_seconds.or(self.duration_seconds),
        }
    }
}

/// Load system + user settings for the current project.
#[must_use]
pub fn load_settings() -> LbvizSettings {
    let (system_path, user_path) = settings_paths();
    load_settings_from_paths(&system_path, &user_path)
}

#[doc(hidden)]
#[must_use]
pub fn settings_paths() -> (PathBuf, PathBuf) {
    let root = project_root();
    let system_path = root.join(DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH);
    let user_path = resolve_config_home(&root).join(DEFAULT_USER_SETTINGS_RELATIVE_PATH);
    (system_path, user_path)
}

#[doc(hidden)]
#[must_use]
pub fn load_settings_from_paths(system: &Path, user: &Path) -> LbvizSettings {
    load_one(system).merge(load_one(user))
}

fn load_one(path: &Path) -> LbvizSettings {
    if !path.exists() {
        return LbvizSettings::default();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to read settings file; ignoring"
            );
            return LbvizSettings::default();
        }
    };
    if raw.trim().is_empty() {
        return LbvizSettings::default();
    }
    match serde_yaml::from_str::<LbvizSettings>(&raw) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to parse settings yaml; ignoring file"
            );
            LbvizSettings::default()
        }
    }
}

fn project_root() -> PathBuf {
    std::env::var("PRJ_ROOT")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map_or_else(
            || std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            PathBuf::from,
        )
}

/// Set config-home override (used by CLI `--conf`).
///
/// The path can be absolute, or relative to `PRJ_ROOT`/cwd.
pub fn set_config_home_override(path: impl Into<PathBuf>) {
    let path = path.into();
    if path.as_os_str().is_empty() {
        return;
    }
    if CONFIG_HOME_OVERRIDE.set(path.clone()).is_err()
        && let Some(current) = CONFIG_HOME_OVERRIDE.get()
        && current != &path
    {
        tracing::warn!(
            current = %current.display(),
            ignored = %path.display(),
            "config home override already set; ignoring subsequent value"
        );
    }
}

fn resolve_config_home(project_root: &Path) -> PathBuf {
    if let Some(path) = CONFIG_HOME_OVERRIDE.get() {
        return absolutize(project_root, path.clone());
    }

    let configured = std::env::var("PRJ_CONFIG_HOME")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_HOME_RELATIVE_PATH.to_string());
    absolutize(project_root, PathBuf::from(configured))
}

fn absolutize(project_root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        project_root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_files() {
        let settings = LbvizSettings::default();
        let client = settings.client_config(None);
        assert_eq!(client.base_url, "http://127.0.0.1:5000");
        assert!((settings.rate_per_second() - 1.0).abs() < f64::EPSILON);
        assert!((settings.duration_seconds() - 10.0).abs() < f64::EPSILON);
        assert_eq!(settings.controller_config().initial_targets, 3);
        assert_eq!(settings.tick_rate(), Duration::from_millis(250));
    }

    #[test]
    fn test_rate_is_clamped() {
        let mut settings = LbvizSettings::default();
        settings.run.rate_per_second = Some(500.0);
        assert!((settings.rate_per_second() - 100.0).abs() < f64::EPSILON);
        settings.run.rate_per_second = Some(0.0);
        assert!((settings.rate_per_second() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_base_url_flag_wins() {
        let mut settings = LbvizSettings::default();
        settings.decision.base_url = Some("http://from-file:5000".to_string());
        assert_eq!(
            settings.client_config(Some("http://flag:9000")).base_url,
            "http://flag:9000"
        );
        assert_eq!(settings.client_config(None).base_url, "http://from-file:5000");
    }

    #[test]
    fn test_absolutize_relative() {
        let root = Path::new("/srv/project");
        assert_eq!(
            absolutize(root, PathBuf::from(".config")),
            PathBuf::from("/srv/project/.config")
        );
        assert_eq!(absolutize(root, PathBuf::from("/etc/x")), PathBuf::from("/etc/x"));
    }
}
