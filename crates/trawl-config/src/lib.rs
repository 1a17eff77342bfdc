//! Configuration for trawl: TOML loading, workspace discovery and `tracing` setup.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trawl_cache::CacheConfig;
use trawl_scheduler::SchedulerConfig;

mod diagnostics;
mod logging;

pub use diagnostics::ConfigDiagnostics;
pub use logging::init_tracing;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrawlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// A simple level (`info`, `debug`, ...) or `EnvFilter` directives.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Also append logs to this file.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Upper bound on files searched concurrently. Defaults to the hardware concurrency.
    #[serde(default)]
    pub max_parallelism: Option<usize>,
}

impl SearchConfig {
    /// The worker bound to use: the configured value (at least 1), else the number of
    /// available cores.
    pub fn effective_parallelism(&self) -> usize {
        match self.max_parallelism {
            Some(value) => value.max(1),
            None => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::with_compute_threads(self.effective_parallelism())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSection {
    /// Persist parsed binary metadata between sessions.
    #[serde(default = "CacheSection::default_enabled")]
    pub enabled: bool,

    /// Cache root. Falls back to `$TRAWL_CACHE_DIR`, then `~/.trawl/cache`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl CacheSection {
    fn default_enabled() -> bool {
        true
    }

    /// Where persisted metadata goes, or `None` when persistence is disabled.
    pub fn cache_config(&self) -> Option<CacheConfig> {
        if !self.enabled {
            return None;
        }
        Some(match &self.dir {
            Some(dir) => CacheConfig {
                cache_root_override: Some(dir.clone()),
            },
            None => CacheConfig::from_env(),
        })
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            dir: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Toml(err.message().to_string())
    }
}

impl TrawlConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = read_config(path.as_ref())?;
        Ok(toml::from_str(&text)?)
    }

    /// Like [`TrawlConfig::load_from_path`], also reporting unknown keys.
    pub fn load_from_path_with_diagnostics(
        path: impl AsRef<Path>,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let text = read_config(path.as_ref())?;
        Self::load_from_str_with_diagnostics(&text)
    }

    /// Parse TOML, collecting unrecognized keys instead of rejecting them.
    pub fn load_from_str_with_diagnostics(
        text: &str,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let (config, unknown_keys) =
            diagnostics::parse_collecting_unknown::<TrawlConfig>(text)?;
        for key in &unknown_keys {
            tracing::warn!(target: "trawl.config", key = %key, "ignoring unknown config key");
        }
        Ok((config, ConfigDiagnostics { unknown_keys }))
    }
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub const TRAWL_CONFIG_ENV_VAR: &str = "TRAWL_CONFIG_PATH";

static CONFIG_ENV_LOCK: OnceLock<ReentrantMutex<()>> = OnceLock::new();

fn config_env_lock() -> &'static ReentrantMutex<()> {
    CONFIG_ENV_LOCK.get_or_init(|| ReentrantMutex::new(()))
}

/// Run `f` while holding the lock that serializes config discovery.
///
/// Environment variables are process-global; code that sets [`TRAWL_CONFIG_ENV_VAR`]
/// temporarily should do it inside this.
pub fn with_config_env_lock<R>(f: impl FnOnce() -> R) -> R {
    let _guard = config_env_lock().lock();
    f()
}

/// Find the config file for a workspace.
///
/// Search order:
/// 1) `TRAWL_CONFIG_PATH` (absolute or relative to `workspace_root`)
/// 2) `trawl.toml` in `workspace_root`
/// 3) `.trawl.toml` in `workspace_root`
pub fn discover_config_path(workspace_root: &Path) -> Option<PathBuf> {
    let _guard = config_env_lock().lock();
    if let Some(value) = std::env::var_os(TRAWL_CONFIG_ENV_VAR).filter(|value| !value.is_empty()) {
        let candidate = PathBuf::from(value);
        let path = if candidate.is_absolute() {
            candidate
        } else {
            workspace_root.join(candidate)
        };
        return Some(path.canonicalize().unwrap_or(path));
    }

    ["trawl.toml", ".trawl.toml"]
        .into_iter()
        .map(|name| workspace_root.join(name))
        .find(|path| path.is_file())
        .map(|path| path.canonicalize().unwrap_or(path))
}

/// Load the config for a workspace, or the defaults (and `None`) when there is no file.
pub fn load_for_workspace(
    workspace_root: &Path,
) -> Result<(TrawlConfig, Option<PathBuf>), ConfigError> {
    let Some(path) = discover_config_path(workspace_root) else {
        return Ok((TrawlConfig::default(), None));
    };

    let (config, _diagnostics) = TrawlConfig::load_from_path_with_diagnostics(&path)?;
    tracing::debug!(target: "trawl.config", path = %path.display(), "loaded config");
    Ok((config, Some(path)))
}
