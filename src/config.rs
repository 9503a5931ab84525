//! TOML configuration for the anticipation service.
//!
//! Settings live in `config.toml` under the `.entrechat` app root. Missing
//! files and missing fields fall back to defaults so a fresh checkout runs
//! without any setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;

/// Default filename used to store the service configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Seconds of video covered by one inference window.
pub const DEFAULT_WINDOW_SECONDS: f64 = 10.0;
/// Embeddings per window, the models' time dimension.
pub const DEFAULT_FRAMES_PER_WINDOW: usize = 10;
/// Channels per frame embedding, the models' feature dimension.
pub const DEFAULT_FEATURE_DIM: usize = 2048;
/// Ranked predictions returned per segment.
pub const DEFAULT_TOP_K: usize = 5;
/// Per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Errors raised while loading or saving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to resolve application directory: {0}")]
    AppDir(#[from] app_dirs::AppDirError),
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    #[error("Failed to serialize configuration: {0}")]
    SerializeToml(#[from] toml::ser::Error),
    #[error("Failed to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Aggregate service configuration loaded from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub models: ModelSettings,
}

/// Knobs for the continuous inference pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_window_seconds")]
    pub window_seconds: f64,
    #[serde(default = "default_frames_per_window")]
    pub frames_per_window: usize,
    #[serde(default = "default_feature_dim")]
    pub feature_dim: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Worker threads for window-level inference; 0 picks a value from the
    /// machine's parallelism.
    #[serde(default)]
    pub worker_threads: usize,
    /// Per-request deadline in seconds; 0 disables the deadline.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            window_seconds: DEFAULT_WINDOW_SECONDS,
            frames_per_window: DEFAULT_FRAMES_PER_WINDOW,
            feature_dim: DEFAULT_FEATURE_DIM,
            top_k: DEFAULT_TOP_K,
            worker_threads: 0,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl PipelineSettings {
    /// Worker count with the automatic value resolved.
    pub fn effective_workers(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1).max(1))
            .unwrap_or(1)
    }

    /// Request deadline, if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// Artifact locations for the two loadable models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_gru_paths")]
    pub gru: ModelPaths,
    #[serde(default = "default_transformer_paths")]
    pub transformer: ModelPaths,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            gru: default_gru_paths(),
            transformer: default_transformer_paths(),
        }
    }
}

/// An ONNX artifact plus its sidecar info JSON.
///
/// Relative paths are resolved against the app models directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPaths {
    pub model: PathBuf,
    pub info: PathBuf,
}

impl ModelPaths {
    /// Absolute artifact path, anchoring relative entries at `base`.
    pub fn model_path(&self, base: &Path) -> PathBuf {
        resolve(base, &self.model)
    }

    /// Absolute info-JSON path, anchoring relative entries at `base`.
    pub fn info_path(&self, base: &Path) -> PathBuf {
        resolve(base, &self.info)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn default_gru_paths() -> ModelPaths {
    ModelPaths {
        model: PathBuf::from("action_gru.onnx"),
        info: PathBuf::from("action_gru.json"),
    }
}

fn default_transformer_paths() -> ModelPaths {
    ModelPaths {
        model: PathBuf::from("action_transformer.onnx"),
        info: PathBuf::from("action_transformer.json"),
    }
}

fn default_window_seconds() -> f64 {
    DEFAULT_WINDOW_SECONDS
}

fn default_frames_per_window() -> usize {
    DEFAULT_FRAMES_PER_WINDOW
}

fn default_feature_dim() -> usize {
    DEFAULT_FEATURE_DIM
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Path of the config file under the app root.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the configuration, falling back to defaults when no file exists.
pub fn load_or_default() -> Result<AppConfig, ConfigError> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    load_from(&path)
}

fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

/// Persist the configuration to its default location.
pub fn save(config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_path()?;
    save_to_path(config, &path)
}

/// Persist the configuration to an explicit path.
pub fn save_to_path(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(config)?;
    std::fs::write(path, data).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_dirs::test_support::OverrideGuard;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_the_model_contract() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.window_seconds, 10.0);
        assert_eq!(config.pipeline.frames_per_window, 10);
        assert_eq!(config.pipeline.feature_dim, 2048);
        assert_eq!(config.pipeline.top_k, 5);
        assert!(config.pipeline.effective_workers() >= 1);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let base = tempdir().unwrap();
        let _guard = OverrideGuard::set(base.path().to_path_buf());
        let config = load_or_default().unwrap();
        assert_eq!(config.pipeline.frames_per_window, 10);
    }

    #[test]
    fn saved_config_round_trips() {
        let base = tempdir().unwrap();
        let _guard = OverrideGuard::set(base.path().to_path_buf());
        let mut config = AppConfig::default();
        config.pipeline.worker_threads = 3;
        config.models.gru.model = PathBuf::from("/models/custom_gru.onnx");
        save(&config).unwrap();

        let loaded = load_or_default().unwrap();
        assert_eq!(loaded.pipeline.worker_threads, 3);
        assert_eq!(
            loaded.models.gru.model,
            PathBuf::from("/models/custom_gru.onnx")
        );
    }

    #[test]
    fn partial_file_fills_missing_fields() {
        let base = tempdir().unwrap();
        let _guard = OverrideGuard::set(base.path().to_path_buf());
        let path = config_path().unwrap();
        std::fs::write(&path, "[pipeline]\nwindow_seconds = 5.0\n").unwrap();

        let config = load_or_default().unwrap();
        assert_eq!(config.pipeline.window_seconds, 5.0);
        assert_eq!(config.pipeline.feature_dim, 2048);
        assert_eq!(config.models.gru.info, PathBuf::from("action_gru.json"));
    }

    #[test]
    fn relative_model_paths_anchor_at_the_base() {
        let paths = default_gru_paths();
        let base = Path::new("/srv/entrechat/models");
        assert_eq!(
            paths.model_path(base),
            PathBuf::from("/srv/entrechat/models/action_gru.onnx")
        );
        let absolute = ModelPaths {
            model: PathBuf::from("/opt/m.onnx"),
            info: PathBuf::from("/opt/m.json"),
        };
        assert_eq!(absolute.model_path(base), PathBuf::from("/opt/m.onnx"));
    }

    #[test]
    fn zero_timeout_disables_the_deadline() {
        let mut settings = PipelineSettings::default();
        assert_eq!(
            settings.request_timeout(),
            Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
        );
        settings.request_timeout_secs = 0;
        assert_eq!(settings.request_timeout(), None);
    }
}
