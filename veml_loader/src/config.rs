//! Loader configuration.
//!
//! Loaded from `loader_config.json` with an environment variable override.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_LOADER_CONFIG: &str = include_str!("data/loader_config.json");

pub const LOADER_CONFIG_ENV: &str = "VEML_LOADER_CONFIG_PATH";

/// Where the loader runs; selects the default wait timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Desktop,
    Web,
}

impl DeploymentMode {
    pub fn default_timeout(self) -> Duration {
        match self {
            DeploymentMode::Desktop => Duration::from_secs(10),
            DeploymentMode::Web => Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub deployment: DeploymentMode,
    /// Overrides the deployment default for entity waits.
    pub timeout_secs: Option<f64>,
    /// Overrides the entity timeout for script waits.
    pub script_timeout_secs: Option<f64>,
    /// Base for relative references when the document URI cannot serve as one.
    pub base_uri: Option<String>,
    /// Applied when a texture background cannot be fetched.
    pub fallback_background: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            deployment: DeploymentMode::Desktop,
            timeout_secs: None,
            script_timeout_secs: None,
            base_uri: None,
            fallback_background: "#808080".to_string(),
        }
    }
}

impl LoaderConfig {
    pub fn builtin() -> Arc<Self> {
        let config = Self::from_json_str(BUILTIN_LOADER_CONFIG).unwrap_or_else(|err| {
            tracing::error!(
                target: "veml::config",
                error = %err,
                "loader_config.builtin_invalid"
            );
            Self::default()
        });
        Arc::new(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, LoaderConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| LoaderConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = LoaderConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs_f64());
        self
    }

    pub fn timeout(&self) -> Duration {
        seconds(self.timeout_secs).unwrap_or_else(|| self.deployment.default_timeout())
    }

    pub fn script_timeout(&self) -> Duration {
        seconds(self.script_timeout_secs).unwrap_or_else(|| self.timeout())
    }
}

/// Negative, NaN and infinite values are ignored.
fn seconds(value: Option<f64>) -> Option<Duration> {
    value.and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

#[derive(Debug, Error)]
pub enum LoaderConfigError {
    #[error("failed to parse loader config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read loader config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct LoaderConfigMetadata {
    path: Option<PathBuf>,
}

impl LoaderConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

pub fn load_loader_config_from_env() -> (Arc<LoaderConfig>, LoaderConfigMetadata) {
    if let Some(path) = env::var(LOADER_CONFIG_ENV).ok().map(PathBuf::from) {
        match LoaderConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "veml::config",
                    path = %path.display(),
                    "loader_config.loaded=file"
                );
                return (Arc::new(config), LoaderConfigMetadata::new(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "veml::config",
                    path = %path.display(),
                    error = %err,
                    "loader_config.load_failed"
                );
            }
        }
    }

    let config = LoaderConfig::builtin();
    tracing::info!(target: "veml::config", "loader_config.loaded=builtin");
    (config, LoaderConfigMetadata::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_is_desktop() {
        let config = LoaderConfig::builtin();
        assert_eq!(config.deployment, DeploymentMode::Desktop);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.script_timeout(), Duration::from_secs(10));
        assert_eq!(config.fallback_background, "#808080");
    }

    #[test]
    fn web_deployment_waits_longer() {
        let config = LoaderConfig::from_json_str(r#"{"deployment": "web"}"#).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn explicit_timeouts_override_deployment() {
        let config = LoaderConfig::from_json_str(
            r#"{"deployment": "web", "timeout_secs": 2.5, "script_timeout_secs": 1}"#,
        )
        .unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(2500));
        assert_eq!(config.script_timeout(), Duration::from_secs(1));

        let negative = LoaderConfig::from_json_str(r#"{"timeout_secs": -1}"#).unwrap();
        assert_eq!(negative.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = LoaderConfig::from_file(Path::new("/nonexistent/loader_config.json"))
            .expect_err("missing file");
        assert!(err.to_string().contains("/nonexistent/loader_config.json"));
    }

    #[test]
    fn unknown_deployment_is_a_parse_error() {
        assert!(LoaderConfig::from_json_str(r#"{"deployment": "console"}"#).is_err());
    }
}
