use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_DELAY_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid JSON5 config: {0}")]
    Json5(#[from] json5::Error),
    #[error("unsupported config extension for {0}; expected .toml, .json or .json5")]
    UnsupportedFormat(PathBuf),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub marker_class: String,
    pub mutation_settle_delay_ms: u64,
    pub visibility_settle_delay_ms: u64,
    pub initial_highlight_delay_ms: u64,
    pub hide_transition_delay_ms: u64,
    pub excluded_tags: Vec<String>,
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            marker_class: "multi-highlight-term".to_string(),
            mutation_settle_delay_ms: 300,
            visibility_settle_delay_ms: 500,
            initial_highlight_delay_ms: 1_000,
            hide_transition_delay_ms: 200,
            excluded_tags: vec!["script".to_string(), "style".to_string()],
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn mutation_settle_delay(&self) -> Duration {
        Duration::from_millis(self.mutation_settle_delay_ms)
    }

    pub fn visibility_settle_delay(&self) -> Duration {
        Duration::from_millis(self.visibility_settle_delay_ms)
    }

    pub fn initial_highlight_delay(&self) -> Duration {
        Duration::from_millis(self.initial_highlight_delay_ms)
    }

    pub fn hide_transition_delay(&self) -> Duration {
        Duration::from_millis(self.hide_transition_delay_ms)
    }

    pub fn is_excluded_tag(&self, tag: &str) -> bool {
        self.excluded_tags.iter().any(|excluded| excluded == tag)
    }
}

pub fn validate(cfg: &EngineConfig) -> Result<(), String> {
    if cfg.marker_class.is_empty() || cfg.marker_class.chars().any(char::is_whitespace) {
        return Err("marker_class must be a single non-empty class name".into());
    }

    let delays = [
        ("mutation_settle_delay_ms", cfg.mutation_settle_delay_ms),
        ("visibility_settle_delay_ms", cfg.visibility_settle_delay_ms),
        ("initial_highlight_delay_ms", cfg.initial_highlight_delay_ms),
        ("hide_transition_delay_ms", cfg.hide_transition_delay_ms),
    ];
    for (name, value) in delays {
        if value > MAX_DELAY_MS {
            return Err(format!("{name} must be at most {MAX_DELAY_MS}"));
        }
    }

    for tag in &cfg.excluded_tags {
        if tag.is_empty() || tag.chars().any(|c| c.is_ascii_uppercase() || c.is_whitespace()) {
            return Err(format!("excluded tag '{tag}' must be a lowercase tag name"));
        }
    }

    if cfg.log_filter.trim().is_empty() {
        return Err("log_filter is required".into());
    }

    Ok(())
}

/// Loads and validates the config at `path`. `None` or a missing file yields
/// the defaults.
pub fn load(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(EngineConfig::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let config = parse(path, &raw)?;
    validate(&config).map_err(ConfigError::Invalid)?;
    Ok(config)
}

pub fn save(config: &EngineConfig, path: &Path) -> Result<(), ConfigError> {
    validate(config).map_err(ConfigError::Invalid)?;
    let encoded = toml::to_string_pretty(config)?;

    let write_error = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
    }
    fs::write(path, encoded).map_err(write_error)
}

fn parse(path: &Path, raw: &str) -> Result<EngineConfig, ConfigError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("toml") => Ok(toml::from_str(raw)?),
        Some("json") | Some("json5") => Ok(json5::from_str(raw)?),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}
