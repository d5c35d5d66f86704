use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::TermList;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub auto_highlight_mode: bool,
    pub default_terms: Vec<String>,
}

impl Settings {
    pub fn sanitized(self) -> Self {
        Self {
            auto_highlight_mode: self.auto_highlight_mode,
            default_terms: TermList::from_pieces(&self.default_terms).as_strings(),
        }
    }

    pub fn default_term_list(&self) -> TermList {
        TermList::from_pieces(&self.default_terms)
    }

    pub fn auto_highlight_ready(&self) -> bool {
        self.auto_highlight_mode && !self.default_terms.is_empty()
    }
}

pub trait SettingsStore {
    fn load(&self) -> Result<Settings, SettingsError>;
    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError>;
}

#[derive(Debug, Clone)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileSettingsStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Settings::default()),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let settings: Settings = serde_json::from_str(&raw)?;
        Ok(settings.sanitized())
    }

    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        let write_error = |source| SettingsError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_error)?;
            }
        }

        let encoded = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, encoded).map_err(write_error)
    }
}

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Settings,
    saves: usize,
    fail: bool,
}

impl MemorySettingsStore {
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        if self.fail {
            return Err(SettingsError::Unavailable("memory store set to fail".into()));
        }
        Ok(self.settings.clone().sanitized())
    }

    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        if self.fail {
            return Err(SettingsError::Unavailable("memory store set to fail".into()));
        }
        self.settings = settings.clone();
        self.saves += 1;
        Ok(())
    }
}
