use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::config::{self, ConfigError};
use crate::document::{Document, DocumentHost};
use crate::engine::{EngineError, HighlightEngine, HostEnvironment};
use crate::logging::{self, LoggingError};
use crate::model::ResultsSummary;
use crate::settings::{JsonFileSettingsStore, MemorySettingsStore, SettingsStore};

const LOCAL_CONTROLLER_ID: &str = "multihighlight-cli";

pub const USAGE: &str = "usage: multihighlight-core --input <file> [--terms <terms>] \
[--config <path>] [--settings <path>] [--auto] [--log-dir <dir>]";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("missing value for {0}")]
    MissingValue(String),
    #[error("unknown argument '{0}'")]
    UnknownArgument(String),
    #[error("--input is required")]
    MissingInput,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("failed to read input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode summary: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub input: PathBuf,
    pub terms: Option<String>,
    pub config_path: Option<PathBuf>,
    pub settings_path: Option<PathBuf>,
    pub auto: bool,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub markup: String,
    pub summary: Option<ResultsSummary>,
}

pub fn parse_cli_args(args: &[String]) -> Result<CliOptions, CliError> {
    let mut input = None;
    let mut options = CliOptions::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| CliError::MissingValue(flag.to_string()))
        };
        match arg.as_str() {
            "--input" => input = Some(PathBuf::from(value("--input")?)),
            "--terms" => options.terms = Some(value("--terms")?),
            "--config" => options.config_path = Some(PathBuf::from(value("--config")?)),
            "--settings" => options.settings_path = Some(PathBuf::from(value("--settings")?)),
            "--log-dir" => options.log_dir = Some(PathBuf::from(value("--log-dir")?)),
            "--auto" => options.auto = true,
            other => return Err(CliError::UnknownArgument(other.to_string())),
        }
    }

    options.input = input.ok_or(CliError::MissingInput)?;
    Ok(options)
}

pub fn run_with_options(options: CliOptions) -> Result<(), RuntimeError> {
    let config = config::load(options.config_path.as_deref())?;
    logging::init(&config.log_filter, options.log_dir.as_deref())?;

    let report = execute(&options, config)?;
    println!("{}", report.markup);
    println!("{}", serde_json::to_string_pretty(&report.summary)?);
    Ok(())
}

pub fn execute(
    options: &CliOptions,
    config: config::EngineConfig,
) -> Result<RunReport, RuntimeError> {
    let text = fs::read_to_string(&options.input).map_err(|source| RuntimeError::Input {
        path: options.input.clone(),
        source,
    })?;
    let document = Document::from_paragraphs(&text);
    info!(input = %options.input.display(), "loaded input document");

    match &options.settings_path {
        Some(path) => drive(options, document, JsonFileSettingsStore::new(path), config),
        None => drive(options, document, MemorySettingsStore::default(), config),
    }
}

fn drive<S: SettingsStore>(
    options: &CliOptions,
    document: Document,
    store: S,
    config: config::EngineConfig,
) -> Result<RunReport, RuntimeError> {
    let settle = config.initial_highlight_delay();
    let environment = HostEnvironment::trusted(LOCAL_CONTROLLER_ID);
    let mut engine = HighlightEngine::attach(environment, document, store, config)?;

    if options.auto && !engine.settings().auto_highlight_mode {
        engine.set_auto_highlight_mode(true);
    }

    match &options.terms {
        Some(raw) => engine.perform_search(raw),
        None => {
            let until = engine.now() + settle;
            engine.pump(until);
        }
    }

    let summary = engine.summary().cloned();
    let document = engine.shutdown();
    Ok(RunReport {
        markup: document.render(document.body()),
        summary,
    })
}
