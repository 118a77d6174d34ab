use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_ENV: &str = "CHAIN_REACTION_CONFIG";
const ENV_PREFIX: &str = "CHAIN_REACTION_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::Invalid(format!("unknown log format: {other}"))),
        }
    }
}

/// Runtime configuration for the turn service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding the shared state file; also the engine's working directory
    pub state_dir: PathBuf,
    pub state_file: String,
    /// Engine executable; relative paths resolve against `state_dir`
    pub engine_path: PathBuf,
    /// Extra launcher arguments, e.g. a script for an interpreter in `engine_path`
    pub engine_args: Vec<String>,
    pub engine_timeout_ms: u64,
    /// Let the engine open each game
    pub engine_first: bool,
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3001,
            state_dir: PathBuf::from("."),
            state_file: "input.txt".into(),
            engine_path: PathBuf::from("game_engine_ai"),
            engine_args: Vec::new(),
            engine_timeout_ms: 10_000,
            engine_first: false,
            log_format: LogFormat::Text,
        }
    }
}

impl ServiceConfig {
    /// Ephemeral loopback port and a short engine timeout, state under `state_dir`.
    pub fn for_tests(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            port: 0,
            state_dir: state_dir.into(),
            engine_timeout_ms: 2_000,
            ..Self::default()
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(&self.state_file)
    }

    pub fn resolved_engine_path(&self) -> PathBuf {
        if self.engine_path.is_absolute() {
            self.engine_path.clone()
        } else {
            self.state_dir.join(&self.engine_path)
        }
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "engine_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.state_file.trim().is_empty() {
            return Err(ConfigError::Invalid("state_file cannot be empty".into()));
        }
        if self.state_file.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(
                "state_file must be a file name, not a path".into(),
            ));
        }
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("host cannot be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Default,
    File,
    Env,
    Cli,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfigSources {
    pub host: ValueSource,
    pub port: ValueSource,
    pub state_dir: ValueSource,
    pub state_file: ValueSource,
    pub engine_path: ValueSource,
    pub engine_args: ValueSource,
    pub engine_timeout_ms: ValueSource,
    pub engine_first: ValueSource,
    pub log_format: ValueSource,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self {
            host: ValueSource::Default,
            port: ValueSource::Default,
            state_dir: ValueSource::Default,
            state_file: ValueSource::Default,
            engine_path: ValueSource::Default,
            engine_args: ValueSource::Default,
            engine_timeout_ms: ValueSource::Default,
            engine_first: ValueSource::Default,
            log_format: ValueSource::Default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigResolved {
    pub config: ServiceConfig,
    pub sources: ConfigSources,
}

/// Values given on the command line. They win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub state_dir: Option<PathBuf>,
    pub state_file: Option<String>,
    pub engine_path: Option<PathBuf>,
    pub engine_args: Option<Vec<String>>,
    pub engine_timeout_ms: Option<u64>,
    pub engine_first: Option<bool>,
    pub log_format: Option<LogFormat>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    state_dir: Option<PathBuf>,
    #[serde(default)]
    state_file: Option<String>,
    #[serde(default)]
    engine_path: Option<PathBuf>,
    #[serde(default)]
    engine_args: Option<Vec<String>>,
    #[serde(default)]
    engine_timeout_ms: Option<u64>,
    #[serde(default)]
    engine_first: Option<bool>,
    #[serde(default)]
    log_format: Option<LogFormat>,
}

/// Resolves configuration from the process environment.
pub fn load_with_sources(overrides: ConfigOverrides) -> Result<ConfigResolved, ConfigError> {
    resolve(overrides, |key| std::env::var(key).ok())
}

/// Layers defaults, the TOML file, environment values and CLI overrides in
/// that order. `env` is a lookup so callers can supply a fixed environment.
pub fn resolve<E>(overrides: ConfigOverrides, env: E) -> Result<ConfigResolved, ConfigError>
where
    E: Fn(&str) -> Option<String>,
{
    let mut cfg = ServiceConfig::default();
    let mut sources = ConfigSources::default();

    let file_path = overrides
        .config_file
        .clone()
        .or_else(|| non_empty(env(CONFIG_ENV)).map(PathBuf::from));
    if let Some(path) = file_path {
        apply_file(&mut cfg, &mut sources, &path)?;
    }

    apply_env(&mut cfg, &mut sources, &env)?;
    apply_overrides(&mut cfg, &mut sources, overrides);

    cfg.validate()?;
    Ok(ConfigResolved {
        config: cfg,
        sources,
    })
}

fn apply_file(
    cfg: &mut ServiceConfig,
    sources: &mut ConfigSources,
    path: &Path,
) -> Result<(), ConfigError> {
    let text = fs::read_to_string(path)?;
    let file: FileConfig = toml::from_str(&text)?;

    if let Some(v) = file.host {
        cfg.host = v;
        sources.host = ValueSource::File;
    }
    if let Some(v) = file.port {
        cfg.port = v;
        sources.port = ValueSource::File;
    }
    if let Some(v) = file.state_dir {
        cfg.state_dir = v;
        sources.state_dir = ValueSource::File;
    }
    if let Some(v) = file.state_file {
        cfg.state_file = v;
        sources.state_file = ValueSource::File;
    }
    if let Some(v) = file.engine_path {
        cfg.engine_path = v;
        sources.engine_path = ValueSource::File;
    }
    if let Some(v) = file.engine_args {
        cfg.engine_args = v;
        sources.engine_args = ValueSource::File;
    }
    if let Some(v) = file.engine_timeout_ms {
        cfg.engine_timeout_ms = v;
        sources.engine_timeout_ms = ValueSource::File;
    }
    if let Some(v) = file.engine_first {
        cfg.engine_first = v;
        sources.engine_first = ValueSource::File;
    }
    if let Some(v) = file.log_format {
        cfg.log_format = v;
        sources.log_format = ValueSource::File;
    }
    Ok(())
}

fn apply_env<E>(
    cfg: &mut ServiceConfig,
    sources: &mut ConfigSources,
    env: &E,
) -> Result<(), ConfigError>
where
    E: Fn(&str) -> Option<String>,
{
    let var = |name: &str| non_empty(env(&format!("{ENV_PREFIX}{name}")));

    if let Some(v) = var("HOST") {
        cfg.host = v;
        sources.host = ValueSource::Env;
    }
    if let Some(v) = var("PORT") {
        cfg.port = v
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid port: {v}")))?;
        sources.port = ValueSource::Env;
    }
    if let Some(v) = var("STATE_DIR") {
        cfg.state_dir = PathBuf::from(v);
        sources.state_dir = ValueSource::Env;
    }
    if let Some(v) = var("STATE_FILE") {
        cfg.state_file = v;
        sources.state_file = ValueSource::Env;
    }
    if let Some(v) = var("ENGINE_PATH") {
        cfg.engine_path = PathBuf::from(v);
        sources.engine_path = ValueSource::Env;
    }
    if let Some(v) = var("ENGINE_ARGS") {
        cfg.engine_args = v.split_whitespace().map(str::to_string).collect();
        sources.engine_args = ValueSource::Env;
    }
    if let Some(v) = var("ENGINE_TIMEOUT_MS") {
        cfg.engine_timeout_ms = v
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid engine timeout: {v}")))?;
        sources.engine_timeout_ms = ValueSource::Env;
    }
    if let Some(v) = var("ENGINE_FIRST") {
        cfg.engine_first = parse_bool(&v)
            .ok_or_else(|| ConfigError::Invalid(format!("invalid engine_first: {v}")))?;
        sources.engine_first = ValueSource::Env;
    }
    if let Some(v) = var("LOG_FORMAT") {
        cfg.log_format = v.parse()?;
        sources.log_format = ValueSource::Env;
    }
    Ok(())
}

fn apply_overrides(cfg: &mut ServiceConfig, sources: &mut ConfigSources, o: ConfigOverrides) {
    if let Some(v) = o.host {
        cfg.host = v;
        sources.host = ValueSource::Cli;
    }
    if let Some(v) = o.port {
        cfg.port = v;
        sources.port = ValueSource::Cli;
    }
    if let Some(v) = o.state_dir {
        cfg.state_dir = v;
        sources.state_dir = ValueSource::Cli;
    }
    if let Some(v) = o.state_file {
        cfg.state_file = v;
        sources.state_file = ValueSource::Cli;
    }
    if let Some(v) = o.engine_path {
        cfg.engine_path = v;
        sources.engine_path = ValueSource::Cli;
    }
    if let Some(v) = o.engine_args {
        cfg.engine_args = v;
        sources.engine_args = ValueSource::Cli;
    }
    if let Some(v) = o.engine_timeout_ms {
        cfg.engine_timeout_ms = v;
        sources.engine_timeout_ms = ValueSource::Cli;
    }
    if let Some(v) = o.engine_first {
        cfg.engine_first = v;
        sources.engine_first = ValueSource::Cli;
    }
    if let Some(v) = o.log_format {
        cfg.log_format = v;
        sources.log_format = ValueSource::Cli;
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
