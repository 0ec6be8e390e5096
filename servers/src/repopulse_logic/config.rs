use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lib_repopulse::github::fetcher::{FetcherOptions, GITHUB_GRAPHQL_URL};
use lib_repopulse::{ChannelOptions, ConfigError, Credentials, ProjectRegistry};

const DEFAULT_CONFIG_FILE: &str = "repopulse.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Live GitHub star/fork dashboard over WebSocket", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "REPOPULSE_PORT", help = "Port to listen on for viewers.")]
    pub port: Option<u16>,

    #[clap(long, env = "REPOPULSE_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "REPOPULSE_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "REPOPULSE_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "REPOPULSE_GRAPHQL_URL", help = "GitHub GraphQL endpoint.")]
    pub github_graphql_url: Option<String>,

    #[clap(long, env = "REPOPULSE_TOKEN_ENV", help = "Name of the environment variable holding the GitHub token.")]
    pub github_token_env: Option<String>,

    #[clap(long, env = "REPOPULSE_FETCH_TIMEOUT_MS", help = "Timeout in milliseconds for one metrics request.")]
    pub fetch_timeout_ms: Option<u64>,

    #[clap(long, env = "REPOPULSE_FETCH_MAX_RETRIES", help = "Transport retries per metrics request (0 = single attempt).")]
    pub fetch_max_retries: Option<u32>,

    #[clap(long, env = "REPOPULSE_TRIGGER_QUEUE", help = "Triggers a channel may queue while a fetch is in flight.")]
    pub trigger_queue: Option<usize>,

    #[clap(
        long = "project",
        env = "REPOPULSE_PROJECTS",
        value_delimiter = ',',
        help = "Tracked project as owner/name. Repeat or comma-separate."
    )]
    pub projects: Option<Vec<String>>,

    #[clap(long, env = "TLS_CERT_PATH", help = "Path to the TLS certificate file.")]
    pub tls_cert_path: Option<PathBuf>,

    #[clap(long, env = "TLS_KEY_PATH", help = "Path to the TLS private key file.")]
    pub tls_key_path: Option<PathBuf>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            github_graphql_url: other.github_graphql_url.or(self.github_graphql_url),
            github_token_env: other.github_token_env.or(self.github_token_env),
            fetch_timeout_ms: other.fetch_timeout_ms.or(self.fetch_timeout_ms),
            fetch_max_retries: other.fetch_max_retries.or(self.fetch_max_retries),
            trigger_queue: other.trigger_queue.or(self.trigger_queue),
            projects: other.projects.or(self.projects),
            tls_cert_path: other.tls_cert_path.or(self.tls_cert_path),
            tls_key_path: other.tls_key_path.or(self.tls_key_path),
        }
    }

    fn defaults() -> Config {
        Config {
            port: Some(8000),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            github_graphql_url: Some(GITHUB_GRAPHQL_URL.to_string()),
            github_token_env: Some("GITHUB_TOKEN".to_string()),
            fetch_timeout_ms: Some(5000),
            fetch_max_retries: Some(0),
            trigger_queue: Some(16),
            ..Default::default()
        }
    }
}

/// Fully resolved settings the server runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub registry: ProjectRegistry,
    pub credentials: Credentials,
    pub fetcher: FetcherOptions,
    pub channel: ChannelOptions,
    pub tls: Option<(PathBuf, PathBuf)>,
}

/// A config-loading diagnostic, held until logging is up.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigNote {
    pub level: log::Level,
    pub message: String,
}

impl ConfigNote {
    fn new(level: log::Level, message: String) -> Self {
        Self { level, message }
    }

    /// Writes the note through the active logger.
    pub fn emit(&self) {
        log::log!(self.level, "{}", self.message);
    }
}

/// Layers defaults, the config file, then environment and CLI (highest wins).
///
/// Runs before the logger exists, so diagnostics come back to the caller.
pub fn load_config() -> (Config, Vec<ConfigNote>) {
    let cli_args = Config::parse();
    let config_file_path = cli_args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut notes = Vec::new();
    let mut current_config = Config::defaults();
    match read_config_file(&config_file_path) {
        Ok(Some(file_config)) => current_config = current_config.merge(file_config),
        Ok(None) => notes.push(ConfigNote::new(
            log::Level::Info,
            format!(
                "Config file not found at {}. Using defaults and environment/CLI variables.",
                config_file_path.display()
            ),
        )),
        Err(note) => notes.push(note),
    }
    (current_config.merge(cli_args), notes)
}

fn read_config_file(path: &Path) -> Result<Option<Config>, ConfigNote> {
    if !path.exists() {
        return Ok(None);
    }
    let config_str = fs::read_to_string(path).map_err(|e| {
        ConfigNote::new(
            log::Level::Warn,
            format!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e),
        )
    })?;
    serde_json::from_str::<Config>(&config_str).map(Some).map_err(|e| {
        ConfigNote::new(
            log::Level::Warn,
            format!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e),
        )
    })
}

impl Config {
    /// Validates and fills in everything the server needs.
    ///
    /// The token is read here so a missing one stops startup instead of
    /// failing every fetch.
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let defaults = Config::defaults();
        let cfg = defaults.merge(self);

        let registry = match cfg.projects {
            Some(specs) if specs.is_empty() => {
                return Err(invalid("projects", "must list at least one owner/name"));
            }
            Some(specs) => ProjectRegistry::from_specs(&specs)?,
            None => ProjectRegistry::new(ProjectRegistry::default_projects()),
        };

        let token_env = cfg.github_token_env.unwrap_or_else(|| "GITHUB_TOKEN".to_string());
        let credentials = Credentials::from_env(&token_env)?;

        let timeout_ms = cfg.fetch_timeout_ms.unwrap_or(5000);
        if timeout_ms == 0 {
            return Err(invalid("fetchTimeoutMs", "must be greater than zero"));
        }
        let trigger_queue = cfg.trigger_queue.unwrap_or(16);
        if trigger_queue == 0 {
            return Err(invalid("triggerQueue", "must be greater than zero"));
        }

        let tls = match (cfg.tls_cert_path, cfg.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert, key)),
            (None, None) => None,
            _ => return Err(invalid("tlsCertPath/tlsKeyPath", "both must be set to enable TLS")),
        };

        Ok(Settings {
            port: cfg.port.unwrap_or(8000),
            log_dir: cfg.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: cfg.log_level.unwrap_or_else(|| "info".to_string()),
            registry,
            credentials,
            fetcher: FetcherOptions {
                endpoint: cfg
                    .github_graphql_url
                    .unwrap_or_else(|| GITHUB_GRAPHQL_URL.to_string()),
                timeout: Duration::from_millis(timeout_ms),
                max_retries: cfg.fetch_max_retries.unwrap_or(0),
            },
            channel: ChannelOptions { trigger_queue },
            tls,
        })
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
