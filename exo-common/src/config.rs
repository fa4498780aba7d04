//! Bootstrap configuration loading and resolution
//!
//! Settings are resolved per field in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and the compiled
//! defaults are used. A TOML file that exists but does not parse is.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG: &str = "EXO_CONFIG";
/// Environment variable overriding the listen port
pub const ENV_PORT: &str = "EXO_PORT";
/// Environment variable overriding the model artifact directory
pub const ENV_MODEL_DIR: &str = "EXO_MODEL_DIR";
/// Environment variable overriding the upstream dataset URL
pub const ENV_UPSTREAM_URL: &str = "EXO_UPSTREAM_URL";

/// NASA Exoplanet Archive TAP query: KOI rows still dispositioned CANDIDATE,
/// with identifiers, sky position and the model measurement columns.
pub const DEFAULT_UPSTREAM_URL: &str = concat!(
    "https://exoplanetarchive.ipac.caltech.edu/TAP/sync?query=select+",
    "kepid,kepoi_name,koi_score,koi_fpflag_nt,koi_fpflag_ss,koi_fpflag_co,koi_fpflag_ec,",
    "koi_period,koi_period_err1,koi_period_err2,koi_time0bk,koi_time0bk_err1,koi_time0bk_err2,",
    "koi_impact,koi_impact_err1,koi_impact_err2,koi_duration,koi_duration_err1,koi_duration_err2,",
    "koi_depth,koi_depth_err1,koi_depth_err2,koi_prad,koi_prad_err1,koi_prad_err2,",
    "koi_teq,koi_teq_err1,koi_teq_err2,koi_insol,koi_insol_err1,koi_insol_err2,",
    "koi_model_snr,koi_tce_plnt_num,koi_tce_delivname,koi_steff,koi_steff_err1,koi_steff_err2,",
    "koi_slogg,koi_slogg_err1,koi_slogg_err2,koi_srad,koi_srad_err1,koi_srad_err2,",
    "ra,dec,ra_str,dec_str,koi_kepmag",
    "+from+cumulative+where+koi_disposition+like+%27CANDIDATE%27&format=json"
);

/// TOML bootstrap file contents. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Listen address (default 127.0.0.1)
    #[serde(default)]
    pub bind_address: Option<String>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Directory holding the three model artifact files
    #[serde(default)]
    pub model_dir: Option<PathBuf>,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[upstream]` table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamConfig {
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// `[logging]` table
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a TOML bootstrap file. Read failures surface as `Error::Io`,
    /// parse failures as `Error::Config`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }
}

/// Compiled fallbacks used when nothing else supplies a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub bind_address: String,
    pub port: u16,
    pub model_dir: PathBuf,
    pub upstream_url: String,
    pub upstream_timeout: Duration,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5780,
            model_dir: PathBuf::from("./model"),
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            upstream_timeout: Duration::from_secs(30),
            log_level: default_log_level(),
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub port: Option<u16>,
    pub model_dir: Option<PathBuf>,
    pub upstream_url: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub port: u16,
    pub model_dir: PathBuf,
    pub upstream_url: String,
    pub upstream_timeout: Duration,
    pub log_level: String,
}

/// Resolves [`ServiceConfig`] from CLI, environment, TOML and defaults
pub struct ConfigResolver {
    overrides: ConfigOverrides,
    defaults: CompiledDefaults,
}

impl ConfigResolver {
    pub fn new(overrides: ConfigOverrides) -> Self {
        Self {
            overrides,
            defaults: CompiledDefaults::default(),
        }
    }

    pub fn resolve(&self) -> Result<ServiceConfig> {
        let toml_config = self.load_toml()?;

        let env_port = match std::env::var(ENV_PORT) {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<u16>()
                    .map_err(|e| Error::Config(format!("{}={:?} is not a port: {}", ENV_PORT, raw, e)))?,
            ),
            Err(_) => None,
        };
        let env_model_dir = std::env::var(ENV_MODEL_DIR).ok().map(PathBuf::from);
        let env_upstream = std::env::var(ENV_UPSTREAM_URL).ok().filter(|s| !s.trim().is_empty());

        let timeout_secs = toml_config.upstream.timeout_secs;
        if timeout_secs == Some(0) {
            return Err(Error::Config("upstream.timeout_secs must be greater than zero".to_string()));
        }

        Ok(ServiceConfig {
            bind_address: toml_config
                .bind_address
                .unwrap_or_else(|| self.defaults.bind_address.clone()),
            port: self
                .overrides
                .port
                .or(env_port)
                .or(toml_config.port)
                .unwrap_or(self.defaults.port),
            model_dir: self
                .overrides
                .model_dir
                .clone()
                .or(env_model_dir)
                .or(toml_config.model_dir)
                .unwrap_or_else(|| self.defaults.model_dir.clone()),
            upstream_url: self
                .overrides
                .upstream_url
                .clone()
                .or(env_upstream)
                .or(toml_config.upstream.url)
                .unwrap_or_else(|| self.defaults.upstream_url.clone()),
            upstream_timeout: timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(self.defaults.upstream_timeout),
            log_level: toml_config.logging.level,
        })
    }

    /// Explicit paths (CLI, then `EXO_CONFIG`) must exist; the per-user
    /// default path is optional.
    fn load_toml(&self) -> Result<TomlConfig> {
        let explicit = self
            .overrides
            .config_path
            .clone()
            .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from));

        if let Some(path) = explicit {
            info!("Loading config from {}", path.display());
            return TomlConfig::load(&path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                TomlConfig::load(&path)
            }
            _ => {
                warn!("No config file found, using compiled defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}

/// `~/.config/exo/exo-api.toml` (platform equivalent elsewhere)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("exo").join("exo-api.toml"))
}
