//! Configuration file loading and management.
//!
//! Loads configuration from:
//! - Linux: `~/.config/agdash/config.toml`
//! - macOS: `~/Library/Application Support/dev.agdash.agdash/config.toml`
//! - Windows: `%APPDATA%/agdash/agdash/config/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `AGDASH_CONFIG`: Override config file path
//! - `AGDASH_LISTEN`: Server listen address (e.g., "0.0.0.0:8000")
//! - `AGDASH_CACHE_DIR`: Snapshot directory
//! - `AGDASH_FRESH_MINUTES`: Freshness window for every family
//! - `AGDASH_WARM_INTERVAL`: Warm-up sweep interval in seconds (0 disables)
//! - `AGDASH_REQUEST_TIMEOUT`: Caller-side timeout for synchronous refreshes
//! - `AGDASH_SOURCE_URL`: Base URL of the upstream metrics bridge
//! - `AGDASH_PROJECT`: Issue-tracker project key
//! - `AGDASH_SOURCE_TIMEOUT`: Upstream request timeout in seconds

use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use super::freshness::{DEFAULT_FRESH_MINUTES, FreshnessPolicy};
use crate::core::family::MetricFamily;
use crate::error::{AgdashError, Result};

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Environment variable to override config file path.
pub const ENV_CONFIG: &str = "AGDASH_CONFIG";
/// Environment variable for the server listen address.
pub const ENV_LISTEN: &str = "AGDASH_LISTEN";
/// Environment variable for the snapshot directory.
pub const ENV_CACHE_DIR: &str = "AGDASH_CACHE_DIR";
/// Environment variable for the freshness window in minutes.
pub const ENV_FRESH_MINUTES: &str = "AGDASH_FRESH_MINUTES";
/// Environment variable for the warm-up interval in seconds.
pub const ENV_WARM_INTERVAL: &str = "AGDASH_WARM_INTERVAL";
/// Environment variable for the caller-side request timeout in seconds.
pub const ENV_REQUEST_TIMEOUT: &str = "AGDASH_REQUEST_TIMEOUT";
/// Environment variable for the upstream base URL.
pub const ENV_SOURCE_URL: &str = "AGDASH_SOURCE_URL";
/// Environment variable for the project key.
pub const ENV_PROJECT: &str = "AGDASH_PROJECT";
/// Environment variable for the upstream timeout in seconds.
pub const ENV_SOURCE_TIMEOUT: &str = "AGDASH_SOURCE_TIMEOUT";

/// Upper bound for any configured timeout.
const MAX_TIMEOUT_SECS: u64 = 600;

// =============================================================================
// CLI Overrides
// =============================================================================

/// Settings that can be forced from the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Explicit config file path.
    pub config_path: Option<PathBuf>,
    /// Snapshot directory.
    pub cache_dir: Option<PathBuf>,
    /// Server listen address.
    pub listen_addr: Option<String>,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// Caller-side timeout for requests that wait on the metrics source.
    pub request_timeout: Option<Duration>,
    /// Directory holding one snapshot per family.
    pub cache_dir: PathBuf,
    /// Freshness windows per family.
    pub freshness: FreshnessPolicy,
    /// Interval between warm-up sweeps, if enabled.
    pub warm_interval: Option<Duration>,
    /// Base URL of the upstream metrics bridge.
    pub source_url: String,
    /// Issue-tracker project key passed to the bridge.
    pub project_key: String,
    /// Upstream request timeout.
    pub source_timeout: Duration,
    /// Log level from the config file, if any.
    pub log_level: Option<String>,
    /// Source of each setting for debugging.
    pub sources: ConfigSources,
}

/// Tracks the source of each configuration value.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub listen_addr: ConfigSource,
    pub request_timeout: ConfigSource,
    pub cache_dir: ConfigSource,
    pub fresh_minutes: ConfigSource,
    pub warm_interval: ConfigSource,
    pub source_url: ConfigSource,
    pub project_key: ConfigSource,
    pub source_timeout: ConfigSource,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default.
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl ResolvedConfig {
    /// Resolve final configuration from CLI overrides, the process
    /// environment, and the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file exists but is invalid
    /// - Any resolved value is invalid (e.g., unparseable listen address)
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let config = Self::load_config(overrides, &env)?;
        Self::resolve_with(overrides, &config, &env)
    }

    /// Resolve against an already loaded config and an env lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the config or any resolved value is invalid.
    pub fn resolve_with(
        overrides: &ConfigOverrides,
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        config.validate()?;

        let mut sources = ConfigSources::default();

        let listen_addr = Self::resolve_listen_addr(overrides, config, env, &mut sources.listen_addr)?;
        let request_timeout = Self::resolve_request_timeout(config, env, &mut sources.request_timeout)?;
        let cache_dir = Self::resolve_cache_dir(overrides, config, env, &mut sources.cache_dir);
        let freshness = Self::resolve_freshness(config, env, &mut sources.fresh_minutes)?;
        let warm_interval = Self::resolve_warm_interval(config, env, &mut sources.warm_interval)?;
        let source_url = Self::resolve_string(
            env(ENV_SOURCE_URL),
            &config.source.base_url,
            &SourceConfig::default().base_url,
            &mut sources.source_url,
        );
        let project_key = Self::resolve_string(
            env(ENV_PROJECT),
            &config.source.project_key,
            &SourceConfig::default().project_key,
            &mut sources.project_key,
        );
        let source_timeout = Self::resolve_source_timeout(config, env, &mut sources.source_timeout)?;

        Ok(Self {
            listen_addr,
            request_timeout,
            cache_dir,
            freshness,
            warm_interval,
            source_url,
            project_key,
            source_timeout,
            log_level: config.general.log_level.clone(),
            sources,
        })
    }

    /// Load config file, respecting `--config` and `AGDASH_CONFIG`.
    fn load_config(
        overrides: &ConfigOverrides,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Config> {
        if let Some(path) = &overrides.config_path {
            Config::load_from(path)
        } else if let Some(path) = env(ENV_CONFIG) {
            Config::load_from(Path::new(&path))
        } else {
            Config::load()
        }
    }

    fn resolve_listen_addr(
        overrides: &ConfigOverrides,
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> Result<SocketAddr> {
        let (raw, origin) = if let Some(addr) = &overrides.listen_addr {
            (addr.clone(), ConfigSource::Cli)
        } else if let Some(addr) = env(ENV_LISTEN) {
            (addr, ConfigSource::Env)
        } else if config.server.listen_addr == ServerConfig::default().listen_addr {
            (config.server.listen_addr.clone(), ConfigSource::Default)
        } else {
            (config.server.listen_addr.clone(), ConfigSource::ConfigFile)
        };
        *source = origin;
        parse_listen_addr(&raw)
    }

    fn resolve_request_timeout(
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> Result<Option<Duration>> {
        let secs = if let Some(raw) = env(ENV_REQUEST_TIMEOUT) {
            *source = ConfigSource::Env;
            Some(parse_u64(ENV_REQUEST_TIMEOUT, &raw)?)
        } else if let Some(secs) = config.server.request_timeout_seconds {
            *source = ConfigSource::ConfigFile;
            Some(secs)
        } else {
            *source = ConfigSource::Default;
            None
        };

        match secs {
            None | Some(0) => Ok(None),
            Some(secs) => {
                check_timeout("request_timeout_seconds", secs)?;
                Ok(Some(Duration::from_secs(secs)))
            }
        }
    }

    fn resolve_cache_dir(
        overrides: &ConfigOverrides,
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> PathBuf {
        if let Some(dir) = &overrides.cache_dir {
            *source = ConfigSource::Cli;
            return dir.clone();
        }
        if let Some(dir) = env(ENV_CACHE_DIR) {
            *source = ConfigSource::Env;
            return PathBuf::from(dir);
        }
        if let Some(dir) = &config.cache.dir {
            *source = ConfigSource::ConfigFile;
            return dir.clone();
        }
        *source = ConfigSource::Default;
        AppPaths::new().snapshot_dir()
    }

    fn resolve_freshness(
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> Result<FreshnessPolicy> {
        let minutes = if let Some(raw) = env(ENV_FRESH_MINUTES) {
            *source = ConfigSource::Env;
            let minutes = parse_u64(ENV_FRESH_MINUTES, &raw)?;
            if minutes == 0 {
                return Err(invalid(ENV_FRESH_MINUTES, &raw, "must be at least 1 minute"));
            }
            minutes
        } else if config.cache.fresh_minutes == DEFAULT_FRESH_MINUTES {
            *source = ConfigSource::Default;
            DEFAULT_FRESH_MINUTES
        } else {
            *source = ConfigSource::ConfigFile;
            config.cache.fresh_minutes
        };

        let mut policy = FreshnessPolicy::uniform(minutes_to_duration(minutes));
        for (name, family_config) in &config.cache.families {
            if let Some(minutes) = family_config.fresh_minutes {
                let family = MetricFamily::from_cli_name(name)?;
                policy = policy.with_window(family, minutes_to_duration(minutes));
            }
        }
        Ok(policy)
    }

    fn resolve_warm_interval(
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> Result<Option<Duration>> {
        let secs = if let Some(raw) = env(ENV_WARM_INTERVAL) {
            *source = ConfigSource::Env;
            parse_u64(ENV_WARM_INTERVAL, &raw)?
        } else if config.cache.warm_interval_seconds == 0 {
            *source = ConfigSource::Default;
            0
        } else {
            *source = ConfigSource::ConfigFile;
            config.cache.warm_interval_seconds
        };
        Ok((secs > 0).then(|| Duration::from_secs(secs)))
    }

    fn resolve_source_timeout(
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> Result<Duration> {
        let secs = if let Some(raw) = env(ENV_SOURCE_TIMEOUT) {
            *source = ConfigSource::Env;
            let secs = parse_u64(ENV_SOURCE_TIMEOUT, &raw)?;
            check_timeout(ENV_SOURCE_TIMEOUT, secs)?;
            secs
        } else {
            *source = if config.source.timeout_seconds == SourceConfig::default().timeout_seconds {
                ConfigSource::Default
            } else {
                ConfigSource::ConfigFile
            };
            config.source.timeout_seconds
        };
        Ok(Duration::from_secs(secs))
    }

    fn resolve_string(
        env_value: Option<String>,
        file_value: &str,
        default_value: &str,
        source: &mut ConfigSource,
    ) -> String {
        if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
            *source = ConfigSource::Env;
            return value.trim().to_string();
        }
        *source = if file_value == default_value {
            ConfigSource::Default
        } else {
            ConfigSource::ConfigFile
        };
        file_value.to_string()
    }
}

fn parse_listen_addr(raw: &str) -> Result<SocketAddr> {
    raw.trim()
        .parse()
        .map_err(|e| invalid("listen_addr", raw, &format!("not a socket address: {e}")))
}

fn parse_u64(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(key, raw, "expected a non-negative integer"))
}

fn check_timeout(key: &str, secs: u64) -> Result<()> {
    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(invalid(
            key,
            &secs.to_string(),
            &format!("must be between 1 and {MAX_TIMEOUT_SECS} seconds"),
        ));
    }
    Ok(())
}

const fn minutes_to_duration(minutes: u64) -> Duration {
    Duration::from_secs(minutes * 60)
}

fn invalid(key: &str, value: &str, message: &str) -> AgdashError {
    AgdashError::ConfigInvalid {
        key: key.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

// =============================================================================
// Config File
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Snapshot cache settings.
    pub cache: CacheConfig,
    /// Upstream metrics source settings.
    pub source: SourceConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub listen_addr: String,
    /// Give up waiting on a synchronous refresh after this many seconds.
    pub request_timeout_seconds: Option<u64>,
}

/// Snapshot cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Snapshot directory (defaults to the platform cache dir).
    pub dir: Option<PathBuf>,
    /// Freshness window for every family, in minutes.
    pub fresh_minutes: u64,
    /// Warm-up sweep interval in seconds; 0 disables the warmer.
    pub warm_interval_seconds: u64,
    /// Per-family overrides keyed by family name.
    pub families: HashMap<String, FamilyCacheConfig>,
}

/// Per-family cache overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyCacheConfig {
    /// Freshness window for this family, in minutes.
    pub fresh_minutes: Option<u64>,
}

/// Upstream metrics source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL of the metrics bridge.
    pub base_url: String,
    /// Issue-tracker project key.
    pub project_key: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8000".to_string(),
            request_timeout_seconds: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            fresh_minutes: DEFAULT_FRESH_MINUTES,
            warm_interval_seconds: 0,
            families: HashMap::new(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000/api".to_string(),
            project_key: "CB".to_string(),
            timeout_seconds: 60,
        }
    }
}

impl Config {
    /// Load configuration from the default config file path.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns error only if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns error only if the file exists but is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AgdashError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| AgdashError::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)?;
        tracing::debug!(?path, "Config file saved");
        Ok(())
    }

    /// Get the config file path.
    #[must_use]
    pub fn config_path() -> PathBuf {
        AppPaths::new().config_file()
    }

    /// Validate configuration values.
    ///
    /// Checks that:
    /// - The listen address parses
    /// - Freshness windows are at least one minute
    /// - Family override names are known
    /// - Timeouts are within 1-600 seconds
    /// - The source URL is an http(s) URL
    pub fn validate(&self) -> Result<()> {
        parse_listen_addr(&self.server.listen_addr)?;

        if self.cache.fresh_minutes == 0 {
            return Err(invalid("cache.fresh_minutes", "0", "must be at least 1 minute"));
        }

        for (name, family) in &self.cache.families {
            MetricFamily::from_cli_name(name).map_err(|_| {
                let valid = MetricFamily::ALL
                    .iter()
                    .map(|f| f.cli_name())
                    .collect::<Vec<_>>()
                    .join(", ");
                invalid(
                    "cache.families",
                    name,
                    &format!("unknown family. Valid families: {valid}"),
                )
            })?;
            if family.fresh_minutes == Some(0) {
                return Err(invalid(
                    &format!("cache.families.{name}.fresh_minutes"),
                    "0",
                    "must be at least 1 minute",
                ));
            }
        }

        check_timeout("source.timeout_seconds", self.source.timeout_seconds)?;
        if let Some(secs) = self.server.request_timeout_seconds.filter(|s| *s > 0) {
            check_timeout("server.request_timeout_seconds", secs)?;
        }

        let url = self.source.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid(
                "source.base_url",
                url,
                "must start with http:// or https://",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn overrides_with_dir() -> ConfigOverrides {
        ConfigOverrides {
            cache_dir: Some(PathBuf::from("/tmp/agdash-test")),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.fresh_minutes, 2);
        assert_eq!(config.server.listen_addr, "127.0.0.1:8000");
    }

    #[test]
    fn load_missing_file_returns_default() {
        let config = Config::load_from(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert_eq!(config.source.project_key, "CB");
    }

    #[test]
    fn load_valid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
listen_addr = "0.0.0.0:8080"
request_timeout_seconds = 20

[cache]
fresh_minutes = 5
warm_interval_seconds = 30

[cache.families.executive]
fresh_minutes = 15

[source]
base_url = "http://bridge:9000"
project_key = "OPS"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.cache.fresh_minutes, 5);
        assert_eq!(
            config.cache.families["executive"].fresh_minutes,
            Some(15)
        );
        assert_eq!(config.source.project_key, "OPS");
        assert_eq!(config.source.timeout_seconds, 60);
    }

    #[test]
    fn load_invalid_toml_returns_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not valid toml {{{{").unwrap();

        let result = Config::load_from(file.path());
        assert!(matches!(result, Err(AgdashError::ConfigParse { .. })));
    }

    #[test]
    fn roundtrip_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.cache.fresh_minutes = 7;
        config.source.project_key = "QA".to_string();

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded.cache.fresh_minutes, 7);
        assert_eq!(loaded.source.project_key, "QA");
    }

    #[test]
    fn validate_rejects_unknown_family() {
        let mut config = Config::default();
        config
            .cache
            .families
            .insert("velocity".to_string(), FamilyCacheConfig::default());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("unknown family"));
    }

    #[test]
    fn validate_rejects_zero_freshness() {
        let mut config = Config::default();
        config.cache.fresh_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_timeouts_and_urls() {
        let mut config = Config::default();
        config.source.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.source.timeout_seconds = 601;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.source.base_url = "ftp://bridge".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.listen_addr = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_defaults() {
        let resolved =
            ResolvedConfig::resolve_with(&overrides_with_dir(), &Config::default(), &no_env)
                .unwrap();

        assert_eq!(resolved.listen_addr, "127.0.0.1:8000".parse().unwrap());
        assert_eq!(resolved.request_timeout, None);
        assert_eq!(resolved.warm_interval, None);
        assert_eq!(
            resolved.freshness.window(MetricFamily::Agile),
            Duration::from_secs(120)
        );
        assert_eq!(resolved.source_timeout, Duration::from_secs(60));
        assert_eq!(resolved.sources.listen_addr, ConfigSource::Default);
        assert_eq!(resolved.sources.cache_dir, ConfigSource::Cli);
    }

    #[test]
    fn env_overrides_config_file() {
        let mut config = Config::default();
        config.source.base_url = "http://file-bridge:9000".to_string();
        config.cache.fresh_minutes = 10;

        let env = |key: &str| match key {
            ENV_SOURCE_URL => Some("http://env-bridge:9000".to_string()),
            ENV_LISTEN => Some("0.0.0.0:9999".to_string()),
            ENV_WARM_INTERVAL => Some("45".to_string()),
            _ => None,
        };
        let resolved = ResolvedConfig::resolve_with(&overrides_with_dir(), &config, &env).unwrap();

        assert_eq!(resolved.source_url, "http://env-bridge:9000");
        assert_eq!(resolved.sources.source_url, ConfigSource::Env);
        assert_eq!(resolved.listen_addr.port(), 9999);
        assert_eq!(resolved.warm_interval, Some(Duration::from_secs(45)));
        assert_eq!(
            resolved.freshness.window(MetricFamily::Executive),
            Duration::from_secs(600)
        );
        assert_eq!(resolved.sources.fresh_minutes, ConfigSource::ConfigFile);
    }

    #[test]
    fn cli_overrides_env() {
        let overrides = ConfigOverrides {
            listen_addr: Some("127.0.0.1:7000".to_string()),
            cache_dir: Some(PathBuf::from("/srv/snapshots")),
            config_path: None,
        };
        let env = |key: &str| match key {
            ENV_LISTEN => Some("0.0.0.0:9999".to_string()),
            ENV_CACHE_DIR => Some("/var/cache/agdash".to_string()),
            _ => None,
        };
        let resolved =
            ResolvedConfig::resolve_with(&overrides, &Config::default(), &env).unwrap();

        assert_eq!(resolved.listen_addr.port(), 7000);
        assert_eq!(resolved.cache_dir, PathBuf::from("/srv/snapshots"));
        assert_eq!(resolved.sources.listen_addr, ConfigSource::Cli);
    }

    #[test]
    fn family_windows_override_global_window() {
        let mut config = Config::default();
        config.cache.families.insert(
            "executive".to_string(),
            FamilyCacheConfig {
                fresh_minutes: Some(15),
            },
        );
        let env = |key: &str| (key == ENV_FRESH_MINUTES).then(|| "3".to_string());
        let resolved = ResolvedConfig::resolve_with(&overrides_with_dir(), &config, &env).unwrap();

        assert_eq!(
            resolved.freshness.window(MetricFamily::Agile),
            Duration::from_secs(180)
        );
        assert_eq!(
            resolved.freshness.window(MetricFamily::Executive),
            Duration::from_secs(900)
        );
    }

    #[test]
    fn invalid_env_values_are_rejected() {
        let env = |key: &str| (key == ENV_FRESH_MINUTES).then(|| "soon".to_string());
        let result = ResolvedConfig::resolve_with(&overrides_with_dir(), &Config::default(), &env);
        assert!(matches!(result, Err(AgdashError::ConfigInvalid { .. })));

        let env = |key: &str| (key == ENV_REQUEST_TIMEOUT).then(|| "9000".to_string());
        let result = ResolvedConfig::resolve_with(&overrides_with_dir(), &Config::default(), &env);
        assert!(result.is_err());
    }

    #[test]
    fn zero_request_timeout_disables_it() {
        let env = |key: &str| (key == ENV_REQUEST_TIMEOUT).then(|| "0".to_string());
        let resolved =
            ResolvedConfig::resolve_with(&overrides_with_dir(), &Config::default(), &env).unwrap();
        assert_eq!(resolved.request_timeout, None);
    }
}
