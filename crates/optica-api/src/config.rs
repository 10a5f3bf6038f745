//! Service configuration.
//!
//! Loading order:
//! 1. Read the TOML file (a missing file means all defaults)
//! 2. Substitute `${VAR}` placeholders from the environment
//! 3. Parse into [`AppConfig`]
//! 4. Apply `OPTICA_<SECTION>_<KEY>` environment overrides
//! 5. Validate

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use optica_core::{CorePolicy, RowParsePolicy, TransitionPolicy};

pub const DEFAULT_CONFIG_PATH: &str = "optica.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required environment variables: {0}")]
    MissingEnv(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub policy: CorePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, `host:port`
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:`
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "optica.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::Invalid(format!("Unknown log format: {s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.server
            .bind
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid(format!("server.bind '{}': {}", self.server.bind, e)))?;

        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        crate::logging::parse_log_level(&self.logging.level)?;
        Ok(())
    }

    pub fn bind_addr(&self) -> ConfigResult<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server.bind '{}': {}", self.server.bind, e)))
    }
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist. Overrides and validation apply either way.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
    let path = path.as_ref();

    let mut config = if path.exists() {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let contents = substitute_env_vars(&contents)?;
        toml::from_str(&contents)?
    } else {
        tracing::debug!(path = %path.display(), "No configuration file, using defaults");
        AppConfig::default()
    };

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Replace `${VAR_NAME}` placeholders. Comment lines are left alone.
fn substitute_env_vars(input: &str) -> ConfigResult<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| ConfigError::Invalid(e.to_string()))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed = processed.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(ConfigError::MissingEnv(missing_vars.join(", ")));
    }
    Ok(result)
}

fn apply_env_overrides(config: &mut AppConfig) -> ConfigResult<()> {
    if let Ok(val) = std::env::var("OPTICA_SERVER_BIND") {
        config.server.bind = val;
    }
    if let Ok(val) = std::env::var("OPTICA_DATABASE_PATH") {
        config.database.path = val;
    }
    if let Ok(val) = std::env::var("OPTICA_LOGGING_LEVEL") {
        config.logging.level = val;
    }
    if let Ok(val) = std::env::var("OPTICA_LOGGING_FORMAT") {
        config.logging.format = val.parse()?;
    }
    if let Ok(val) = std::env::var("OPTICA_POLICY_TRANSITIONS") {
        config.policy.transitions = val.parse::<TransitionPolicy>().map_err(ConfigError::Invalid)?;
    }
    if let Ok(val) = std::env::var("OPTICA_POLICY_ROW_PARSE") {
        config.policy.row_parse = val.parse::<RowParsePolicy>().map_err(ConfigError::Invalid)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const OVERRIDES: [&str; 6] = [
        "OPTICA_SERVER_BIND",
        "OPTICA_DATABASE_PATH",
        "OPTICA_LOGGING_LEVEL",
        "OPTICA_LOGGING_FORMAT",
        "OPTICA_POLICY_TRANSITIONS",
        "OPTICA_POLICY_ROW_PARSE",
    ];

    fn clear_overrides() {
        for var in OVERRIDES {
            std::env::remove_var(var);
        }
    }

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();

        let config = load_config("/nonexistent/optica.toml").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.policy.transitions, TransitionPolicy::Strict);
        assert_eq!(config.policy.row_parse, RowParsePolicy::Skip);
    }

    #[test]
    fn test_full_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();

        let file = write_config(
            r#"
[server]
bind = "0.0.0.0:9000"

[database]
path = "/var/lib/optica/optica.db"

[logging]
level = "debug"
format = "json"

[policy]
transitions = "permissive"
row_parse = "reject"
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.database.path, "/var/lib/optica/optica.db");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.policy.transitions, TransitionPolicy::Permissive);
        assert_eq!(config.policy.row_parse, RowParsePolicy::Reject);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();

        let file = write_config("[logging]\nlevel = \"warn\"\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_substitution_skips_comments() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::set_var("OPTICA_TEST_DB", "/data/shop.db");
        std::env::remove_var("OPTICA_TEST_UNSET");

        let input = "# path = \"${OPTICA_TEST_UNSET}\"\npath = \"${OPTICA_TEST_DB}\"";
        let output = substitute_env_vars(input).unwrap();
        assert!(output.contains("path = \"/data/shop.db\""));
        assert!(output.contains("${OPTICA_TEST_UNSET}"));

        std::env::remove_var("OPTICA_TEST_DB");
    }

    #[test]
    fn test_missing_variable_is_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::remove_var("OPTICA_TEST_ABSENT");

        let result = substitute_env_vars("path = \"${OPTICA_TEST_ABSENT}\"");
        match result {
            Err(ConfigError::MissingEnv(vars)) => assert_eq!(vars, "OPTICA_TEST_ABSENT"),
            other => panic!("expected MissingEnv, got {other:?}"),
        }
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        std::env::set_var("OPTICA_DATABASE_PATH", ":memory:");
        std::env::set_var("OPTICA_POLICY_TRANSITIONS", "Permissive");
        std::env::set_var("OPTICA_LOGGING_FORMAT", "json");

        let config = load_config("/nonexistent/optica.toml").unwrap();
        assert_eq!(config.database.path, ":memory:");
        assert_eq!(config.policy.transitions, TransitionPolicy::Permissive);
        assert_eq!(config.logging.format, LogFormat::Json);

        clear_overrides();
    }

    #[test]
    fn test_invalid_values_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();

        let bad_bind = write_config("[server]\nbind = \"not-an-address\"\n");
        assert!(matches!(load_config(bad_bind.path()), Err(ConfigError::Invalid(_))));

        let bad_level = write_config("[logging]\nlevel = \"loud\"\n");
        assert!(matches!(load_config(bad_level.path()), Err(ConfigError::Invalid(_))));

        std::env::set_var("OPTICA_POLICY_ROW_PARSE", "ignore");
        assert!(matches!(
            load_config("/nonexistent/optica.toml"),
            Err(ConfigError::Invalid(_))
        ));
        clear_overrides();
    }

    #[test]
    fn test_malformed_toml() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();

        let file = write_config("[server\nbind = 1");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }
}
