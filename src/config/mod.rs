// casesync/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::utils::identifiers::TableName;

const DEFAULT_CONFIG_PATH: &str = "config.json";
const DEFAULT_PORT: u16 = 5432;
const DEFAULT_ENTITY: &str = "Cases";
const DEFAULT_LOG_DIR: &str = ".";
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

// Structs for deserializing config.json. Credentials are not accepted here;
// they are only read from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonConnectionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub encrypt: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawJsonConfig {
    pub source: Option<JsonConnectionConfig>,
    pub target: Option<JsonConnectionConfig>,
    pub source_entity: Option<String>,
    pub target_entity: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub acquire_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    fn env_prefix(self) -> &'static str {
        match self {
            Side::Source => "SOURCE",
            Side::Target => "TARGET",
        }
    }

    fn json(self, raw: &RawJsonConfig) -> Option<&JsonConnectionConfig> {
        match self {
            Side::Source => raw.source.as_ref(),
            Side::Target => raw.target.as_ref(),
        }
    }
}

/// A resolved connection URL. `Debug` and `Display` never show the password.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    url: String,
}

impl DatabaseConfig {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn redacted(&self) -> String {
        match Url::parse(&self.url) {
            Ok(mut parsed) => {
                if parsed.password().is_some() {
                    let _ = parsed.set_password(Some("***"));
                }
                parsed.to_string()
            }
            Err(_) => "<unparseable url>".to_string(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.redacted())
            .finish()
    }
}

impl fmt::Display for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

// Application's internal configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source: DatabaseConfig,
    pub target: DatabaseConfig,
    pub source_entity: TableName,
    pub target_entity: TableName,
    pub log_dir: PathBuf,
    pub acquire_timeout: Duration,
}

impl AppConfig {
    /// Loads `config.json` (or `$CASESYNC_CONFIG`) if present and resolves it
    /// against the process environment.
    pub fn load() -> Result<Self> {
        let config_path = env::var("CASESYNC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let raw = load_raw_config(&config_path)?;
        Self::resolve(&raw, |key| env::var(key).ok())
    }

    /// Builds the configuration from parsed JSON plus an environment lookup.
    /// Environment values win over file values.
    pub fn resolve<F>(raw: &RawJsonConfig, env_lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = resolve_database(raw, Side::Source, &env_lookup)?;
        let target = resolve_database(raw, Side::Target, &env_lookup)?;

        let source_entity = raw.source_entity.as_deref().unwrap_or(DEFAULT_ENTITY);
        let source_entity = TableName::entity(source_entity)
            .with_context(|| format!("source_entity '{}' is not allowed", source_entity))?;
        let target_entity = raw.target_entity.as_deref().unwrap_or(DEFAULT_ENTITY);
        let target_entity = TableName::entity(target_entity)
            .with_context(|| format!("target_entity '{}' is not allowed", target_entity))?;

        let acquire_timeout_secs = raw
            .acquire_timeout_secs
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS);
        if acquire_timeout_secs == 0 {
            return Err(anyhow::anyhow!("acquire_timeout_secs must be greater than zero"));
        }

        Ok(AppConfig {
            source,
            target,
            source_entity,
            target_entity,
            log_dir: raw
                .log_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
        })
    }
}

/// A missing file is not an error: everything can come from the environment.
pub fn load_raw_config(config_path: &Path) -> Result<RawJsonConfig> {
    if !config_path.exists() {
        return Ok(RawJsonConfig::default());
    }
    let config_content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
    serde_json::from_str(&config_content).with_context(|| {
        format!(
            "Failed to parse JSON from config file at {}",
            config_path.display()
        )
    })
}

fn resolve_database<F>(raw: &RawJsonConfig, side: Side, env_lookup: &F) -> Result<DatabaseConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let prefix = side.env_prefix();
    let lookup = |name: &str| env_lookup(&format!("{}_{}", prefix, name)).filter(|v| !v.trim().is_empty());

    if let Some(url) = lookup("DATABASE_URL") {
        Url::parse(&url).with_context(|| format!("{}_DATABASE_URL is not a valid URL", prefix))?;
        return Ok(DatabaseConfig { url });
    }

    let json = side.json(raw).cloned().unwrap_or_default();
    let host = lookup("DB_HOST")
        .or(json.host)
        .with_context(|| format!("{} host must be set in config.json or {}_DB_HOST", prefix.to_lowercase(), prefix))?;
    let database = lookup("DB_NAME")
        .or(json.database)
        .with_context(|| format!("{} database must be set in config.json or {}_DB_NAME", prefix.to_lowercase(), prefix))?;
    let port = match lookup("DB_PORT") {
        Some(port) => port
            .trim()
            .parse::<u16>()
            .with_context(|| format!("{}_DB_PORT must be a port number", prefix))?,
        None => json.port.unwrap_or(DEFAULT_PORT),
    };
    let encrypt = match lookup("DB_ENCRYPT") {
        Some(flag) => parse_flag(&flag)
            .with_context(|| format!("{}_DB_ENCRYPT must be true or false", prefix))?,
        None => json.encrypt.unwrap_or(true),
    };
    let user = lookup("DB_USER").with_context(|| format!("{}_DB_USER must be set", prefix))?;
    let password =
        lookup("DB_PASSWORD").with_context(|| format!("{}_DB_PASSWORD must be set", prefix))?;

    let url = build_connection_url(&host, port, &database, &user, &password, encrypt)?;
    Ok(DatabaseConfig { url })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Builds a PostgreSQL connection URL with credentials percent-encoded.
/// `encrypt` requires TLS without verifying the server certificate.
pub fn build_connection_url(
    host: &str,
    port: u16,
    database: &str,
    user: &str,
    password: &str,
    encrypt: bool,
) -> Result<String> {
    let mut url = Url::parse("postgres://localhost").context("Invalid base connection URL")?;
    url.set_host(Some(host))
        .with_context(|| format!("Invalid database host: {}", host))?;
    url.set_port(Some(port))
        .map_err(|_| anyhow::anyhow!("Cannot set port on connection URL"))?;
    url.set_username(user)
        .map_err(|_| anyhow::anyhow!("Cannot set username on connection URL"))?;
    url.set_password(Some(password))
        .map_err(|_| anyhow::anyhow!("Cannot set password on connection URL"))?;
    url.set_path(&format!("/{}", database));
    url.query_pairs_mut()
        .append_pair("sslmode", if encrypt { "require" } else { "disable" });
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn credentials() -> Vec<(&'static str, &'static str)> {
        vec![
            ("SOURCE_DB_USER", "reader"),
            ("SOURCE_DB_PASSWORD", "p@ss&word(£)"),
            ("TARGET_DB_USER", "writer"),
            ("TARGET_DB_PASSWORD", "s3cr3t<"),
        ]
    }

    fn raw_from(value: serde_json::Value) -> anyhow::Result<RawJsonConfig> {
        Ok(serde_json::from_value(value)?)
    }

    #[test]
    fn test_resolve_from_file_and_env_credentials() -> anyhow::Result<()> {
        let raw = raw_from(json!({
            "source": { "host": "src.internal", "port": 5433, "database": "CaseTrackingSystemDb" },
            "target": { "host": "dw.internal", "database": "DataWarehouse", "encrypt": false },
            "log_dir": "./logs"
        }))?;

        let config = AppConfig::resolve(&raw, env_of(&credentials()))?;

        let source = Url::parse(config.source.url())?;
        assert_eq!(source.host_str(), Some("src.internal"));
        assert_eq!(source.port(), Some(5433));
        assert_eq!(source.path(), "/CaseTrackingSystemDb");
        assert_eq!(source.username(), "reader");
        assert!(config.source.url().contains("sslmode=require"));

        let target = Url::parse(config.target.url())?;
        assert_eq!(target.port(), Some(5432));
        assert!(config.target.url().contains("sslmode=disable"));

        assert_eq!(config.source_entity.as_str(), "Cases");
        assert_eq!(config.target_entity.as_str(), "Cases");
        assert_eq!(config.log_dir, PathBuf::from("./logs"));
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        Ok(())
    }

    #[test]
    fn test_password_is_percent_encoded_and_redacted() -> anyhow::Result<()> {
        let url = build_connection_url("db", 5432, "Cases", "u", "p@ss:w/rd", true)?;
        let parsed = Url::parse(&url)?;
        assert_eq!(parsed.password(), Some("p%40ss%3Aw%2Frd"));
        assert_eq!(parsed.host_str(), Some("db"));
        assert_eq!(parsed.path(), "/Cases");

        let config = DatabaseConfig { url };
        let shown = format!("{:?} {}", config, config);
        assert!(!shown.contains("p%40ss"));
        assert!(shown.contains("u:***@db"));
        Ok(())
    }

    #[test]
    fn test_env_overrides_file_values() -> anyhow::Result<()> {
        let raw = raw_from(json!({
            "source": { "host": "file-host", "database": "filedb" },
            "target": { "host": "dw", "database": "dw" }
        }))?;
        let mut env = credentials();
        env.push(("SOURCE_DB_HOST", "env-host"));
        env.push(("SOURCE_DB_ENCRYPT", "no"));

        let config = AppConfig::resolve(&raw, env_of(&env))?;

        let source = Url::parse(config.source.url())?;
        assert_eq!(source.host_str(), Some("env-host"));
        assert_eq!(source.path(), "/filedb");
        assert!(config.source.url().contains("sslmode=disable"));
        Ok(())
    }

    #[test]
    fn test_full_url_override() -> anyhow::Result<()> {
        let env = env_of(&[
            ("SOURCE_DATABASE_URL", "postgres://a:b@src/cases"),
            ("TARGET_DATABASE_URL", "postgres://c:d@dw/warehouse"),
        ]);

        let config = AppConfig::resolve(&RawJsonConfig::default(), env)?;

        assert_eq!(config.source.url(), "postgres://a:b@src/cases");
        assert_eq!(config.target.url(), "postgres://c:d@dw/warehouse");
        Ok(())
    }

    #[test]
    fn test_missing_credentials_is_an_error() -> anyhow::Result<()> {
        let raw = raw_from(json!({
            "source": { "host": "src", "database": "db" },
            "target": { "host": "dw", "database": "dw" }
        }))?;
        let env = env_of(&[("SOURCE_DB_USER", "reader")]);

        let err = AppConfig::resolve(&raw, env).unwrap_err();
        assert!(err.to_string().contains("SOURCE_DB_PASSWORD"));
        Ok(())
    }

    #[test]
    fn test_credentials_in_file_are_rejected() {
        let parsed: std::result::Result<RawJsonConfig, _> = serde_json::from_value(json!({
            "source": { "host": "src", "database": "db", "password": "hunter2" }
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_unknown_entity_is_rejected() -> anyhow::Result<()> {
        let raw = raw_from(json!({ "target_entity": "Users" }))?;
        let env = env_of(&[
            ("SOURCE_DATABASE_URL", "postgres://a:b@src/cases"),
            ("TARGET_DATABASE_URL", "postgres://c:d@dw/warehouse"),
        ]);

        assert!(AppConfig::resolve(&raw, env).is_err());
        Ok(())
    }

    #[test]
    fn test_load_raw_config_missing_file_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let raw = load_raw_config(&dir.path().join("config.json"))?;
        assert!(raw.source.is_none());
        assert!(raw.target_entity.is_none());
        Ok(())
    }

    #[test]
    fn test_load_raw_config_from_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{ "target_entity": "Cases", "acquire_timeout_secs": 5 }}"#)?;

        let raw = load_raw_config(file.path())?;

        assert_eq!(raw.target_entity.as_deref(), Some("Cases"));
        assert_eq!(raw.acquire_timeout_secs, Some(5));
        Ok(())
    }

    #[test]
    fn test_load_raw_config_invalid_json() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, "not json")?;
        assert!(load_raw_config(file.path()).is_err());
        Ok(())
    }
}
