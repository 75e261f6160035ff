use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_SOURCE_URL: &str = "https://www.bcv.org.ve/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_SECRET_KEY: &str = "change-me";
const DEFAULT_MYSQL_PORT: u16 = 3306;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            url: DEFAULT_SOURCE_URL.to_string(),
            timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL; takes precedence over the discrete fields.
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: None,
            host: None,
            port: None,
            user: None,
            password: None,
            name: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlCredentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub name: String,
}

/// Storage backend resolved from [`DatabaseConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseBackend {
    /// `mysql://` URL; TLS is mandatory for this form.
    MySqlUrl(String),
    MySql(MySqlCredentials),
    Sqlite(PathBuf),
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    /// Directory for the default SQLite file.
    pub data_path: Option<String>,
}

fn default_secret_key() -> String {
    DEFAULT_SECRET_KEY.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig::default(),
            source: SourceConfig::default(),
            database: DatabaseConfig::default(),
            secret_key: default_secret_key(),
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Builds the effective configuration: defaults, then the YAML file, then
    /// `.env` and process environment variables.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::load_from_path(path)?,
            None => {
                let path = Self::default_config_path()?;
                if path.exists() {
                    Self::load_from_path(&path)?
                } else {
                    debug!("No config file at {}, using defaults", path.display());
                    Self::default()
                }
            }
        };

        let dotenv = read_dotenv();
        config.apply_env_with(|name| {
            std::env::var(name)
                .ok()
                .or_else(|| dotenv.get(name).cloned())
        })?;
        Ok(config)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "bcv-rate", "bcv-rate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "bcv-rate", "bcv-rate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Overrides fields from variables returned by `lookup`. Blank values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(bind) = var("BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = var("PORT") {
            self.server.port = parse_var("PORT", &port)?;
        }

        if let Some(url) = var("RATE_SOURCE_URL") {
            self.source.url = url;
        }
        if let Some(timeout) = var("RATE_FETCH_TIMEOUT_SECS") {
            self.source.timeout_secs = parse_var("RATE_FETCH_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(user_agent) = var("RATE_USER_AGENT") {
            self.source.user_agent = user_agent;
        }

        if let Some(url) = var("DATABASE_URL").or_else(|| var("MYSQL_URL")) {
            self.database.url = Some(url);
        }
        if let Some(host) = var("DB_HOST") {
            self.database.host = Some(host);
        }
        if let Some(port) = var("DB_PORT") {
            self.database.port = Some(parse_var("DB_PORT", &port)?);
        }
        if let Some(user) = var("DB_USER") {
            self.database.user = Some(user);
        }
        if let Some(password) = var("DB_PASSWORD") {
            self.database.password = Some(password);
        }
        if let Some(name) = var("DB_NAME") {
            self.database.name = Some(name);
        }
        if let Some(timeout) = var("DB_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_var("DB_TIMEOUT_SECS", &timeout)?;
        }

        if let Some(secret) = var("SECRET_KEY") {
            self.secret_key = secret;
        }
        if let Some(data_path) = var("DATA_PATH") {
            self.data_path = Some(data_path);
        }
        Ok(())
    }

    /// Resolves which storage backend the configuration points at.
    pub fn database_backend(&self) -> Result<DatabaseBackend> {
        let db = &self.database;

        if let Some(url) = db.url.as_deref() {
            return parse_database_url(url);
        }

        if let Some(host) = &db.host {
            let user = db
                .user
                .clone()
                .ok_or_else(|| anyhow!("DB_USER is required when DB_HOST is set"))?;
            let name = db
                .name
                .clone()
                .ok_or_else(|| anyhow!("DB_NAME is required when DB_HOST is set"))?;
            return Ok(DatabaseBackend::MySql(MySqlCredentials {
                host: host.clone(),
                port: db.port.unwrap_or(DEFAULT_MYSQL_PORT),
                user,
                password: db.password.clone(),
                name,
            }));
        }

        let path = self.default_data_path()?.join("rates.db");
        debug!("No database configured, falling back to {}", path.display());
        Ok(DatabaseBackend::Sqlite(path))
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }
}

fn parse_database_url(url: &str) -> Result<DatabaseBackend> {
    let (scheme, rest) = url
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid database URL: missing scheme"))?;

    match scheme.to_ascii_lowercase().as_str() {
        "mysql" | "mariadb" => Ok(DatabaseBackend::MySqlUrl(url.to_string())),
        "sqlite" => {
            let path = rest.trim_start_matches("//");
            if path.is_empty() {
                bail!("Invalid database URL: sqlite URL has no file path");
            }
            Ok(DatabaseBackend::Sqlite(PathBuf::from(path)))
        }
        "memory" => Ok(DatabaseBackend::Memory),
        other => bail!("Unsupported database URL scheme: {other}"),
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid value for {name}: '{value}'"))
}

fn read_dotenv() -> HashMap<String, String> {
    match dotenvy::dotenv_iter() {
        Ok(iter) => iter.filter_map(Result::ok).collect(),
        Err(e) => {
            debug!("No .env file loaded: {}", e);
            HashMap::new()
        }
    }
}
