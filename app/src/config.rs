use crate::error::ConfigError;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    database_url: String,
    db_max_connections: u32,
    server_port: u16,
    storage_dir: String,
    storage_public_url: String,
    audio_bucket: String,
    max_upload_bytes: u64,
    relay: RelayConfig,
    admin_role: String,
    otel_stdout: bool,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    pub linger: Duration,
    pub fallback_port: u16,
    pub fallback_path: String,
    pub default_topic: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            connect_timeout: Duration::from_millis(10_000),
            response_timeout: Duration::from_millis(5_000),
            linger: Duration::from_millis(1_000),
            fallback_port: 8080,
            fallback_path: "/api/publish".to_owned(),
            default_topic: "agrimon/command".to_owned(),
        }
    }
}

impl Config {
    /// Reads the process environment, after merging an optional `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let server_port = parse_or(&lookup, "SERVER_PORT", 8000)?;
        let defaults = RelayConfig::default();

        let relay = RelayConfig {
            connect_timeout: Duration::from_millis(parse_or(
                &lookup,
                "RELAY_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout.as_millis() as u64,
            )?),
            response_timeout: Duration::from_millis(parse_or(
                &lookup,
                "RELAY_RESPONSE_TIMEOUT_MS",
                defaults.response_timeout.as_millis() as u64,
            )?),
            linger: Duration::from_millis(parse_or(
                &lookup,
                "RELAY_LINGER_MS",
                defaults.linger.as_millis() as u64,
            )?),
            fallback_port: parse_or(&lookup, "RELAY_FALLBACK_PORT", defaults.fallback_port)?,
            fallback_path: lookup("RELAY_FALLBACK_PATH").unwrap_or(defaults.fallback_path),
            default_topic: lookup("RELAY_DEFAULT_TOPIC").unwrap_or(defaults.default_topic),
        };
        if !relay.fallback_path.starts_with('/') {
            return Err(ConfigError::Invalid(
                "RELAY_FALLBACK_PATH",
                relay.fallback_path,
            ));
        }

        Ok(Config {
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            server_port,
            storage_dir: lookup("STORAGE_DIR").unwrap_or_else(|| "./storage".to_owned()),
            storage_public_url: lookup("STORAGE_PUBLIC_URL")
                .unwrap_or_else(|| format!("http://localhost:{}/storage", server_port))
                .trim_end_matches('/')
                .to_owned(),
            audio_bucket: lookup("AUDIO_BUCKET").unwrap_or_else(|| "audio-files".to_owned()),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            relay,
            admin_role: lookup("ADMIN_ROLE").unwrap_or_else(|| "admin".to_owned()),
            otel_stdout: parse_or(&lookup, "OTEL_STDOUT", false)?,
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn storage_dir(&self) -> &str {
        &self.storage_dir
    }

    pub fn storage_public_url(&self) -> &str {
        &self.storage_public_url
    }

    pub fn audio_bucket(&self) -> &str {
        &self.audio_bucket
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn relay(&self) -> &RelayConfig {
        &self.relay
    }

    pub fn admin_role(&self) -> &str {
        &self.admin_role
    }

    pub fn otel_stdout(&self) -> bool {
        self.otel_stdout
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
    }
}
