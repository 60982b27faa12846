use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub public_server: ServerConfig,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
    pub ordering: OrderingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    Jwt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// Owner id assumed in `none` mode when the request names no owner
    #[serde(default = "AuthConfig::default_dev_owner")]
    pub dev_owner_id: String,
    #[serde(default)]
    pub jwt: Option<JwtConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 secret shared with the session issuer
    pub secret: String,
    #[serde(default)]
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub ttl_secs: u64,
    pub flush_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderingConfig {
    /// Attempts made by `append` before a position conflict becomes a storage failure
    pub append_max_attempts: u32,
}

impl AuthConfig {
    fn default_dev_owner() -> String {
        "dev".to_string()
    }

    /// Auth disabled, every request acts as `dev_owner_id` unless it sends `X-Owner-Id`
    pub fn disabled() -> Self {
        Self {
            mode: AuthMode::None,
            dev_owner_id: Self::default_dev_owner(),
            jwt: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl_secs: 30,
            flush_interval_secs: 5,
        }
    }
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            append_max_attempts: 5,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{name} has an invalid value: '{raw}'")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./biolink.db".to_string());
        let max_connections = env_or("DATABASE_MAX_CONNECTIONS", 10u32)?;

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = env_or("API_PORT", 8080u16)?;

        let public_host =
            std::env::var("PUBLIC_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let public_port = env_or("PUBLIC_PORT", 3000u16)?;

        let auth_mode = std::env::var("AUTH_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase();

        let auth_mode = match auth_mode.as_str() {
            "none" => AuthMode::None,
            "jwt" => AuthMode::Jwt,
            other => {
                tracing::warn!(
                    "Unknown AUTH_MODE '{other}', falling back to 'none'. Supported values: none, jwt"
                );
                AuthMode::None
            }
        };

        let jwt = if auth_mode == AuthMode::Jwt {
            let secret = std::env::var("AUTH_JWT_SECRET")
                .context("AUTH_JWT_SECRET must be set when AUTH_MODE=jwt")?;
            let issuer = std::env::var("AUTH_JWT_ISSUER").ok();
            Some(JwtConfig { secret, issuer })
        } else {
            None
        };

        let dev_owner_id = std::env::var("AUTH_DEV_OWNER_ID")
            .unwrap_or_else(|_| AuthConfig::default_dev_owner());

        let cache_defaults = CacheConfig::default();
        let cache = CacheConfig {
            max_entries: env_or("CACHE_MAX_ENTRIES", cache_defaults.max_entries)?,
            ttl_secs: env_or("CACHE_TTL_SECS", cache_defaults.ttl_secs)?,
            flush_interval_secs: env_or(
                "CACHE_FLUSH_INTERVAL_SECS",
                cache_defaults.flush_interval_secs,
            )?,
        };

        let append_max_attempts = env_or(
            "ORDERING_APPEND_MAX_ATTEMPTS",
            OrderingConfig::default().append_max_attempts,
        )?
        .max(1);

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            public_server: ServerConfig {
                host: public_host,
                port: public_port,
            },
            auth: AuthConfig {
                mode: auth_mode,
                dev_owner_id,
                jwt,
            },
            cache,
            ordering: OrderingConfig {
                append_max_attempts,
            },
        })
    }
}
