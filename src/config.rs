//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use crate::chain::{Address, ContractAddresses};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_AUTH_CHALLENGE: &str = "Please sign this message to authenticate";

// Local deployment addresses of the governance contracts
const DEFAULT_GOVERNOR_ADDRESS: &str = "0xCf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9";
const DEFAULT_TOKEN_ADDRESS: &str = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512";
const DEFAULT_TIMELOCK_ADDRESS: &str = "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0),
            port: 3333,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_pool_size: usize,
    pub require_tls: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "governance".to_string(),
            max_pool_size: 10,
            require_tls: false,
        }
    }
}

/// CORS configuration; no origins means any origin
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// JSON-RPC node and contract deployment
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub rpc_timeout: Duration,
    pub contracts: ContractAddresses,
    pub receipt_poll_interval: Duration,
    pub receipt_max_polls: u32,
    /// Grant the Governor its Timelock roles at startup, sent from `admin_address`
    pub grant_timelock_roles: bool,
    pub admin_address: Option<Address>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            rpc_timeout: Duration::from_secs(30),
            contracts: default_contracts(),
            receipt_poll_interval: Duration::from_millis(500),
            receipt_max_polls: 120,
            grant_timelock_roles: false,
            admin_address: None,
        }
    }
}

fn default_contracts() -> ContractAddresses {
    // constants above are valid addresses
    ContractAddresses {
        governor: DEFAULT_GOVERNOR_ADDRESS.parse().unwrap_or_default(),
        token: DEFAULT_TOKEN_ADDRESS.parse().unwrap_or_default(),
        timelock: DEFAULT_TIMELOCK_ADDRESS.parse().unwrap_or_default(),
    }
}

/// Signature login and JWT issuing
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_minutes: i64,
    pub challenge: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "governance-dev-secret-change-in-production".to_string(),
            jwt_expiration_minutes: 60,
            challenge: DEFAULT_AUTH_CHALLENGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::InvalidValue(format!(
                "LOG_FORMAT must be compact or json, got {}",
                other
            ))),
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub chain: ChainConfig,
    pub auth: AuthConfig,
    pub log_format: LogFormat,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; `load` passes the process environment
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let server_defaults = ServerConfig::default();
        let server = ServerConfig {
            host: parse_or(&var, "HOST", server_defaults.host)?,
            port: parse_or(&var, "PORT", server_defaults.port)?,
        };

        let max_pool_size = parse_or(&var, "DB_MAX_CONNECTIONS", 10usize)?;

        // DATABASE_URL wins over the individual DB_* variables
        let database = if let Some(database_url) = var("DATABASE_URL") {
            Self::parse_database_url(&database_url, max_pool_size)?
        } else {
            let defaults = DatabaseConfig::default();
            DatabaseConfig {
                host: var("DB_HOST").unwrap_or(defaults.host),
                port: parse_or(&var, "DB_PORT", defaults.port)?,
                user: var("DB_USER").unwrap_or(defaults.user),
                password: var("DB_PASSWORD").unwrap_or_default(),
                database: var("DB_NAME").unwrap_or(defaults.database),
                max_pool_size,
                require_tls: parse_or(&var, "DB_SSL", false)?,
            }
        };

        let cors = CorsConfig {
            allowed_origins: var("ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        };

        let chain_defaults = ChainConfig::default();
        let grant_timelock_roles = parse_or(&var, "GRANT_TIMELOCK_ROLES", false)?;
        let admin_address = var("CHAIN_ADMIN_ADDRESS")
            .map(|a| parse_address("CHAIN_ADMIN_ADDRESS", &a))
            .transpose()?;
        if grant_timelock_roles && admin_address.is_none() {
            return Err(ConfigError::MissingVar(
                "CHAIN_ADMIN_ADDRESS (required when GRANT_TIMELOCK_ROLES=true)".to_string(),
            ));
        }

        let chain = ChainConfig {
            rpc_url: var("RPC_URL").unwrap_or(chain_defaults.rpc_url),
            rpc_timeout: Duration::from_secs(parse_or(&var, "RPC_TIMEOUT_SECS", 30u64)?),
            contracts: ContractAddresses {
                governor: address_or(&var, "GOVERNOR_ADDRESS", chain_defaults.contracts.governor)?,
                token: address_or(&var, "TOKEN_ADDRESS", chain_defaults.contracts.token)?,
                timelock: address_or(&var, "TIMELOCK_ADDRESS", chain_defaults.contracts.timelock)?,
            },
            receipt_poll_interval: Duration::from_millis(parse_or(
                &var,
                "RECEIPT_POLL_INTERVAL_MS",
                500u64,
            )?),
            receipt_max_polls: parse_or(&var, "RECEIPT_MAX_POLLS", 120u32)?,
            grant_timelock_roles,
            admin_address,
        };

        let auth_defaults = AuthConfig::default();
        let auth = AuthConfig {
            jwt_secret: var("JWT_SECRET").unwrap_or(auth_defaults.jwt_secret),
            jwt_expiration_minutes: parse_or(&var, "JWT_EXPIRATION_MINUTES", 60i64)?,
            challenge: var("AUTH_CHALLENGE").unwrap_or(auth_defaults.challenge),
        };

        let log_format = var("LOG_FORMAT")
            .map(|f| f.parse())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            server,
            database,
            cors,
            chain,
            auth,
            log_format,
        })
    }

    /// Parse a DATABASE_URL connection string (postgresql://...)
    fn parse_database_url(url: &str, max_pool_size: usize) -> Result<DatabaseConfig, ConfigError> {
        let parsed = url::Url::parse(url).map_err(|_| {
            ConfigError::InvalidValue(
                "Invalid DATABASE_URL format (expected postgresql://...)".to_string(),
            )
        })?;

        let host = parsed
            .host_str()
            .ok_or_else(|| ConfigError::InvalidValue("Missing host in DATABASE_URL".to_string()))?
            .to_string();

        let require_tls = parsed
            .query_pairs()
            .any(|(k, v)| k == "sslmode" && v == "require");

        Ok(DatabaseConfig {
            port: parsed.port().unwrap_or(5432),
            user: parsed.username().to_string(),
            password: parsed.password().map(|p| p.to_string()).unwrap_or_default(),
            database: parsed.path().trim_start_matches('/').to_string(),
            max_pool_size,
            require_tls,
            host,
        })
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{}={}", key, raw))),
        None => Ok(default),
    }
}

fn parse_address(key: &str, raw: &str) -> Result<Address, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::InvalidValue(format!("{}: {}", key, e)))
}

fn address_or(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Address,
) -> Result<Address, ConfigError> {
    var(key).map_or(Ok(default), |raw| parse_address(key, &raw))
}
