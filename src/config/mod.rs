//! Configuration module for the HackMate backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;

/// Email domain HackMate accounts must belong to unless overridden.
pub const DEFAULT_ALLOWED_DOMAIN: &str = "nitp.ac.in";

/// Which document store backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

impl StoreKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Some(StoreKind::Sqlite),
            "memory" => Some(StoreKind::Memory),
            _ => None,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Document store backend
    pub store: StoreKind,
    /// Path to the JSON account directory used by the identity provider
    pub accounts_path: PathBuf,
    /// Email domain sign-ins are restricted to (None disables the policy)
    pub allowed_domain: Option<String>,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("HACKMATE_DB_PATH")
            .unwrap_or_else(|_| "./data/hackmate.sqlite".to_string())
            .into();

        let store_raw = env::var("HACKMATE_STORE").unwrap_or_else(|_| "sqlite".to_string());
        let store = StoreKind::parse(&store_raw).ok_or_else(|| {
            AppError::Config(format!(
                "Invalid HACKMATE_STORE '{}': expected sqlite or memory",
                store_raw
            ))
        })?;

        let accounts_path = env::var("HACKMATE_ACCOUNTS_PATH")
            .unwrap_or_else(|_| "./data/accounts.json".to_string())
            .into();

        let allowed_domain = match env::var("HACKMATE_ALLOWED_DOMAIN") {
            Ok(value) if value.trim().is_empty() => None,
            Ok(value) => Some(value.trim().trim_start_matches('@').to_ascii_lowercase()),
            Err(_) => Some(DEFAULT_ALLOWED_DOMAIN.to_string()),
        };

        let bind_raw =
            env::var("HACKMATE_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = bind_raw.parse().map_err(|_| {
            AppError::Config(format!("Invalid HACKMATE_BIND_ADDR format: {}", bind_raw))
        })?;

        let log_level = env::var("HACKMATE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            db_path,
            store,
            accounts_path,
            allowed_domain,
            bind_addr,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 6] = [
        "HACKMATE_DB_PATH",
        "HACKMATE_STORE",
        "HACKMATE_ACCOUNTS_PATH",
        "HACKMATE_ALLOWED_DOMAIN",
        "HACKMATE_BIND_ADDR",
        "HACKMATE_LOG_LEVEL",
    ];

    // Environment variables are process-wide, so every env case runs inside one test.
    #[test]
    fn test_config_from_env() {
        for var in VARS {
            env::remove_var(var);
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.db_path, PathBuf::from("./data/hackmate.sqlite"));
        assert_eq!(config.store, StoreKind::Sqlite);
        assert_eq!(config.accounts_path, PathBuf::from("./data/accounts.json"));
        assert_eq!(config.allowed_domain.as_deref(), Some("nitp.ac.in"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");

        env::set_var("HACKMATE_ALLOWED_DOMAIN", "@Example.EDU");
        env::set_var("HACKMATE_STORE", "Memory");
        let config = Config::from_env().unwrap();
        assert_eq!(config.allowed_domain.as_deref(), Some("example.edu"));
        assert_eq!(config.store, StoreKind::Memory);

        env::set_var("HACKMATE_ALLOWED_DOMAIN", "");
        assert!(Config::from_env().unwrap().allowed_domain.is_none());

        env::set_var("HACKMATE_BIND_ADDR", "not-an-address");
        assert!(matches!(Config::from_env(), Err(AppError::Config(_))));
        env::remove_var("HACKMATE_BIND_ADDR");

        env::set_var("HACKMATE_STORE", "redis");
        assert!(matches!(Config::from_env(), Err(AppError::Config(_))));

        for var in VARS {
            env::remove_var(var);
        }
    }
}
