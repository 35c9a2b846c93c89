use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use orgperm_core::AppError;
use tracing_subscriber::EnvFilter;

/// Backing store selected at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { database_url: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub storage: StorageBackend,
    pub api_host: String,
    pub api_port: u16,
    pub database_max_connections: u32,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let storage = match env::var("ORGPERM_STORAGE")
            .unwrap_or_else(|_| "postgres".to_owned())
            .as_str()
        {
            "postgres" => StorageBackend::Postgres {
                database_url: required_non_empty_env("DATABASE_URL")?,
            },
            "memory" => StorageBackend::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "ORGPERM_STORAGE must be either 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        if migrate_only && storage == StorageBackend::Memory {
            return Err(AppError::Validation(
                "the migrate command requires ORGPERM_STORAGE=postgres".to_owned(),
            ));
        }

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3101);
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(10);

        Ok(Self {
            migrate_only,
            storage,
            api_host,
            api_port,
            database_max_connections,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}
