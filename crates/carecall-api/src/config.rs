//! Process configuration read from the environment.

use std::fmt;
use std::str::FromStr;

use carecall_core::{defaults, Error, Result};

/// Which [`carecall_core::ReminderStore`] backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Postgres,
    /// Process-local store. Reminders are lost on restart.
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Postgres => "postgres",
            StoreBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(Error::Config(format!(
                "STORE_BACKEND must be postgres or memory, got '{}'",
                other
            ))),
        }
    }
}

/// HTTP server settings.
///
/// | Variable | Default |
/// |----------|---------|
/// | `DATABASE_URL` | `postgres://localhost/carecall` |
/// | `STORE_BACKEND` | `postgres` |
/// | `HOST` | `0.0.0.0` |
/// | `PORT` | `3000` |
/// | `RUN_MIGRATIONS` | `true` |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub store_backend: StoreBackend,
    pub host: String,
    pub port: u16,
    pub run_migrations: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: defaults::DATABASE_URL.to_string(),
            store_backend: StoreBackend::default(),
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
            run_migrations: true,
        }
    }
}

impl ServerConfig {
    /// Read settings from the environment. Only an unknown `STORE_BACKEND`
    /// is an error; malformed numbers fall back to defaults.
    pub fn from_env() -> Result<Self> {
        let fallback = Self::default();

        let store_backend = match std::env::var("STORE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => fallback.store_backend,
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(fallback.database_url),
            store_backend,
            host: std::env::var("HOST").unwrap_or(fallback.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(fallback.port),
            run_migrations: std::env::var("RUN_MIGRATIONS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(fallback.run_migrations),
        })
    }

    pub fn with_store_backend(mut self, backend: StoreBackend) -> Self {
        self.store_backend = backend;
        self
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
