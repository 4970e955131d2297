use super::parsed_or;
use crate::core::Result;
use serde::Deserialize;
use std::env;

/// Server configuration for HTTP server
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerConfig {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            workers: default_workers(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let workers: usize = parsed_or("SERVER_WORKERS", "0")?;
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parsed_or("SERVER_PORT", "8080")?,
            workers: if workers == 0 { default_workers() } else { workers },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Handlers mostly wait on the gateway and the database.
fn default_workers() -> usize {
    num_cpus::get() * 2
}
