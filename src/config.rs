//! Gateway configuration
//!
//! Reads the chat-server endpoint and credentials from environment
//! variables. A missing authentication token is a fatal startup
//! condition; everything else has a development-friendly default.

use std::env;

use crate::error::ConfigError;

/// Default endpoint scheme (mapped to `ws` for the socket URL)
const DEFAULT_SCHEME: &str = "http";

/// Default chat-server hostname
const DEFAULT_HOSTNAME: &str = "localhost";

/// Default chat-server port
const DEFAULT_PORT: u16 = 5000;

/// Connection settings for the gateway
///
/// Built from `PARLOR_*` environment variables. The token is the only
/// required value.
#[derive(Debug, Clone)]
pub struct Config {
    /// Endpoint scheme, `http` or `https`
    pub scheme: String,
    /// Chat-server hostname
    pub hostname: String,
    /// Chat-server port
    pub port: u16,
    /// Authentication token presented on connect
    pub token: String,
    /// Room slugs to join once the session is ready
    pub rooms: Vec<String>,
}

impl Config {
    /// Build a configuration from the process environment
    ///
    /// Reads `PARLOR_SCHEME`, `PARLOR_HOSTNAME`, `PARLOR_PORT`,
    /// `PARLOR_TOKEN` and `PARLOR_ROOMS` (comma-separated slugs).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    ///
    /// `from_env` delegates here; tests supply their own lookup so they
    /// never mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("PARLOR_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let port = match lookup("PARLOR_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        let rooms = lookup("PARLOR_ROOMS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            scheme: lookup("PARLOR_SCHEME").unwrap_or_else(|| DEFAULT_SCHEME.to_string()),
            hostname: lookup("PARLOR_HOSTNAME").unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()),
            port,
            token,
            rooms,
        })
    }

    /// WebSocket URL for this configuration
    ///
    /// `https` maps to `wss`, everything else to `ws`. The token rides
    /// as a query parameter.
    pub fn endpoint_url(&self) -> String {
        let ws_scheme = if self.scheme == "https" { "wss" } else { "ws" };
        format!(
            "{}://{}:{}/ws?token={}",
            ws_scheme, self.hostname, self.port, self.token
        )
    }

    /// Endpoint rendered without credentials, for log lines
    pub fn display_endpoint(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.hostname, self.port)
    }
}
