//! Server settings read from the environment.

use crate::ServerError;

/// Bind address and route layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Route prefix, always with a leading and no trailing `/`.
    pub api_prefix: String,
    pub api_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            api_prefix: "/api".to_string(),
            api_version: "v1".to_string(),
        }
    }
}

impl ServerConfig {
    /// Reads `BIND_ADDR`, `PORT`, `API_PREFIX` and `API_VERSION`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if `PORT` is not a valid port.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(value) => value.trim().parse().map_err(|_| ServerError::Config {
                message: format!("PORT must be a port number, got '{value}'"),
            })?,
            None => defaults.port,
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port,
            api_prefix: get("API_PREFIX").map_or(defaults.api_prefix, |p| normalize_prefix(&p)),
            api_version: get("API_VERSION")
                .map(|v| v.trim_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.api_version),
        })
    }

    /// Scope of the agent endpoints below the prefix, e.g. `/v1/space`.
    #[must_use]
    pub fn space_scope(&self) -> String {
        format!("/{}/space", self.api_version)
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
