//! Server configuration loaded from environment variables

use std::env;

/// Port used when `PORT` is unset or does not parse as an integer
const DEFAULT_PORT: i64 = 8080;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP listener binds to.
    ///
    /// Kept as a wide integer: values outside the valid port range pass
    /// through and are rejected at bind, not silently remapped.
    pub port: i64,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// `PORT` is the whole configuration surface. A missing or unparseable
    /// value falls back to the default instead of failing startup.
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self { port }
    }
}
