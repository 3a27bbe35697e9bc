//! Server configuration from the environment.
//!
//! Every setting has a development default so `cargo run` works with no
//! environment at all. The JWT default is a placeholder and is reported as
//! such by [`ServerConfig::is_dev_jwt_secret`].

use std::net::SocketAddr;
use std::time::Duration;

use realm_presence::PresenceConfig;
use realm_reaper::ReaperConfig;

const DEV_JWT_SECRET: &str = "realm_local_development_jwt_secret_not_for_production";

/// Core presence server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (host:port).
    pub bind_addr: SocketAddr,
    /// HMAC secret identity tokens are signed with.
    pub jwt_secret: String,
    /// A connection silent for longer than this is reaped.
    pub idle_threshold: Duration,
    /// Time between idle sweeps.
    pub sweep_interval: Duration,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
}

impl ServerConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `REALM_BIND_ADDR` | `127.0.0.1:8080` |
    /// | `REALM_JWT_SECRET` | dev-only placeholder |
    /// | `REALM_IDLE_THRESHOLD_SECS` | `1800` |
    /// | `REALM_SWEEP_INTERVAL_SECS` | `300` |
    /// | `REALM_LOG_FILTER` | `info` |
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    pub fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let bind_addr = env("REALM_BIND_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)));

        let jwt_secret =
            env("REALM_JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.into());

        let secs = |key: &str, default: u64| {
            Duration::from_secs(
                env(key)
                    .ok()
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(default),
            )
        };
        let idle_threshold = secs(
            "REALM_IDLE_THRESHOLD_SECS",
            PresenceConfig::DEFAULT_IDLE_THRESHOLD.as_secs(),
        );
        let sweep_interval = secs(
            "REALM_SWEEP_INTERVAL_SECS",
            ReaperConfig::DEFAULT_SWEEP_INTERVAL.as_secs(),
        );

        let log_filter =
            env("REALM_LOG_FILTER").unwrap_or_else(|_| "info".into());

        Self {
            bind_addr,
            jwt_secret,
            idle_threshold,
            sweep_interval,
            log_filter,
        }
    }

    /// Returns true when using the development-only JWT secret.
    pub fn is_dev_jwt_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    /// Presence settings derived from this config.
    pub fn presence_config(&self) -> PresenceConfig {
        PresenceConfig {
            idle_threshold: self.idle_threshold,
            reaper: ReaperConfig::with_interval(self.sweep_interval),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_env_fn(|_| Err(std::env::VarError::NotPresent))
    }
}
