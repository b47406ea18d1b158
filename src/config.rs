use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

/// Everything needed to reach the store. Built once at startup and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Sent with `AUTH` when non-empty.
    pub password: String,
    /// Selected with `SELECT` when non-zero.
    pub database: u32,
    /// Interval between keep-alive pings. Shorter than a millisecond counts as one.
    pub heartbeat: Duration,
    pub writable: bool,
}

impl ConnectionConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            password: String::new(),
            database: 0,
            heartbeat: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            writable: false,
        }
    }
}
