//! Daemon configuration from environment variables.
//!
//! The database URL is read by `uni_db::connect_from_env`; everything else
//! lives here. The mail relay and member directory are optional: when a URL
//! is absent the daemon falls back to the log/empty adapters and says so at
//! startup.

use std::net::SocketAddr;

pub const ENV_DAEMON_ADDR: &str = "UNIMART_DAEMON_ADDR";
pub const ENV_MAIL_RELAY_URL: &str = "UNIMART_MAIL_RELAY_URL";
pub const ENV_DIRECTORY_URL: &str = "UNIMART_DIRECTORY_URL";

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub mail_relay_url: Option<String>,
    pub directory_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            addr: bind_addr_from_env()
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8710))),
            mail_relay_url: non_empty_var(ENV_MAIL_RELAY_URL),
            directory_url: non_empty_var(ENV_DIRECTORY_URL),
        }
    }
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_DAEMON_ADDR).ok()?.parse().ok()
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
