//! Runtime configuration, read straight from the environment.
//!
//! Follows `services/server`'s `main.rs`: no config-file layer, just
//! `env::var(...).unwrap_or_else(...)` for the handful of tunables this
//! crate has.

use std::env;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub bind_addr: String,
    pub log_level: String,
}

impl RelayConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4000);
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_owned());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
        Self { port, bind_addr, log_level }
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_addr_joins_bind_and_port() {
        let config = RelayConfig { port: 4000, bind_addr: "0.0.0.0".to_owned(), log_level: "info".to_owned() };
        assert_eq!(config.socket_addr(), "0.0.0.0:4000");
    }
}
