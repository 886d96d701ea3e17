//! Server configuration
//!
//! All values are read from the environment once at startup and stay fixed
//! for the process lifetime.

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8081";
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_CREATE_GATE_CAPACITY: usize = 5;
pub const DEFAULT_WORKER_POOL_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub allowed_origin: String,
    pub create_gate_capacity: usize,
    pub worker_pool_size: usize,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("GT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".gt-data"));

        let bind_addr = env_parsed("GT_BIND_ADDR", DEFAULT_BIND_ADDR)
            .parse()
            .unwrap_or_else(|_| {
                warn!("invalid GT_BIND_ADDR, falling back to {}", DEFAULT_BIND_ADDR);
                DEFAULT_BIND_ADDR.parse().expect("default bind addr parses")
            });

        let allowed_origin =
            std::env::var("GT_ALLOWED_ORIGIN").unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGIN.into());

        Self {
            data_dir,
            bind_addr,
            allowed_origin,
            create_gate_capacity: env_usize(
                "GT_CREATE_GATE_CAPACITY",
                DEFAULT_CREATE_GATE_CAPACITY,
            ),
            worker_pool_size: env_usize("GT_WORKER_POOL_SIZE", DEFAULT_WORKER_POOL_SIZE),
        }
    }
}

fn env_parsed(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<usize>() {
            Ok(value) if value > 0 => value,
            _ => {
                warn!("invalid value {:?} for {}, using default {}", raw, key, default);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_usize_rejects_garbage_and_zero() {
        std::env::set_var("GT_TEST_CAPACITY_A", "not a number");
        assert_eq!(env_usize("GT_TEST_CAPACITY_A", 5), 5);

        std::env::set_var("GT_TEST_CAPACITY_B", "0");
        assert_eq!(env_usize("GT_TEST_CAPACITY_B", 5), 5);

        std::env::set_var("GT_TEST_CAPACITY_C", "8");
        assert_eq!(env_usize("GT_TEST_CAPACITY_C", 5), 8);
    }

    #[test]
    fn test_env_usize_defaults_when_unset() {
        assert_eq!(env_usize("GT_TEST_CAPACITY_UNSET", 10), 10);
    }
}
