//! Common environment variables uses by various components

use log::warn;
use once_cell::sync::OnceCell;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

pub const ENV_NAME_SERVER_CAPACITY: &str = "SERVER_CAPACITY";
pub const DEFAULT_SERVER_CAPACITY: u64 = 50_000_000;
static SERVER_CAPACITY: OnceCell<u64> = OnceCell::new();

pub const ENV_NAME_BASE_RESPONSE_TIME_MS: &str = "BASE_RESPONSE_TIME_MS";
pub const DEFAULT_BASE_RESPONSE_TIME_MS: u32 = 50;
static BASE_RESPONSE_TIME_MS: OnceCell<u32> = OnceCell::new();

pub const ENV_NAME_METRICS_INTERVAL_MS: &str = "METRICS_INTERVAL_MS";
pub const DEFAULT_METRICS_INTERVAL_MS: u64 = 250;

pub const ENV_NAME_PULSE_INTERVAL_MS: &str = "PULSE_INTERVAL_MS";
pub const DEFAULT_PULSE_INTERVAL_MS: u64 = 50;

pub const ENV_NAME_CONTROL_INTERVAL_MS: &str = "CONTROL_INTERVAL_MS";
pub const DEFAULT_CONTROL_INTERVAL_MS: u64 = 1_000;

pub const ENV_NAME_JOB_RETENTION_SECS: &str = "JOB_RETENTION_SECS";
pub const DEFAULT_JOB_RETENTION_SECS: u64 = 600;

pub const ENV_NAME_CLEANUP_INTERVAL_SECS: &str = "CLEANUP_INTERVAL_SECS";
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 30;

pub const ENV_NAME_HTTP_PORT: &str = "HTTP_ENDPOINT_PORT";
pub const DEFAULT_HTTP_PORT: u16 = 3030;
static HTTP_PORT: OnceCell<u16> = OnceCell::new();

/// Capacity of the simulated server. Zero is not a valid capacity and falls back to the default.
pub fn server_capacity() -> u64 {
    *SERVER_CAPACITY.get_or_init(|| {
        let capacity = env_or(ENV_NAME_SERVER_CAPACITY, DEFAULT_SERVER_CAPACITY);
        if capacity == 0 {
            warn!(
                "{} can not be 0, using {}",
                ENV_NAME_SERVER_CAPACITY, DEFAULT_SERVER_CAPACITY
            );
            DEFAULT_SERVER_CAPACITY
        } else {
            capacity
        }
    })
}

pub fn base_response_time_ms() -> u32 {
    *BASE_RESPONSE_TIME_MS.get_or_init(|| {
        env_or(ENV_NAME_BASE_RESPONSE_TIME_MS, DEFAULT_BASE_RESPONSE_TIME_MS)
    })
}

pub fn metrics_interval_ms() -> u64 {
    interval_or(ENV_NAME_METRICS_INTERVAL_MS, DEFAULT_METRICS_INTERVAL_MS)
}

pub fn pulse_interval_ms() -> u64 {
    interval_or(ENV_NAME_PULSE_INTERVAL_MS, DEFAULT_PULSE_INTERVAL_MS)
}

pub fn control_interval_ms() -> u64 {
    interval_or(ENV_NAME_CONTROL_INTERVAL_MS, DEFAULT_CONTROL_INTERVAL_MS)
}

/// How long finished jobs and their snapshots stay queryable
pub fn job_retention_secs() -> u64 {
    env_or(ENV_NAME_JOB_RETENTION_SECS, DEFAULT_JOB_RETENTION_SECS)
}

pub fn cleanup_interval_secs() -> u64 {
    interval_or(ENV_NAME_CLEANUP_INTERVAL_SECS, DEFAULT_CLEANUP_INTERVAL_SECS)
}

pub fn http_port() -> u16 {
    *HTTP_PORT.get_or_init(|| env_or(ENV_NAME_HTTP_PORT, DEFAULT_HTTP_PORT))
}

// tokio intervals panic on a zero period
fn interval_or(name: &str, default: u64) -> u64 {
    match env_or(name, default) {
        0 => default,
        val => val,
    }
}

fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match env::var(name) {
        Ok(val) => T::from_str(val.trim()).unwrap_or_else(|_| {
            warn!("invalid value {} for {}, using {}", val, name, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn interval_from_env() {
        env::set_var(ENV_NAME_PULSE_INTERVAL_MS, "20");
        assert_eq!(pulse_interval_ms(), 20);
        env::set_var(ENV_NAME_PULSE_INTERVAL_MS, "0");
        assert_eq!(pulse_interval_ms(), DEFAULT_PULSE_INTERVAL_MS);
        env::set_var(ENV_NAME_PULSE_INTERVAL_MS, "fast");
        assert_eq!(pulse_interval_ms(), DEFAULT_PULSE_INTERVAL_MS);
        env::remove_var(ENV_NAME_PULSE_INTERVAL_MS);
        assert_eq!(pulse_interval_ms(), DEFAULT_PULSE_INTERVAL_MS);
    }

    #[test]
    #[serial]
    fn defaults_without_env() {
        env::remove_var(ENV_NAME_METRICS_INTERVAL_MS);
        env::remove_var(ENV_NAME_CONTROL_INTERVAL_MS);
        assert_eq!(metrics_interval_ms(), 250);
        assert_eq!(control_interval_ms(), 1_000);
    }

    #[test]
    #[serial]
    fn retention_from_env() {
        env::remove_var(ENV_NAME_JOB_RETENTION_SECS);
        assert_eq!(job_retention_secs(), DEFAULT_JOB_RETENTION_SECS);
        env::set_var(ENV_NAME_JOB_RETENTION_SECS, "5");
        assert_eq!(job_retention_secs(), 5);
        env::remove_var(ENV_NAME_JOB_RETENTION_SECS);

        env::set_var(ENV_NAME_CLEANUP_INTERVAL_SECS, "0");
        assert_eq!(cleanup_interval_secs(), DEFAULT_CLEANUP_INTERVAL_SECS);
        env::remove_var(ENV_NAME_CLEANUP_INTERVAL_SECS);
    }
}
