//! Configuration Module
//!
//! Handles loading engine and server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::loader::LoaderConfig;
use crate::registry::LruConfig;
use crate::shim::RetryPolicy;

// == Defaults ==
pub const DEFAULT_MAX_MODULE_LOAD_DEPTH: usize = 100;
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;
pub const DEFAULT_SHIM_LOAD_MAX_RETRIES: u32 = 3;
pub const DEFAULT_SHIM_LOAD_RETRY_DELAY_MS: u64 = 200;
pub const DEFAULT_MAX_MODULES: usize = 500;
/// 50 MiB
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_MAX_STYLES: usize = 100;
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Engine and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum recursion depth of a single load
    pub max_module_load_depth: usize,
    /// Maximum number of fetches outstanding at once
    pub max_concurrent_fetches: usize,
    /// Maximum number of non-preloaded modules kept in cache
    pub max_modules: usize,
    /// Memory budget for non-preloaded modules, in estimated bytes
    pub max_memory_bytes: usize,
    /// Maximum number of tracked styles
    pub max_styles: usize,
    /// Extra attempts made by the shim loader after the first failure
    pub shim_max_retries: u32,
    /// Base backoff delay for shim retries, in milliseconds
    pub shim_retry_delay_ms: u64,
    /// HTTP control plane port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_MODULE_LOAD_DEPTH` (default: 100)
    /// - `MAX_CONCURRENT_FETCHES` (default: 8)
    /// - `MAX_MODULES` (default: 500)
    /// - `MAX_MEMORY_BYTES` (default: 52428800)
    /// - `MAX_STYLES` (default: 100)
    /// - `SHIM_MAX_RETRIES` (default: 3)
    /// - `SHIM_RETRY_DELAY_MS` (default: 200)
    /// - `SERVER_PORT` (default: 3000)
    pub fn from_env() -> Self {
        Self {
            max_module_load_depth: env_or("MAX_MODULE_LOAD_DEPTH", DEFAULT_MAX_MODULE_LOAD_DEPTH),
            max_concurrent_fetches: env_or(
                "MAX_CONCURRENT_FETCHES",
                DEFAULT_MAX_CONCURRENT_FETCHES,
            ),
            max_modules: env_or("MAX_MODULES", DEFAULT_MAX_MODULES),
            max_memory_bytes: env_or("MAX_MEMORY_BYTES", DEFAULT_MAX_MEMORY_BYTES),
            max_styles: env_or("MAX_STYLES", DEFAULT_MAX_STYLES),
            shim_max_retries: env_or("SHIM_MAX_RETRIES", DEFAULT_SHIM_LOAD_MAX_RETRIES),
            shim_retry_delay_ms: env_or("SHIM_RETRY_DELAY_MS", DEFAULT_SHIM_LOAD_RETRY_DELAY_MS),
            server_port: env_or("SERVER_PORT", DEFAULT_SERVER_PORT),
        }
    }

    /// Loader settings derived from this configuration.
    pub fn loader(&self) -> LoaderConfig {
        LoaderConfig {
            max_module_load_depth: self.max_module_load_depth,
            max_concurrent_fetches: self.max_concurrent_fetches,
            ..LoaderConfig::default()
        }
    }

    /// Cache limits derived from this configuration.
    pub fn lru(&self) -> LruConfig {
        LruConfig {
            max_modules: Some(self.max_modules),
            max_memory_bytes: Some(self.max_memory_bytes),
            max_styles: Some(self.max_styles),
        }
    }

    /// Shim retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.shim_max_retries,
            base_delay: Duration::from_millis(self.shim_retry_delay_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_module_load_depth: DEFAULT_MAX_MODULE_LOAD_DEPTH,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            max_modules: DEFAULT_MAX_MODULES,
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            max_styles: DEFAULT_MAX_STYLES,
            shim_max_retries: DEFAULT_SHIM_LOAD_MAX_RETRIES,
            shim_retry_delay_ms: DEFAULT_SHIM_LOAD_RETRY_DELAY_MS,
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_module_load_depth, 100);
        assert_eq!(config.max_concurrent_fetches, 8);
        assert_eq!(config.max_modules, 500);
        assert_eq!(config.max_memory_bytes, 52_428_800);
        assert_eq!(config.max_styles, 100);
        assert_eq!(config.shim_max_retries, 3);
        assert_eq!(config.shim_retry_delay_ms, 200);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_config_from_env_defaults() {
        for name in [
            "MAX_MODULE_LOAD_DEPTH",
            "MAX_CONCURRENT_FETCHES",
            "MAX_MODULES",
            "MAX_MEMORY_BYTES",
            "MAX_STYLES",
            "SHIM_MAX_RETRIES",
            "SHIM_RETRY_DELAY_MS",
            "SERVER_PORT",
        ] {
            env::remove_var(name);
        }

        assert_eq!(Config::from_env(), Config::default());
    }

    #[test]
    fn test_config_projections() {
        let config = Config {
            max_module_load_depth: 7,
            max_concurrent_fetches: 2,
            shim_retry_delay_ms: 150,
            shim_max_retries: 2,
            ..Config::default()
        };

        let loader = config.loader();
        assert_eq!(loader.max_module_load_depth, 7);
        assert_eq!(loader.max_concurrent_fetches, 2);
        assert!(loader.preload_aliases.is_empty());

        let lru = config.lru();
        assert_eq!(lru.max_modules, Some(500));
        assert_eq!(lru.max_styles, Some(100));

        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(150));
    }
}
