//! Shade Configuration
//!
//! Shared configuration crate for the Shade client and CLI.
//!
//! Handles loading configuration from:
//! 1. SHADE_CONFIG env var (explicit path)
//! 2. ./config.toml (current directory)
//! 3. ~/.shade/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<ShadeConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".shade";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_NETWORK: &str = "devnet";
const DEFAULT_RPC_URL: &str = "http://127.0.0.1:5050/rpc";
const DEFAULT_POOL_ADDRESS: &str = "0x0";
const DEFAULT_DEPOSIT_EVENT: &str = "DepositExecuted";
const DEFAULT_COORDINATOR_URL: &str = "http://127.0.0.1:3000";

const DEFAULT_COORDINATOR_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CHUNK_SIZE: u64 = 1_000;
const DEFAULT_TREE_DEPTH: usize = 20;
const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DEPOSIT_POLL_INTERVAL_MS: u64 = 2_000;
const DEFAULT_DEPOSIT_POLL_ATTEMPTS: u32 = 30;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadeConfig {
    #[serde(default = "default_network")]
    pub default_network: String,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub fallback: FallbackTomlConfig,
    #[serde(default = "default_networks")]
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Default for ShadeConfig {
    fn default() -> Self {
        Self {
            default_network: DEFAULT_NETWORK.into(),
            coordinator: CoordinatorConfig::default(),
            fallback: FallbackTomlConfig::default(),
            networks: default_networks(),
        }
    }
}

fn default_network() -> String {
    DEFAULT_NETWORK.into()
}

fn default_networks() -> BTreeMap<String, NetworkConfig> {
    BTreeMap::from([(DEFAULT_NETWORK.to_string(), NetworkConfig::default())])
}

/// Proof coordinator (fast path)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_coordinator_timeout")]
    pub timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: DEFAULT_COORDINATOR_TIMEOUT_MS,
        }
    }
}

fn default_coordinator_timeout() -> u64 {
    DEFAULT_COORDINATOR_TIMEOUT_MS
}

/// Local reconstruction (slow path)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackTomlConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    #[serde(default = "default_tree_depth")]
    pub tree_depth: usize,
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
    /// Deadline for the whole slow path; unset means no deadline
    #[serde(default)]
    pub slow_path_timeout_secs: Option<u64>,
    #[serde(default = "default_poll_interval")]
    pub deposit_poll_interval_ms: u64,
    #[serde(default = "default_poll_attempts")]
    pub deposit_poll_attempts: u32,
}

impl Default for FallbackTomlConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            tree_depth: DEFAULT_TREE_DEPTH,
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
            slow_path_timeout_secs: None,
            deposit_poll_interval_ms: DEFAULT_DEPOSIT_POLL_INTERVAL_MS,
            deposit_poll_attempts: DEFAULT_DEPOSIT_POLL_ATTEMPTS,
        }
    }
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}
fn default_tree_depth() -> usize {
    DEFAULT_TREE_DEPTH
}
fn default_rpc_timeout() -> u64 {
    DEFAULT_RPC_TIMEOUT_SECS
}
fn default_poll_interval() -> u64 {
    DEFAULT_DEPOSIT_POLL_INTERVAL_MS
}
fn default_poll_attempts() -> u32 {
    DEFAULT_DEPOSIT_POLL_ATTEMPTS
}

/// One deployment of the privacy pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_pool_address")]
    pub pool_address: String,
    /// Name of the deposit event; its selector is the first event key
    #[serde(default = "default_deposit_event")]
    pub deposit_event: String,
    /// Block the pool was deployed at
    #[serde(default)]
    pub from_block: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.into(),
            pool_address: DEFAULT_POOL_ADDRESS.into(),
            deposit_event: DEFAULT_DEPOSIT_EVENT.into(),
            from_block: 0,
        }
    }
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.into()
}
fn default_pool_address() -> String {
    DEFAULT_POOL_ADDRESS.into()
}
fn default_deposit_event() -> String {
    DEFAULT_DEPOSIT_EVENT.into()
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Source of override values; the process environment outside tests
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Set field from lookup if present
fn env_string(lookup: Lookup<'_>, key: &str, field: &mut String) {
    if let Some(v) = lookup(key) {
        *field = v;
    }
}

/// Set Option<String> from lookup if present
fn env_option_string(lookup: Lookup<'_>, key: &str, field: &mut Option<String>) {
    if let Some(v) = lookup(key) {
        *field = Some(v);
    }
}

/// Set field from lookup if present and parseable
fn env_parse<T: std::str::FromStr>(lookup: Lookup<'_>, key: &str, field: &mut T) {
    if let Some(parsed) = lookup(key).and_then(|v| v.parse().ok()) {
        *field = parsed;
    }
}

/// Set Option<T> from lookup if present and parseable
fn env_parse_option<T: std::str::FromStr>(lookup: Lookup<'_>, key: &str, field: &mut Option<T>) {
    if let Some(parsed) = lookup(key).and_then(|v| v.parse().ok()) {
        *field = Some(parsed);
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl ShadeConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check SHADE_CONFIG env var
        if let Ok(path) = env::var("SHADE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check ./config.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.shade/config.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(&process_env);
    }

    fn apply_overrides(&mut self, lookup: Lookup<'_>) {
        env_string(lookup, "SHADE_NETWORK", &mut self.default_network);
        self.apply_network_overrides(lookup);

        // Coordinator
        env_option_string(lookup, "SHADE_COORDINATOR_URL", &mut self.coordinator.url);
        env_parse(
            lookup,
            "SHADE_COORDINATOR_TIMEOUT_MS",
            &mut self.coordinator.timeout_ms,
        );

        // Fallback
        env_parse(lookup, "SHADE_CHUNK_SIZE", &mut self.fallback.chunk_size);
        env_parse(lookup, "SHADE_TREE_DEPTH", &mut self.fallback.tree_depth);
        env_parse(
            lookup,
            "SHADE_RPC_TIMEOUT_SECS",
            &mut self.fallback.rpc_timeout_secs,
        );
        env_parse_option(
            lookup,
            "SHADE_SLOW_PATH_TIMEOUT_SECS",
            &mut self.fallback.slow_path_timeout_secs,
        );
    }

    /// Overrides for the active network. Env alone can define a network
    /// that has no TOML section.
    fn apply_network_overrides(&mut self, lookup: Lookup<'_>) {
        const NETWORK_VARS: [&str; 4] = [
            "SHADE_RPC_URL",
            "SHADE_POOL_ADDRESS",
            "SHADE_DEPOSIT_EVENT",
            "SHADE_FROM_BLOCK",
        ];
        if !self.networks.contains_key(&self.default_network)
            && !NETWORK_VARS.iter().any(|key| lookup(*key).is_some())
        {
            return;
        }

        let network = self
            .networks
            .entry(self.default_network.clone())
            .or_default();
        env_string(lookup, "SHADE_RPC_URL", &mut network.rpc_url);
        env_string(lookup, "SHADE_POOL_ADDRESS", &mut network.pool_address);
        env_string(lookup, "SHADE_DEPOSIT_EVENT", &mut network.deposit_event);
        env_parse(lookup, "SHADE_FROM_BLOCK", &mut network.from_block);
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.coordinator.url = Some(DEFAULT_COORDINATOR_URL.into());
        sample.fallback.slow_path_timeout_secs = Some(120);
        toml::to_string_pretty(&sample).unwrap_or_default()
    }

    /// Settings for a named network
    pub fn network(&self, name: &str) -> Option<&NetworkConfig> {
        self.networks.get(name)
    }

    /// Settings for `default_network`
    pub fn active_network(&self) -> Result<&NetworkConfig> {
        self.network(&self.default_network)
            .ok_or_else(|| anyhow!("Network '{}' is not configured", self.default_network))
    }

    pub fn coordinator_timeout(&self) -> Duration {
        Duration::from_millis(self.coordinator.timeout_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback.rpc_timeout_secs)
    }

    pub fn slow_path_timeout(&self) -> Option<Duration> {
        self.fallback.slow_path_timeout_secs.map(Duration::from_secs)
    }

    pub fn deposit_poll_interval(&self) -> Duration {
        Duration::from_millis(self.fallback.deposit_poll_interval_ms)
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static ShadeConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Try to get the global config instance.
    ///
    /// Returns `None` if config hasn't been initialized yet.
    pub fn try_global() -> Option<&'static ShadeConfig> {
        GLOBAL_CONFIG.get()
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: ShadeConfig) -> Result<(), ShadeConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `ShadeConfig::global()`.
#[inline]
pub fn global_config() -> &'static ShadeConfig {
    ShadeConfig::global()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ShadeConfig::default();
        assert_eq!(config.default_network, DEFAULT_NETWORK);
        assert_eq!(config.coordinator.timeout_ms, DEFAULT_COORDINATOR_TIMEOUT_MS);
        assert_eq!(config.fallback.tree_depth, DEFAULT_TREE_DEPTH);
        assert!(config.coordinator.url.is_none());
        assert_eq!(config.active_network().unwrap().rpc_url, DEFAULT_RPC_URL);
    }

    #[test]
    fn test_generate_sample() {
        let sample = ShadeConfig::generate_sample();
        assert!(sample.contains("[coordinator]"));
        assert!(sample.contains("[fallback]"));
        assert!(sample.contains("[networks.devnet]"));
    }

    #[test]
    fn test_parse_sample() {
        let sample = ShadeConfig::generate_sample();
        let parsed: ShadeConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.coordinator.url.as_deref(), Some(DEFAULT_COORDINATOR_URL));
        assert_eq!(parsed.slow_path_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: ShadeConfig = toml::from_str(
            r#"
            default_network = "sepolia"

            [networks.sepolia]
            pool_address = "0x123"
            "#,
        )
        .unwrap();

        let network = parsed.active_network().unwrap();
        assert_eq!(network.pool_address, "0x123");
        assert_eq!(network.deposit_event, DEFAULT_DEPOSIT_EVENT);
        assert_eq!(parsed.fallback.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(parsed.network("devnet").is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[fallback]\nchunk_size = 250").unwrap();

        let config = ShadeConfig::load_from(file.path()).unwrap();
        assert_eq!(config.fallback.chunk_size, 250);
    }

    #[test]
    fn test_load_from_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is = = not toml").unwrap();
        assert!(ShadeConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SHADE_NETWORK", "mainnet"),
            ("SHADE_RPC_URL", "https://rpc.example"),
            ("SHADE_COORDINATOR_URL", "https://coord.example"),
            ("SHADE_CHUNK_SIZE", "50"),
            ("SHADE_TREE_DEPTH", "not-a-number"),
            ("SHADE_SLOW_PATH_TIMEOUT_SECS", "9"),
        ]);
        let lookup = |key: &str| vars.get(key).map(|v| v.to_string());

        let mut config = ShadeConfig::default();
        config.apply_overrides(&lookup);

        assert_eq!(config.default_network, "mainnet");
        assert_eq!(config.active_network().unwrap().rpc_url, "https://rpc.example");
        assert_eq!(config.coordinator.url.as_deref(), Some("https://coord.example"));
        assert_eq!(config.fallback.chunk_size, 50);
        assert_eq!(config.fallback.tree_depth, DEFAULT_TREE_DEPTH, "unparseable values are ignored");
        assert_eq!(config.slow_path_timeout(), Some(Duration::from_secs(9)));
    }

    #[test]
    fn test_missing_network() {
        let vars: HashMap<&str, &str> = HashMap::from([("SHADE_NETWORK", "nowhere")]);
        let lookup = |key: &str| vars.get(key).map(|v| v.to_string());

        let mut config = ShadeConfig::default();
        config.apply_overrides(&lookup);
        assert!(config.active_network().is_err());
        assert!(config.network("nowhere").is_none());
    }
}
