//! Runtime configuration.
//!
//! Settings come from three layers, lowest precedence first: built-in
//! defaults, an optional `kg-cwl.toml`, and `KG_CWL_*` environment
//! variables. Command-line flags are applied on top by the caller.

use crate::core::error::KgCwlError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "kg-cwl.toml";
pub const DEFAULT_API_URL: &str = "https://model-validation-api.apps.ebrains.eu";
pub const DEFAULT_OUTPUT_FILE: &str = "input.json";
pub const DEFAULT_INSTRUCTION: &str = "./run";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HANDLE_HOST: &str = "core.kg.ebrains.eu";

pub const ENV_API_URL: &str = "KG_CWL_API_URL";
pub const ENV_WORKDIR: &str = "KG_CWL_WORKDIR";

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub descriptor: DescriptorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Hosts, besides the registry's own, that may receive the bearer token
    /// when a lazy `@id` handle is fetched. Always over https.
    pub handle_hosts: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            handle_hosts: vec![DEFAULT_HANDLE_HOST.to_string()],
        }
    }
}

/// Descriptor defaults. Every list here lands in the output even when empty.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct DescriptorConfig {
    pub output_file: String,
    pub workdir: Option<String>,
    pub instruction: String,
    pub workflow_run: Option<String>,
    pub workflow_data: Option<String>,
    pub pre_instruction: Vec<String>,
    pub pip_install: Vec<String>,
    pub module_deps: Vec<String>,
    pub profiling: Vec<String>,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            workdir: None,
            instruction: DEFAULT_INSTRUCTION.to_string(),
            workflow_run: None,
            workflow_data: None,
            pre_instruction: Vec::new(),
            pip_install: Vec::new(),
            module_deps: Vec::new(),
            profiling: Vec::new(),
        }
    }
}

impl Config {
    /// Overlay environment overrides. `lookup` is injected so tests never
    /// touch the process environment.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.registry.base_url = url;
        }
        if let Some(dir) = lookup(ENV_WORKDIR).filter(|v| !v.trim().is_empty()) {
            self.descriptor.workdir = Some(dir);
        }
        self
    }

    pub fn with_process_env(self) -> Self {
        self.with_env(|key| std::env::var(key).ok())
    }
}

pub fn parse_config(content: &str) -> Result<Config, KgCwlError> {
    toml::from_str(content).map_err(|e| KgCwlError::ConfigError(e.to_string()))
}

/// Load config from an explicit path, or from `kg-cwl.toml` under `cwd`.
///
/// An explicit path must exist. The implicit file is optional: no file
/// means built-in defaults.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<Config, KgCwlError> {
    let config_path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(KgCwlError::ConfigError(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => {
            let implicit = cwd.join(CONFIG_FILE_NAME);
            if !implicit.exists() {
                return Ok(Config::default());
            }
            implicit
        }
    };

    tracing::debug!(path = %config_path.display(), "loading config");
    let content = fs::read_to_string(&config_path)?;
    parse_config(&content)
}
