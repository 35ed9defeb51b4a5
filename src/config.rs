// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every field has a default, so a missing or partial config.toml still runs
// the reference dispatch: 32 floats through shaders/square.comp.spv.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub kernel: KernelConfig,
    pub debug: DebugConfig,
}

/// Instance/device settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub app_name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            app_name: "Vulkan Compute Square".to_string(),
        }
    }
}

/// Compute kernel settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Precompiled SPIR-V module
    pub path: PathBuf,
    pub entry_point: String,
    /// Must match `local_size_x` declared in the kernel
    pub local_size_x: u32,
    pub element_count: usize,
    /// Bound on the completion fence wait; unset waits forever
    pub fence_timeout_ms: Option<u64>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("shaders/square.comp.spv"),
            entry_point: "main".to_string(),
            local_size_x: 32,
            element_count: 32,
            fence_timeout_ms: None,
        }
    }
}

impl KernelConfig {
    pub fn entry_point_cstr(&self) -> Result<CString> {
        CString::new(self.entry_point.as_str())
            .with_context(|| format!("Invalid kernel entry point {:?}", self.entry_point))
    }

    pub fn fence_timeout(&self) -> Option<Duration> {
        self.fence_timeout_ms.map(Duration::from_millis)
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    /// Unset: each binary picks its own default level
    pub log_level: Option<String>,
    pub log_to_file: bool,
    pub log_file: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_level: None,
            log_to_file: false,
            log_file: "compute_debug.log".to_string(),
        }
    }
}

/// Config file read by both binaries, relative to the working directory
pub const CONFIG_PATH: &str = "config.toml";

impl Config {
    /// Load configuration from `path`, falling back to defaults if it cannot
    /// be read or parsed. Runs before logging exists, so the load error is
    /// returned for the caller to report.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<anyhow::Error>) {
        match Self::load_from_path(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        }
    }

    /// Load configuration from a specific path. A missing file is not an error.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validation is only honoured in debug builds.
    pub fn enable_validation(&self) -> bool {
        cfg!(debug_assertions) && self.debug.validation_layers
    }
}
