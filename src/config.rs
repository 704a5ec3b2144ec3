//! Configuration management for atreides-sim.
//!
//! Configuration is loaded from multiple sources in priority order:
//! 1. Environment variables (`ATREIDES_NUM_CORES`, etc.)
//! 2. Project-local config file (`./atreides-sim.toml`)
//! 3. User config file (`~/.config/atreides-sim/config.toml`)
//! 4. Built-in defaults
//!
//! # Config File Format
//!
//! ```toml
//! # atreides-sim.toml
//!
//! # Hardware variant: "v1" (8-bit addresses) or "v2" (12-bit addresses)
//! variant = "v1"
//!
//! num_cores = 2
//! threads_per_block = 4
//! data_channels = 4
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Global cached configuration.
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Largest block the register file can index (`%threadIdx` is 4 bits wide).
pub const MAX_THREADS_PER_BLOCK: usize = 16;

/// Errors resolving a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be at least 1")]
    Zero { field: &'static str },

    #[error("threads_per_block = {0} exceeds the maximum of {MAX_THREADS_PER_BLOCK}")]
    TooManyThreads(usize),

    #[error("{field} = {bits} is outside the supported 1..=16 address bits")]
    AddressBits { field: &'static str, bits: u32 },

    #[error("unknown variant '{0}' (expected v1 or v2)")]
    UnknownVariant(String),

    #[error("{arbiter} arbiter serves {actual} consumers, expected {expected}")]
    ArbiterShape {
        arbiter: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Shipped hardware variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// 8-bit program and data addresses.
    #[default]
    V1,
    /// 12-bit program and data addresses.
    V2,
}

impl Variant {
    /// Program/data address width.
    pub fn addr_bits(self) -> u32 {
        match self {
            Variant::V1 => 8,
            Variant::V2 => 12,
        }
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" => Ok(Variant::V1),
            "v2" => Ok(Variant::V2),
            _ => Err(ConfigError::UnknownVariant(s.to_string())),
        }
    }
}

/// Resolved hardware and simulation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    /// Compute cores.
    pub num_cores: usize,
    /// Thread slots per core (`%blockDim`).
    pub threads_per_block: usize,
    /// Program address width (also the PC width).
    pub program_addr_bits: u32,
    /// Data address width.
    pub data_addr_bits: u32,
    /// Program memory channels.
    pub program_channels: usize,
    /// Data memory channels.
    pub data_channels: usize,
    /// Extra cycles before memory answers a channel request.
    pub memory_latency: u32,
    /// Cycle budget for `Gpu::run`.
    pub max_cycles: u64,
    /// Fail runs in which a block's threads disagree on the next PC.
    pub strict_convergence: bool,
    /// Systolic array edge length.
    pub array_size: usize,
    /// Arrays per systolic cluster.
    pub num_arrays: usize,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            num_cores: 2,
            threads_per_block: 4,
            program_addr_bits: Variant::V1.addr_bits(),
            data_addr_bits: Variant::V1.addr_bits(),
            program_channels: 1,
            data_channels: 4,
            memory_latency: 0,
            max_cycles: 100_000,
            strict_convergence: false,
            array_size: 4,
            num_arrays: 2,
        }
    }
}

impl GpuConfig {
    /// Defaults with the address widths of a variant.
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            program_addr_bits: variant.addr_bits(),
            data_addr_bits: variant.addr_bits(),
            ..Self::default()
        }
    }

    /// Check every parameter is buildable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("num_cores", self.num_cores),
            ("threads_per_block", self.threads_per_block),
            ("program_channels", self.program_channels),
            ("data_channels", self.data_channels),
            ("array_size", self.array_size),
            ("num_arrays", self.num_arrays),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.threads_per_block > MAX_THREADS_PER_BLOCK {
            return Err(ConfigError::TooManyThreads(self.threads_per_block));
        }
        for (field, bits) in [
            ("program_addr_bits", self.program_addr_bits),
            ("data_addr_bits", self.data_addr_bits),
        ] {
            if !(1..=16).contains(&bits) {
                return Err(ConfigError::AddressBits { field, bits });
            }
        }
        Ok(())
    }
}

/// Layered configuration file contents.
///
/// Every field is optional so files and environment variables can override
/// each other field by field before being resolved into a [`GpuConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub variant: Option<Variant>,
    pub num_cores: Option<usize>,
    pub threads_per_block: Option<usize>,
    pub program_addr_bits: Option<u32>,
    pub data_addr_bits: Option<u32>,
    pub program_channels: Option<usize>,
    pub data_channels: Option<usize>,
    pub memory_latency: Option<u32>,
    pub max_cycles: Option<u64>,
    pub strict_convergence: Option<bool>,
    pub array_size: Option<usize>,
    pub num_arrays: Option<usize>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Project-local `atreides-sim.toml`
    /// 3. User config `~/.config/atreides-sim/config.toml`
    /// 4. Defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }

        if let Some(local_config) = Self::load_local_config() {
            config.merge(local_config);
        }

        // Environment variables override everything
        config.apply_env_overrides();

        config
    }

    /// Get the cached global configuration.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(|| {
            let config = Self::load();
            log::debug!("Loaded configuration: {:?}", config);
            config
        })
    }

    /// Resolve into hardware parameters and validate them.
    ///
    /// The variant preset is applied first; explicit address widths win over it.
    pub fn resolve(&self) -> Result<GpuConfig, ConfigError> {
        let mut gpu = GpuConfig::for_variant(self.variant.unwrap_or_default());
        macro_rules! take {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field {
                    gpu.$field = value;
                })*
            };
        }
        take!(
            num_cores,
            threads_per_block,
            program_addr_bits,
            data_addr_bits,
            program_channels,
            data_channels,
            memory_latency,
            max_cycles,
            strict_convergence,
            array_size,
            num_arrays
        );
        gpu.validate()?;
        Ok(gpu)
    }

    /// Load a config file, reporting errors instead of skipping the file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load user configuration from ~/.config/atreides-sim/config.toml
    fn load_user_config() -> Option<Self> {
        let config_path = Self::user_config_path()?;
        Self::load_from_file(&config_path)
    }

    /// Load project-local configuration from ./atreides-sim.toml
    fn load_local_config() -> Option<Self> {
        let local_path = Path::new("atreides-sim.toml");
        if let Some(config) = Self::load_from_file(local_path) {
            return Some(config);
        }

        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let project_path = Path::new(&manifest_dir).join("atreides-sim.toml");
            if let Some(config) = Self::load_from_file(&project_path) {
                return Some(config);
            }
        }

        None
    }

    /// Load an optional config file; problems are logged and the file skipped.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match Self::from_file(path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                Some(config)
            }
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    }

    /// Merge another config into this one.
    /// Only overrides fields that are Some in the other config.
    pub fn merge(&mut self, other: Self) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        overlay!(
            variant,
            num_cores,
            threads_per_block,
            program_addr_bits,
            data_addr_bits,
            program_channels,
            data_channels,
            memory_latency,
            max_cycles,
            strict_convergence,
            array_size,
            num_arrays
        );
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        fn env<T: FromStr>(name: &str) -> Option<T> {
            let raw = std::env::var(name).ok()?;
            match raw.trim().parse() {
                Ok(value) => {
                    log::info!("Using {} from environment: {}", name, raw);
                    Some(value)
                }
                Err(_) => {
                    log::warn!("Ignoring {}: cannot parse '{}'", name, raw);
                    None
                }
            }
        }

        macro_rules! from_env {
            ($($field:ident => $name:literal),* $(,)?) => {
                $(if let Some(value) = env($name) {
                    self.$field = Some(value);
                })*
            };
        }
        from_env!(
            variant => "ATREIDES_VARIANT",
            num_cores => "ATREIDES_NUM_CORES",
            threads_per_block => "ATREIDES_THREADS_PER_BLOCK",
            program_addr_bits => "ATREIDES_PROGRAM_ADDR_BITS",
            data_addr_bits => "ATREIDES_DATA_ADDR_BITS",
            program_channels => "ATREIDES_PROGRAM_CHANNELS",
            data_channels => "ATREIDES_DATA_CHANNELS",
            memory_latency => "ATREIDES_MEMORY_LATENCY",
            max_cycles => "ATREIDES_MAX_CYCLES",
            strict_convergence => "ATREIDES_STRICT_CONVERGENCE",
            array_size => "ATREIDES_ARRAY_SIZE",
            num_arrays => "ATREIDES_NUM_ARRAYS",
        );
    }

    /// Get the path to the user config file (for display/creation).
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("atreides-sim").join("config.toml"))
    }

    /// Generate a sample config file content.
    pub fn sample_config() -> String {
        r#"# atreides-sim configuration
# Place this file at ~/.config/atreides-sim/config.toml or ./atreides-sim.toml

# Hardware variant: "v1" (8-bit addresses) or "v2" (12-bit addresses)
variant = "v1"

# Compute cores and thread slots per core
num_cores = 2
threads_per_block = 4

# Memory controller channels
program_channels = 1
data_channels = 4

# Extra cycles before external memory answers a request
# memory_latency = 0

# Cycle budget for a kernel run
# max_cycles = 100000

# Treat divergent branches inside a block as an error
# strict_convergence = false

# Systolic cluster geometry
# array_size = 4
# num_arrays = 2
"#
        .to_string()
    }
}
