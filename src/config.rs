//! Architecture configuration.
//!
//! Parameters are loaded in priority order:
//! 1. The file named by `VPU_EMU_CONFIG`, if set
//! 2. Project-local `vpu-emu.toml`
//! 3. User config (`~/.config/vpu-emu/config.toml`)
//! 4. Built-in defaults (the reference machine)
//!
//! # Config File Format
//!
//! ```toml
//! # vpu-emu.toml
//! vlen = 4096          # bits per vector register
//! nr_lanes = 4
//! nr_banks = 8
//! data_width = 64      # bits per bank word
//! mem_base = 0xE0000000
//! mem_depth = 409600   # 64-bit words
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Machine parameters of the modeled vector unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Bits per architectural vector register.
    pub vlen: u64,

    /// Number of lanes in the register file.
    pub nr_lanes: u32,

    /// Banks per lane.
    pub nr_banks: u32,

    /// Bits per bank word.
    pub data_width: u32,

    /// Base byte address of main memory.
    pub mem_base: u64,

    /// Main memory size in 64-bit words.
    pub mem_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vlen: 4096,
            nr_lanes: 4,
            nr_banks: 8,
            data_width: 64,
            mem_base: 0xE000_0000,
            mem_depth: 409_600,
        }
    }
}

impl Config {
    /// Load configuration from the highest-priority available source.
    ///
    /// The first readable config file wins whole; there is no field-level
    /// merging across files.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("VPU_EMU_CONFIG") {
            if let Some(config) = Self::load_from_file(Path::new(&path)) {
                return config;
            }
            log::warn!("VPU_EMU_CONFIG set but {path} was not usable; falling back");
        }

        if let Some(config) = Self::load_from_file(Path::new("vpu-emu.toml")) {
            return config;
        }

        if let Some(path) = Self::user_config_path() {
            if let Some(config) = Self::load_from_file(&path) {
                return config;
            }
        }

        Self::default()
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Path of the user config file.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("vpu-emu").join("config.toml"))
    }
}
