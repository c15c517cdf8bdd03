//! Configuration management for archseek.
//!
//! This module provides configuration loading, saving, and defaults.
//! Configuration is stored in TOML format in a platform-appropriate location.

use crate::error::{ArchseekError, Result};
use crate::search::SearchOptions;
use crate::types::CaseMode;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure for archseek.
///
/// ## Example Configuration File (archseek.toml)
///
/// ```toml
/// [general]
/// log_level = "info"
///
/// [search]
/// case_mode = "insensitive"
/// match_prefix = "root/"
/// parallel_index_threshold = 50000
///
/// [extraction]
/// enabled = true
/// output_dir = "/cases/2024-117/extracted"
///
/// [report]
/// write_csv = true
/// write_json = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Index and pattern matching
    pub search: SearchConfig,

    /// Writing matched members to disk
    pub extraction: ExtractionConfig,

    /// Run report outputs
    pub report: ReportConfig,
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            log_level: "info".to_string(),
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Casing discipline for names and patterns
    pub case_mode: CaseMode,

    /// Prefix prepended to pattern and candidate before glob matching
    pub match_prefix: String,

    /// Member count above which the index is built in parallel shards
    pub parallel_index_threshold: usize,

    /// Compiled pattern size limit in bytes
    pub regex_size_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            case_mode: CaseMode::Insensitive,
            match_prefix: "root/".to_string(),
            parallel_index_threshold: 50_000,
            regex_size_limit: crate::glob::DEFAULT_SIZE_LIMIT,
        }
    }
}

/// Extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Extract matched members after each run
    pub enabled: bool,

    /// Root for run directories (None = default data location)
    pub output_dir: Option<PathBuf>,

    /// Copy buffer size in bytes
    pub buffer_size: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            enabled: false,
            output_dir: None,
            buffer_size: crate::archive::DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Report configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Write the summary and detail CSV files
    pub write_csv: bool,

    /// Write the full report as JSON
    pub write_json: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            write_csv: true,
            write_json: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default config if no config file exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }

        info!(path = %path.display(), "Loading configuration");
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents).map_err(|e| ArchseekError::Config {
            reason: format!("Failed to parse config: {}", e),
        })?;

        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Saving configuration");
        let contents = toml::to_string_pretty(self).map_err(|e| ArchseekError::Config {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "archseek").ok_or_else(|| ArchseekError::Config {
            reason: "Could not determine config directory".to_string(),
        })?;

        Ok(dirs.config_dir().join("archseek.toml"))
    }

    /// Get the default data directory path.
    pub fn default_data_dir() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "archseek").ok_or_else(|| ArchseekError::Config {
            reason: "Could not determine data directory".to_string(),
        })?;

        Ok(dirs.data_dir().to_path_buf())
    }

    /// Get the directory run outputs are written under (from config or default).
    pub fn runs_dir(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.extraction.output_dir {
            Ok(path.clone())
        } else {
            Ok(Self::default_data_dir()?.join("runs"))
        }
    }

    /// Search engine options derived from the `[search]` section.
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            case: self.search.case_mode,
            match_prefix: self.search.match_prefix.clone(),
            regex_size_limit: self.search.regex_size_limit,
        }
    }
}
