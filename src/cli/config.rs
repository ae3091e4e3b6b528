use crate::cli::error::{CliError, Result};
use crate::core::DEFAULT_REPLACE_STR;
use crate::runtime::mux::CANDIDATES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings read from `config.toml`; command-line flags take priority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Placeholder replaced by each input
    #[serde(default = "default_replace_str")]
    pub replace_str: String,

    /// Worker pool size; 0 means one per CPU
    #[serde(default = "default_max_procs")]
    pub max_procs: usize,

    /// Multiplexer programs in order of preference
    #[serde(default = "default_multiplexers")]
    pub multiplexers: Vec<String>,

    /// Shell for `--shell` execution (default: `$SHELL`, then `/bin/sh`)
    pub shell: Option<String>,

    #[serde(default)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            replace_str: default_replace_str(),
            max_procs: default_max_procs(),
            multiplexers: default_multiplexers(),
            shell: None,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from an explicitly named file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CliError::configuration(format!(
                "config file {} does not exist",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Default config file path, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rxargs")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load `--config` if given, else the default file when it exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::load_from_file(path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Merge with command-line arguments, giving priority to CLI args
    pub fn merge_with_cli_args(mut self, cli_args: &crate::cli::app::Cli) -> Self {
        if let Some(ref replace_str) = cli_args.replace_str {
            self.replace_str = replace_str.clone();
        }
        if let Some(max_procs) = cli_args.max_procs {
            self.max_procs = max_procs;
        }
        if cli_args.verbose {
            self.verbose = true;
        }
        self
    }

    /// Reject values that would make every command malformed
    pub fn validate(&self) -> Result<()> {
        if self.replace_str.is_empty() {
            return Err(CliError::configuration("replace_str must not be empty"));
        }
        if self.multiplexers.is_empty() {
            return Err(CliError::configuration("multiplexers must name at least one program"));
        }
        Ok(())
    }

    /// Pool size with 0 resolved to the CPU count
    pub fn pool_size(&self) -> usize {
        match self.max_procs {
            0 => num_cpus::get(),
            n => n,
        }
    }
}

fn default_replace_str() -> String {
    DEFAULT_REPLACE_STR.to_string()
}

fn default_max_procs() -> usize {
    1
}

fn default_multiplexers() -> Vec<String> {
    CANDIDATES.iter().map(|s| s.to_string()).collect()
}
