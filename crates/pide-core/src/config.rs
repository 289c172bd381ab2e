//! Configuration and server launch
//!
//! Settings live in `config.toml` under the platform config directory:
//!
//! ```toml
//! home = "/opt/Isabelle2024"
//! args = ["-l", "HOL"]
//! cygwin_root = ""
//! languages = ["isabelle", "isabelle-ml", "bibtex"]
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::caret::{DocumentSelector, DEFAULT_LANGUAGES};

/// Options always passed to the server
const STANDARD_ARGS: [&str; 4] = ["-o", "vscode_unicode_symbols", "-o", "vscode_pide_extensions"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing user settings: isabelle.home")]
    MissingHome,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PideConfig {
    /// Installation root of the prover
    pub home: String,
    /// Extra server arguments
    pub args: Vec<String>,
    /// Alternate Cygwin root (Windows only)
    pub cygwin_root: String,
    /// Language ids whose documents the server manages
    pub languages: Vec<String>,
}

impl Default for PideConfig {
    fn default() -> Self {
        Self {
            home: String::new(),
            args: Vec::new(),
            cygwin_root: String::new(),
            languages: DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl PideConfig {
    /// Default location: `<config dir>/pide/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pide").join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the default location; a missing file yields defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.home.trim().is_empty() {
            return Err(ConfigError::MissingHome);
        }
        Ok(())
    }

    pub fn selector(&self) -> DocumentSelector {
        DocumentSelector::new(self.languages.clone())
    }
}

/// How to start the server process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ServerCommand {
    /// Build the launch command; fails if the configuration is incomplete
    pub fn from_config(config: &PideConfig, windows: bool) -> Result<Self, ConfigError> {
        config.validate()?;

        let home = Path::new(&config.home);
        let tool = home.join("bin").join("isabelle");
        let server_args = std::iter::once("vscode_server".to_string())
            .chain(STANDARD_ARGS.iter().map(|a| a.to_string()))
            .chain(config.args.iter().cloned());

        if windows {
            let cygwin_root = if config.cygwin_root.trim().is_empty() {
                home.join("contrib").join("cygwin")
            } else {
                PathBuf::from(&config.cygwin_root)
            };
            let args = ["-l".to_string(), tool.to_string_lossy().into_owned()]
                .into_iter()
                .chain(server_args)
                .collect();
            Ok(Self {
                program: cygwin_root.join("bin").join("bash"),
                args,
            })
        } else {
            Ok(Self {
                program: tool,
                args: server_args.collect(),
            })
        }
    }

    /// Command with piped stdio, ready to spawn
    pub fn command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }
}
