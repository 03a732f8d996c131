//! Config file commands
//!
//! Stores the default port and baud rate in
//! `<config_dir>/ranger/config.toml`.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BAUD: u32 = 115_200;

fn config_dir() -> Result<PathBuf> {
    let mut path =
        dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine config directory"))?;
    path.push("ranger");
    Ok(path)
}

pub fn config_file() -> Result<PathBuf> {
    let mut path = config_dir()?;
    path.push("config.toml");
    Ok(path)
}

/// Persistent CLI defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Serial port used when `--port` is omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    /// Baud rate used when `--baud` is omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baud: Option<u32>,
}

impl CliConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file()?)
    }

    /// Missing file means defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn baud_or_default(&self) -> u32 {
        self.baud.unwrap_or(DEFAULT_BAUD)
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Set default values
    Set {
        /// Default serial port (e.g. /dev/ttyUSB0, COM3)
        #[arg(short, long)]
        port: Option<String>,

        /// Default baud rate
        #[arg(short, long)]
        baud: Option<u32>,
    },

    /// Print a value (`port`, `baud` or `all`)
    Get {
        #[arg(default_value = "all")]
        key: String,
    },

    /// Show the config file location and contents
    Check,
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Set { port, baud } => Self::set_(port, baud),
            ConfigCommand::Get { key } => Self::get_(&key),
            ConfigCommand::Check => Self::check_(),
        }
    }

    fn set_(port: Option<String>, baud: Option<u32>) -> Result<()> {
        let mut config = CliConfig::load()?;

        if let Some(port) = port {
            println!("Default port: {}", port);
            config.port = Some(port);
        }
        if let Some(baud) = baud {
            anyhow::ensure!(baud > 0, "Baud rate must be positive");
            println!("Default baud: {}", baud);
            config.baud = Some(baud);
        }

        config.save()
    }

    fn get_(key: &str) -> Result<()> {
        let config = CliConfig::load()?;

        match key {
            "port" => println!("{}", config.port.as_deref().unwrap_or("(not set)")),
            "baud" => println!("{}", config.baud_or_default()),
            _ => {
                println!("Ranger CLI config:");
                println!("  port: {}", config.port.as_deref().unwrap_or("(not set)"));
                println!("  baud: {}", config.baud_or_default());
            },
        }
        Ok(())
    }

    fn check_() -> Result<()> {
        let path = config_file()?;
        let config = CliConfig::load_from(&path)?;

        println!("Config file: {}", path.display());
        println!("  exists: {}", path.exists());
        println!("  port: {:?}", config.port);
        println!("  baud: {:?}", config.baud);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.baud_or_default(), DEFAULT_BAUD);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = CliConfig {
            port: Some("/dev/ttyUSB1".to_string()),
            baud: Some(921_600),
        };
        config.save_to(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("port = \"/dev/ttyUSB1\""));
        assert_eq!(CliConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "baud = 57600\n").unwrap();

        let config = CliConfig::load_from(&path).unwrap();
        assert_eq!(config.port, None);
        assert_eq!(config.baud_or_default(), 57_600);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "baud = \"fast\"\n").unwrap();
        assert!(CliConfig::load_from(&path).is_err());
    }
}
