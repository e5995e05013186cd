use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

/// Command line options.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct Cli {
    /// Base directory for the database and session file.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Path to the SQLite database (overrides data-dir placement).
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// Enable or disable logging (true/false).
    #[arg(long)]
    pub logging: Option<bool>,
    /// Path to configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Runtime configuration resolved from file, env and CLI.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base directory for local data.
    pub data_dir: PathBuf,
    /// SQLite database path.
    pub db_path: PathBuf,
    /// Whether verbose logging is enabled.
    pub logging_enabled: bool,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    storage: FileStorage,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Deserialize, Default)]
struct FileStorage {
    data_dir: Option<PathBuf>,
    db: Option<PathBuf>,
}

#[derive(Deserialize)]
struct FileLogging {
    #[serde(default = "default_logging")]
    enabled: bool,
}

fn default_logging() -> bool {
    true
}

impl Default for FileLogging {
    fn default() -> Self {
        Self {
            enabled: default_logging(),
        }
    }
}

impl Config {
    /// Resolve configuration from CLI, environment variables, config file and defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        // built-in defaults
        let mut data_dir: Option<PathBuf> = None;
        let mut db: Option<PathBuf> = None;
        let mut logging = default_logging();

        // config file path precedence: CLI -> ENV -> default
        let config_path = cli
            .config
            .clone()
            .or_else(|| std::env::var("BIZCONNECT_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config/bizconnect.toml"));

        if let Ok(bytes) = fs::read(&config_path) {
            let contents = String::from_utf8_lossy(&bytes);
            let file_cfg: FileConfig = toml::from_str(&contents).context("invalid config file")?;
            data_dir = file_cfg.storage.data_dir;
            db = file_cfg.storage.db;
            logging = file_cfg.logging.enabled;
        }

        // environment overrides
        if let Ok(d) = std::env::var("BIZCONNECT_DATA_DIR") {
            data_dir = Some(PathBuf::from(d));
        }
        if let Ok(l) = std::env::var("BIZCONNECT_LOGGING") {
            if let Ok(l) = l.parse::<bool>() {
                logging = l;
            }
        }

        // CLI overrides
        if let Some(d) = &cli.data_dir {
            data_dir = Some(d.clone());
        }
        if let Some(d) = &cli.db {
            db = Some(d.clone());
        }
        if let Some(l) = cli.logging {
            logging = l;
        }

        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let db_path = db.unwrap_or_else(|| data_dir.join("bizconnect.db"));

        Ok(Self {
            data_dir,
            db_path,
            logging_enabled: logging,
        })
    }

    /// Where the signed-in session blob lives.
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }
}

/// Determine the default data directory.
pub fn default_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        let mut p = PathBuf::from(home);
        p.push(".local/share/bizconnect");
        p
    } else {
        PathBuf::from("./bizconnect_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    fn clean_env() {
        std::env::remove_var("BIZCONNECT_CONFIG");
        std::env::remove_var("BIZCONNECT_DATA_DIR");
        std::env::remove_var("BIZCONNECT_LOGGING");
    }

    #[test]
    #[serial]
    fn valid_config_parses() {
        clean_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "[storage]\ndata_dir=\"/tmp/bc\"\n[logging]\nenabled=false\n").unwrap();
        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        let cfg = Config::load(&cli).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/bc"));
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/bc/bizconnect.db"));
        assert_eq!(cfg.session_path(), PathBuf::from("/tmp/bc/session.json"));
        assert!(!cfg.logging_enabled);
    }

    #[test]
    #[serial]
    fn missing_keys_defaults() {
        clean_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "").unwrap();
        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        let cfg = Config::load(&cli).unwrap();
        assert_eq!(cfg.data_dir, default_data_dir());
        assert!(cfg.logging_enabled);
    }

    #[test]
    #[serial]
    fn precedence_cli_env_file() {
        clean_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "[storage]\ndata_dir=\"/tmp/from-file\"\n").unwrap();
        std::env::set_var("BIZCONNECT_DATA_DIR", "/tmp/from-env");
        let cli = Cli {
            config: Some(path),
            data_dir: Some(PathBuf::from("/tmp/from-cli")),
            ..Default::default()
        };
        let cfg = Config::load(&cli).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/from-cli"));
        std::env::remove_var("BIZCONNECT_DATA_DIR");
    }

    #[test]
    #[serial]
    fn env_beats_file() {
        clean_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "[storage]\ndata_dir=\"/tmp/from-file\"\n").unwrap();
        std::env::set_var("BIZCONNECT_DATA_DIR", "/tmp/from-env");
        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        let cfg = Config::load(&cli).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/from-env"));
        std::env::remove_var("BIZCONNECT_DATA_DIR");
    }

    #[test]
    #[serial]
    fn explicit_db_path_wins_over_data_dir_placement() {
        clean_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "").unwrap();
        let cli = Cli {
            config: Some(path),
            data_dir: Some(PathBuf::from("/tmp/bc")),
            db: Some(PathBuf::from("/var/lib/bc.db")),
            ..Default::default()
        };
        let cfg = Config::load(&cli).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/var/lib/bc.db"));
    }

    #[test]
    #[serial]
    fn logging_toggle() {
        clean_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "[logging]\nenabled=false\n").unwrap();
        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        let cfg = Config::load(&cli).unwrap();
        assert!(!cfg.logging_enabled);
    }
}
