//! User settings, stored as RON next to the working directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use tether_core::{CoreConfig, STOP_ESCALATION_DEADLINE};
use tether_engine::{AtomicFileWriter, PersistError};
use tether_logging::{tether_info, tether_warn, LogDestination};
use thiserror::Error;

pub const SETTINGS_FILENAME: &str = ".tether_settings.ron";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not serialize settings: {0}")]
    Serialize(#[from] ron::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Port name the simulated board reports.
    pub port: String,
    pub stop_deadline_ms: u64,
    pub log_destination: LogDestination,
    pub verbose: bool,
    /// JSON board image to load at start and write back on exit.
    pub board_image: Option<PathBuf>,
    /// Where `backup` without an explicit path puts its archive.
    pub backup_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            stop_deadline_ms: STOP_ESCALATION_DEADLINE.as_millis() as u64,
            log_destination: LogDestination::File,
            verbose: false,
            board_image: None,
            backup_dir: PathBuf::from("backups"),
        }
    }
}

impl Settings {
    pub fn core_config(&self) -> CoreConfig {
        CoreConfig {
            stop_deadline: Duration::from_millis(self.stop_deadline_ms),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

pub fn settings_path(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_FILENAME)
}

/// Missing or unreadable settings fall back to defaults.
pub fn load_settings(dir: &Path) -> Settings {
    let path = settings_path(dir);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Settings::default(),
        Err(err) => {
            tether_warn!("Failed to read settings from {}: {}", path.display(), err);
            return Settings::default();
        }
    };

    match ron::from_str::<Settings>(&content) {
        Ok(settings) => settings,
        Err(err) => {
            tether_warn!("Failed to parse settings from {}: {}", path.display(), err);
            Settings::default()
        }
    }
}

pub fn save_settings(dir: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let path = settings_path(dir);
    let content = ron::ser::to_string_pretty(settings, PrettyConfig::new())?;
    AtomicFileWriter::write(&path, content.as_bytes())?;
    tether_info!("Saved settings to {}", path.display());
    Ok(())
}
