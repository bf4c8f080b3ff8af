use std::{
    env, fs, io,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{leaderboard::DEFAULT_HISTOGRAM_BINS, models::Variant};

const CONFIG_FILE: &str = "config.ron";
const CONFIG_PATH_VAR: &str = "BASS_BASH_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not read config file {}", .path.display())]
    ReadFile {
        source: io::Error,
        path: PathBuf,
    },

    #[error("Could not parse config file {}", .path.display())]
    ParseFile {
        source: ron::error::SpannedError,
        path: PathBuf,
    },

    #[error("Environment variable {name} has invalid value {value:?}")]
    InvalidEnvar { name: &'static str, value: String },
}

/// Configuration for the dashboard server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub address: IpAddr,
    pub port: u16,
    pub variant: Variant,
    pub title: String,
    pub histogram_bins: usize,
    pub max_sessions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3030,
            variant: Variant::default(),
            title: "Bass Bash: Tagging Tournament".to_string(),
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            max_sessions: 1024,
        }
    }
}

impl Config {
    /// Loads the config file, if there is one, and applies environment
    /// overrides on top.
    pub fn load() -> Result<Self, Error> {
        let mut config = match Self::path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                debug!("No config file at {}, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|name| env::var(name).ok())?;

        Ok(config)
    }

    fn path() -> Option<PathBuf> {
        env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .or_else(default_path)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        debug!("Reading config from {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            source,
            path: path.to_path_buf(),
        })?;

        ron::from_str(&text).map_err(|source| Error::ParseFile {
            source,
            path: path.to_path_buf(),
        })
    }

    /// Overrides fields from `BASS_BASH_*` variables as returned by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = parse_var(&lookup, "BASS_BASH_ADDRESS")? {
            self.address = address;
        }
        if let Some(port) = parse_var(&lookup, "BASS_BASH_PORT")? {
            self.port = port;
        }
        if let Some(variant) = parse_var(&lookup, "BASS_BASH_VARIANT")? {
            self.variant = variant;
        }
        if let Some(bins) = parse_var(&lookup, "BASS_BASH_HISTOGRAM_BINS")? {
            self.histogram_bins = bins;
        }
        if let Some(max_sessions) = parse_var(&lookup, "BASS_BASH_MAX_SESSIONS")? {
            self.max_sessions = max_sessions;
        }

        Ok(())
    }
}

/// `config.ron` in the platform config directory, e.g.
/// `~/.config/bass-bash/config.ron` on Linux.
fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "Bass Bash", "bass-bash")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, Error>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };

    match value.trim().parse() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => Err(Error::InvalidEnvar { name, value }),
    }
}
