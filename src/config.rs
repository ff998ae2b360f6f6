//! Server configuration
//!
//! Every field has a default, so an empty or missing `tideway.yaml` yields the
//! stock layout: port 8888, document root `.`, `static/` and `dynamic/`
//! folders underneath it.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// File looked up in the working directory by [`Config::load`].
pub const CONFIG_FILE: &str = "tideway.yaml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// IPv4 address to bind
    pub listen_addr: String,
    pub listen_port: u16,
    pub backlog: i32,
    /// Folder containing the static and dynamic subfolders
    pub document_root: PathBuf,
    /// Subfolder served with sendfile
    pub static_folder: String,
    /// Subfolder served through kernel AIO
    pub dynamic_folder: String,
    /// Body of 404 responses, relative to the document root
    pub not_found_page: PathBuf,
    /// Bytes moved per overlapped read/write pair
    pub chunk_size: usize,
    /// Largest request head accepted before parsing is forced
    pub max_request_size: usize,
    /// Queue depth passed to io_setup
    pub aio_max_events: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8888,
            backlog: 5,
            document_root: PathBuf::from("."),
            static_folder: "static".to_string(),
            dynamic_folder: "dynamic".to_string(),
            not_found_page: PathBuf::from("404.html"),
            chunk_size: 8192,
            max_request_size: 8192,
            aio_max_events: 128,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(serde_yaml::Error),
    InvalidAddress(String),
    ZeroChunkSize,
    ZeroRequestSize,
    ZeroAioEvents,
    InvalidFolder(String),
    OverlappingFolders,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(e) => write!(f, "cannot read config: {}", e),
            ConfigError::Parse(e) => write!(f, "cannot parse config: {}", e),
            ConfigError::InvalidAddress(a) => write!(f, "not an IPv4 address: {:?}", a),
            ConfigError::ZeroChunkSize => write!(f, "chunk_size must be positive"),
            ConfigError::ZeroRequestSize => write!(f, "max_request_size must be positive"),
            ConfigError::ZeroAioEvents => write!(f, "aio_max_events must be positive"),
            ConfigError::InvalidFolder(name) => {
                write!(f, "folder name must be a single path segment: {:?}", name)
            }
            ConfigError::OverlappingFolders => {
                write!(f, "static and dynamic folders must differ")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl Config {
    /// Loads [`CONFIG_FILE`] from the working directory, or the defaults when
    /// the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // serde_yaml turns an empty document into unit, not an empty map
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let cfg: Config = serde_yaml::from_str(text).map_err(ConfigError::Parse)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_ip()?;

        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.max_request_size == 0 {
            return Err(ConfigError::ZeroRequestSize);
        }
        if self.aio_max_events == 0 {
            return Err(ConfigError::ZeroAioEvents);
        }

        for folder in [&self.static_folder, &self.dynamic_folder] {
            if !is_single_segment(folder) {
                return Err(ConfigError::InvalidFolder(folder.clone()));
            }
        }

        if self.static_folder == self.dynamic_folder {
            return Err(ConfigError::OverlappingFolders);
        }

        Ok(())
    }

    pub fn listen_ip(&self) -> Result<std::net::Ipv4Addr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.listen_addr.clone()))
    }

    /// Absolute location of the 404 body.
    pub fn not_found_path(&self) -> PathBuf {
        self.document_root.join(&self.not_found_page)
    }
}

fn is_single_segment(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}
