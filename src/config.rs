//! Configuration loading from config.json
//!
//! Both the server and the client read the same JSON file:
//!
//! ```json
//! {
//!     "server_ip": "127.0.0.1",
//!     "server_port": 9000,
//!     "input_file": "words.txt",
//!     "k": 10,
//!     "p": 3,
//!     "num_clients": 4
//! }
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WordfeedError};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Server-wide paging constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSettings {
    /// Words per page (`k`).
    pub page_size: usize,
    /// Words per frame within a page (`p`).
    pub batch_size: usize,
}

impl PageSettings {
    /// Create settings, rejecting zero sizes.
    pub fn new(page_size: usize, batch_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(WordfeedError::Config("k (page size) must be positive".into()));
        }
        if batch_size == 0 {
            return Err(WordfeedError::Config("p (batch size) must be positive".into()));
        }
        Ok(Self {
            page_size,
            batch_size,
        })
    }
}

/// wordfeed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the server binds and clients connect to
    pub server_ip: IpAddr,
    /// TCP port
    pub server_port: u16,
    /// Document served by the server
    pub input_file: PathBuf,
    /// Page size
    pub k: usize,
    /// Batch size
    pub p: usize,
    /// Number of concurrent clients started by the harness
    #[serde(default = "default_num_clients")]
    pub num_clients: usize,
    /// Directory receiving one frequency file per client
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_num_clients() -> usize {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            WordfeedError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json(&text)?;
        tracing::debug!(path = %path.display(), ?config, "Configuration loaded");
        Ok(config)
    }

    /// Parse and validate configuration from a JSON string.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        self.page_settings()?;
        if self.num_clients == 0 {
            return Err(WordfeedError::Config("num_clients must be positive".into()));
        }
        Ok(())
    }

    /// Paging constants for the server.
    pub fn page_settings(&self) -> Result<PageSettings> {
        PageSettings::new(self.k, self.p)
    }

    /// Socket address of the server.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_ip, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "server_ip": "127.0.0.1",
        "server_port": 9000,
        "input_file": "words.txt",
        "k": 10,
        "p": 3,
        "num_clients": 4
    }"#;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_json(SAMPLE).unwrap();

        assert_eq!(config.socket_addr(), "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.input_file, PathBuf::from("words.txt"));
        assert_eq!(config.num_clients, 4);
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(
            config.page_settings().unwrap(),
            PageSettings {
                page_size: 10,
                batch_size: 3
            }
        );
    }

    #[test]
    fn test_num_clients_defaults_to_one() {
        let json = r#"{"server_ip":"0.0.0.0","server_port":1,"input_file":"f","k":1,"p":1}"#;
        let config = Config::from_json(json).unwrap();
        assert_eq!(config.num_clients, 1);
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let json = r#"{"server_ip":"0.0.0.0","server_port":1,"input_file":"f","k":0,"p":1}"#;
        assert!(matches!(Config::from_json(json), Err(WordfeedError::Config(_))));

        let json = r#"{"server_ip":"0.0.0.0","server_port":1,"input_file":"f","k":1,"p":0}"#;
        assert!(matches!(Config::from_json(json), Err(WordfeedError::Config(_))));

        let json = r#"{"server_ip":"0.0.0.0","server_port":1,"input_file":"f","k":1,"p":1,"num_clients":0}"#;
        assert!(matches!(Config::from_json(json), Err(WordfeedError::Config(_))));
    }

    #[test]
    fn test_missing_field_is_json_error() {
        let json = r#"{"server_ip":"0.0.0.0","server_port":1}"#;
        assert!(matches!(Config::from_json(json), Err(WordfeedError::Json(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/no/such/config.json");
        assert!(matches!(result, Err(WordfeedError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.k, 10);
        assert_eq!(config.p, 3);
    }
}
