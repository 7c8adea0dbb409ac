//! # Configuration
//!
//! Loaded from a TOML file, one positional path argument per binary
//! (`fathom-send config.toml`, `fathom-recv config.toml`). Validation
//! happens once, at startup, before any socket is opened — any failure is
//! a fatal [`TransferError::Config`].

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::TransferError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub max_packet_size: u64,
    pub link_bandwidth: u64,
    #[serde(default)]
    pub sender: SenderSection,
    #[serde(default)]
    pub receiver: ReceiverSection,
    pub network: NetworkSection,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SenderSection {
    #[serde(default = "default_peer_id")]
    pub id: String,
    #[serde(default = "default_window_size")]
    pub window_size: u32,
    pub source_file: Option<PathBuf>,
    #[serde(default = "default_fast_retransmit_gap")]
    pub fast_retransmit_gap: u64,
    #[serde(default = "default_thresh_max_factor")]
    pub thresh_max_factor: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReceiverSection {
    #[serde(default = "default_peer_id")]
    pub id: String,
    pub write_location: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSection {
    pub prop_delay: f64,
    pub bind_addr: SocketAddr,
    pub peer_addr: SocketAddr,
}

fn default_peer_id() -> String {
    "default".to_string()
}

fn default_window_size() -> u32 {
    4
}

fn default_fast_retransmit_gap() -> u64 {
    2
}

fn default_thresh_max_factor() -> f64 {
    1.25
}

impl Config {
    pub fn load(path: &std::path::Path) -> Result<Self, TransferError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TransferError::Config(format!("reading {}: {e}", path.display())))?;
        let config: Config = toml::from_str(&text)
            .map_err(|e| TransferError::Config(format!("parsing {}: {e}", path.display())))?;
        Ok(config)
    }

    fn validate_common(&self) -> Result<(), TransferError> {
        if self.max_packet_size == 0 {
            return Err(TransferError::Config("max_packet_size must be non-zero".into()));
        }
        if self.link_bandwidth == 0 {
            return Err(TransferError::Config("link_bandwidth must be positive".into()));
        }
        if self.network.prop_delay < 0.0 {
            return Err(TransferError::Config("network.prop_delay must be non-negative".into()));
        }
        Ok(())
    }

    pub fn validate_for_sender(&self) -> Result<(), TransferError> {
        self.validate_common()?;
        if self.sender.window_size == 0 {
            return Err(TransferError::Config("sender.window_size must be non-zero".into()));
        }
        if !(1.25..=1.75).contains(&self.sender.thresh_max_factor) {
            return Err(TransferError::Config(
                "sender.thresh_max_factor must be in [1.25, 1.75]".into(),
            ));
        }
        match &self.sender.source_file {
            None => Err(TransferError::Config("sender.source_file is required".into())),
            Some(path) if !path.exists() => Err(TransferError::Config(format!(
                "sender.source_file {} does not exist",
                path.display()
            ))),
            Some(_) => Ok(()),
        }
    }

    pub fn validate_for_receiver(&self) -> Result<(), TransferError> {
        self.validate_common()?;
        if self.receiver.write_location.is_none() {
            return Err(TransferError::Config(
                "receiver.write_location is required".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_toml() -> String {
        r#"
max_packet_size = 1024
link_bandwidth = 1000000

[network]
prop_delay = 0.01
bind_addr = "127.0.0.1:9001"
peer_addr = "127.0.0.1:9002"
"#
        .to_string()
    }

    #[test]
    fn rejects_zero_max_packet_size() {
        let mut text = base_toml();
        text = text.replace("max_packet_size = 1024", "max_packet_size = 0");
        let cfg: Config = toml::from_str(&text).unwrap();
        assert!(cfg.validate_for_sender().is_err());
    }

    #[test]
    fn sender_requires_source_file() {
        let cfg: Config = toml::from_str(&base_toml()).unwrap();
        assert!(cfg.validate_for_sender().is_err());
    }

    #[test]
    fn receiver_requires_write_location() {
        let cfg: Config = toml::from_str(&base_toml()).unwrap();
        assert!(cfg.validate_for_receiver().is_err());
    }

    #[test]
    fn accepts_valid_receiver_config() {
        let mut text = base_toml();
        text.push_str("\n[receiver]\nwrite_location = \"/tmp/out.bin\"\n");
        let cfg: Config = toml::from_str(&text).unwrap();
        assert!(cfg.validate_for_receiver().is_ok());
    }

    #[test]
    fn defaults_apply_when_section_omitted() {
        let cfg: Config = toml::from_str(&base_toml()).unwrap();
        assert_eq!(cfg.sender.window_size, 4);
        assert_eq!(cfg.sender.fast_retransmit_gap, 2);
        assert!((cfg.sender.thresh_max_factor - 1.25).abs() < 1e-9);
    }
}
