//! Error type for the `hds-cli` binary.
//!
//! Wraps `hds_core::DemuxError` plus the errors of the concrete host
//! implementations (`reqwest`, `roxmltree`, `toml`) this binary supplies,
//! mirroring `jellyfin-hls-proxy/src/error.rs`'s single top-level `ProxyError`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("demuxer error: {0}")]
    Demux(#[from] hds_core::DemuxError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("manifest XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("config file error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
