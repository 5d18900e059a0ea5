//! Core parsing and scheduling logic for Adobe HTTP Dynamic Streaming (HDS).
//!
//! This crate has no network, XML, or base64 dependencies of its own: the
//! host supplies those capabilities through the traits in [`host`]. See
//! [`demux::DemuxerCore`] for the entry point.

pub mod amf;
pub mod bootstrap;
pub mod demux;
pub mod error;
pub mod host;
pub mod manifest;
pub mod scheduler;
pub mod tagstream;
pub mod types;
pub mod url;

pub use demux::DemuxerCore;
pub use error::{DemuxError, Result};
