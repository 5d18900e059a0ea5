//! `Base64Decoder` backed by the `base64` crate.
//!
//! Grounded on the same `onvif` crate's dependency on `base64` for
//! ONVIF/WS-Security digest encoding. Padding strip (`\n`/`\t`) is the
//! caller's job per `hds_core::manifest`'s design, not this decoder's — this
//! is a dumb `decode(src, dst)` capability per spec §6.

use base64::{decode_config_slice, STANDARD};

use hds_core::error::{DemuxError, Result};
use hds_core::host::Base64Decoder;

pub struct StdBase64;

impl Base64Decoder for StdBase64 {
    fn decode(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        decode_config_slice(src, STANDARD, dst)
            .map_err(|e| DemuxError::MalformedManifest(format!("invalid base64: {e}")))
    }
}
