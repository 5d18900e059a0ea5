//! `Fetcher` backed by a blocking `reqwest` client.
//!
//! Grounded on `jellyfin-hls-proxy/src/jellyfin/client.rs`'s request-building
//! style, adapted to a blocking client: `hds_core`'s scheduling model
//! (single-threaded, cooperative) treats each `Fetcher` call itself as the
//! suspension point, so there is no async runtime to drive here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;

use hds_core::error::{DemuxError, Result};
use hds_core::host::{FetchHandle, Fetcher};

struct HttpHandle {
    data: Bytes,
}

/// A blocking HTTP byte fetcher: `open` downloads the whole resource up
/// front and `read_exact` copies it out in one call, matching `fetch_all`'s
/// single-shot usage in `hds_core::host`.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    interrupted: AtomicBool,
}

impl HttpFetcher {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            interrupted: AtomicBool::new(false),
        }
    }

    /// Signal cancellation to any `Fetcher` call currently or about to run,
    /// mirroring the host's cancellation callback in spec §5.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }
}

impl Fetcher for HttpFetcher {
    fn open(&self, url: &str) -> Result<Box<dyn FetchHandle>> {
        if self.is_interrupted() {
            return Err(DemuxError::Interrupted);
        }

        tracing::debug!(url, "fetching");
        let response = self.client.get(url).send().map_err(classify_error)?;
        if !response.status().is_success() {
            return Err(DemuxError::IoFatal(format!(
                "HTTP {} fetching {url}",
                response.status()
            )));
        }
        let data = response.bytes().map_err(classify_error)?;
        Ok(Box::new(HttpHandle { data }))
    }

    fn size(&self, handle: &dyn FetchHandle) -> Result<u64> {
        let handle = downcast(handle)?;
        Ok(handle.data.len() as u64)
    }

    fn read_exact(&self, handle: &dyn FetchHandle, buf: &mut [u8]) -> Result<()> {
        let handle = downcast(handle)?;
        if buf.len() != handle.data.len() {
            return Err(DemuxError::IoFatal(format!(
                "short read: expected {} bytes, buffer holds {}",
                handle.data.len(),
                buf.len()
            )));
        }
        buf.copy_from_slice(&handle.data);
        Ok(())
    }

    fn close(&self, _handle: Box<dyn FetchHandle>) {}

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

fn downcast(handle: &dyn FetchHandle) -> Result<&HttpHandle> {
    handle
        .as_any()
        .downcast_ref::<HttpHandle>()
        .ok_or_else(|| DemuxError::IoFatal("fetch handle from a different Fetcher".into()))
}

/// Connect/timeout failures are retryable by the host; anything else is fatal.
fn classify_error(e: reqwest::Error) -> DemuxError {
    if e.is_timeout() || e.is_connect() {
        DemuxError::IoTransient(e.to_string())
    } else {
        DemuxError::IoFatal(e.to_string())
    }
}
