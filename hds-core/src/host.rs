//! External collaborator traits.
//!
//! The transport, the XML tree, and the base64 codec are all host-provided
//! capabilities rather than owned implementations — `hds-core` depends only on
//! these narrow interfaces, never on a concrete HTTP client or XML library.
//! This mirrors the source design note: "the Fetcher and ManifestNodeProvider
//! are capability sets, implement as polymorphism over those operations."

use crate::error::Result;

/// A handle to an in-flight or completed fetch, opaque to `hds-core`.
///
/// Blanket-implemented for any `'static` type, so a `Fetcher` impl's handle
/// struct needs no explicit `impl FetchHandle for ...`. `as_any` lets the
/// same `Fetcher` downcast the handle it just minted back to its concrete
/// type in `size`/`read_exact`/`close`.
pub trait FetchHandle {
    fn as_any(&self) -> &dyn std::any::Any;
}

impl<T: std::any::Any> FetchHandle for T {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Host-provided byte-range HTTP transport.
///
/// All methods may block the calling thread: the demuxer's scheduling model is
/// single-threaded and cooperative, so a `Fetcher` call is itself
/// the suspension point. Implementations must honor `is_interrupted` between
/// blocking steps and return [`crate::error::DemuxError::Interrupted`] promptly
/// when it flips true.
pub trait Fetcher {
    /// Open `url` for reading. Returns an opaque handle.
    fn open(&self, url: &str) -> Result<Box<dyn FetchHandle>>;

    /// Total size in bytes of the resource behind `handle`, if known up front.
    fn size(&self, handle: &dyn FetchHandle) -> Result<u64>;

    /// Read exactly `buf.len()` bytes into `buf`. A short read is an error, not
    /// retried at this layer.
    fn read_exact(&self, handle: &dyn FetchHandle, buf: &mut [u8]) -> Result<()>;

    /// Release the handle and any underlying connection state.
    fn close(&self, handle: Box<dyn FetchHandle>);

    /// Polled by long operations between fetch steps; true requests early exit.
    fn is_interrupted(&self) -> bool {
        false
    }
}

/// Fetch an entire resource in one call: open, size, read_exact, close.
///
/// A thin convenience built only out of the four primitives above — every
/// `Fetcher` implementation gets this for free.
pub fn fetch_all(fetcher: &dyn Fetcher, url: &str) -> Result<Vec<u8>> {
    let handle = fetcher.open(url)?;
    let len = fetcher.size(handle.as_ref())?;
    let mut buf = vec![0u8; len as usize];
    let result = fetcher.read_exact(handle.as_ref(), &mut buf);
    fetcher.close(handle);
    result?;
    Ok(buf)
}

/// A single DOM-like node from the host's manifest tree.
///
/// `ManifestParser` never parses XML itself; it walks whatever tree the host
/// hands it through this trait.
pub trait ManifestNode {
    /// Local element name (no namespace prefix), e.g. `"manifest"`, `"media"`.
    fn name(&self) -> &str;

    /// Value of an attribute on this node, if present.
    fn attr(&self, name: &str) -> Option<&str>;

    /// Concatenated text content of this node (not its descendants' markup).
    fn text(&self) -> &str;

    /// Direct element children, in document order.
    fn children(&self) -> Vec<&dyn ManifestNode>;
}

/// Host-provided base64 codec.
pub trait Base64Decoder {
    /// Decode `src` into `dst`, returning the number of decoded bytes written.
    fn decode(&self, src: &[u8], dst: &mut [u8]) -> Result<usize>;
}
