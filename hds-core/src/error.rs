//! Error taxonomy for the HDS demuxer core.

use thiserror::Error;

/// Errors produced while parsing, scheduling, or pumping an HDS session.
#[derive(Error, Debug)]
pub enum DemuxError {
    /// Manifest root was not `<manifest>`, or a required attribute/child was missing.
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    /// AMF0 payload did not match the expected tag sequence, or a string exceeded the size bound.
    #[error("malformed AMF0 metadata: {0}")]
    MalformedAmf(String),

    /// A box declared a zero size, was truncated, or nested beyond the table bounds.
    #[error("malformed box: {0}")]
    MalformedBox(String),

    /// A tag had a nonzero stream id, an unsupported filter bit, or a truncated body.
    #[error("malformed tag: {0}")]
    MalformedTag(String),

    /// A codec id was recognized as out of scope (non-AVC video, non-AAC audio).
    ///
    /// Non-fatal: `DemuxerCore` logs this via `tracing::warn!` and continues without
    /// registering the affected stream.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// A `Fetcher` I/O failure that the host may retry (maps to "no packet yet").
    #[error("transient I/O error: {0}")]
    IoTransient(String),

    /// A `Fetcher` I/O failure that is not retryable.
    #[error("fatal I/O error: {0}")]
    IoFatal(String),

    /// The host's cancellation callback fired mid-operation.
    #[error("interrupted")]
    Interrupted,

    /// VOD playback reached the end of the fragment-run table for a variant.
    #[error("end of stream")]
    EndOfStream,

    /// An allocation failure (table capacity, sample buffer, etc.).
    #[error("out of memory")]
    OutOfMemory,

    /// A bounded table (segment-run boxes, fragment-run entries, ...) exceeded its capacity.
    #[error("too many entries: {0}")]
    TooManyEntries(String),
}

/// Result type alias used throughout `hds-core`.
pub type Result<T> = std::result::Result<T, DemuxError>;
