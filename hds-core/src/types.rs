//! Data model shared by every component: the manifest tree, the bootstrap
//! index, per-variant codec parameters, and the decoded sample/cursor types.

use bytes::Bytes;

/// Top-level delivery mode declared by a manifest's `streamType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Live,
    Vod,
    Recorded,
}

impl StreamType {
    /// Parse a manifest `streamType` value, case-insensitively. Unknown values
    /// fall back to `Vod` (the original demuxer only special-cases `"live"`).
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => StreamType::Live,
            "recorded" => StreamType::Recorded,
            _ => StreamType::Vod,
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, StreamType::Live)
    }
}

/// A `bootstrapInfo` entry: either an inline base64 blob or a URL to fetch.
#[derive(Debug, Clone)]
pub struct BootstrapDescriptor {
    pub id: String,
    pub url: Option<String>,
    pub profile: Option<String>,
    pub inline_metadata: Option<Bytes>,
}

impl BootstrapDescriptor {
    /// A descriptor is invalid if neither a URL nor inline bytes were given.
    pub fn is_valid(&self) -> bool {
        self.url.is_some() || self.inline_metadata.is_some()
    }
}

/// A `media` entry: one quality variant of the stream.
#[derive(Debug, Clone)]
pub struct Variant {
    pub bitrate_kbps: u32,
    pub url: String,
    pub bootstrap_id: String,
    pub amf_metadata: Bytes,
}

/// The parsed manifest: immutable after `ManifestParser::parse`.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub id: String,
    pub stream_type: StreamType,
    pub bootstraps: Vec<BootstrapDescriptor>,
    pub variants: Vec<Variant>,
}

impl Manifest {
    /// Look up a bootstrap descriptor by id.
    pub fn bootstrap_by_id(&self, id: &str) -> Option<&BootstrapDescriptor> {
        self.bootstraps.iter().find(|b| b.id == id)
    }
}

/// One `{first_segment, fragments_per_segment}` run in an `asrt` box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRunEntry {
    pub first_segment: u32,
    pub fragments_per_segment: u32,
}

/// One fragment-timing run in an `afrt` box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentRunEntry {
    pub first_fragment: u32,
    pub first_fragment_ts: u64,
    pub duration: u32,
    pub discontinuity_indicator: u8,
}

/// A parsed `asrt` (segment run table) box.
#[derive(Debug, Clone, Default)]
pub struct SegmentRunTable {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<SegmentRunEntry>,
}

/// A parsed `afrt` (fragment run table) box.
#[derive(Debug, Clone, Default)]
pub struct FragmentRunTable {
    pub version: u8,
    pub flags: u32,
    pub timescale: u32,
    pub entries: Vec<FragmentRunEntry>,
}

/// Two-bit profile field packed into an `abst` box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    P0,
    P1,
    P2,
    P3,
}

impl Profile {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Profile::P0,
            1 => Profile::P1,
            2 => Profile::P2,
            _ => Profile::P3,
        }
    }
}

/// The parsed `abst` bootstrap-info box plus any `mdat` payload found alongside it.
#[derive(Debug, Clone)]
pub struct BootstrapInfo {
    pub version: u8,
    pub flags: u32,
    pub bs_version: u32,
    pub profile: Profile,
    pub is_live: bool,
    pub is_update: bool,
    pub timescale: u32,
    pub current_media_time: u64,
    pub smpte_offset: u64,
    pub movie_id: String,
    pub drm_data: String,
    pub metadata: String,
    pub segment_tables: Vec<SegmentRunTable>,
    pub fragment_tables: Vec<FragmentRunTable>,
    /// Raw payload of a sibling `mdat` box, if the parsed buffer contained one
    /// (true for a downloaded fragment; absent for a standalone bootstrap blob).
    pub media_data: Option<Bytes>,
}

/// Known audio codec, derived from AMF0 `audiocodecid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Aac,
    None,
}

/// Known video codec, derived from AMF0 `videocodecid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    Avc,
    None,
}

/// Codec parameters decoded from a variant's `onMetaData` AMF0 payload.
#[derive(Debug, Clone, Default)]
pub struct CodecDescriptor {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<u32>,
    pub audio_sample_rate: Option<u32>,
    pub audio_channels: Option<u32>,
    pub audio_rate_kbps: Option<u32>,
    pub video_rate_kbps: Option<u32>,
    pub audio_codec: AudioCodecOpt,
    pub video_codec: VideoCodecOpt,
}

/// `Option<AudioCodec>` with an explicit "known absent" default, matching the
/// an explicit audio-codec-known-absent case distinct from "not yet parsed".
pub type AudioCodecOpt = Option<AudioCodec>;
pub type VideoCodecOpt = Option<VideoCodec>;

/// Kind of an elementary media sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Audio,
    Video,
}

/// One decoded, timestamped elementary sample.
#[derive(Debug, Clone)]
pub struct MediaSample {
    pub kind: SampleKind,
    pub timestamp_ms: u32,
    pub payload: Bytes,
}

/// Holds the most recently decoded AVCDecoderConfigurationRecord's SPS/PPS,
/// each already prefixed with an Annex B start code. Lives on the variant
/// (via [`VariantCursor`]) and is replaced wholesale by a new configuration
/// record; it is not reset between fragment fetches, since an encoder may
/// send the configuration record only once for the life of the variant.
#[derive(Debug, Clone, Default)]
pub struct AvcConfig {
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
}

/// Per-variant fetch cursor: fragment-run progress, live-window state, the
/// ring of samples decoded from the most recently fetched fragment, and the
/// AVC SPS/PPS arena carried across fragment boundaries.
#[derive(Debug, Clone, Default)]
pub struct VariantCursor {
    pub fragments_read: u32,
    pub live_offset: u32,
    pub live_total: u32,
    pub sample_index: usize,
    pub samples: Vec<MediaSample>,
    pub avc_config: AvcConfig,
}

impl VariantCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once every buffered sample has been handed to the host.
    pub fn is_drained(&self) -> bool {
        self.sample_index >= self.samples.len()
    }

    /// Pop the next sample in order, if any remain.
    pub fn pop_front(&mut self) -> Option<MediaSample> {
        if self.sample_index < self.samples.len() {
            let sample = self.samples[self.sample_index].clone();
            self.sample_index += 1;
            Some(sample)
        } else {
            None
        }
    }

    /// Refill the ring with a freshly decoded fragment's samples, resetting
    /// the read cursor. Invariant: only called once the prior ring was fully
    /// drained.
    pub fn refill(&mut self, samples: Vec<MediaSample>) {
        self.samples = samples;
        self.sample_index = 0;
    }
}
