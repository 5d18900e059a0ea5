//! Orchestrates manifest parsing, bootstrap loading, and per-variant fragment
//! pumping behind an `open`/`read_packet`/`close` surface.
//!
//! Grounded on `original_source/libavformat/hdsdec.c`'s `hds_read_header`
//! (→ [`DemuxerCore::open`]), `hds_read_packet`/`get_next_packet`/
//! `get_next_fragment`/`read_next_sample`/`clear_samples`
//! (→ [`DemuxerCore::read_packet`]), and `hds_close` (→ [`DemuxerCore::close`]).
//! `create_streams`/`create_media`/`create_pmt`/`initialize_context` ground
//! the stream/program bookkeeping built during `open`.

use bytes::Bytes;

use crate::amf;
use crate::bootstrap;
use crate::error::{DemuxError, Result};
use crate::host::{Base64Decoder, Fetcher, ManifestNode};
use crate::manifest;
use crate::scheduler::{self, ScheduleOutcome};
use crate::tagstream;
use crate::types::{AudioCodec, BootstrapInfo, Manifest, SampleKind, VariantCursor, VideoCodec};
use crate::url;

/// One registered elementary stream, mirroring an `AVStream` slot: the host
/// can mark it `discard` to opt out of the variant it belongs to — this is
/// the demuxer's sole ABR lever: adaptive bitrate switching is out of scope,
/// so a host selects one variant by discarding every other one's streams.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    pub kind: SampleKind,
    pub discard: bool,
}

/// One playback program grouping a variant's video and audio stream indices
/// under a display name (`create_pmt`'s `AVProgram`).
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub video_stream_index: Option<usize>,
    pub audio_stream_index: Option<usize>,
}

/// A decoded sample ready to hand to the host, with its destination stream.
#[derive(Debug, Clone)]
pub struct Packet {
    pub stream_index: usize,
    pub dts_ms: u32,
    pub data: Bytes,
}

struct VariantState {
    url: String,
    bootstrap_id: String,
    video_stream_index: Option<usize>,
    audio_stream_index: Option<usize>,
    cursor: VariantCursor,
}

/// True if `filename` looks like an HDS manifest, mirroring `hds_probe`.
pub fn probe_filename(filename: &str) -> bool {
    filename.to_ascii_lowercase().contains(".f4m")
}

pub struct DemuxerCore {
    opener_url: String,
    base_url: String,
    is_live: bool,
    manifest: Manifest,
    bootstraps: Vec<BootstrapInfo>,
    variants: Vec<VariantState>,
    pub streams: Vec<StreamDescriptor>,
    pub programs: Vec<Program>,
}

impl DemuxerCore {
    /// Parse the manifest, resolve every bootstrap (inline or fetched), parse
    /// every variant's codec metadata, and register streams and programs.
    pub fn open(
        opener_url: &str,
        manifest_root: &dyn ManifestNode,
        fetcher: &dyn Fetcher,
        decoder: &dyn Base64Decoder,
    ) -> Result<Self> {
        let base_url = url::base_url(opener_url).ok_or_else(|| {
            DemuxError::MalformedManifest(format!(
                "cannot derive a base url from opener url {opener_url:?}"
            ))
        })?;

        let manifest = manifest::parse_manifest(manifest_root, decoder)?;

        let mut bootstraps = Vec::with_capacity(manifest.bootstraps.len());
        for descriptor in &manifest.bootstraps {
            let raw = match &descriptor.inline_metadata {
                Some(bytes) => bytes.clone(),
                None => {
                    let bootstrap_url = descriptor.url.as_deref().ok_or_else(|| {
                        DemuxError::MalformedManifest(format!(
                            "bootstrapInfo {:?} has neither inline metadata nor a url",
                            descriptor.id
                        ))
                    })?;
                    let fetch_url =
                        url::construct_bootstrap_url(&base_url, bootstrap_url, opener_url);
                    Bytes::from(crate::host::fetch_all(fetcher, &fetch_url)?)
                }
            };
            let parsed = bootstrap::parse_boxes(&raw)?;
            let info = parsed.bootstrap.ok_or_else(|| {
                DemuxError::MalformedBox(format!(
                    "bootstrapInfo {:?} did not contain an abst box",
                    descriptor.id
                ))
            })?;
            bootstraps.push(info);
        }

        let mut streams = Vec::new();
        let mut variants = Vec::with_capacity(manifest.variants.len());
        for variant in &manifest.variants {
            let codec = amf::parse_amf_metadata(&variant.amf_metadata)?;

            let video_stream_index = match codec.video_codec {
                Some(VideoCodec::Avc) => {
                    streams.push(StreamDescriptor {
                        kind: SampleKind::Video,
                        discard: false,
                    });
                    Some(streams.len() - 1)
                }
                _ => {
                    tracing::warn!(variant = %variant.url, "no supported video codec, video stream not registered");
                    None
                }
            };

            let audio_stream_index = match codec.audio_codec {
                Some(AudioCodec::Aac) => {
                    streams.push(StreamDescriptor {
                        kind: SampleKind::Audio,
                        discard: false,
                    });
                    Some(streams.len() - 1)
                }
                _ => {
                    tracing::warn!(variant = %variant.url, "no supported audio codec, audio stream not registered");
                    None
                }
            };

            variants.push(VariantState {
                url: variant.url.clone(),
                bootstrap_id: variant.bootstrap_id.clone(),
                video_stream_index,
                audio_stream_index,
                cursor: VariantCursor::new(),
            });
        }

        let programs = manifest
            .variants
            .iter()
            .zip(variants.iter())
            .map(|(variant, state)| Program {
                name: format!("Bandwidth: {} Kbps", variant.bitrate_kbps),
                video_stream_index: state.video_stream_index,
                audio_stream_index: state.audio_stream_index,
            })
            .collect();

        let is_live = manifest.stream_type.is_live();

        Ok(Self {
            opener_url: opener_url.to_string(),
            base_url,
            is_live,
            manifest,
            bootstraps,
            variants,
            streams,
            programs,
        })
    }

    fn bootstrap_index_for(&self, bootstrap_id: &str) -> Option<usize> {
        self.manifest
            .bootstraps
            .iter()
            .position(|b| b.id.eq_ignore_ascii_case(bootstrap_id))
    }

    /// Find the first variant with at least one non-discarded stream and a
    /// resolvable bootstrap, mirroring `hds_read_packet`'s selection loop.
    fn select_variant(&self) -> Option<usize> {
        self.variants.iter().position(|v| {
            let video_active = v
                .video_stream_index
                .map(|i| !self.streams[i].discard)
                .unwrap_or(false);
            let audio_active = v
                .audio_stream_index
                .map(|i| !self.streams[i].discard)
                .unwrap_or(false);
            (video_active || audio_active) && self.bootstrap_index_for(&v.bootstrap_id).is_some()
        })
    }

    /// Fetch and decode the next fragment for `variant_index`, refreshing the
    /// bootstrap on live rollover, and refill that variant's sample ring.
    fn fill_fragment(&mut self, variant_index: usize, fetcher: &dyn Fetcher) -> Result<()> {
        let bootstrap_index = self
            .bootstrap_index_for(&self.variants[variant_index].bootstrap_id)
            .expect("select_variant already verified bootstrap resolves");

        loop {
            let outcome = scheduler::next_segment_fragment(
                &self.bootstraps[bootstrap_index],
                &mut self.variants[variant_index].cursor,
                self.is_live,
            );

            match outcome {
                ScheduleOutcome::EndOfStream => return Err(DemuxError::EndOfStream),
                ScheduleOutcome::RefreshBootstrap => {
                    let descriptor = &self.manifest.bootstraps[bootstrap_index];
                    let bootstrap_url = descriptor.url.as_deref().ok_or_else(|| {
                        DemuxError::MalformedManifest(
                            "live bootstrap refresh requires a url-backed bootstrapInfo".into(),
                        )
                    })?;
                    let fetch_url = url::construct_bootstrap_url(
                        &self.base_url,
                        bootstrap_url,
                        &self.opener_url,
                    );
                    let raw = crate::host::fetch_all(fetcher, &fetch_url)?;
                    let parsed = bootstrap::parse_boxes(&raw)?;
                    let refreshed = parsed.bootstrap.ok_or_else(|| {
                        DemuxError::MalformedBox("refreshed bootstrap had no abst box".into())
                    })?;
                    self.bootstraps[bootstrap_index] = refreshed;
                    scheduler::reset_after_refresh(&mut self.variants[variant_index].cursor);
                }
                ScheduleOutcome::Download { segment, fragment } => {
                    let fragment_url = url::construct_fragment_url(
                        &self.base_url,
                        &self.variants[variant_index].url,
                        segment,
                        fragment,
                        &self.opener_url,
                    );
                    let raw = crate::host::fetch_all(fetcher, &fragment_url)?;
                    let parsed = bootstrap::parse_boxes(&raw)?;
                    let media_data = parsed.media_data.ok_or_else(|| {
                        DemuxError::MalformedBox("fragment contained no mdat box".into())
                    })?;
                    let samples = tagstream::decode_tag_stream(
                        &media_data,
                        &mut self.variants[variant_index].cursor.avc_config,
                    )?;

                    self.variants[variant_index].cursor.refill(samples);
                    self.variants[variant_index].cursor.fragments_read += 1;
                    return Ok(());
                }
            }
        }
    }

    /// Produce the next packet, fetching and decoding a fragment if the
    /// selected variant's sample ring is empty. Returns `Ok(None)` on a
    /// transient fetch failure (mirrors the host-facing "no packet yet"
    /// signal) and on a clean end of stream for the selected variant.
    pub fn read_packet(&mut self, fetcher: &dyn Fetcher) -> Result<Option<Packet>> {
        let Some(variant_index) = self.select_variant() else {
            return Ok(None);
        };

        if self.variants[variant_index].cursor.is_drained() {
            match self.fill_fragment(variant_index, fetcher) {
                Ok(()) => {}
                Err(DemuxError::IoTransient(_)) => return Ok(None),
                Err(DemuxError::EndOfStream) => return Err(DemuxError::EndOfStream),
                Err(e) => return Err(e),
            }
        }

        let variant = &mut self.variants[variant_index];
        let Some(sample) = variant.cursor.pop_front() else {
            return Ok(None);
        };

        let stream_index = match sample.kind {
            SampleKind::Video => variant.video_stream_index,
            SampleKind::Audio => variant.audio_stream_index,
        };
        let Some(stream_index) = stream_index else {
            return Ok(None);
        };

        if variant.cursor.is_drained() {
            variant.cursor.refill(Vec::new());
        }

        Ok(Some(Packet {
            stream_index,
            dts_ms: sample.timestamp_ms,
            data: sample.payload,
        }))
    }

    /// No host-visible teardown work remains beyond normal drop semantics;
    /// kept for parity with the host surface's `open`/`read_packet`/`close` shape.
    pub fn close(self) {}
}
