//! F4M manifest parsing: walks a host-provided [`ManifestNode`] tree into a
//! [`Manifest`].
//!
//! Grounded on `original_source/libavformat/f4mmanifest.c`. The padding/length
//! helpers (`f4m_get_content_padding`/`f4m_get_content_length`) exist because
//! `libxml2` preserves the raw text node, which Adobe's encoder sometimes
//! indents with leading `\n`/`\t` before the base64 payload; `hds-core`
//! reproduces the same strip-then-decode behavior rather than trusting the
//! host's XML layer to have already normalized whitespace.

use bytes::Bytes;

use crate::error::{DemuxError, Result};
use crate::host::{Base64Decoder, ManifestNode};
use crate::types::{BootstrapDescriptor, Manifest, StreamType, Variant};

const MAX_URL_SIZE: usize = 1024;

/// Count and strip leading `\n`/`\t` bytes, matching `f4m_get_content_padding`.
fn content_padding(text: &str) -> usize {
    text.bytes()
        .take_while(|&b| b == b'\n' || b == b'\t')
        .count()
}

/// Decoded-buffer size bound: every non-padding byte, plus one (the source's
/// `result++` before the `MAX_URL_SIZE` clamp, inherited unchanged here since
/// it only ever widens the scratch buffer a base64 decode writes into).
fn content_length(text: &str) -> usize {
    let non_padding = text
        .bytes()
        .filter(|&b| b != b'\n' && b != b'\t')
        .count();
    (non_padding + 1).min(MAX_URL_SIZE)
}

/// Strip the leading padding and base64-decode the remainder via the host
/// codec, bounding the output buffer the way `f4m_get_content_length` does.
fn decode_base64_content(text: &str, decoder: &dyn Base64Decoder) -> Result<Option<Bytes>> {
    let padding = content_padding(text);
    let len = content_length(text);
    if len <= 1 {
        return Ok(None);
    }
    let src = &text.as_bytes()[padding.min(text.len())..];
    let mut dst = vec![0u8; len];
    let written = decoder.decode(src, &mut dst)?;
    dst.truncate(written);
    Ok(Some(Bytes::from(dst)))
}

fn parse_bootstrap_info_node(
    node: &dyn ManifestNode,
    decoder: &dyn Base64Decoder,
) -> Result<BootstrapDescriptor> {
    let id = node.attr("id").unwrap_or_default().to_string();
    let url = node.attr("url").map(|s| s.to_string());
    let profile = node.attr("profile").map(|s| s.to_string());

    let text = node.text();
    let inline_metadata = if text.is_empty() {
        None
    } else {
        decode_base64_content(text, decoder)?
    };

    Ok(BootstrapDescriptor {
        id,
        url,
        profile,
        inline_metadata,
    })
}

fn parse_metadata_child(node: &dyn ManifestNode, decoder: &dyn Base64Decoder) -> Result<Bytes> {
    let metadata_node = node.children().into_iter().find(|c| c.name() == "metadata");
    match metadata_node {
        Some(m) => Ok(decode_base64_content(m.text(), decoder)?.unwrap_or_default()),
        None => Ok(Bytes::new()),
    }
}

fn parse_media_node(node: &dyn ManifestNode, decoder: &dyn Base64Decoder) -> Result<Variant> {
    let bitrate_kbps = node
        .attr("bitrate")
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(0);
    let url = node.attr("url").unwrap_or_default().to_string();
    let bootstrap_id = node.attr("bootstrapInfoId").unwrap_or_default().to_string();
    let amf_metadata = parse_metadata_child(node, decoder)?;

    Ok(Variant {
        bitrate_kbps,
        url,
        bootstrap_id,
        amf_metadata,
    })
}

/// Parse a manifest document rooted at `root`, which must be named `manifest`.
pub fn parse_manifest(root: &dyn ManifestNode, decoder: &dyn Base64Decoder) -> Result<Manifest> {
    if root.name() != "manifest" {
        return Err(DemuxError::MalformedManifest(format!(
            "root element is not named manifest, name = {}",
            root.name()
        )));
    }

    let mut id = String::new();
    let mut stream_type = StreamType::Vod;
    let mut bootstraps = Vec::new();
    let mut variants = Vec::new();

    for child in root.children() {
        match child.name() {
            "id" => {
                let padding = content_padding(child.text());
                id = child.text()[padding.min(child.text().len())..].to_string();
            }
            "streamType" => {
                let padding = content_padding(child.text());
                let raw = &child.text()[padding.min(child.text().len())..];
                stream_type = StreamType::parse(raw);
            }
            "bootstrapInfo" => {
                bootstraps.push(parse_bootstrap_info_node(child, decoder)?);
            }
            "media" => {
                variants.push(parse_media_node(child, decoder)?);
            }
            _ => {}
        }
    }

    Ok(Manifest {
        id,
        stream_type,
        bootstraps,
        variants,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestNode {
        name: String,
        attrs: Vec<(String, String)>,
        text: String,
        children: Vec<TestNode>,
    }

    impl TestNode {
        fn new(name: &str) -> Self {
            Self {
                name: name.into(),
                attrs: Vec::new(),
                text: String::new(),
                children: Vec::new(),
            }
        }
        fn attr(mut self, k: &str, v: &str) -> Self {
            self.attrs.push((k.into(), v.into()));
            self
        }
        fn text(mut self, t: &str) -> Self {
            self.text = t.into();
            self
        }
        fn child(mut self, c: TestNode) -> Self {
            self.children.push(c);
            self
        }
    }

    impl ManifestNode for TestNode {
        fn name(&self) -> &str {
            &self.name
        }
        fn attr(&self, name: &str) -> Option<&str> {
            self.attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }
        fn text(&self) -> &str {
            &self.text
        }
        fn children(&self) -> Vec<&dyn ManifestNode> {
            self.children.iter().map(|c| c as &dyn ManifestNode).collect()
        }
    }

    struct IdentityBase64;
    impl Base64Decoder for IdentityBase64 {
        fn decode(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
            let n = src.len().min(dst.len());
            dst[..n].copy_from_slice(&src[..n]);
            Ok(n)
        }
    }

    #[test]
    fn rejects_non_manifest_root() {
        let root = TestNode::new("not-manifest");
        let decoder = IdentityBase64;
        assert!(matches!(
            parse_manifest(&root, &decoder),
            Err(DemuxError::MalformedManifest(_))
        ));
    }

    #[test]
    fn parses_id_stream_type_bootstrap_and_media() {
        let root = TestNode::new("manifest")
            .child(TestNode::new("id").text("my-stream"))
            .child(TestNode::new("streamType").text("live"))
            .child(
                TestNode::new("bootstrapInfo")
                    .attr("id", "bootstrap1")
                    .attr("url", "bootstrap.abst"),
            )
            .child(
                TestNode::new("media")
                    .attr("bitrate", "500")
                    .attr("url", "500Kbps")
                    .attr("bootstrapInfoId", "bootstrap1")
                    .child(TestNode::new("metadata").text("abcd")),
            );
        let decoder = IdentityBase64;
        let manifest = parse_manifest(&root, &decoder).unwrap();

        assert_eq!(manifest.id, "my-stream");
        assert!(manifest.stream_type.is_live());
        assert_eq!(manifest.bootstraps.len(), 1);
        assert_eq!(manifest.bootstraps[0].id, "bootstrap1");
        assert_eq!(manifest.bootstraps[0].url.as_deref(), Some("bootstrap.abst"));
        assert_eq!(manifest.variants.len(), 1);
        assert_eq!(manifest.variants[0].bitrate_kbps, 500);
        assert_eq!(manifest.variants[0].bootstrap_id, "bootstrap1");
    }

    #[test]
    fn strips_leading_tab_and_newline_padding_before_decoding() {
        let root = TestNode::new("manifest").child(
            TestNode::new("bootstrapInfo")
                .attr("id", "b1")
                .text("\n\tpayload"),
        );
        let decoder = IdentityBase64;
        let manifest = parse_manifest(&root, &decoder).unwrap();
        let meta = manifest.bootstraps[0].inline_metadata.as_ref().unwrap();
        assert_eq!(meta.as_ref(), b"payload");
    }

    #[test]
    fn media_without_metadata_child_gets_empty_amf_payload() {
        let root = TestNode::new("manifest").child(
            TestNode::new("media")
                .attr("bitrate", "200")
                .attr("url", "low"),
        );
        let decoder = IdentityBase64;
        let manifest = parse_manifest(&root, &decoder).unwrap();
        assert!(manifest.variants[0].amf_metadata.is_empty());
    }

    #[test]
    fn unparseable_bitrate_defaults_to_zero() {
        let root = TestNode::new("manifest").child(
            TestNode::new("media").attr("bitrate", "not-a-number").attr("url", "x"),
        );
        let decoder = IdentityBase64;
        let manifest = parse_manifest(&root, &decoder).unwrap();
        assert_eq!(manifest.variants[0].bitrate_kbps, 0);
    }
}
