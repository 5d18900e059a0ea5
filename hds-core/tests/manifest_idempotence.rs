//! Parsing the same manifest twice yields deep-equal `Manifest`s (spec §8).

use hds_core::host::{Base64Decoder, ManifestNode};
use hds_core::manifest::parse_manifest;

struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Node>,
}

impl Node {
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
    fn child(mut self, c: Node) -> Self {
        self.children.push(c);
        self
    }
}

impl ManifestNode for Node {
    fn name(&self) -> &str {
        &self.name
    }
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
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
    fn decode(&self, src: &[u8], dst: &mut [u8]) -> hds_core::error::Result<usize> {
        let n = src.len().min(dst.len());
        dst[..n].copy_from_slice(&src[..n]);
        Ok(n)
    }
}

fn build_manifest() -> Node {
    Node::new("manifest")
        .child(Node::new("id").text("my-stream"))
        .child(Node::new("streamType").text("vod"))
        .child(
            Node::new("bootstrapInfo")
                .attr("id", "bs1")
                .attr("url", "bootstrap.abst"),
        )
        .child(
            Node::new("media")
                .attr("bitrate", "800")
                .attr("url", "800Kbps")
                .attr("bootstrapInfoId", "bs1")
                .child(Node::new("metadata").text("abcd")),
        )
}

#[test]
fn parsing_twice_yields_deep_equal_manifests() {
    let decoder = IdentityBase64;
    let root = build_manifest();

    let first = parse_manifest(&root, &decoder).unwrap();
    let second = parse_manifest(&root, &decoder).unwrap();

    assert_eq!(format!("{first:?}"), format!("{second:?}"));
}

#[test]
fn every_variant_bootstrap_id_resolves() {
    let decoder = IdentityBase64;
    let root = build_manifest();
    let manifest = parse_manifest(&root, &decoder).unwrap();

    for variant in &manifest.variants {
        let matches: Vec<_> = manifest
            .bootstraps
            .iter()
            .filter(|b| b.id == variant.bootstrap_id)
            .collect();
        assert_eq!(matches.len(), 1, "bootstrap_id must resolve to exactly one descriptor");
    }
}
