//! Exercises `DemuxerCore` against a `Fetcher` backed by real files on disk
//! instead of an in-memory map, proving the trait boundary holds for a
//! filesystem-based host as well as an HTTP-based one (`hds-cli` supplies the
//! latter). Fixtures are written to `tempfile::NamedTempFile`s per call.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use hds_core::error::{DemuxError, Result};
use hds_core::host::{Base64Decoder, FetchHandle, Fetcher, ManifestNode};
use hds_core::DemuxerCore;

struct FileHandle(PathBuf);

struct FileFetcher {
    dir: TempDir,
    files: RefCell<HashMap<String, PathBuf>>,
}

impl FileFetcher {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            files: RefCell::new(HashMap::new()),
        }
    }

    /// Register `url` as resolving to a freshly written file containing `bytes`.
    fn put(&self, url: &str, bytes: &[u8]) {
        let path = self.dir.path().join(url.replace(['/', ':', '?'], "_"));
        fs::write(&path, bytes).unwrap();
        self.files.borrow_mut().insert(url.to_string(), path);
    }
}

impl Fetcher for FileFetcher {
    fn open(&self, url: &str) -> Result<Box<dyn FetchHandle>> {
        let path = self
            .files
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| DemuxError::IoFatal(format!("no fixture registered for {url}")))?;
        Ok(Box::new(FileHandle(path)))
    }

    fn size(&self, handle: &dyn FetchHandle) -> Result<u64> {
        let handle = handle.as_any().downcast_ref::<FileHandle>().unwrap();
        Ok(fs::metadata(&handle.0).map_err(|e| DemuxError::IoFatal(e.to_string()))?.len())
    }

    fn read_exact(&self, handle: &dyn FetchHandle, buf: &mut [u8]) -> Result<()> {
        let handle = handle.as_any().downcast_ref::<FileHandle>().unwrap();
        let data = fs::read(&handle.0).map_err(|e| DemuxError::IoFatal(e.to_string()))?;
        if data.len() != buf.len() {
            return Err(DemuxError::IoFatal("short read from fixture file".into()));
        }
        buf.copy_from_slice(&data);
        Ok(())
    }

    fn close(&self, _handle: Box<dyn FetchHandle>) {}
}

struct IdentityBase64;
impl Base64Decoder for IdentityBase64 {
    fn decode(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let n = src.len().min(dst.len());
        dst[..n].copy_from_slice(&src[..n]);
        Ok(n)
    }
}

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

fn box_header(btype: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&((8 + body.len()) as u32).to_be_bytes());
    v.extend_from_slice(btype);
    v.extend_from_slice(body);
    v
}

fn minimal_abst(fragments_per_segment: u32) -> Vec<u8> {
    let asrt_body = {
        let mut v = vec![0u8, 0, 0, 0, 0];
        v.extend_from_slice(&1u32.to_be_bytes());
        v.extend_from_slice(&1u32.to_be_bytes());
        v.extend_from_slice(&fragments_per_segment.to_be_bytes());
        v
    };
    let afrt_body = {
        let mut v = vec![0u8, 0, 0, 0];
        v.extend_from_slice(&1000u32.to_be_bytes());
        v.push(0);
        v.extend_from_slice(&1u32.to_be_bytes());
        v.extend_from_slice(&1u32.to_be_bytes());
        v.extend_from_slice(&0u64.to_be_bytes());
        v.extend_from_slice(&4000u32.to_be_bytes());
        v
    };
    let mut body = vec![0u8, 0, 0, 0];
    body.extend_from_slice(&1u32.to_be_bytes());
    body.push(0);
    body.extend_from_slice(&1000u32.to_be_bytes());
    body.extend_from_slice(&0u64.to_be_bytes());
    body.extend_from_slice(&0u64.to_be_bytes());
    body.push(0);
    body.push(0);
    body.push(0);
    body.push(0);
    body.push(0);
    body.push(1);
    body.extend_from_slice(&box_header(b"asrt", &asrt_body));
    body.push(1);
    body.extend_from_slice(&box_header(b"afrt", &afrt_body));
    box_header(b"abst", &body)
}

#[test]
fn demuxer_opens_against_a_filesystem_backed_fetcher() {
    let root = Node::new("manifest")
        .child(Node::new("streamType"))
        .child(
            Node::new("bootstrapInfo")
                .attr("id", "bootstrap1")
                .attr("url", "bootstrap.abst"),
        )
        .child(
            Node::new("media")
                .attr("bitrate", "300")
                .attr("url", "300Kbps")
                .attr("bootstrapInfoId", "bootstrap1"),
        );

    let fetcher = FileFetcher::new();
    fetcher.put("https://h/x/bootstrap.abst", &minimal_abst(5));
    let decoder = IdentityBase64;

    let core = DemuxerCore::open("https://h/x/y.f4m", &root, &fetcher, &decoder).unwrap();
    assert_eq!(core.programs.len(), 1);
    assert_eq!(core.programs[0].name, "Bandwidth: 300 Kbps");
}
