//! Nested box parser for `abst` (bootstrap info), `asrt` (segment run table),
//! `afrt` (fragment run table), and `mdat` (media data) boxes.
//!
//! Grounded on `original_source/libavformat/f4fbox.c`: box headers are
//! `size:u32, type:fourcc, [extended_size:u64 if size==1]`, and each
//! `f4fbox_parse_single_box` call scopes its children to the declared size,
//! skipping any trailing unused bytes. `hds-core` reproduces this with a
//! byte-slice cursor instead of an `AVIOContext`.

use bytes::Bytes;

use crate::error::{DemuxError, Result};
use crate::types::{
    BootstrapInfo, FragmentRunEntry, FragmentRunTable, Profile, SegmentRunEntry, SegmentRunTable,
};

const MAX_TABLES: usize = 256;
const MAX_ENTRIES: usize = 1024;

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            Err(DemuxError::MalformedBox("truncated box body".into()))
        } else {
            Ok(())
        }
    }

    fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn u24be(&mut self) -> Result<u32> {
        self.need(3)?;
        let v = ((self.buf[self.pos] as u32) << 16)
            | ((self.buf[self.pos + 1] as u32) << 8)
            | (self.buf[self.pos + 2] as u32);
        self.pos += 3;
        Ok(v)
    }

    fn u32be(&mut self) -> Result<u32> {
        self.need(4)?;
        let v = u32::from_be_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn u64be(&mut self) -> Result<u64> {
        self.need(8)?;
        let v = u64::from_be_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n)?;
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    /// Read a NUL-terminated byte run, returning it as a lossy UTF-8 string.
    /// Used both for retained fields (movie_id, drm_data, metadata) and for
    /// the unused server/quality URL entries, which are read and discarded.
    fn c_string(&mut self) -> Result<String> {
        let start = self.pos;
        while self.pos < self.buf.len() && self.buf[self.pos] != 0 {
            self.pos += 1;
        }
        if self.pos >= self.buf.len() {
            return Err(DemuxError::MalformedBox("unterminated string".into()));
        }
        let s = String::from_utf8_lossy(&self.buf[start..self.pos]).into_owned();
        self.pos += 1; // consume the NUL
        Ok(s)
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

/// Output of scanning a buffer for top-level/recognized boxes: at most one
/// `abst` (with all its nested tables already folded in) and at most one
/// sibling `mdat`, exactly as `F4FBox { abst, mdat }` pairs them in the source.
#[derive(Debug, Default)]
pub struct ParsedBoxes {
    pub bootstrap: Option<BootstrapInfo>,
    pub media_data: Option<Bytes>,
}

/// Parse a buffer that may contain `abst` and/or `mdat` boxes at any depth
/// reachable from the top level (the two are always siblings in practice:
/// a bootstrap-only blob has just `abst`; a downloaded fragment has both).
pub fn parse_boxes(buf: &[u8]) -> Result<ParsedBoxes> {
    let mut cur = Cursor::new(buf);
    let mut out = ParsedBoxes::default();

    while !cur.at_eof() && cur.remaining() >= 8 {
        let start = cur.pos;
        let mut size = cur.u32be()? as u64;
        let box_type = cur.take(4)?.to_vec();
        if size == 1 {
            size = cur.u64be()?;
        }
        if size == 0 {
            return Err(DemuxError::MalformedBox("box declared zero size".into()));
        }

        let body_end = start + size as usize;
        if body_end > buf.len() {
            return Err(DemuxError::MalformedBox("box size exceeds buffer".into()));
        }
        let header_len = cur.pos - start;
        let body = &buf[cur.pos..body_end];

        match &box_type[..] {
            b"abst" => {
                out.bootstrap = Some(parse_abst(body)?);
            }
            b"mdat" => {
                out.media_data = Some(Bytes::copy_from_slice(body));
            }
            // Unknown top-level boxes are ignored silently, by design, for
            // forward compatibility.
            _ => {}
        }

        let _ = header_len;
        cur.pos = body_end;
    }

    Ok(out)
}

fn parse_abst(body: &[u8]) -> Result<BootstrapInfo> {
    let mut cur = Cursor::new(body);

    let version = cur.u8()?;
    let flags = cur.u24be()?;
    let bs_version = cur.u32be()?;

    let packed = cur.u8()?;
    let profile = Profile::from_bits((packed >> 6) & 0x03);
    let is_live = ((packed >> 5) & 0x01) != 0;
    let is_update = ((packed >> 4) & 0x01) != 0;

    let timescale = cur.u32be()?;
    let current_media_time = cur.u64be()?;
    let smpte_offset = cur.u64be()?;

    let movie_id = cur.c_string()?;

    let server_entry_count = cur.u8()?;
    for _ in 0..server_entry_count {
        cur.c_string()?; // unused server URL, discarded
    }

    let quality_entry_count = cur.u8()?;
    for _ in 0..quality_entry_count {
        cur.c_string()?; // unused quality URL, discarded
    }

    let drm_data = cur.c_string()?;
    let metadata = cur.c_string()?;

    let segment_table_count = cur.u8()? as usize;
    if segment_table_count > MAX_TABLES {
        return Err(DemuxError::TooManyEntries(format!(
            "segment run table count {segment_table_count} exceeds {MAX_TABLES}"
        )));
    }
    let mut segment_tables = Vec::with_capacity(segment_table_count);
    for _ in 0..segment_table_count {
        segment_tables.push(parse_nested_box(&mut cur, BoxKind::Asrt)?);
    }

    let fragment_table_count = cur.u8()? as usize;
    if fragment_table_count > MAX_TABLES {
        return Err(DemuxError::TooManyEntries(format!(
            "fragment run table count {fragment_table_count} exceeds {MAX_TABLES}"
        )));
    }
    let mut fragment_tables = Vec::with_capacity(fragment_table_count);
    for _ in 0..fragment_table_count {
        fragment_tables.push(parse_nested_box(&mut cur, BoxKind::Afrt)?);
    }

    if segment_tables.is_empty() || fragment_tables.is_empty() {
        return Err(DemuxError::MalformedBox(
            "abst must contain at least one asrt and one afrt".into(),
        ));
    }

    Ok(BootstrapInfo {
        version,
        flags,
        bs_version,
        profile,
        is_live,
        is_update,
        timescale,
        current_media_time,
        smpte_offset,
        movie_id,
        drm_data,
        metadata,
        segment_tables: segment_tables.into_iter().filter_map(TableOut::asrt).collect(),
        fragment_tables: fragment_tables.into_iter().filter_map(TableOut::afrt).collect(),
        media_data: None,
    })
}

enum BoxKind {
    Asrt,
    Afrt,
}

enum TableOut {
    Asrt(SegmentRunTable),
    Afrt(FragmentRunTable),
}

impl TableOut {
    fn asrt(self) -> Option<SegmentRunTable> {
        match self {
            TableOut::Asrt(t) => Some(t),
            _ => None,
        }
    }
    fn afrt(self) -> Option<FragmentRunTable> {
        match self {
            TableOut::Afrt(t) => Some(t),
            _ => None,
        }
    }
}

/// Read a child box header (`size`, fourcc, optional extended size) and parse
/// its body as the expected table kind, scoping the child cursor to its
/// declared size and skipping any unconsumed trailing bytes.
fn parse_nested_box(cur: &mut Cursor, expect: BoxKind) -> Result<TableOut> {
    let start = cur.pos;
    let mut size = cur.u32be()? as u64;
    let box_type = cur.take(4)?.to_vec();
    if size == 1 {
        size = cur.u64be()?;
    }
    if size == 0 {
        return Err(DemuxError::MalformedBox("nested box declared zero size".into()));
    }

    let body_end = start + size as usize;
    if body_end > cur.buf.len() {
        return Err(DemuxError::MalformedBox("nested box size exceeds parent".into()));
    }
    let body = &cur.buf[cur.pos..body_end];

    let result = match (&box_type[..], &expect) {
        (b"asrt", BoxKind::Asrt) => TableOut::Asrt(parse_asrt(body)?),
        (b"afrt", BoxKind::Afrt) => TableOut::Afrt(parse_afrt(body)?),
        (other, _) => {
            return Err(DemuxError::MalformedBox(format!(
                "expected asrt/afrt box, got {:?}",
                String::from_utf8_lossy(other)
            )));
        }
    };

    cur.pos = body_end;
    Ok(result)
}

fn parse_asrt(body: &[u8]) -> Result<SegmentRunTable> {
    let mut cur = Cursor::new(body);
    let version = cur.u8()?;
    let flags = cur.u24be()?;

    let quality_entry_count = cur.u8()?;
    for _ in 0..quality_entry_count {
        cur.c_string()?;
    }

    let run_count = cur.u32be()? as usize;
    if run_count > MAX_ENTRIES {
        return Err(DemuxError::TooManyEntries(format!(
            "segment run entry count {run_count} exceeds {MAX_ENTRIES}"
        )));
    }
    let mut entries = Vec::with_capacity(run_count);
    for _ in 0..run_count {
        let first_segment = cur.u32be()?;
        let fragments_per_segment = cur.u32be()?;
        entries.push(SegmentRunEntry {
            first_segment,
            fragments_per_segment,
        });
    }

    Ok(SegmentRunTable {
        version,
        flags,
        entries,
    })
}

fn parse_afrt(body: &[u8]) -> Result<FragmentRunTable> {
    let mut cur = Cursor::new(body);
    let version = cur.u8()?;
    let flags = cur.u24be()?;
    let timescale = cur.u32be()?;

    let quality_entry_count = cur.u8()?;
    for _ in 0..quality_entry_count {
        cur.c_string()?;
    }

    let run_count = cur.u32be()? as usize;
    if run_count > MAX_ENTRIES {
        return Err(DemuxError::TooManyEntries(format!(
            "fragment run entry count {run_count} exceeds {MAX_ENTRIES}"
        )));
    }
    let mut entries = Vec::with_capacity(run_count);
    for _ in 0..run_count {
        let first_fragment = cur.u32be()?;
        let first_fragment_ts = cur.u64be()?;
        let duration = cur.u32be()?;
        let discontinuity_indicator = if duration == 0 { cur.u8()? } else { 0 };
        entries.push(FragmentRunEntry {
            first_fragment,
            first_fragment_ts,
            duration,
            discontinuity_indicator,
        });
    }

    Ok(FragmentRunTable {
        version,
        flags,
        timescale,
        entries,
    })
}
