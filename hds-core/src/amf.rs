//! AMF0 `onMetaData` parser.
//!
//! Grounded on `original_source/libavformat/amfmetadata.c`: a single forward
//! cursor over a byte slice, a handful of value-type tags, and property names
//! matched case-insensitively against a fixed set of `CodecDescriptor` fields.

use crate::error::{DemuxError, Result};
use crate::types::{AudioCodec, CodecDescriptor, VideoCodec};

const AMF_NUMBER: u8 = 0x00;
const AMF_BOOL: u8 = 0x01;
const AMF_STRING: u8 = 0x02;
const AMF_OBJECT: u8 = 0x03;
const AMF_MIXED_ARRAY: u8 = 0x08;
const AMF_END_OF_OBJECT: u8 = 0x09;
const AMF_STRICT_ARRAY: u8 = 0x0A;

const END_OF_OBJECT_MARKER: [u8; 3] = [0x00, 0x00, AMF_END_OF_OBJECT];
const MAX_STRING_LEN: usize = 32 * 1024;

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn u8(&mut self) -> Result<u8> {
        if self.remaining() < 1 {
            return Err(DemuxError::MalformedAmf("unexpected end of input".into()));
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn u16be(&mut self) -> Result<u16> {
        if self.remaining() < 2 {
            return Err(DemuxError::MalformedAmf("unexpected end of input".into()));
        }
        let v = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    fn u32be(&mut self) -> Result<u32> {
        if self.remaining() < 4 {
            return Err(DemuxError::MalformedAmf("unexpected end of input".into()));
        }
        let v = u32::from_be_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn f64be(&mut self) -> Result<f64> {
        if self.remaining() < 8 {
            return Err(DemuxError::MalformedAmf("unexpected end of input".into()));
        }
        let v = f64::from_be_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(DemuxError::MalformedAmf("unexpected end of input".into()));
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Read a 16-bit-length-prefixed UTF-8 string.
    fn string(&mut self) -> Result<String> {
        let len = self.u16be()? as usize;
        if len > MAX_STRING_LEN {
            return Err(DemuxError::MalformedAmf(format!(
                "string length {len} exceeds {MAX_STRING_LEN} byte bound"
            )));
        }
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| DemuxError::MalformedAmf(format!("invalid UTF-8 string: {e}")))
    }

    /// Read the type-tagged string value used for the outer `onMetaData` name.
    fn string_value(&mut self) -> Result<String> {
        let tag = self.u8()?;
        if tag != AMF_STRING {
            return Err(DemuxError::MalformedAmf(format!(
                "expected string tag 0x02, got {tag:#04x}"
            )));
        }
        self.string()
    }
}

/// Parse an AMF0-encoded `onMetaData` payload into a `CodecDescriptor`.
pub fn parse_amf_metadata(buf: &[u8]) -> Result<CodecDescriptor> {
    if buf.is_empty() {
        return Ok(CodecDescriptor::default());
    }

    let mut cur = Cursor::new(buf);
    let name = cur.string_value()?;
    if !name.eq_ignore_ascii_case("onMetaData") {
        return Err(DemuxError::MalformedAmf(format!(
            "expected onMetaData, got {name:?}"
        )));
    }

    let mut descriptor = CodecDescriptor::default();
    parse_value(&mut cur, &mut descriptor, Some(&name))?;
    Ok(descriptor)
}

fn parse_value(cur: &mut Cursor, descriptor: &mut CodecDescriptor, name: Option<&str>) -> Result<()> {
    let tag = cur.u8()?;
    match tag {
        AMF_NUMBER => {
            let value = cur.f64be()?;
            if let Some(name) = name {
                assign_number(descriptor, name, value);
            }
        }
        AMF_BOOL => {
            let value = cur.u8()? as f64;
            if let Some(name) = name {
                assign_number(descriptor, name, value);
            }
        }
        AMF_STRING => {
            let value = cur.string()?;
            if let Some(name) = name {
                assign_string(descriptor, name, &value);
            }
        }
        AMF_OBJECT => parse_object(cur, descriptor)?,
        AMF_MIXED_ARRAY => {
            cur.u32be()?; // array size, unused
            parse_object(cur, descriptor)?;
        }
        AMF_STRICT_ARRAY => {
            let len = cur.u32be()?;
            for _ in 0..len {
                if cur.at_eof() {
                    break;
                }
                parse_value(cur, descriptor, None)?;
            }
        }
        other => {
            return Err(DemuxError::MalformedAmf(format!(
                "unsupported AMF0 value tag {other:#04x}"
            )));
        }
    }
    Ok(())
}

fn parse_object(cur: &mut Cursor, descriptor: &mut CodecDescriptor) -> Result<()> {
    while !cur.at_eof() {
        let name = cur.string()?;
        if name.is_empty() {
            // Empty property name terminates the object: the following byte
            // must be the end-of-object marker (0x09).
            let marker = cur.u8()?;
            if marker != AMF_END_OF_OBJECT {
                return Err(DemuxError::MalformedAmf(
                    "expected end-of-object marker after empty property name".into(),
                ));
            }
            return Ok(());
        }

        parse_value(cur, descriptor, Some(&name))?;
    }
    Ok(())
}

fn assign_number(descriptor: &mut CodecDescriptor, name: &str, value: f64) {
    let v = value as i64;
    match_lower(name, |lower| match lower.as_str() {
        "width" => descriptor.width = Some(v.max(0) as u32),
        "height" => descriptor.height = Some(v.max(0) as u32),
        "framerate" => descriptor.frame_rate = Some(v.max(0) as u32),
        "videodatarate" => descriptor.video_rate_kbps = Some(v.max(0) as u32),
        "audiosamplerate" => descriptor.audio_sample_rate = Some(v.max(0) as u32),
        "audiochannels" => descriptor.audio_channels = Some(v.max(0) as u32),
        "stereo" => descriptor.audio_channels = Some(if v != 0 { 2 } else { 1 }),
        "audiodatarate" => descriptor.audio_rate_kbps = Some(v.max(0) as u32),
        "audiocodecid" => {
            if v == 10 {
                descriptor.audio_codec = Some(AudioCodec::Aac);
            }
        }
        "videocodecid" => {
            if v == 7 {
                descriptor.video_codec = Some(VideoCodec::Avc);
            }
        }
        _ => {}
    });
}

fn assign_string(descriptor: &mut CodecDescriptor, name: &str, value: &str) {
    match_lower(name, |lower| match lower.as_str() {
        "audiocodecid" => {
            if value.eq_ignore_ascii_case("mp4a") || value.eq_ignore_ascii_case("aac") {
                descriptor.audio_codec = Some(AudioCodec::Aac);
            }
        }
        "videocodecid" => {
            if value.eq_ignore_ascii_case("avc1") || value.eq_ignore_ascii_case("h264") {
                descriptor.video_codec = Some(VideoCodec::Avc);
            }
        }
        _ => {}
    });
}

fn match_lower(name: &str, f: impl FnOnce(&String)) {
    let lower = name.to_ascii_lowercase();
    f(&lower);
}
