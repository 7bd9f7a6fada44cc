//! Record codec
//!
//! Every array write becomes one record in the binary data file and a mirrored
//! record in the structural log; every attribute write becomes one log record.
//! Lengths and counts are little-endian `u64`, each field ends with `:`.
//!
//! ```text
//! array header  "ARR:"
//!               len group ":"  len name ":"  payload_len ":"
//!               len dtype ":"  ndim dim.. ":"  order
//! data file     <array header> <payload>
//! log           <array header> <u64 record offset> "\n"
//!
//! attribute     "ATTR:" len group ":" len name ":" kind ":" value
//!               kind text|byte -> len bytes, doub -> f64, long -> i64
//! log           <attribute> "\n"
//! ```
//!
//! The order byte follows the shape field's single `:`. Older logs wrote an
//! empty field (`"::"`) before it, so their data offsets sit one byte later
//! and they do not decode with this reader.
//!
//! The payload of a column-major array is its own buffer, which is the
//! row-major image of the transposed array; readers lay it out with the
//! reversed shape and transpose back.

use crate::array::{NdArray, Order};
use crate::attr::AttrValue;
use crate::dtype::DType;
use crate::error::{ContainerError, Result};
use crate::header::FileKind;
use std::path::Path;

pub const ARRAY_TAG: &[u8] = b"ARR:";
pub const ATTR_TAG: &[u8] = b"ATTR:";

const FIELD_END: u8 = b':';
const RECORD_END: u8 = b'\n';

fn len_u64(len: usize) -> Result<u64> {
    u64::try_from(len).map_err(|_| ContainerError::SizeOverflow(len as u128))
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_sized(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    put_u64(out, len_u64(bytes.len())?);
    out.extend_from_slice(bytes);
    Ok(())
}

fn put_field(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    put_sized(out, bytes)?;
    out.push(FIELD_END);
    Ok(())
}

/// Encode the header of an array record. The payload is `array.as_bytes()`.
pub fn encode_array_header(group: &str, name: &str, array: &NdArray) -> Result<Vec<u8>> {
    let dtype = array.dtype().to_string();
    let shape = array.shape();
    let mut out = Vec::with_capacity(64 + group.len() + name.len() + 8 * shape.len());

    out.extend_from_slice(ARRAY_TAG);
    put_field(&mut out, group.as_bytes())?;
    put_field(&mut out, name.as_bytes())?;

    put_u64(&mut out, len_u64(array.as_bytes().len())?);
    out.push(FIELD_END);

    put_field(&mut out, dtype.as_bytes())?;

    put_u64(&mut out, len_u64(shape.len())?);
    for &dim in shape {
        put_u64(&mut out, dim);
    }
    out.push(FIELD_END);

    out.push(array.order().as_byte());
    Ok(out)
}

/// Log mirror of an array record: its header plus the data-file offset.
pub fn encode_array_log_record(header: &[u8], record_offset: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(header.len() + 9);
    out.extend_from_slice(header);
    put_u64(&mut out, record_offset);
    out.push(RECORD_END);
    out
}

/// Encode an attribute record including the log terminator.
pub fn encode_attr_record(group: &str, name: &str, value: &AttrValue) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(48 + group.len() + name.len());

    out.extend_from_slice(ATTR_TAG);
    put_field(&mut out, group.as_bytes())?;
    put_field(&mut out, name.as_bytes())?;
    out.extend_from_slice(value.tag());
    out.push(FIELD_END);

    match value {
        AttrValue::Text(text) => put_sized(&mut out, text.as_bytes())?,
        AttrValue::Bytes(bytes) => put_sized(&mut out, bytes)?,
        AttrValue::Double(d) => out.extend_from_slice(&d.to_le_bytes()),
        AttrValue::Long(l) => out.extend_from_slice(&l.to_le_bytes()),
    }

    out.push(RECORD_END);
    Ok(out)
}

/// One decoded structural log record
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    Array {
        group: String,
        name: String,
        bytes_len: u64,
        dtype: DType,
        shape: Vec<u64>,
        order: Order,
        record_offset: u64,
    },
    Attr {
        group: String,
        name: String,
        value: AttrValue,
    },
}

enum Decode {
    /// The buffer ends inside the record
    Incomplete,
    Malformed(String),
}

type DecodeResult<T> = std::result::Result<T, Decode>;

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: u64) -> DecodeResult<&'a [u8]> {
        let n = usize::try_from(n)
            .map_err(|_| Decode::Malformed(format!("length {} too large", n)))?;
        let end = self.pos.checked_add(n).ok_or(Decode::Incomplete)?;
        if end > self.buf.len() {
            return Err(Decode::Incomplete);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u64(&mut self) -> DecodeResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn expect(&mut self, expected: &[u8], what: &str) -> DecodeResult<()> {
        let got = self.take(expected.len() as u64)?;
        if got != expected {
            return Err(Decode::Malformed(format!("expected {} {:?}", what, expected)));
        }
        Ok(())
    }

    fn field_end(&mut self) -> DecodeResult<()> {
        self.expect(&[FIELD_END], "field terminator")
    }

    fn sized(&mut self) -> DecodeResult<&'a [u8]> {
        let len = self.u64()?;
        self.take(len)
    }

    fn text_field(&mut self, what: &str) -> DecodeResult<String> {
        let bytes = self.sized()?;
        self.field_end()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Decode::Malformed(format!("{} is not UTF-8", what)))
    }
}

fn decode_array(cur: &mut Cursor<'_>) -> DecodeResult<LogRecord> {
    let group = cur.text_field("group path")?;
    let name = cur.text_field("array name")?;

    let bytes_len = cur.u64()?;
    cur.field_end()?;

    let dtype = cur.text_field("dtype")?;
    let dtype: DType = dtype
        .parse()
        .map_err(|e: ContainerError| Decode::Malformed(e.to_string()))?;

    let ndim = cur.u64()?;
    let mut shape = Vec::new();
    for _ in 0..ndim {
        shape.push(cur.u64()?);
    }
    cur.field_end()?;

    let order = cur.take(1)?[0];
    let order = Order::from_byte(order)
        .ok_or_else(|| Decode::Malformed(format!("unknown order byte {:#04x}", order)))?;

    let record_offset = cur.u64()?;
    cur.expect(&[RECORD_END], "record terminator")?;

    Ok(LogRecord::Array {
        group,
        name,
        bytes_len,
        dtype,
        shape,
        order,
        record_offset,
    })
}

fn decode_attr(cur: &mut Cursor<'_>) -> DecodeResult<LogRecord> {
    let group = cur.text_field("group path")?;
    let name = cur.text_field("attribute name")?;

    let tag = cur.take(4)?;
    let tag: [u8; 4] = [tag[0], tag[1], tag[2], tag[3]];
    cur.field_end()?;

    let value = match &tag {
        b"text" => {
            let bytes = cur.sized()?;
            let text = String::from_utf8(bytes.to_vec())
                .map_err(|_| Decode::Malformed("text attribute is not UTF-8".into()))?;
            AttrValue::Text(text)
        }
        b"byte" => AttrValue::Bytes(cur.sized()?.to_vec()),
        b"doub" => AttrValue::Double(f64::from_bits(cur.u64()?)),
        b"long" => AttrValue::Long(cur.u64()? as i64),
        other => {
            return Err(Decode::Malformed(format!(
                "unknown attribute kind {:?}",
                String::from_utf8_lossy(other)
            )))
        }
    };
    cur.expect(&[RECORD_END], "record terminator")?;

    Ok(LogRecord::Attr { group, name, value })
}

/// Decode the record at the start of `buf`, returning it with its length.
fn decode_record(buf: &[u8]) -> DecodeResult<(LogRecord, usize)> {
    let mut cur = Cursor { buf, pos: 0 };

    let record = if buf.starts_with(ARRAY_TAG) {
        cur.pos = ARRAY_TAG.len();
        decode_array(&mut cur)?
    } else if buf.starts_with(ATTR_TAG) {
        cur.pos = ATTR_TAG.len();
        decode_attr(&mut cur)?
    } else if ARRAY_TAG.starts_with(buf) || ATTR_TAG.starts_with(buf) {
        return Err(Decode::Incomplete);
    } else {
        return Err(Decode::Malformed("unknown record tag".into()));
    };

    Ok((record, cur.pos))
}

/// Sequential reader over a structural log.
///
/// Yields records in the order they were appended. A record cut short at the
/// end of the buffer (a writer that has not flushed yet) ends the iteration
/// quietly unless [`LogReader::strict`] was requested.
pub struct LogReader {
    buf: Vec<u8>,
    pos: usize,
    strict: bool,
    done: bool,
}

impl LogReader {
    /// Read the whole log file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Decode a log already held in memory, starting with its header.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self> {
        let magic = FileKind::Log.magic();
        let (pos, done) = if buf.len() < magic.len() && magic.starts_with(&buf) {
            // Header not flushed yet
            (buf.len(), true)
        } else {
            (FileKind::Log.validate(&buf)? as usize, false)
        };

        Ok(LogReader {
            buf,
            pos,
            strict: false,
            done,
        })
    }

    /// Report a truncated trailing record as corruption.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Offset in the log of the next record
    pub fn offset(&self) -> u64 {
        self.pos as u64
    }
}

impl Iterator for LogReader {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.buf.len() {
            return None;
        }

        match decode_record(&self.buf[self.pos..]) {
            Ok((record, used)) => {
                self.pos += used;
                Some(Ok(record))
            }
            Err(Decode::Incomplete) => {
                self.done = true;
                if self.strict {
                    let remaining = (self.buf.len() - self.pos) as u64;
                    Some(Err(ContainerError::Corruption {
                        offset: self.pos as u64,
                        expected: remaining + 1,
                        actual: remaining,
                    }))
                } else {
                    None
                }
            }
            Err(Decode::Malformed(reason)) => {
                self.done = true;
                Some(Err(ContainerError::InvalidRecord {
                    offset: self.pos as u64,
                    reason,
                }))
            }
        }
    }
}
