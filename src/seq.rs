//! [BitSeq]: a window of bits over shared storage, plus a read cursor.
//!
//! A sequence is described by a byte position into its [BitBuffer], a bit offset
//! (0..8) into that first byte and a bit length. Cloning or slicing shares the
//! buffer; the first mutation of a shared or file-backed buffer copies the
//! sequence's own span into fresh memory (see [BitSeq::make_mut]).

use std::{
    fmt,
    io::{Read, Seek, Write},
    ops::{Bound, RangeBounds},
    path::{Path, PathBuf},
    rc::Rc,
    str::FromStr,
};

use tracing::trace;

use crate::{
    bits::{bytes_for, clear_tail, extract},
    buffer::{BitBuffer, CACHE_BLOCK_BYTES, FileBuffer, MemoryBuffer, ReadSeek},
    convert,
    errors::{Error, Result},
};

/// Bits handled per step by whole-sequence scans.
pub(crate) const CHUNK_BITS: usize = CACHE_BLOCK_BYTES * 8;

/// An arbitrary-length sequence of bits with a read cursor.
#[derive(Clone)]
pub struct BitSeq {
    pub(crate) store: Rc<BitBuffer>,
    pub(crate) start_byte: usize,
    pub(crate) offset: usize,
    pub(crate) len: usize,
    pub(crate) pos: usize,
}

impl Default for BitSeq {
    fn default() -> Self {
        Self::new()
    }
}

impl BitSeq {
    /// The empty sequence.
    pub fn new() -> Self {
        Self::from_aligned(Vec::new(), 0)
    }

    /// `len` zero bits.
    pub fn zeros(len: usize) -> Self {
        Self::from_aligned(vec![0; bytes_for(len)], len)
    }

    /// Wraps raw bytes; the length is the whole buffer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() * 8;
        Self::over(BitBuffer::Memory(MemoryBuffer::new(bytes)), len)
    }

    /// Parses binary digits. Whitespace and stray `0b` prefixes are ignored.
    pub fn from_bin(s: &str) -> Result<Self> {
        let (data, len) = convert::parse_bin(s)?;
        Ok(Self::from_aligned(data, len))
    }

    /// Parses hex digits. Whitespace and stray `0x` prefixes are ignored.
    pub fn from_hex(s: &str) -> Result<Self> {
        let (data, len) = convert::parse_hex(s)?;
        Ok(Self::from_aligned(data, len))
    }

    /// Parses octal digits. Whitespace and stray `0o` prefixes are ignored.
    pub fn from_oct(s: &str) -> Result<Self> {
        let (data, len) = convert::parse_oct(s)?;
        Ok(Self::from_aligned(data, len))
    }

    /// Encodes `value` in exactly `len` bits. Fails if it does not fit or `len == 0`.
    pub fn from_uint(value: u128, len: usize) -> Result<Self> {
        Ok(Self::from_aligned(convert::encode_uint(value, len)?, len))
    }

    /// Two's complement encoding of `value` in exactly `len` bits.
    pub fn from_int(value: i128, len: usize) -> Result<Self> {
        Ok(Self::from_aligned(convert::encode_int(value, len)?, len))
    }

    /// Unsigned Exponential-Golomb code of `value`.
    pub fn from_ue(value: u64) -> Self {
        let (data, len) = convert::encode_golomb(convert::ue_code(value));
        Self::from_aligned(data, len)
    }

    /// Signed Exponential-Golomb code of `value`.
    pub fn from_se(value: i64) -> Self {
        let (data, len) = convert::encode_golomb(convert::se_code(value));
        Self::from_aligned(data, len)
    }

    /// Lazily reads the file at `path`. Bytes are loaded only when visited.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let buffer = FileBuffer::open(path)?;
        let len = buffer.len() * 8;
        Ok(Self::over(BitBuffer::File(buffer), len))
    }

    /// Lazily reads any seekable source, like [BitSeq::open].
    pub fn from_reader<R: Read + Seek + 'static>(reader: R) -> Result<Self> {
        let buffer = FileBuffer::from_reader(reader)?;
        let len = buffer.len() * 8;
        Ok(Self::over(BitBuffer::File(buffer), len))
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    fn over(store: BitBuffer, len: usize) -> Self {
        Self {
            store: Rc::new(store),
            start_byte: 0,
            offset: 0,
            len,
            pos: 0,
        }
    }

    /// Sequence over aligned storage; bytes past `len` are dropped or zero filled.
    pub(crate) fn from_aligned(mut data: Vec<u8>, len: usize) -> Self {
        data.resize(bytes_for(len), 0);
        clear_tail(&mut data, len);
        Self::over(BitBuffer::Memory(MemoryBuffer::new(data)), len)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True while the bits are still read from a file rather than memory.
    pub fn is_file_backed(&self) -> bool {
        self.store.is_file()
    }

    /// Aligned copy of the bits in `start..start + len`.
    pub(crate) fn aligned(&self, start: usize, len: usize) -> Result<Vec<u8>> {
        if start.checked_add(len).is_none_or(|end| end > self.len) {
            return Err(Error::range(
                "bit range end",
                start.saturating_add(len),
                0,
                self.len,
            ));
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let abs = self.offset + start;
        let first = self.start_byte + abs / 8;
        let last = self.start_byte + (abs + len).div_ceil(8);
        let raw = self.store.byte_range(first, last)?;
        if raw.len() < last - first {
            return Err(Error::range(
                "storage byte",
                last,
                0,
                self.store.byte_length(),
            ));
        }

        Ok(extract(&raw, abs % 8, len))
    }

    /// Slice sharing storage. The caller guarantees `start + len <= self.len`.
    pub(crate) fn view(&self, start: usize, len: usize) -> BitSeq {
        let abs = self.offset + start;
        BitSeq {
            store: Rc::clone(&self.store),
            start_byte: self.start_byte + abs / 8,
            offset: abs % 8,
            len,
            pos: 0,
        }
    }

    /// Drops `offset` leading bits and keeps `length` bits (default: all that remain).
    pub(crate) fn bounded(self, offset: usize, length: Option<usize>) -> Result<BitSeq> {
        if offset > self.len {
            return Err(Error::range("offset", offset, 0, self.len));
        }

        let available = self.len - offset;
        let length = length.unwrap_or(available);
        if length > available {
            return Err(Error::range("offset + length", offset + length, 0, self.len));
        }
        if length == 0 {
            return Ok(BitSeq::new());
        }

        Ok(self.view(offset, length))
    }

    /// Replaces the storage with `data`, an aligned buffer holding `len` bits.
    ///
    /// The cursor is clamped to the new length; callers reposition it as needed.
    pub(crate) fn install(&mut self, data: Vec<u8>, len: usize) {
        if Rc::strong_count(&self.store) > 1 {
            trace!(len, "detached from shared storage");
        }

        let pos = self.pos.min(len);
        *self = BitSeq {
            pos,
            ..BitSeq::from_aligned(data, len)
        };
    }

    /// Uniquely owned, aligned in-memory bytes for this sequence.
    ///
    /// Storage that is shared, file backed or not normalized to offset 0 is first
    /// replaced with a private copy of this sequence's span.
    pub(crate) fn make_mut(&mut self) -> Result<&mut Vec<u8>> {
        let len = self.len;
        let normalized = self.start_byte == 0
            && self.offset == 0
            && matches!(&*self.store, BitBuffer::Memory(m) if m.bytes.len() == bytes_for(len));

        if !normalized || Rc::get_mut(&mut self.store).is_none() {
            let data = self.aligned(0, len)?;
            self.install(data, len);
        }

        match Rc::get_mut(&mut self.store) {
            Some(BitBuffer::Memory(m)) => {
                clear_tail(&mut m.bytes, len);
                Ok(&mut m.bytes)
            }
            _ => Err(Error::usage("storage could not be made unique")),
        }
    }

    pub fn bin(&self) -> Result<String> {
        Ok(convert::to_bin(&self.aligned(0, self.len)?, self.len))
    }

    /// Hex digits without a prefix. The length must be a multiple of 4.
    pub fn hex(&self) -> Result<String> {
        convert::to_hex(&self.aligned(0, self.len)?, self.len)
    }

    /// Octal digits without a prefix. The length must be a multiple of 3.
    pub fn oct(&self) -> Result<String> {
        convert::to_oct(&self.aligned(0, self.len)?, self.len)
    }

    pub fn uint(&self) -> Result<u128> {
        convert::decode_uint(&self.aligned(0, self.len)?, self.len)
    }

    pub fn int(&self) -> Result<i128> {
        convert::decode_int(&self.aligned(0, self.len)?, self.len)
    }

    /// Interprets the whole sequence as exactly one unsigned Exp-Golomb code.
    pub fn ue(&self) -> Result<u64> {
        convert::ue_value(self.single_golomb()?)
    }

    /// Interprets the whole sequence as exactly one signed Exp-Golomb code.
    pub fn se(&self) -> Result<i64> {
        convert::se_value(self.single_golomb()?)
    }

    fn single_golomb(&self) -> Result<u128> {
        let (code, used) = convert::decode_golomb(&self.aligned(0, self.len)?, self.len)?;
        if used != self.len {
            return Err(Error::decode(format!(
                "exp-golomb code uses {used} of {} bits",
                self.len
            )));
        }
        Ok(code)
    }

    /// The bits as bytes, with the final partial byte zero padded.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.aligned(0, self.len)
    }

    /// Writes [BitSeq::to_bytes] to `out`, one cache block at a time.
    pub fn write_to(&self, mut out: impl Write) -> Result<()> {
        for start in (0..self.len).step_by(CHUNK_BITS) {
            let n = CHUNK_BITS.min(self.len - start);
            out.write_all(&self.aligned(start, n)?)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn bit(&self, index: usize) -> Result<bool> {
        if index >= self.len {
            return Err(Error::range("bit index", index, 0, self.len));
        }

        let abs = self.offset + index;
        let byte = self.store.byte_at(self.start_byte + abs / 8)?;
        Ok((byte >> (7 - abs % 8)) & 1 == 1)
    }

    /// Sub-sequence sharing storage. Its cursor starts at 0.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Result<BitSeq> {
        let (start, end) = bounds(range, self.len)?;
        Ok(self.view(start, end - start))
    }

    /// Concatenates `parts` with `self` between each pair.
    pub fn join(&self, parts: &[BitSeq]) -> Result<BitSeq> {
        let mut out = BitSeq::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                out.append(self)?;
            }
            out.append(part)?;
        }
        Ok(out)
    }
}

/// Concatenates every part into one new sequence.
pub fn concat_all(parts: &[BitSeq]) -> Result<BitSeq> {
    BitSeq::new().join(parts)
}

/// Resolves `range` against a sequence of `len` bits into `(start, end)`.
pub(crate) fn bounds(range: impl RangeBounds<usize>, len: usize) -> Result<(usize, usize)> {
    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e.saturating_add(1),
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    };

    if end > len {
        return Err(Error::range("range end", end, 0, len));
    }
    if start > end {
        return Err(Error::range("range start", start, 0, end));
    }
    Ok((start, end))
}

/// Equality of bit content only; storage, offset and cursor are ignored.
/// A sequence whose bytes cannot be read compares unequal.
impl PartialEq for BitSeq {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }

        (0..self.len).step_by(CHUNK_BITS).all(|start| {
            let n = CHUNK_BITS.min(self.len - start);
            matches!(
                (self.aligned(start, n), other.aligned(start, n)),
                (Ok(a), Ok(b)) if a == b
            )
        })
    }
}

impl fmt::Display for BitSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len == 0 {
            return Ok(());
        }

        let rendered = if self.len % 4 == 0 {
            self.hex().map(|h| format!("0x{h}"))
        } else {
            self.bin().map(|b| format!("0b{b}"))
        };

        match rendered {
            Ok(s) => f.write_str(&s),
            Err(e) => write!(f, "<unreadable: {e}>"),
        }
    }
}

impl fmt::Debug for BitSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitSeq")
            .field("bits", &format_args!("{self}"))
            .field("len", &self.len)
            .field("pos", &self.pos)
            .field("file_backed", &self.is_file_backed())
            .finish()
    }
}

/// Parses the comma separated literal grammar of [crate::pack].
impl FromStr for BitSeq {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        crate::pack::pack(s, &[])
    }
}

impl From<&[u8]> for BitSeq {
    fn from(bytes: &[u8]) -> Self {
        BitSeq::from_bytes(bytes)
    }
}

impl From<Vec<u8>> for BitSeq {
    fn from(bytes: Vec<u8>) -> Self {
        BitSeq::from_bytes(bytes)
    }
}

enum Source {
    Bin(String),
    Hex(String),
    Oct(String),
    Uint(u128),
    Int(i128),
    Ue(u64),
    Se(i64),
    Bytes(Vec<u8>),
    File(PathBuf),
    Reader(Box<dyn ReadSeek>),
    Seq(BitSeq),
}

impl Source {
    fn name(&self) -> &'static str {
        match self {
            Source::Bin(_) => "bin",
            Source::Hex(_) => "hex",
            Source::Oct(_) => "oct",
            Source::Uint(_) => "uint",
            Source::Int(_) => "int",
            Source::Ue(_) => "ue",
            Source::Se(_) => "se",
            Source::Bytes(_) => "bytes",
            Source::File(_) => "file",
            Source::Reader(_) => "reader",
            Source::Seq(_) => "seq",
        }
    }
}

/// Keyword-style construction: exactly one source plus optional `offset` and `length`.
///
/// ```
/// use bitseq::BitSeq;
///
/// let s = BitSeq::builder().bytes(vec![0xa0, 0xb1, 0xc2]).offset(4).build().unwrap();
/// assert_eq!(s.hex().unwrap(), "0b1c2");
/// ```
#[derive(Default)]
pub struct Builder {
    source: Option<Source>,
    conflict: Option<(&'static str, &'static str)>,
    offset: usize,
    length: Option<usize>,
}

impl Builder {
    fn source(mut self, source: Source) -> Self {
        if let Some(prev) = &self.source
            && self.conflict.is_none()
        {
            self.conflict = Some((prev.name(), source.name()));
        }
        self.source = Some(source);
        self
    }

    pub fn bin(self, digits: impl Into<String>) -> Self {
        self.source(Source::Bin(digits.into()))
    }

    pub fn hex(self, digits: impl Into<String>) -> Self {
        self.source(Source::Hex(digits.into()))
    }

    pub fn oct(self, digits: impl Into<String>) -> Self {
        self.source(Source::Oct(digits.into()))
    }

    pub fn uint(self, value: u128) -> Self {
        self.source(Source::Uint(value))
    }

    pub fn int(self, value: i128) -> Self {
        self.source(Source::Int(value))
    }

    pub fn ue(self, value: u64) -> Self {
        self.source(Source::Ue(value))
    }

    pub fn se(self, value: i64) -> Self {
        self.source(Source::Se(value))
    }

    pub fn bytes(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.source(Source::Bytes(bytes.into()))
    }

    pub fn file(self, path: impl Into<PathBuf>) -> Self {
        self.source(Source::File(path.into()))
    }

    pub fn reader<R: Read + Seek + 'static>(self, reader: R) -> Self {
        self.source(Source::Reader(Box::new(reader)))
    }

    pub fn seq(self, seq: BitSeq) -> Self {
        self.source(Source::Seq(seq))
    }

    /// Bits to skip at the start of the source. Not allowed for numeric sources.
    pub fn offset(mut self, bits: usize) -> Self {
        self.offset = bits;
        self
    }

    /// Bit length of the result. Required for `uint`/`int`, forbidden for `ue`/`se`.
    pub fn length(mut self, bits: usize) -> Self {
        self.length = Some(bits);
        self
    }

    pub fn build(self) -> Result<BitSeq> {
        if let Some((first, second)) = self.conflict {
            return Err(Error::conflict(format!(
                "both '{first}' and '{second}' given as source"
            )));
        }

        let Builder {
            source,
            offset,
            length,
            ..
        } = self;

        let Some(source) = source else {
            if offset != 0 {
                return Err(Error::usage("offset given without a source"));
            }
            return Ok(BitSeq::zeros(length.unwrap_or(0)));
        };

        let name = source.name();
        let numeric = matches!(
            source,
            Source::Uint(_) | Source::Int(_) | Source::Ue(_) | Source::Se(_)
        );
        if offset != 0 && numeric {
            return Err(Error::conflict(format!("'{name}' cannot take an offset")));
        }

        match source {
            Source::Uint(value) => {
                let len = length.ok_or_else(|| Error::usage("uint requires a length"))?;
                BitSeq::from_uint(value, len)
            }
            Source::Int(value) => {
                let len = length.ok_or_else(|| Error::usage("int requires a length"))?;
                BitSeq::from_int(value, len)
            }
            Source::Ue(_) | Source::Se(_) if length.is_some() => Err(Error::conflict(format!(
                "'{name}' has an implicit length"
            ))),
            Source::Ue(value) => Ok(BitSeq::from_ue(value)),
            Source::Se(value) => Ok(BitSeq::from_se(value)),
            Source::Bin(s) => BitSeq::from_bin(&s)?.bounded(offset, length),
            Source::Hex(s) => BitSeq::from_hex(&s)?.bounded(offset, length),
            Source::Oct(s) => BitSeq::from_oct(&s)?.bounded(offset, length),
            Source::Bytes(bytes) => BitSeq::from_bytes(bytes).bounded(offset, length),
            Source::File(path) => BitSeq::open(path)?.bounded(offset, length),
            Source::Reader(reader) => BitSeq::from_reader(reader)?.bounded(offset, length),
            Source::Seq(seq) => seq.bounded(offset, length),
        }
    }
}
