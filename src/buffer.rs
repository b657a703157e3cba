//! Byte storage behind a [crate::BitSeq].
//!
//! Two backends share one byte-addressed contract: [MemoryBuffer] owns its bytes
//! and may be mutated, [FileBuffer] reads a seekable source lazily and caches
//! every block it touches. Neither is thread safe; the cache assumes a single
//! caller materializes a given block at a time.

use std::{
    borrow::Cow,
    cell::RefCell,
    collections::HashMap,
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

use tracing::{debug, trace};

use crate::errors::{Error, Result};

/// Granularity of the file cache.
pub const CACHE_BLOCK_BYTES: usize = 4096;

/// Any byte source that can be read from an arbitrary position.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Storage backend for bit sequences.
#[derive(Debug)]
pub enum BitBuffer {
    Memory(MemoryBuffer),
    File(FileBuffer),
}

impl BitBuffer {
    pub fn byte_length(&self) -> usize {
        match self {
            BitBuffer::Memory(m) => m.bytes.len(),
            BitBuffer::File(f) => f.len,
        }
    }

    /// Returns the byte at `index`; fails if it is past the end of the buffer.
    pub fn byte_at(&self, index: usize) -> Result<u8> {
        if index >= self.byte_length() {
            return Err(Error::range("byte index", index, 0, self.byte_length()));
        }

        match self {
            BitBuffer::Memory(m) => Ok(m.bytes[index]),
            BitBuffer::File(f) => Ok(f.materialize_range(index, index + 1)?[0]),
        }
    }

    /// Bytes in `start..end`, with `end` clamped to the buffer length.
    pub fn byte_range(&self, start: usize, end: usize) -> Result<Cow<'_, [u8]>> {
        let end = end.min(self.byte_length());
        let start = start.min(end);

        match self {
            BitBuffer::Memory(m) => Ok(Cow::Borrowed(&m.bytes[start..end])),
            BitBuffer::File(f) => Ok(Cow::Owned(f.materialize_range(start, end)?)),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, BitBuffer::File(_))
    }
}

/// Bytes held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryBuffer {
    pub bytes: Vec<u8>,
}

impl MemoryBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

/// Read-only, lazily materialized view of a seekable byte source.
pub struct FileBuffer {
    source: RefCell<Box<dyn ReadSeek>>,
    cache: RefCell<HashMap<usize, Box<[u8]>>>,
    len: usize,
}

impl std::fmt::Debug for FileBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBuffer")
            .field("len", &self.len)
            .field("cached_blocks", &self.cache.borrow().len())
            .finish()
    }
}

impl FileBuffer {
    /// Opens `path`. A missing file fails here with the unchanged I/O error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let buffer = Self::from_reader(file)?;
        debug!(path = %path.display(), bytes = buffer.len, "opened file buffer");
        Ok(buffer)
    }

    /// Wraps any seekable source; its length is taken from the end position.
    pub fn from_reader<R: Read + Seek + 'static>(mut reader: R) -> Result<Self> {
        let end = reader.seek(SeekFrom::End(0))?;
        let len = usize::try_from(end)
            .map_err(|_| Error::usage(format!("source of {end} bytes is not addressable")))?;

        Ok(Self {
            source: RefCell::new(Box::new(reader)),
            cache: RefCell::new(HashMap::new()),
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn cached_blocks(&self) -> usize {
        self.cache.borrow().len()
    }

    fn load_block(&self, block: usize) -> Result<()> {
        if self.cache.borrow().contains_key(&block) {
            return Ok(());
        }

        let start = block * CACHE_BLOCK_BYTES;
        let size = CACHE_BLOCK_BYTES.min(self.len - start);
        let mut data = vec![0u8; size];
        {
            let mut source = self.source.borrow_mut();
            source.seek(SeekFrom::Start(start as u64))?;
            source.read_exact(&mut data)?;
        }

        trace!(block, size, "materialized file block");
        self.cache.borrow_mut().insert(block, data.into_boxed_slice());
        Ok(())
    }

    /// Reads `start..end` from the source once; later calls are served from the cache.
    pub fn materialize_range(&self, start: usize, end: usize) -> Result<Vec<u8>> {
        if end > self.len || start > end {
            return Err(Error::range("file byte range end", end, start, self.len));
        }

        let mut out = Vec::with_capacity(end - start);
        if start == end {
            return Ok(out);
        }

        for block in start / CACHE_BLOCK_BYTES..=(end - 1) / CACHE_BLOCK_BYTES {
            self.load_block(block)?;
            let cache = self.cache.borrow();
            let data = &cache[&block];
            let block_start = block * CACHE_BLOCK_BYTES;
            let from = start.max(block_start) - block_start;
            let to = end.min(block_start + data.len()) - block_start;
            out.extend_from_slice(&data[from..to]);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn counting_source(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 256) as u8).collect()
    }

    #[test]
    fn test_memory_contract() {
        let buffer = BitBuffer::Memory(MemoryBuffer::new(vec![1, 2, 3]));
        assert_eq!(buffer.byte_length(), 3);
        assert_eq!(buffer.byte_at(2).unwrap(), 3);
        assert!(buffer.byte_at(3).is_err());
        assert_eq!(&*buffer.byte_range(1, 10).unwrap(), &[2, 3]);
    }

    #[test]
    fn test_file_matches_memory() {
        let data = counting_source(3 * CACHE_BLOCK_BYTES + 17);
        let file = BitBuffer::File(FileBuffer::from_reader(Cursor::new(data.clone())).unwrap());
        let mem = BitBuffer::Memory(MemoryBuffer::new(data));

        assert_eq!(file.byte_length(), mem.byte_length());
        assert_eq!(file.byte_at(0).unwrap(), mem.byte_at(0).unwrap());
        for (start, end) in [(1, 5), (4090, 4200), (0, 20000), (12300, 12305)] {
            assert_eq!(
                file.byte_range(start, end).unwrap(),
                mem.byte_range(start, end).unwrap()
            );
        }
    }

    #[test]
    fn test_file_cache_is_lazy() {
        let data = counting_source(10 * CACHE_BLOCK_BYTES);
        let file = FileBuffer::from_reader(Cursor::new(data.clone())).unwrap();
        assert_eq!(file.cached_blocks(), 0);

        let tail = file
            .materialize_range(9 * CACHE_BLOCK_BYTES + 5, 9 * CACHE_BLOCK_BYTES + 9)
            .unwrap();
        assert_eq!(tail, data[9 * CACHE_BLOCK_BYTES + 5..9 * CACHE_BLOCK_BYTES + 9]);
        assert_eq!(file.cached_blocks(), 1);

        file.materialize_range(9 * CACHE_BLOCK_BYTES, 9 * CACHE_BLOCK_BYTES + 1)
            .unwrap();
        assert_eq!(file.cached_blocks(), 1);
    }

    #[test]
    fn test_file_range_past_end() {
        let file = FileBuffer::from_reader(Cursor::new(vec![0u8; 4])).unwrap();
        assert!(matches!(
            file.materialize_range(0, 5),
            Err(Error::Range { .. })
        ));
        assert!(FileBuffer::open("this/file/does/not/exist").is_err());
    }
}
