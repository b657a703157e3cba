//! Bit-level and byte-aligned search over a [BitSeq].
//!
//! Every operation is built on one primitive that scans candidate positions in
//! windows of [CACHE_BLOCK_BYTES] bytes, so a file-backed haystack only loads the
//! blocks the scan actually visits.
//!
//! ```
//! use bitseq::{BitSeq, Search};
//!
//! let mut s = BitSeq::from_hex("0x010203040102ff").unwrap();
//! let needle = BitSeq::from_hex("0x02").unwrap();
//! assert_eq!(s.find(&needle, Search::new().aligned()).unwrap(), Some(8));
//! assert_eq!(s.pos(), 8);
//! ```

use std::iter::FusedIterator;

use tracing::debug;

use crate::{
    bits::{append_bits, read_bits_at},
    buffer::CACHE_BLOCK_BYTES,
    errors::{Error, Result},
    seq::BitSeq,
};

const WINDOW_BITS: usize = CACHE_BLOCK_BYTES * 8;

/// Bounds and mode shared by every search operation.
///
/// A match at `p` must satisfy `start <= p` and `p + needle.len() <= end`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Search {
    start: usize,
    end: Option<usize>,
    bytealigned: bool,
    count: Option<usize>,
}

impl Search {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only consider positions that are multiples of 8 from bit 0.
    pub fn aligned(mut self) -> Self {
        self.bytealigned = true;
        self
    }

    pub fn bytealigned(mut self, aligned: bool) -> Self {
        self.bytealigned = aligned;
        self
    }

    pub fn start(mut self, bit: usize) -> Self {
        self.start = bit;
        self
    }

    /// Exclusive upper bound; defaults to the haystack length.
    pub fn end(mut self, bit: usize) -> Self {
        self.end = Some(bit);
        self
    }

    /// Caps the number of results (matches, pieces or replacements).
    pub fn count(mut self, n: usize) -> Self {
        self.count = Some(n);
        self
    }

    fn window(&self, len: usize) -> Result<(usize, usize)> {
        let end = self.end.unwrap_or(len);
        if end > len {
            return Err(Error::range("search end", end, 0, len));
        }
        if self.start > end {
            return Err(Error::range("search start", self.start, 0, end));
        }
        Ok((self.start, end))
    }
}

#[derive(Debug, Clone)]
struct Needle {
    data: Vec<u8>,
    len: usize,
}

impl Needle {
    fn new(seq: &BitSeq) -> Result<Self> {
        if seq.is_empty() {
            return Err(Error::usage("cannot search for an empty sequence"));
        }
        Ok(Self {
            data: seq.to_bytes()?,
            len: seq.len(),
        })
    }

    fn matches_at(&self, window: &[u8], at: usize) -> Result<bool> {
        for k in (0..self.len).step_by(64) {
            let take = 64.min(self.len - k);
            if read_bits_at(window, at + k, take)? != read_bits_at(&self.data, k, take)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Lowest match position in `start..end`, if any.
fn scan_forward(
    hay: &BitSeq,
    needle: &Needle,
    start: usize,
    end: usize,
    aligned: bool,
) -> Result<Option<usize>> {
    if end < start || end - start < needle.len {
        return Ok(None);
    }

    let last = end - needle.len;
    let mut lo = start;
    while lo <= last {
        let hi = (lo + WINDOW_BITS).min(last + 1);
        let window = hay.aligned(lo, hi - lo + needle.len - 1)?;
        for p in (lo..hi).filter(|p| !aligned || p % 8 == 0) {
            if needle.matches_at(&window, p - lo)? {
                return Ok(Some(p));
            }
        }
        lo = hi;
    }
    Ok(None)
}

/// Highest match position in `start..end`, if any.
fn scan_backward(
    hay: &BitSeq,
    needle: &Needle,
    start: usize,
    end: usize,
    aligned: bool,
) -> Result<Option<usize>> {
    if end < start || end - start < needle.len {
        return Ok(None);
    }

    let mut hi = end - needle.len + 1;
    while hi > start {
        let lo = hi.saturating_sub(WINDOW_BITS).max(start);
        let window = hay.aligned(lo, hi - lo + needle.len - 1)?;
        for p in (lo..hi).rev().filter(|p| !aligned || p % 8 == 0) {
            if needle.matches_at(&window, p - lo)? {
                return Ok(Some(p));
            }
        }
        hi = lo;
    }
    Ok(None)
}

impl BitSeq {
    /// First match of `needle`. On success the cursor moves to the match.
    pub fn find(&mut self, needle: &BitSeq, opts: Search) -> Result<Option<usize>> {
        let (start, end) = opts.window(self.len)?;
        let found = scan_forward(self, &Needle::new(needle)?, start, end, opts.bytealigned)?;
        if let Some(p) = found {
            self.pos = p;
        }
        Ok(found)
    }

    /// Last match of `needle`. On success the cursor moves to the match.
    pub fn rfind(&mut self, needle: &BitSeq, opts: Search) -> Result<Option<usize>> {
        let (start, end) = opts.window(self.len)?;
        let found = scan_backward(self, &Needle::new(needle)?, start, end, opts.bytealigned)?;
        if let Some(p) = found {
            self.pos = p;
        }
        Ok(found)
    }

    /// Whether `needle` occurs anywhere. The cursor is not moved.
    pub fn contains(&self, needle: &BitSeq) -> Result<bool> {
        Ok(scan_forward(self, &Needle::new(needle)?, 0, self.len, false)?.is_some())
    }

    /// Lazily yields every match start; matches may overlap.
    pub fn find_all(&self, needle: &BitSeq, opts: Search) -> FindAll {
        FindAll {
            hay: self.clone(),
            needle: needle.clone(),
            opts,
            state: State::Fresh,
        }
    }

    /// Lazily splits on `delimiter`. Every piece after the first begins with it.
    pub fn split(&self, delimiter: &BitSeq, opts: Search) -> Split {
        Split {
            hay: self.clone(),
            delimiter: delimiter.clone(),
            opts,
            state: State::Fresh,
        }
    }

    /// Lazily yields consecutive `bits`-wide pieces; a short final piece is dropped.
    pub fn cut(&self, bits: usize, opts: Search) -> Cut {
        Cut {
            hay: self.clone(),
            bits,
            opts,
            state: State::Fresh,
        }
    }

    /// Replaces non-overlapping occurrences of `old` with `new`, scanning left to
    /// right and resuming after each match. Returns the number of replacements.
    ///
    /// A cursor after a replaced span shifts by the length difference; a cursor
    /// strictly inside one moves to the end of its replacement.
    pub fn replace(&mut self, old: &BitSeq, new: &BitSeq, opts: Search) -> Result<usize> {
        let (start, end) = opts.window(self.len)?;
        let needle = Needle::new(old)?;

        let mut found = Vec::new();
        let mut from = start;
        while opts.count.is_none_or(|c| found.len() < c) {
            match scan_forward(self, &needle, from, end, opts.bytealigned)? {
                Some(p) => {
                    found.push(p);
                    from = p + old.len;
                }
                None => break,
            }
        }
        if found.is_empty() {
            return Ok(0);
        }

        let replacement = new.to_bytes()?;
        let mut data = Vec::new();
        let mut len = 0;
        let mut prev = 0;
        for &p in &found {
            append_bits(&mut data, len, &self.aligned(prev, p - prev)?, 0, p - prev);
            len += p - prev;
            append_bits(&mut data, len, &replacement, 0, new.len);
            len += new.len;
            prev = p + old.len;
        }
        append_bits(&mut data, len, &self.aligned(prev, self.len - prev)?, 0, self.len - prev);
        len += self.len - prev;

        let (mut removed, mut added) = (0, 0);
        let mut cursor = None;
        for &p in &found {
            if p + old.len <= self.pos {
                removed += old.len;
                added += new.len;
            } else {
                if p < self.pos {
                    cursor = Some(p - removed + added + new.len);
                }
                break;
            }
        }
        let cursor = cursor.unwrap_or(self.pos - removed + added);

        debug!(replacements = found.len(), old_bits = old.len, new_bits = new.len, "replaced matches");
        self.install(data, len);
        self.pos = cursor;
        Ok(found.len())
    }
}

#[derive(Debug, Clone)]
enum State<T> {
    Fresh,
    Running(T),
    Done,
}

#[derive(Debug, Clone)]
struct Progress {
    next: usize,
    end: usize,
    remaining: Option<usize>,
}

impl Progress {
    fn take(&mut self) -> bool {
        match &mut self.remaining {
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
            None => true,
        }
    }
}

/// Iterator returned by [BitSeq::find_all].
#[derive(Debug, Clone)]
pub struct FindAll {
    hay: BitSeq,
    needle: BitSeq,
    opts: Search,
    state: State<(Needle, Progress)>,
}

impl FindAll {
    fn advance(&mut self) -> Result<Option<usize>> {
        if let State::Fresh = self.state {
            let (start, end) = self.opts.window(self.hay.len())?;
            let progress = Progress {
                next: start,
                end,
                remaining: self.opts.count,
            };
            self.state = State::Running((Needle::new(&self.needle)?, progress));
        }

        let State::Running((needle, progress)) = &mut self.state else {
            return Ok(None);
        };
        if !progress.take() {
            return Ok(None);
        }

        let found = scan_forward(&self.hay, needle, progress.next, progress.end, self.opts.bytealigned)?;
        if let Some(p) = found {
            progress.next = p + 1;
        }
        Ok(found)
    }
}

impl Iterator for FindAll {
    type Item = Result<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(p)) => Some(Ok(p)),
            Ok(None) => {
                self.state = State::Done;
                None
            }
            Err(e) => {
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for FindAll {}

/// Iterator returned by [BitSeq::split].
#[derive(Debug, Clone)]
pub struct Split {
    hay: BitSeq,
    delimiter: BitSeq,
    opts: Search,
    state: State<(Needle, Progress)>,
}

impl Split {
    /// Next `(piece_start, piece_end)`; `Ok(None)` once the haystack is used up.
    fn advance(&mut self) -> Result<Option<(usize, usize)>> {
        if let State::Fresh = self.state {
            let (start, end) = self.opts.window(self.hay.len())?;
            let needle = Needle::new(&self.delimiter)?;
            let mut progress = Progress {
                next: start,
                end,
                remaining: self.opts.count,
            };
            if !progress.take() {
                return Ok(None);
            }

            let first = scan_forward(&self.hay, &needle, start, end, self.opts.bytealigned)?;
            let Some(p) = first else {
                self.state = State::Done;
                return Ok(Some((start, end)));
            };
            progress.next = p;
            self.state = State::Running((needle, progress));
            return Ok(Some((start, p)));
        }

        let State::Running((needle, progress)) = &mut self.state else {
            return Ok(None);
        };
        if !progress.take() {
            return Ok(None);
        }

        let piece = progress.next;
        let found = scan_forward(
            &self.hay,
            needle,
            piece + needle.len,
            progress.end,
            self.opts.bytealigned,
        )?;
        match found {
            Some(p) => {
                progress.next = p;
                Ok(Some((piece, p)))
            }
            None => {
                let end = progress.end;
                self.state = State::Done;
                Ok(Some((piece, end)))
            }
        }
    }
}

impl Iterator for Split {
    type Item = Result<BitSeq>;

    fn next(&mut self) -> Option<Self::Item> {
        if let State::Done = self.state {
            return None;
        }
        match self.advance() {
            Ok(Some((start, end))) => Some(Ok(self.hay.view(start, end - start))),
            Ok(None) => {
                self.state = State::Done;
                None
            }
            Err(e) => {
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for Split {}

/// Iterator returned by [BitSeq::cut].
#[derive(Debug, Clone)]
pub struct Cut {
    hay: BitSeq,
    bits: usize,
    opts: Search,
    state: State<Progress>,
}

impl Cut {
    fn advance(&mut self) -> Result<Option<usize>> {
        if let State::Fresh = self.state {
            if self.bits == 0 {
                return Err(Error::usage("cannot cut into zero-width pieces"));
            }
            let (start, end) = self.opts.window(self.hay.len())?;
            self.state = State::Running(Progress {
                next: start,
                end,
                remaining: self.opts.count,
            });
        }

        let State::Running(progress) = &mut self.state else {
            return Ok(None);
        };
        if progress.end - progress.next < self.bits || !progress.take() {
            return Ok(None);
        }

        let piece = progress.next;
        progress.next += self.bits;
        Ok(Some(piece))
    }
}

impl Iterator for Cut {
    type Item = Result<BitSeq>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(start)) => Some(Ok(self.hay.view(start, self.bits))),
            Ok(None) => {
                self.state = State::Done;
                None
            }
            Err(e) => {
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for Cut {}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> BitSeq {
        BitSeq::from_hex(s).unwrap()
    }

    fn bin(s: &str) -> BitSeq {
        BitSeq::from_bin(s).unwrap()
    }

    #[test]
    fn test_find_aligned() {
        let mut s = hex("0x010203040102ff");
        assert_eq!(s.find(&hex("0x02"), Search::new().aligned()).unwrap(), Some(8));
        assert_eq!(s.tell_byte().unwrap(), 1);

        let mut shifted = bin("1");
        shifted.append(&s).unwrap();
        shifted.seek_bit(3).unwrap();
        assert_eq!(shifted.find(&hex("0x02"), Search::new().aligned()).unwrap(), None);
        assert_eq!(shifted.pos(), 3);
        assert_eq!(shifted.find(&hex("0x02"), Search::new()).unwrap(), Some(2));
    }

    #[test]
    fn test_find_bounds() {
        let mut s = bin("00110011");
        assert_eq!(s.find(&bin("11"), Search::new().start(2)).unwrap(), Some(2));
        assert_eq!(s.find(&bin("11"), Search::new().start(3)).unwrap(), Some(6));
        assert_eq!(s.find(&bin("11"), Search::new().start(3).end(7)).unwrap(), None);
        assert_eq!(s.pos(), 6);

        assert!(matches!(
            s.find(&bin("1"), Search::new().end(9)),
            Err(Error::Range { .. })
        ));
        assert!(s.find(&bin("1"), Search::new().start(5).end(4)).is_err());
        assert!(matches!(
            s.find(&BitSeq::new(), Search::new()),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn test_rfind() {
        let mut s = bin("0011001100");
        assert_eq!(s.rfind(&bin("11"), Search::new()).unwrap(), Some(6));
        assert_eq!(s.rfind(&bin("11"), Search::new().end(7)).unwrap(), Some(2));
        assert_eq!(s.pos(), 2);
        assert_eq!(s.rfind(&bin("11"), Search::new().end(3)).unwrap(), None);
        assert_eq!(s.pos(), 2);

        let mut s = hex("0x00ff00ff");
        assert_eq!(s.rfind(&hex("ff"), Search::new().aligned()).unwrap(), Some(24));
    }

    #[test]
    fn test_find_then_read() {
        let mut s = hex("0x1234abcd5678");
        let needle = hex("0xbcd5");
        s.find(&needle, Search::new()).unwrap();
        assert_eq!(s.read_bits(needle.len()).unwrap(), needle);
    }

    #[test]
    fn test_find_across_windows() {
        let mut s = BitSeq::zeros(3 * WINDOW_BITS);
        s.set(WINDOW_BITS + 3, true).unwrap();
        s.set(WINDOW_BITS + 4, true).unwrap();
        let needle = bin("011");
        assert_eq!(s.find(&needle, Search::new()).unwrap(), Some(WINDOW_BITS + 2));
        assert_eq!(s.rfind(&needle, Search::new()).unwrap(), Some(WINDOW_BITS + 2));

        let mut s = BitSeq::zeros(2 * WINDOW_BITS);
        s.set(WINDOW_BITS - 1, true).unwrap();
        s.set(WINDOW_BITS, true).unwrap();
        assert_eq!(s.find(&bin("11"), Search::new()).unwrap(), Some(WINDOW_BITS - 1));
    }

    #[test]
    fn test_contains() {
        let s = bin("0001000");
        assert!(s.contains(&bin("1000")).unwrap());
        assert!(!s.contains(&bin("11")).unwrap());
        assert_eq!(s.pos(), 0);
    }

    #[test]
    fn test_find_all() {
        let s = bin("0111011");
        let found: Vec<usize> = s
            .find_all(&bin("11"), Search::new())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(found, vec![1, 2, 5]);

        let limited: Vec<usize> = s
            .find_all(&bin("11"), Search::new().count(2))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(limited, vec![1, 2]);

        let aligned: Vec<usize> = hex("0x0f0f0f")
            .find_all(&hex("0f"), Search::new().aligned().start(1))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(aligned, vec![8, 16]);
    }

    #[test]
    fn test_find_all_validates_lazily() {
        let s = bin("0101");
        let mut it = s.find_all(&bin("1"), Search::new().end(10));
        assert!(matches!(it.next(), Some(Err(Error::Range { .. }))));
        assert!(it.next().is_none());

        let mut it = s.find_all(&BitSeq::new(), Search::new());
        assert!(matches!(it.next(), Some(Err(Error::Usage(_)))));
    }

    #[test]
    fn test_find_all_is_restartable() {
        let s = bin("1010");
        let it = s.find_all(&bin("1"), Search::new());
        let again = it.clone();
        assert_eq!(it.count(), 2);
        assert_eq!(again.count(), 2);
    }

    #[test]
    fn test_split() {
        let s = bin("0 1 00 1 000 1");
        let pieces: Vec<String> = s
            .split(&bin("1"), Search::new())
            .map(|p| p.unwrap().bin().unwrap())
            .collect();
        assert_eq!(pieces, vec!["0", "100", "1000", "1"]);

        let limited: Vec<String> = s
            .split(&bin("1"), Search::new().count(2))
            .map(|p| p.unwrap().bin().unwrap())
            .collect();
        assert_eq!(limited, vec!["0", "100"]);
    }

    #[test]
    fn test_split_edge_cases() {
        let no_match: Vec<BitSeq> = bin("000")
            .split(&bin("1"), Search::new())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(no_match, vec![bin("000")]);

        let empty: Vec<BitSeq> = BitSeq::new()
            .split(&bin("1"), Search::new())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(empty.len(), 1);
        assert!(empty[0].is_empty());

        let leading: Vec<String> = bin("1101")
            .split(&bin("1"), Search::new())
            .map(|p| p.unwrap().bin().unwrap())
            .collect();
        assert_eq!(leading, vec!["", "1", "10", "1"]);

        assert_eq!(bin("1").split(&bin("1"), Search::new().count(0)).count(), 0);
    }

    #[test]
    fn test_split_aligned_with_bounds() {
        let s = hex("0x0a 0b 0a 0c 0a");
        let pieces: Vec<String> = s
            .split(&hex("0a"), Search::new().aligned().start(8).end(32))
            .map(|p| p.unwrap().hex().unwrap())
            .collect();
        assert_eq!(pieces, vec!["0b", "0a0c"]);
    }

    #[test]
    fn test_cut() {
        let s = bin("110100111");
        let pieces: Vec<String> = s
            .cut(2, Search::new())
            .map(|p| p.unwrap().bin().unwrap())
            .collect();
        assert_eq!(pieces, vec!["11", "01", "00", "11"]);

        let pieces: Vec<String> = s
            .cut(3, Search::new().start(1).count(2))
            .map(|p| p.unwrap().bin().unwrap())
            .collect();
        assert_eq!(pieces, vec!["101", "001"]);

        let mut zero = s.cut(0, Search::new());
        assert!(matches!(zero.next(), Some(Err(Error::Usage(_)))));
        assert!(zero.next().is_none());
    }

    #[test]
    fn test_replace_aligned() {
        let mut s = hex("0x00114723ef4732344700");
        let n = s
            .replace(&hex("0x47"), &hex("0x00"), Search::new().aligned())
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(s.hex().unwrap(), "00110023ef0032340000");
    }

    #[test]
    fn test_replace_growing_and_shrinking() {
        let mut s = bin("0101");
        assert_eq!(s.replace(&bin("1"), &bin("11"), Search::new()).unwrap(), 2);
        assert_eq!(s.bin().unwrap(), "011011");

        assert_eq!(s.replace(&bin("11"), &bin("1"), Search::new()).unwrap(), 2);
        assert_eq!(s.bin().unwrap(), "0101");

        assert_eq!(s.replace(&bin("01"), &BitSeq::new(), Search::new().count(1)).unwrap(), 1);
        assert_eq!(s.bin().unwrap(), "01");

        assert_eq!(s.replace(&bin("111"), &bin("0"), Search::new()).unwrap(), 0);
    }

    #[test]
    fn test_replace_does_not_rematch_replacement() {
        let mut s = bin("1111");
        assert_eq!(s.replace(&bin("11"), &bin("111"), Search::new()).unwrap(), 2);
        assert_eq!(s.bin().unwrap(), "111111");
    }

    #[test]
    fn test_replace_moves_cursor() {
        let mut s = bin("00100100");
        s.seek_bit(6).unwrap();
        s.replace(&bin("1"), &bin("111"), Search::new()).unwrap();
        assert_eq!(s.bin().unwrap(), "001110011100");
        assert_eq!(s.pos(), 10);

        let mut s = bin("0011110");
        s.seek_bit(3).unwrap();
        s.replace(&bin("1111"), &bin("0"), Search::new()).unwrap();
        assert_eq!(s.bin().unwrap(), "0000");
        assert_eq!(s.pos(), 3);
    }
}
