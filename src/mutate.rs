//! In-place edits and bitwise combinations of [BitSeq]s.
//!
//! Editing methods work on a private aligned copy when the storage is shared or
//! file backed, so no other sequence observes the change.

use std::ops::RangeBounds;

use crate::{
    bits::{append_bits, bit_unchecked, bytes_for, clear_tail, set_bit_at, write_bits},
    errors::{Error, Result},
    seq::{BitSeq, bounds},
};

/// Aligned concatenation of `(seq, start, len)` spans.
fn assemble(spans: &[(&BitSeq, usize, usize)]) -> Result<(Vec<u8>, usize)> {
    let mut out = Vec::new();
    let mut len = 0;
    for &(seq, start, n) in spans {
        append_bits(&mut out, len, &seq.aligned(start, n)?, 0, n);
        len += n;
    }
    Ok((out, len))
}

impl BitSeq {
    /// Appends `other`; the cursor stays put.
    pub fn append(&mut self, other: &BitSeq) -> Result<()> {
        let src = other.to_bytes()?;
        let len = self.len;
        let data = self.make_mut()?;
        append_bits(data, len, &src, 0, other.len);
        self.len = len + other.len;
        Ok(())
    }

    /// Prepends `other`; the cursor moves with the original bits.
    pub fn prepend(&mut self, other: &BitSeq) -> Result<()> {
        let (data, len) = assemble(&[(other, 0, other.len), (&*self, 0, self.len)])?;
        let pos = self.pos + other.len;
        self.install(data, len);
        self.pos = pos;
        Ok(())
    }

    /// Inserts `other` at `pos` (default: the cursor). The cursor ends after the insert.
    pub fn insert(&mut self, other: &BitSeq, pos: Option<usize>) -> Result<()> {
        let pos = pos.unwrap_or(self.pos);
        if pos > self.len {
            return Err(Error::range("insert position", pos, 0, self.len));
        }

        let (data, len) = assemble(&[
            (&*self, 0, pos),
            (other, 0, other.len),
            (&*self, pos, self.len - pos),
        ])?;
        self.install(data, len);
        self.pos = pos + other.len;
        Ok(())
    }

    /// Overwrites bits from `pos` (default: the cursor) with `other`.
    pub fn overwrite(&mut self, other: &BitSeq, pos: Option<usize>) -> Result<()> {
        let pos = pos.unwrap_or(self.pos);
        let end = pos.saturating_add(other.len);
        if end > self.len {
            return Err(Error::range("overwrite end", end, 0, self.len));
        }

        let src = other.to_bytes()?;
        let data = self.make_mut()?;
        write_bits(data, pos, &src, 0, other.len);
        self.pos = end;
        Ok(())
    }

    /// Removes up to `n` bits at `pos` (default: the cursor); `n` is clamped to what remains.
    pub fn delete_bits(&mut self, n: usize, pos: Option<usize>) -> Result<()> {
        let pos = pos.unwrap_or(self.pos);
        if pos > self.len {
            return Err(Error::range("delete position", pos, 0, self.len));
        }

        let n = n.min(self.len - pos);
        let cursor = if self.pos >= pos + n {
            self.pos - n
        } else {
            self.pos.min(pos)
        };

        let (data, len) = assemble(&[(&*self, 0, pos), (&*self, pos + n, self.len - pos - n)])?;
        self.install(data, len);
        self.pos = cursor;
        Ok(())
    }

    /// Removes up to `n` bytes at byte position `pos` (default: the cursor, which
    /// must then be byte aligned).
    pub fn delete_bytes(&mut self, n: usize, pos: Option<usize>) -> Result<()> {
        let pos = match pos {
            Some(p) => p,
            None => self.tell_byte()?,
        };
        let bit = pos
            .checked_mul(8)
            .ok_or_else(|| Error::range("delete position", pos, 0, self.len / 8))?;
        self.delete_bits(n.saturating_mul(8), Some(bit))
    }

    /// Drops the first `n` bits without copying storage.
    pub fn truncate_start(&mut self, n: usize) -> Result<()> {
        if n > self.len {
            return Err(Error::range("truncate length", n, 0, self.len));
        }

        let pos = self.pos.saturating_sub(n);
        *self = self.view(n, self.len - n);
        self.pos = pos;
        Ok(())
    }

    /// Drops the last `n` bits without copying storage.
    pub fn truncate_end(&mut self, n: usize) -> Result<()> {
        if n > self.len {
            return Err(Error::range("truncate length", n, 0, self.len));
        }

        self.len -= n;
        self.pos = self.pos.min(self.len);
        Ok(())
    }

    /// Reverses the order of the bits in `range`.
    pub fn reverse_bits(&mut self, range: impl RangeBounds<usize>) -> Result<()> {
        let (start, end) = bounds(range, self.len)?;
        let data = self.make_mut()?;

        let (mut lo, mut hi) = (start, end);
        while lo + 1 < hi {
            hi -= 1;
            let a = bit_unchecked(data, lo);
            let b = bit_unchecked(data, hi);
            set_bit_at(data, lo, b == 1);
            set_bit_at(data, hi, a == 1);
            lo += 1;
        }
        Ok(())
    }

    /// Logical shift towards bit 0, filling with zeros. The length is unchanged.
    pub fn shift_left(&mut self, n: usize) -> Result<()> {
        let k = n.min(self.len);
        let (data, _) = assemble(&[(&*self, k, self.len - k)])?;
        let len = self.len;
        self.install(data, len);
        Ok(())
    }

    /// Logical shift away from bit 0, filling with zeros. The length is unchanged.
    pub fn shift_right(&mut self, n: usize) -> Result<()> {
        let k = n.min(self.len);
        let mut data = vec![0u8; bytes_for(k)];
        append_bits(&mut data, k, &self.aligned(0, self.len - k)?, 0, self.len - k);
        let len = self.len;
        self.install(data, len);
        Ok(())
    }

    /// Rotates left by `n` bits. Fails on an empty sequence.
    pub fn rol(&mut self, n: usize) -> Result<()> {
        if self.len == 0 {
            return Err(Error::usage("cannot rotate an empty sequence"));
        }

        let k = n % self.len;
        let (data, len) = assemble(&[(&*self, k, self.len - k), (&*self, 0, k)])?;
        self.install(data, len);
        Ok(())
    }

    /// Rotates right by `n` bits. Fails on an empty sequence.
    pub fn ror(&mut self, n: usize) -> Result<()> {
        if self.len == 0 {
            return Err(Error::usage("cannot rotate an empty sequence"));
        }
        self.rol(self.len - n % self.len)
    }

    pub fn set(&mut self, index: usize, bit: bool) -> Result<()> {
        if index >= self.len {
            return Err(Error::range("bit index", index, 0, self.len));
        }

        let data = self.make_mut()?;
        set_bit_at(data, index, bit);
        Ok(())
    }

    /// Replaces the bits in `range` with `other`, which may differ in length.
    ///
    /// The cursor keeps its position, clamped to the new length.
    pub fn splice(&mut self, range: impl RangeBounds<usize>, other: &BitSeq) -> Result<()> {
        let (start, end) = bounds(range, self.len)?;
        let (data, len) = assemble(&[
            (&*self, 0, start),
            (other, 0, other.len),
            (&*self, end, self.len - end),
        ])?;
        self.install(data, len);
        Ok(())
    }

    /// Flips every bit. Fails on an empty sequence.
    pub fn invert(&mut self) -> Result<()> {
        if self.len == 0 {
            return Err(Error::usage("cannot invert an empty sequence"));
        }

        let len = self.len;
        let data = self.make_mut()?;
        for byte in data.iter_mut() {
            *byte = !*byte;
        }
        clear_tail(data, len);
        Ok(())
    }

    fn combine(&self, other: &BitSeq, op: impl Fn(u8, u8) -> u8) -> Result<BitSeq> {
        if self.len != other.len {
            return Err(Error::usage(format!(
                "bitwise operands differ in length: {} and {}",
                self.len, other.len
            )));
        }

        let data: Vec<u8> = self
            .to_bytes()?
            .iter()
            .zip(other.to_bytes()?.iter())
            .map(|(&a, &b)| op(a, b))
            .collect();
        Ok(BitSeq::from_aligned(data, self.len))
    }

    pub fn and(&self, other: &BitSeq) -> Result<BitSeq> {
        self.combine(other, |a, b| a & b)
    }

    pub fn or(&self, other: &BitSeq) -> Result<BitSeq> {
        self.combine(other, |a, b| a | b)
    }

    pub fn xor(&self, other: &BitSeq) -> Result<BitSeq> {
        self.combine(other, |a, b| a ^ b)
    }

    /// `k` back-to-back copies; `k == 0` gives the empty sequence.
    pub fn repeat(&self, k: usize) -> Result<BitSeq> {
        let src = self.to_bytes()?;
        let mut out = Vec::new();
        let mut len = 0;
        for _ in 0..k {
            append_bits(&mut out, len, &src, 0, self.len);
            len += self.len;
        }
        Ok(BitSeq::from_aligned(out, len))
    }

    /// `self` followed by `other` as a new sequence with its cursor at 0.
    pub fn concat(&self, other: &BitSeq) -> Result<BitSeq> {
        let (data, len) = assemble(&[(&*self, 0, self.len), (other, 0, other.len)])?;
        Ok(BitSeq::from_aligned(data, len))
    }
}
