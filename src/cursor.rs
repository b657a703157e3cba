//! Sequential reading through the cursor of a [BitSeq].
//!
//! `read_*` calls return the next bits and advance the cursor; `peek_*` calls
//! return the same value and leave it where it was. Every failure leaves the
//! cursor unchanged.

use crate::{
    bits::read_bits_at,
    convert::{self, MAX_GOLOMB_BITS},
    errors::{Error, Result},
    seq::BitSeq,
};

fn byte_count(n: usize) -> Result<usize> {
    n.checked_mul(8)
        .ok_or_else(|| Error::range("byte count", n, 0, usize::MAX / 8))
}

impl BitSeq {
    /// Current cursor position in bits.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn tell_bit(&self) -> usize {
        self.pos
    }

    /// Cursor position in bytes. Fails unless the cursor is byte aligned.
    pub fn tell_byte(&self) -> Result<usize> {
        if self.pos % 8 != 0 {
            return Err(Error::usage(format!(
                "cursor at bit {} is not byte aligned",
                self.pos
            )));
        }
        Ok(self.pos / 8)
    }

    pub fn seek_bit(&mut self, pos: usize) -> Result<()> {
        if pos > self.len {
            return Err(Error::range("bit position", pos, 0, self.len));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn seek_byte(&mut self, pos: usize) -> Result<()> {
        self.seek_bit(byte_count(pos)?)
    }

    pub fn peek_bits(&self, n: usize) -> Result<BitSeq> {
        if n > self.len - self.pos {
            return Err(Error::range("read end", self.pos.saturating_add(n), 0, self.len));
        }
        Ok(self.view(self.pos, n))
    }

    pub fn read_bits(&mut self, n: usize) -> Result<BitSeq> {
        let out = self.peek_bits(n)?;
        self.pos += n;
        Ok(out)
    }

    pub fn peek_bytes(&self, n: usize) -> Result<BitSeq> {
        self.peek_bits(byte_count(n)?)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<BitSeq> {
        self.read_bits(byte_count(n)?)
    }

    pub fn peek_bit(&self) -> Result<bool> {
        self.bit(self.pos)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        let bit = self.peek_bit()?;
        self.pos += 1;
        Ok(bit)
    }

    /// The next 8 bits as a byte; the cursor need not be aligned.
    pub fn peek_byte(&self) -> Result<u8> {
        let bits = self.peek_bits(8)?.to_bytes()?;
        Ok(read_bits_at(&bits, 0, 8)? as u8)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let byte = self.peek_byte()?;
        self.pos += 8;
        Ok(byte)
    }

    /// Decodes one Exp-Golomb code at the cursor; returns the code number and its width.
    fn next_golomb(&self) -> Result<(u128, usize)> {
        let window = MAX_GOLOMB_BITS.min(self.len - self.pos);
        let data = self.aligned(self.pos, window)?;
        convert::decode_golomb(&data, window)
    }

    /// Reads an unsigned Exponential-Golomb code.
    pub fn read_ue(&mut self) -> Result<u64> {
        let (code, used) = self.next_golomb()?;
        let value = convert::ue_value(code)?;
        self.pos += used;
        Ok(value)
    }

    /// Reads a signed Exponential-Golomb code.
    pub fn read_se(&mut self) -> Result<i64> {
        let (code, used) = self.next_golomb()?;
        let value = convert::se_value(code)?;
        self.pos += used;
        Ok(value)
    }

    pub fn advance_bits(&mut self, n: usize) -> Result<()> {
        self.seek_bit(self.pos.saturating_add(n))
    }

    pub fn retreat_bits(&mut self, n: usize) -> Result<()> {
        let pos = self
            .pos
            .checked_sub(n)
            .ok_or_else(|| Error::range("retreat", n, 0, self.pos))?;
        self.seek_bit(pos)
    }

    pub fn advance_bytes(&mut self, n: usize) -> Result<()> {
        self.advance_bits(byte_count(n)?)
    }

    pub fn retreat_bytes(&mut self, n: usize) -> Result<()> {
        self.retreat_bits(byte_count(n)?)
    }

    pub fn advance_bit(&mut self) -> Result<()> {
        self.advance_bits(1)
    }

    pub fn retreat_bit(&mut self) -> Result<()> {
        self.retreat_bits(1)
    }

    pub fn advance_byte(&mut self) -> Result<()> {
        self.advance_bits(8)
    }

    pub fn retreat_byte(&mut self) -> Result<()> {
        self.retreat_bits(8)
    }

    /// Moves the cursor to the next byte boundary; returns the bits skipped.
    ///
    /// A cursor past the last whole byte is clamped to the end of the sequence.
    pub fn byte_align(&mut self) -> usize {
        let target = self.pos.next_multiple_of(8).min(self.len);
        let skipped = target - self.pos;
        self.pos = target;
        skipped
    }
}
