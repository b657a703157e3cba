//! Low-level bit read and manipulation utilities for byte slices.
//!
//! Bits are addressed in MSB-first order: bit 0 is the high bit of the first byte.
//! Functions that return `Vec<u8>` produce "aligned" storage: the first bit sits
//! in the high bit of byte 0 and pad bits after the last one are zero.

use crate::errors::{Error, Result};

/// Reads a single bit at `bit_pos` (0 = MSB of first byte). Returns 0 or 1.
pub fn read_bit_at(data: &[u8], bit_pos: usize) -> Result<u8> {
    if bit_pos >= data.len() * 8 {
        return Err(Error::range("bit position", bit_pos, 0, data.len() * 8));
    }

    Ok(bit_unchecked(data, bit_pos))
}

#[inline]
pub(crate) fn bit_unchecked(data: &[u8], bit_pos: usize) -> u8 {
    (data[bit_pos / 8] >> (7 - bit_pos % 8)) & 1
}

/// Reads `n` bits starting at `bit_pos` as an unsigned value (max 64 bits). MSB-first.
pub fn read_bits_at(data: &[u8], bit_pos: usize, n: usize) -> Result<u64> {
    if n > 64 {
        return Err(Error::range("read width", n, 0, 64));
    }

    if bit_pos
        .checked_add(n)
        .is_none_or(|end| end > data.len() * 8)
    {
        return Err(Error::range("bit position", bit_pos, 0, data.len() * 8));
    }

    let mut value = 0u64;
    let mut pos = bit_pos;
    let mut remaining = n;

    while remaining > 0 {
        let in_byte = pos % 8;
        let take = (8 - in_byte).min(remaining);
        let byte = data[pos / 8] as u64;
        let part = (byte >> (8 - in_byte - take)) & ((1u64 << take) - 1);
        value = (value << take) | part;
        pos += take;
        remaining -= take;
    }

    Ok(value)
}

/// Writes a single bit at `bit_pos`. The caller guarantees `bit_pos` is in range.
#[inline]
pub fn set_bit_at(data: &mut [u8], bit_pos: usize, bit: bool) {
    let mask = 0x80u8 >> (bit_pos % 8);
    if bit {
        data[bit_pos / 8] |= mask;
    } else {
        data[bit_pos / 8] &= !mask;
    }
}

/// Sign-extends the low `bits` of `value` to a full `i128`.
pub fn sign_extend(value: u128, bits: usize) -> i128 {
    if bits == 0 {
        return 0;
    }
    if bits >= 128 {
        return value as i128;
    }

    let shift = 128 - bits;
    ((value << shift) as i128) >> shift
}

/// Converts a slice of 0/1 values to a byte vector, MSB-first.
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];

    for (i, &bit) in bits.iter().enumerate() {
        out[i / 8] |= (bit & 1) << (7 - (i % 8));
    }

    out
}

/// Number of bytes needed to hold `bits` bits.
#[inline]
pub fn bytes_for(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Copies `len` bits starting at `start` into a fresh aligned vector.
///
/// The caller guarantees `start + len <= data.len() * 8`.
pub fn extract(data: &[u8], start: usize, len: usize) -> Vec<u8> {
    let n_bytes = bytes_for(len);
    let first = start / 8;
    let shift = start % 8;
    let mut out = Vec::with_capacity(n_bytes);

    if shift == 0 {
        out.extend_from_slice(&data[first..first + n_bytes]);
    } else {
        for i in 0..n_bytes {
            let hi = data[first + i] << shift;
            let lo = data.get(first + i + 1).map_or(0, |b| b >> (8 - shift));
            out.push(hi | lo);
        }
    }

    clear_tail(&mut out, len);
    out
}

/// Zeroes every bit at or after `len` in `data`.
pub fn clear_tail(data: &mut [u8], len: usize) {
    let used = len % 8;
    let full = len / 8;
    if used != 0 {
        data[full] &= 0xFFu8 << (8 - used);
    }
    let from = bytes_for(len);
    for b in data.iter_mut().skip(from) {
        *b = 0;
    }
}

/// Overwrites `len` bits of `dst` at `dst_pos` with bits of `src` starting at `src_start`.
///
/// The caller guarantees both ranges are in bounds.
pub fn write_bits(dst: &mut [u8], dst_pos: usize, src: &[u8], src_start: usize, len: usize) {
    let chunk = extract(src, src_start, len);
    let full = len / 8;
    let shift = dst_pos % 8;
    let mut b = dst_pos / 8;

    for &c in &chunk[..full] {
        if shift == 0 {
            dst[b] = c;
        } else {
            dst[b] = (dst[b] & !(0xFFu8 >> shift)) | (c >> shift);
            dst[b + 1] = (dst[b + 1] & (0xFFu8 >> shift)) | (c << (8 - shift));
        }
        b += 1;
    }

    for k in full * 8..len {
        set_bit_at(dst, dst_pos + k, bit_unchecked(&chunk, k) == 1);
    }
}

/// Appends `len` bits of `src` (from `src_start`) to aligned storage holding `dst_len` bits.
pub fn append_bits(dst: &mut Vec<u8>, dst_len: usize, src: &[u8], src_start: usize, len: usize) {
    dst.truncate(bytes_for(dst_len));
    clear_tail(dst, dst_len);
    dst.resize(bytes_for(dst_len + len), 0);
    write_bits(dst, dst_len, src, src_start, len);
}
