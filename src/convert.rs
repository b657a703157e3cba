//! Conversions between aligned bit storage and textual, integer and
//! Exponential-Golomb encodings.

use crate::{
    bits::{self, append_bits, bit_unchecked, bits_to_bytes, clear_tail, extract, read_bits_at},
    errors::{Error, Result},
};

/// Longest Exp-Golomb code accepted: 64 leading zeros, the marker and a 64 bit suffix.
pub const MAX_GOLOMB_BITS: usize = 129;

/// Removes whitespace and every occurrence of the radix prefix, case-insensitively.
fn strip(s: &str, prefix: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    cleaned.replace(prefix, "")
}

/// Parses binary digits (whitespace and `0b` prefixes tolerated).
pub fn parse_bin(s: &str) -> Result<(Vec<u8>, usize)> {
    let digits = strip(s, "0b");
    let mut out = Vec::with_capacity(digits.len());

    for c in digits.chars() {
        match c {
            '0' => out.push(0),
            '1' => out.push(1),
            _ => return Err(Error::decode(format!("invalid binary digit '{c}' in '{s}'"))),
        }
    }

    Ok((bits_to_bytes(&out), out.len()))
}

/// Parses hexadecimal digits (whitespace and `0x` prefixes tolerated).
pub fn parse_hex(s: &str) -> Result<(Vec<u8>, usize)> {
    let digits = strip(s, "0x");
    let mut out = vec![0u8; digits.len().div_ceil(2)];

    for (i, c) in digits.chars().enumerate() {
        let nibble = c
            .to_digit(16)
            .ok_or_else(|| Error::decode(format!("invalid hex digit '{c}' in '{s}'")))?
            as u8;
        out[i / 2] |= if i % 2 == 0 { nibble << 4 } else { nibble };
    }

    Ok((out, digits.len() * 4))
}

/// Parses octal digits (whitespace and `0o` prefixes tolerated).
pub fn parse_oct(s: &str) -> Result<(Vec<u8>, usize)> {
    let digits = strip(s, "0o");
    let mut out = Vec::new();
    let mut len = 0;

    for c in digits.chars() {
        let digit = c
            .to_digit(8)
            .ok_or_else(|| Error::decode(format!("invalid octal digit '{c}' in '{s}'")))?;
        append_bits(&mut out, len, &[(digit as u8) << 5], 0, 3);
        len += 3;
    }

    Ok((out, len))
}

pub fn to_bin(data: &[u8], len: usize) -> String {
    (0..len)
        .map(|i| if bit_unchecked(data, i) == 1 { '1' } else { '0' })
        .collect()
}

pub fn to_hex(data: &[u8], len: usize) -> Result<String> {
    if len % 4 != 0 {
        return Err(Error::decode(format!(
            "cannot render {len} bits as hex: not a multiple of 4"
        )));
    }

    let mut out = String::with_capacity(len / 4);
    for i in 0..len / 4 {
        let nibble = read_bits_at(data, i * 4, 4)? as u32;
        out.push(char::from_digit(nibble, 16).unwrap_or('0'));
    }

    Ok(out)
}

pub fn to_oct(data: &[u8], len: usize) -> Result<String> {
    if len % 3 != 0 {
        return Err(Error::decode(format!(
            "cannot render {len} bits as octal: not a multiple of 3"
        )));
    }

    let mut out = String::with_capacity(len / 3);
    for i in 0..len / 3 {
        let digit = read_bits_at(data, i * 3, 3)? as u32;
        out.push(char::from_digit(digit, 8).unwrap_or('0'));
    }

    Ok(out)
}

/// Right-aligns `value` in `len` bits, filling bits above bit 127 with `fill`.
fn place_u128(value: u128, fill: bool, len: usize) -> Vec<u8> {
    let be = value.to_be_bytes();
    if len <= 128 {
        return extract(&be, 128 - len, len);
    }

    let pad = len - 128;
    let mut out = vec![if fill { 0xFF } else { 0x00 }; bits::bytes_for(pad)];
    clear_tail(&mut out, pad);
    append_bits(&mut out, pad, &be, 0, 128);
    out
}

pub fn encode_uint(value: u128, len: usize) -> Result<Vec<u8>> {
    if len == 0 {
        return Err(Error::usage("uint requires a length of at least 1"));
    }
    if len < 128 && value >> len != 0 {
        return Err(Error::usage(format!("uint {value} does not fit in {len} bits")));
    }

    Ok(place_u128(value, false, len))
}

pub fn encode_int(value: i128, len: usize) -> Result<Vec<u8>> {
    if len == 0 {
        return Err(Error::usage("int requires a length of at least 1"));
    }
    if len < 128 {
        let min = -(1i128 << (len - 1));
        let max = (1i128 << (len - 1)) - 1;
        if value < min || value > max {
            return Err(Error::usage(format!(
                "int {value} does not fit in {len} bits ({min}..={max})"
            )));
        }
    }

    Ok(place_u128(value as u128, value < 0, len))
}

/// Value of the last `min(len, 128)` bits.
fn tail_u128(data: &[u8], len: usize) -> Result<u128> {
    let width = len.min(128);
    let mut pos = len - width;
    let mut value = 0u128;

    while pos < len {
        let take = (len - pos).min(64);
        value = (value << take) | read_bits_at(data, pos, take)? as u128;
        pos += take;
    }

    Ok(value)
}

pub fn decode_uint(data: &[u8], len: usize) -> Result<u128> {
    if len == 0 {
        return Err(Error::decode("cannot interpret an empty sequence as uint"));
    }
    if (0..len.saturating_sub(128)).any(|i| bit_unchecked(data, i) == 1) {
        return Err(Error::decode(format!("uint of {len} bits does not fit in 128 bits")));
    }

    tail_u128(data, len)
}

pub fn decode_int(data: &[u8], len: usize) -> Result<i128> {
    if len == 0 {
        return Err(Error::decode("cannot interpret an empty sequence as int"));
    }
    if len > 128 {
        let sign = bit_unchecked(data, len - 128);
        if (0..len - 128).any(|i| bit_unchecked(data, i) != sign) {
            return Err(Error::decode(format!("int of {len} bits does not fit in 128 bits")));
        }
    }

    Ok(bits::sign_extend(tail_u128(data, len)?, len))
}

/// Encodes an unsigned Exp-Golomb code number; returns storage and bit length.
pub fn encode_golomb(code: u128) -> (Vec<u8>, usize) {
    let x = code + 1;
    let k = (127 - x.leading_zeros()) as usize;
    let mut out = vec![0u8; bits::bytes_for(k)];
    let suffix = place_u128(x, false, k + 1);
    append_bits(&mut out, k, &suffix, 0, k + 1);
    (out, 2 * k + 1)
}

pub fn ue_code(value: u64) -> u128 {
    value as u128
}

pub fn se_code(value: i64) -> u128 {
    if value > 0 {
        2 * value as u128 - 1
    } else {
        2 * value.unsigned_abs() as u128
    }
}

/// Decodes one Exp-Golomb code number from aligned `data` of `len` bits.
///
/// Returns the code number and the number of bits consumed.
pub fn decode_golomb(data: &[u8], len: usize) -> Result<(u128, usize)> {
    let budget = len.min(MAX_GOLOMB_BITS);
    let mut zeros = 0;

    loop {
        if zeros >= budget {
            return Err(Error::decode(if len > MAX_GOLOMB_BITS {
                "exp-golomb code longer than 129 bits"
            } else {
                "bitstream exhausted before exp-golomb marker"
            }));
        }
        if bit_unchecked(data, zeros) == 1 {
            break;
        }
        zeros += 1;
    }

    if zeros > 64 {
        return Err(Error::decode("exp-golomb code longer than 129 bits"));
    }

    let total = 2 * zeros + 1;
    if total > len {
        return Err(Error::decode("bitstream exhausted inside exp-golomb suffix"));
    }

    let mut suffix = 0u128;
    let mut pos = zeros + 1;
    while pos < total {
        let take = (total - pos).min(64);
        suffix = (suffix << take) | read_bits_at(data, pos, take)? as u128;
        pos += take;
    }

    Ok(((1u128 << zeros) - 1 + suffix, total))
}

pub fn ue_value(code: u128) -> Result<u64> {
    u64::try_from(code).map_err(|_| Error::decode(format!("ue code {code} exceeds 64 bits")))
}

pub fn se_value(code: u128) -> Result<i64> {
    let magnitude = code.div_ceil(2);
    let value = if code % 2 == 1 {
        i128::try_from(magnitude).ok()
    } else {
        i128::try_from(magnitude).ok().map(|m| -m)
    };

    value
        .and_then(|v| i64::try_from(v).ok())
        .ok_or_else(|| Error::decode(format!("se code {code} exceeds 64 bits")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_tolerates_whitespace_and_prefixes() {
        let (data, len) = parse_hex("  \n0 X a  4e       \r3  \n").unwrap();
        assert_eq!((data, len), (vec![0xa4, 0xe3], 16));

        assert_eq!(parse_hex("0x0x0X").unwrap().1, 0);
        assert_eq!(parse_hex("ff0xee").unwrap().0, vec![0xff, 0xee]);
    }

    #[test]
    fn test_parse_hex_errors() {
        for bad in ["0xx0", "0xX0", "0Xx0", "-2e", "0xabcdefg"] {
            assert!(matches!(parse_hex(bad), Err(Error::Decode(_))), "{bad}");
        }
    }

    #[test]
    fn test_parse_bin() {
        assert_eq!(parse_bin("  \r\r\n0   B    00   1 1 \t0 ").unwrap(), (vec![0b00110000], 5));
        assert_eq!(parse_bin("000b0b11").unwrap(), (vec![0b00110000], 4));
        assert!(parse_bin("0010020").is_err());
    }

    #[test]
    fn test_parse_oct() {
        let (data, len) = parse_oct("12345670").unwrap();
        assert_eq!(len, 24);
        assert_eq!(to_bin(&data, len), "001010011100101110111000");
        assert!(parse_oct("8").is_err());
    }

    #[test]
    fn test_to_hex_requires_whole_nibbles() {
        assert_eq!(to_hex(&[0xa0, 0xff], 16).unwrap(), "a0ff");
        assert!(to_hex(&[0xa0], 6).is_err());
        assert_eq!(to_oct(&[0b11100000], 3).unwrap(), "7");
        assert!(to_oct(&[0], 5).is_err());
    }

    #[test]
    fn test_int_round_trip() {
        for len in 6..10 {
            for value in -17i128..17 {
                let data = encode_int(value, len).unwrap();
                assert_eq!(decode_int(&data, len).unwrap(), value);
            }
        }

        let data = encode_int(-243, 108).unwrap();
        assert_eq!(decode_int(&data, 108).unwrap(), -243);

        let data = encode_int(-1, 200).unwrap();
        assert_eq!(to_bin(&data, 200), "1".repeat(200));
        assert_eq!(decode_int(&data, 200).unwrap(), -1);
    }

    #[test]
    fn test_int_range_errors() {
        assert!(encode_int(-1, 0).is_err());
        assert!(encode_int(4, 3).is_err());
        assert!(encode_int(-5, 3).is_err());
        assert!(encode_int(-4, 3).is_ok());
    }

    #[test]
    fn test_uint_errors() {
        assert!(encode_uint(4, 2).is_err());
        assert!(encode_uint(0, 0).is_err());
        assert_eq!(to_bin(&encode_uint(15, 6).unwrap(), 6), "001111");
        assert_eq!(decode_uint(&encode_uint(300, 200).unwrap(), 200).unwrap(), 300);
        assert!(decode_uint(&[], 0).is_err());
    }

    #[test]
    fn test_golomb_codes() {
        let expected = ["1", "010", "011", "00100", "00101", "00110", "00111", "0001000", "0001001"];
        for (value, bits) in expected.iter().enumerate() {
            let (data, len) = encode_golomb(ue_code(value as u64));
            assert_eq!(to_bin(&data, len), *bits);
            assert_eq!(decode_golomb(&data, len).unwrap(), (value as u128, len));
        }
    }

    #[test]
    fn test_golomb_extremes() {
        let (data, len) = encode_golomb(ue_code(u64::MAX));
        assert_eq!(len, 129);
        let (code, used) = decode_golomb(&data, len).unwrap();
        assert_eq!(used, 129);
        assert_eq!(ue_value(code).unwrap(), u64::MAX);

        let (data, len) = encode_golomb(se_code(i64::MIN));
        let (code, _) = decode_golomb(&data, len).unwrap();
        assert_eq!(se_value(code).unwrap(), i64::MIN);
    }

    #[test]
    fn test_se_mapping() {
        let pairs = [(0, 0i64), (1, 1), (2, -1), (3, 2), (4, -2)];
        for (code, value) in pairs {
            assert_eq!(se_code(value), code);
            assert_eq!(se_value(code).unwrap(), value);
        }
    }

    #[test]
    fn test_golomb_exhausted() {
        assert!(matches!(decode_golomb(&[0x00], 3), Err(Error::Decode(_))));
        assert!(matches!(decode_golomb(&[0b0010_0000], 4), Err(Error::Decode(_))));
        assert!(decode_golomb(&[], 0).is_err());
    }

    #[test]
    fn test_golomb_all_zero_window() {
        let zeros = [0u8; 17];
        let Err(Error::Decode(msg)) = decode_golomb(&zeros, MAX_GOLOMB_BITS) else {
            panic!("expected a decode error");
        };
        assert!(msg.contains("exhausted"));

        let zeros = [0u8; 18];
        let Err(Error::Decode(msg)) = decode_golomb(&zeros, MAX_GOLOMB_BITS + 1) else {
            panic!("expected a decode error");
        };
        assert!(msg.contains("longer than 129 bits"));
    }
}
