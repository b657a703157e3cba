//! Property tests for bitseq
//!
//! Round trips through every textual and integer encoding, plus the laws the
//! cursor, slicing and concatenation must keep.

use bitseq::{BitSeq, Search, concat_all};
use proptest::prelude::*;

fn bits_strategy(max: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::bool::ANY, 0..max)
        .prop_map(|bits| bits.into_iter().map(|b| if b { '1' } else { '0' }).collect())
}

fn seq_strategy(max: usize) -> impl Strategy<Value = BitSeq> {
    bits_strategy(max).prop_map(|s| BitSeq::from_bin(&s).unwrap())
}

// ============================================================
// Encoding round trips
// ============================================================

proptest! {
    #[test]
    fn bin_round_trip(s in bits_strategy(200)) {
        prop_assert_eq!(BitSeq::from_bin(&s).unwrap().bin().unwrap(), s);
    }

    #[test]
    fn hex_round_trip(digits in "[0-9a-f]{0,40}") {
        prop_assert_eq!(BitSeq::from_hex(&digits).unwrap().hex().unwrap(), digits);
    }

    #[test]
    fn oct_round_trip(digits in "[0-7]{0,40}") {
        prop_assert_eq!(BitSeq::from_oct(&digits).unwrap().oct().unwrap(), digits);
    }

    #[test]
    fn uint_round_trip(value in any::<u64>(), extra in 0usize..80) {
        let len = (64 - value.leading_zeros() as usize).max(1) + extra;
        let s = BitSeq::from_uint(value as u128, len).unwrap();
        prop_assert_eq!(s.len(), len);
        prop_assert_eq!(s.uint().unwrap(), value as u128);
    }

    #[test]
    fn int_round_trip(value in any::<i64>(), extra in 0usize..80) {
        let s = BitSeq::from_int(value as i128, 64 + extra).unwrap();
        prop_assert_eq!(s.int().unwrap(), value as i128);
    }

    #[test]
    fn golomb_round_trip(u in any::<u64>(), v in any::<i64>()) {
        let mut s = BitSeq::from_ue(u);
        s.append(&BitSeq::from_se(v)).unwrap();
        prop_assert_eq!(s.read_ue().unwrap(), u);
        prop_assert_eq!(s.read_se().unwrap(), v);
        prop_assert_eq!(s.pos(), s.len());
    }

    #[test]
    fn bytes_round_trip(s in seq_strategy(100)) {
        let back = BitSeq::builder()
            .bytes(s.to_bytes().unwrap())
            .length(s.len())
            .build()
            .unwrap();
        prop_assert_eq!(back, s);
    }
}

// ============================================================
// Structural laws
// ============================================================

proptest! {
    #[test]
    fn offset_invariance(bytes in prop::collection::vec(any::<u8>(), 1..16), offset in 0usize..8) {
        let shifted = BitSeq::builder().bytes(bytes.clone()).offset(offset).build().unwrap();
        let whole = BitSeq::from_bytes(bytes);
        let expected = whole.slice(offset..).unwrap();
        prop_assert_eq!(shifted.bin().unwrap(), expected.bin().unwrap());

        let realigned = BitSeq::from_bin(&expected.bin().unwrap()).unwrap();
        prop_assert_eq!(shifted, realigned);
    }

    #[test]
    fn peek_is_idempotent(s in seq_strategy(100), n in 0usize..100, pos in 0usize..100) {
        let mut s = s;
        let pos = pos.min(s.len());
        s.seek_bit(pos).unwrap();
        let n = n.min(s.len() - pos);

        let first = s.peek_bits(n).unwrap();
        let second = s.peek_bits(n).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(s.pos(), pos);
        prop_assert_eq!(s.read_bits(n).unwrap(), first);
    }

    #[test]
    fn concat_is_associative(a in seq_strategy(40), b in seq_strategy(40), c in seq_strategy(40)) {
        let left = a.concat(&b).unwrap().concat(&c).unwrap();
        let right = a.concat(&b.concat(&c).unwrap()).unwrap();
        prop_assert_eq!(&left, &right);
        prop_assert_eq!(left, concat_all(&[a, b, c]).unwrap());
    }

    #[test]
    fn self_append_doubles(s in seq_strategy(80)) {
        let mut doubled = s.clone();
        let snapshot = doubled.clone();
        doubled.append(&snapshot).unwrap();
        prop_assert_eq!(doubled.len(), 2 * s.len());
        prop_assert_eq!(doubled, s.repeat(2).unwrap());
    }

    #[test]
    fn find_then_read(hay in seq_strategy(120), needle in seq_strategy(12)) {
        prop_assume!(!needle.is_empty());
        let mut hay = hay;
        if let Some(p) = hay.find(&needle, Search::new()).unwrap() {
            prop_assert_eq!(hay.pos(), p);
            prop_assert_eq!(hay.read_bits(needle.len()).unwrap(), needle);
        } else {
            prop_assert!(!hay.contains(&needle).unwrap());
        }
    }

    #[test]
    fn find_all_agrees_with_naive_scan(hay in bits_strategy(80), needle in bits_strategy(5)) {
        prop_assume!(!needle.is_empty());
        let expected: Vec<usize> = (0..hay.len().saturating_sub(needle.len() - 1))
            .filter(|&p| hay[p..].starts_with(&needle))
            .collect();

        let seq = BitSeq::from_bin(&hay).unwrap();
        let found: Vec<usize> = seq
            .find_all(&BitSeq::from_bin(&needle).unwrap(), Search::new())
            .collect::<Result<_, _>>()
            .unwrap();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn split_pieces_rebuild_haystack(hay in seq_strategy(100), delim in seq_strategy(4)) {
        prop_assume!(!delim.is_empty());
        let pieces: Vec<BitSeq> = hay
            .split(&delim, Search::new())
            .collect::<Result<_, _>>()
            .unwrap();
        prop_assert_eq!(concat_all(&pieces).unwrap(), hay);
    }

    #[test]
    fn reverse_twice_is_identity(s in seq_strategy(100)) {
        let mut r = s.clone();
        r.reverse_bits(..).unwrap();
        r.reverse_bits(..).unwrap();
        prop_assert_eq!(r, s);
    }

    #[test]
    fn insert_then_delete_restores(s in seq_strategy(60), other in seq_strategy(20), pos in 0usize..60) {
        let pos = pos.min(s.len());
        let mut edited = s.clone();
        edited.insert(&other, Some(pos)).unwrap();
        prop_assert_eq!(edited.pos(), pos + other.len());
        edited.delete_bits(other.len(), Some(pos)).unwrap();
        prop_assert_eq!(edited, s);
    }
}
