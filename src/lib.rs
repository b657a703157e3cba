//! # bitseq
//!
//! Bit-addressable sequences with a read cursor.
//!
//! A [BitSeq] can be built from binary, hex or octal digits, fixed-width
//! integers, Exponential-Golomb codes, raw bytes or a file that is read lazily.
//! It can be read sequentially through its cursor, searched at bit or byte
//! granularity, edited in place, and packed or unpacked with a small format
//! language (`"uint:12, hex8, se"`).
//!
//! ## Example
//!
//! ```
//! use bitseq::{pack, Arg, BitSeq, Search, Value};
//!
//! let mut s = pack("uint:6, bin, ue", &[Arg::Int(10), Arg::from("110"), Arg::Int(3)]).unwrap();
//! assert_eq!(s.bin().unwrap(), "00101011000100");
//!
//! let marker = BitSeq::from_bin("110").unwrap();
//! assert_eq!(s.find(&marker, Search::new()).unwrap(), Some(6));
//!
//! s.seek_bit(0).unwrap();
//! assert_eq!(
//!     s.read("uint6, bin3, ue").unwrap(),
//!     vec![Value::Uint(10), Value::Bin("110".to_string()), Value::Uint(3)]
//! );
//! ```
//!
//! Raw bit helpers are internal; only the bounds-checked readers are exported.
//!
//! ```compile_fail
//! let _ = bitseq::bits::extract(&[0xff], 0, 16);
//! ```
//!
//! ```
//! assert!(bitseq::read_bits_at(&[0xff], 0, 16).is_err());
//! assert!(bitseq::read_bit_at(&[0xff], 8).is_err());
//! ```

mod bits;
pub mod buffer;
mod convert;
mod cursor;
pub mod errors;
mod mutate;
pub mod pack;
pub mod search;
pub mod seq;
#[cfg(feature = "serde")]
pub mod serde;
pub mod token;

pub use bits::{read_bit_at, read_bits_at};
pub use errors::{Error, Result, TokenError};
pub use pack::{Arg, Value, pack, pack_with};
pub use search::Search;
pub use seq::{BitSeq, Builder, concat_all};
pub use token::Format;
