//! Packing values into a [BitSeq] and reading typed values back out, driven by
//! a [Format].
//!
//! ```
//! use bitseq::{pack, Arg, Value};
//!
//! let mut s = pack("uint:6, hex, se", &[Arg::Int(10), Arg::from("ff"), Arg::Int(-3)]).unwrap();
//! let values = s.read("uint6, hex8, se").unwrap();
//! assert_eq!(values, vec![Value::Uint(10), Value::Hex("ff".to_string()), Value::Int(-3)]);
//! ```

use std::collections::BTreeMap;

use crate::{
    errors::{Error, Result, TokenError},
    seq::BitSeq,
    token::{Format, Length, Token, TokenKind},
};

/// A value supplied to [pack].
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i128),
    /// Digits for `bin`/`hex`/`oct`, an integer literal, or an auto-initialiser string.
    Str(String),
    Bytes(Vec<u8>),
    Bits(BitSeq),
}

macro_rules! arg_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(value: $t) -> Self {
                Arg::Int(value as i128)
            }
        })*
    };
}

arg_from_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64, usize);

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Arg::Bytes(value)
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Arg::Bytes(value.to_vec())
    }
}

impl From<BitSeq> for Arg {
    fn from(value: BitSeq) -> Self {
        Arg::Bits(value)
    }
}

impl From<&BitSeq> for Arg {
    fn from(value: &BitSeq) -> Self {
        Arg::Bits(value.clone())
    }
}

/// A value decoded by [BitSeq::read]. `ue` decodes to `Uint` and `se` to `Int`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uint(u128),
    Int(i128),
    Bin(String),
    Hex(String),
    Oct(String),
    Bits(BitSeq),
}

impl Value {
    pub fn as_uint(&self) -> Option<u128> {
        match self {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Digits of a `bin`, `hex` or `oct` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Bin(s) | Value::Hex(s) | Value::Oct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bits(&self) -> Option<&BitSeq> {
        match self {
            Value::Bits(b) => Some(b),
            _ => None,
        }
    }
}

/// Packs positional `args` according to `format`.
pub fn pack(format: &str, args: &[Arg]) -> Result<BitSeq> {
    pack_with(format, args, &BTreeMap::new())
}

/// Packs with positional and named values.
///
/// A token whose whole text is a key of `named`, a token value naming a key and
/// an identifier length (`uint:n`) are all resolved from `named`.
pub fn pack_with(format: &str, args: &[Arg], named: &BTreeMap<String, Arg>) -> Result<BitSeq> {
    pack_format(&Format::parse(format)?, args, named)
}

pub fn pack_format(format: &Format, args: &[Arg], named: &BTreeMap<String, Arg>) -> Result<BitSeq> {
    let mut positional = args.iter();
    let mut out = BitSeq::new();

    for token in format.tokens() {
        let piece = if let Some(arg) = named.get(&token.text) {
            auto(token, arg)?
        } else {
            match &token.kind {
                TokenKind::Empty => continue,
                TokenKind::Name(name) => {
                    let arg = named
                        .get(name)
                        .or_else(|| positional.next())
                        .ok_or_else(|| missing(token))?;
                    auto(token, arg)?
                }
                kind => {
                    let length = resolve_length(token, named)?;
                    let literal;
                    let arg = match &token.value {
                        Some(v) => match named.get(v) {
                            Some(arg) => arg,
                            None => {
                                literal = Arg::Str(v.clone());
                                &literal
                            }
                        },
                        None => positional.next().ok_or_else(|| missing(token))?,
                    };
                    encode(token, kind, length, arg)?
                }
            }
        };
        out.append(&piece)?;
    }

    if positional.next().is_some() {
        return Err(Error::usage(format!(
            "{} values given but the format consumes fewer",
            args.len()
        )));
    }
    Ok(out)
}

fn missing(token: &Token) -> Error {
    Error::usage(format!("no value left for token '{}'", token.text))
}

fn resolve_length(token: &Token, named: &BTreeMap<String, Arg>) -> Result<Option<usize>> {
    let name = match &token.length {
        None => return Ok(None),
        Some(Length::Bits(n)) => return Ok(Some(*n)),
        Some(Length::Named(name)) => name,
    };

    let Some(Arg::Int(v)) = named.get(name) else {
        return Err(Error::usage(format!(
            "length '{name}' of token '{}' needs an integer named value",
            token.text
        )));
    };
    let n = usize::try_from(*v)
        .map_err(|_| Error::usage(format!("length '{name}' = {v} is negative")))?;

    if token.kind == TokenKind::Bytes {
        return n
            .checked_mul(8)
            .map(Some)
            .ok_or_else(|| Error::usage(format!("length '{name}' = {v} is too large")));
    }
    Ok(Some(n))
}

/// Interprets a value whose kind is not given by the token.
fn auto(token: &Token, arg: &Arg) -> Result<BitSeq> {
    match arg {
        Arg::Bits(seq) => Ok(seq.clone()),
        Arg::Bytes(bytes) => Ok(BitSeq::from_bytes(bytes.clone())),
        Arg::Str(s) => s.parse(),
        Arg::Int(v) => Err(Error::usage(format!(
            "integer {v} for token '{}' needs a kind such as uint:8",
            token.text
        ))),
    }
}

fn text_arg<'a>(token: &Token, arg: &'a Arg) -> Result<&'a str> {
    match arg {
        Arg::Str(s) => Ok(s),
        other => Err(Error::usage(format!(
            "token '{}' expects digits, got {other:?}",
            token.text
        ))),
    }
}

fn int_arg(token: &Token, arg: &Arg) -> Result<i128> {
    match arg {
        Arg::Int(v) => Ok(*v),
        Arg::Str(s) => s.trim().parse().map_err(|_| {
            Error::usage(format!("token '{}' expects an integer, got '{s}'", token.text))
        }),
        other => Err(Error::usage(format!(
            "token '{}' expects an integer, got {other:?}",
            token.text
        ))),
    }
}

fn encode(token: &Token, kind: &TokenKind, length: Option<usize>, arg: &Arg) -> Result<BitSeq> {
    let fixed = |what: &str| {
        length.ok_or_else(|| Error::usage(format!("{what} token '{}' needs a length", token.text)))
    };

    let seq = match kind {
        TokenKind::Bin => BitSeq::from_bin(text_arg(token, arg)?)?,
        TokenKind::Hex => BitSeq::from_hex(text_arg(token, arg)?)?,
        TokenKind::Oct => BitSeq::from_oct(text_arg(token, arg)?)?,
        TokenKind::Bits => auto(token, arg)?,
        TokenKind::Bytes => match arg {
            Arg::Str(s) => BitSeq::from_bytes(s.as_bytes()),
            Arg::Bits(seq) if seq.len() % 8 != 0 => {
                return Err(Error::usage(format!(
                    "token '{}' expects whole bytes, got {} bits",
                    token.text,
                    seq.len()
                )));
            }
            other => auto(token, other)?,
        },
        TokenKind::Uint => {
            let value = int_arg(token, arg)?;
            let value = u128::try_from(value).map_err(|_| {
                Error::usage(format!("uint token '{}' got negative {value}", token.text))
            })?;
            BitSeq::from_uint(value, fixed("uint")?)?
        }
        TokenKind::Int => BitSeq::from_int(int_arg(token, arg)?, fixed("int")?)?,
        TokenKind::Ue => {
            let value = int_arg(token, arg)?;
            BitSeq::from_ue(u64::try_from(value).map_err(|_| {
                Error::usage(format!("ue token '{}' got {value}", token.text))
            })?)
        }
        TokenKind::Se => {
            let value = int_arg(token, arg)?;
            BitSeq::from_se(i64::try_from(value).map_err(|_| {
                Error::usage(format!("se token '{}' got {value}", token.text))
            })?)
        }
        TokenKind::Name(_) | TokenKind::Empty => {
            return Err(TokenError::UnknownKind(token.text.clone()).into());
        }
    };

    if let Some(len) = length
        && kind.is_stretchy()
        && seq.len() != len
    {
        return Err(Error::usage(format!(
            "token '{}' expects {len} bits but the value has {}",
            token.text,
            seq.len()
        )));
    }
    Ok(seq)
}

/// Checks that `format` can be read; returns whether it has a stretchy token.
fn check_readable(format: &Format) -> Result<bool> {
    let mut stretchy = false;
    let mut golomb = false;

    for token in format.tokens() {
        match &token.kind {
            TokenKind::Empty => continue,
            TokenKind::Name(_) => return Err(TokenError::UnknownKind(token.text.clone()).into()),
            TokenKind::Se | TokenKind::Ue => golomb = true,
            _ => {}
        }
        if token.value.is_some() {
            return Err(Error::usage(format!(
                "token '{}' carries a value; reads take kinds only",
                token.text
            )));
        }
        if let Some(Length::Named(name)) = &token.length {
            return Err(Error::usage(format!(
                "length '{name}' of token '{}' cannot be resolved when reading",
                token.text
            )));
        }
        if matches!(token.kind, TokenKind::Uint | TokenKind::Int)
            && token.bits().is_none_or(|n| n == 0)
        {
            return Err(Error::usage(format!(
                "token '{}' needs a nonzero length",
                token.text
            )));
        }
        if token.kind.is_stretchy() && token.length.is_none() {
            if stretchy {
                return Err(Error::usage(
                    "at most one token in a format may omit its length",
                ));
            }
            stretchy = true;
        }
    }

    if stretchy && golomb {
        return Err(Error::usage(
            "a token without a length cannot be combined with se or ue",
        ));
    }
    Ok(stretchy)
}

/// Adds the token text to a decode failure.
fn in_token(token: &Token) -> impl Fn(Error) -> Error + '_ {
    move |err| match err {
        Error::Decode(msg) => Error::decode(format!("token '{}': {msg}", token.text)),
        other => other,
    }
}

impl BitSeq {
    /// Reads one value per token from the cursor and advances past them.
    ///
    /// A stretchy token (`bin`, `oct`, `hex`, `bits` or `bytes` without a length)
    /// takes every bit the other tokens leave. On failure the cursor is unchanged.
    pub fn read(&mut self, format: &str) -> Result<Vec<Value>> {
        self.read_format(&Format::parse(format)?)
    }

    pub fn read_format(&mut self, format: &Format) -> Result<Vec<Value>> {
        let start = self.pos;
        let values = self.read_tokens(format);
        if values.is_err() {
            self.pos = start;
        }
        values
    }

    /// Like [BitSeq::read] without moving the cursor.
    pub fn peek(&self, format: &str) -> Result<Vec<Value>> {
        self.peek_format(&Format::parse(format)?)
    }

    pub fn peek_format(&self, format: &Format) -> Result<Vec<Value>> {
        self.clone().read_tokens(format)
    }

    /// Like [BitSeq::read] but from bit 0; the cursor is not moved.
    pub fn unpack(&self, format: &str) -> Result<Vec<Value>> {
        self.unpack_format(&Format::parse(format)?)
    }

    pub fn unpack_format(&self, format: &Format) -> Result<Vec<Value>> {
        let mut snapshot = self.clone();
        snapshot.pos = 0;
        snapshot.read_tokens(format)
    }

    fn read_tokens(&mut self, format: &Format) -> Result<Vec<Value>> {
        let stretch = if check_readable(format)? {
            (self.len - self.pos)
                .checked_sub(format.fixed_bits())
                .ok_or_else(|| {
                    Error::decode(format!(
                        "format needs {} bits but only {} remain",
                        format.fixed_bits(),
                        self.len - self.pos
                    ))
                })?
        } else {
            0
        };

        let mut values = Vec::with_capacity(format.tokens().len());
        for token in format.tokens() {
            let width = match token.kind {
                TokenKind::Empty => continue,
                TokenKind::Ue => {
                    values.push(Value::Uint(self.read_ue().map_err(in_token(token))? as u128));
                    continue;
                }
                TokenKind::Se => {
                    values.push(Value::Int(self.read_se().map_err(in_token(token))? as i128));
                    continue;
                }
                _ => token.bits().unwrap_or(stretch),
            };

            if token.kind == TokenKind::Bytes && width % 8 != 0 {
                return Err(Error::decode(format!(
                    "token '{}' needs whole bytes but {width} bits are left",
                    token.text
                )));
            }

            let remaining = self.len - self.pos;
            if width > remaining {
                return Err(Error::decode(format!(
                    "token '{}' needs {width} bits but only {remaining} remain",
                    token.text
                )));
            }

            let bits = self.read_bits(width)?;
            let value = match token.kind {
                TokenKind::Uint => Value::Uint(bits.uint().map_err(in_token(token))?),
                TokenKind::Int => Value::Int(bits.int().map_err(in_token(token))?),
                TokenKind::Bin => Value::Bin(bits.bin()?),
                TokenKind::Hex => Value::Hex(bits.hex().map_err(in_token(token))?),
                TokenKind::Oct => Value::Oct(bits.oct().map_err(in_token(token))?),
                _ => Value::Bits(bits),
            };
            values.push(value);
        }
        Ok(values)
    }
}
