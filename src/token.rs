//! Parser for the comma separated format language used by `pack`, `read` and
//! `unpack`, e.g. `"uint:12, hex8, se, 0b101, bits=flags"`.
//!
//! A [Format] is parsed once and can be reused for any number of reads.

use std::{fmt, str::FromStr};

use crate::errors::TokenError;

/// Kind of value a token describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Bin,
    Oct,
    Hex,
    Bits,
    Bytes,
    Uint,
    Int,
    Se,
    Ue,
    /// Placeholder bound later by a named or positional value.
    Name(String),
    /// Nothing between two commas; produces and consumes no bits.
    Empty,
}

impl TokenKind {
    /// Kinds whose width follows from the data when no length is given.
    pub fn is_stretchy(&self) -> bool {
        matches!(
            self,
            TokenKind::Bin | TokenKind::Oct | TokenKind::Hex | TokenKind::Bits | TokenKind::Bytes
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Bin => "bin",
            TokenKind::Oct => "oct",
            TokenKind::Hex => "hex",
            TokenKind::Bits => "bits",
            TokenKind::Bytes => "bytes",
            TokenKind::Uint => "uint",
            TokenKind::Int => "int",
            TokenKind::Se => "se",
            TokenKind::Ue => "ue",
            TokenKind::Name(name) => name,
            TokenKind::Empty => "",
        };
        f.write_str(name)
    }
}

/// Keywords in match order: longer keywords first where one prefixes another.
const KEYWORDS: [(&str, TokenKind); 9] = [
    ("bytes", TokenKind::Bytes),
    ("bits", TokenKind::Bits),
    ("bin", TokenKind::Bin),
    ("oct", TokenKind::Oct),
    ("hex", TokenKind::Hex),
    ("uint", TokenKind::Uint),
    ("int", TokenKind::Int),
    ("se", TokenKind::Se),
    ("ue", TokenKind::Ue),
];

/// Explicit token length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Length {
    /// Width in bits. `bytes` lengths are already multiplied by 8.
    Bits(usize),
    /// Resolved from a named value when packing.
    Named(String),
}

/// One parsed token of a format string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub length: Option<Length>,
    /// Literal after `=`, or the digits of a `0x`/`0b`/`0o` literal.
    pub value: Option<String>,
    /// The token as written, trimmed.
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, length: Option<Length>, value: Option<String>, text: &str) -> Self {
        Self {
            kind,
            length,
            value,
            text: text.to_string(),
        }
    }

    /// Fixed bit width, if the token has a numeric length.
    pub fn bits(&self) -> Option<usize> {
        match self.length {
            Some(Length::Bits(n)) => Some(n),
            _ => None,
        }
    }
}

impl FromStr for Token {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, TokenError> {
        parse_token(s)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_length(text: &str, raw: &str) -> Result<Length, TokenError> {
    if let Ok(n) = raw.parse::<usize>() {
        return Ok(Length::Bits(n));
    }
    if is_identifier(raw) {
        return Ok(Length::Named(raw.to_string()));
    }
    Err(TokenError::InvalidLength(text.to_string()))
}

/// Splits a name like `hex12` into its keyword kind and inline digits.
fn keyword(name: &str) -> Option<(TokenKind, Option<usize>)> {
    let lower = name.to_ascii_lowercase();
    for (word, kind) in &KEYWORDS {
        let Some(rest) = lower.strip_prefix(word) else {
            continue;
        };
        if rest.is_empty() {
            return Some((kind.clone(), None));
        }
        if rest.bytes().all(|b| b.is_ascii_digit()) {
            return rest.parse().ok().map(|n| (kind.clone(), Some(n)));
        }
    }
    None
}

/// Parses a single token.
pub fn parse_token(raw: &str) -> Result<Token, TokenError> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(Token::new(TokenKind::Empty, None, None, text));
    }

    let lower = text.to_ascii_lowercase();
    for (prefix, kind) in [("0x", TokenKind::Hex), ("0b", TokenKind::Bin), ("0o", TokenKind::Oct)] {
        if lower.starts_with(prefix) {
            return Ok(Token::new(kind, None, Some(text[2..].to_string()), text));
        }
    }

    let (lhs, value) = match text.split_once('=') {
        Some((lhs, value)) => (lhs, Some(value.trim().to_string())),
        None => (text, None),
    };
    let lhs: String = lhs.chars().filter(|c| !c.is_whitespace()).collect();
    let (name, explicit) = match lhs.split_once(':') {
        Some((name, len)) => (name, Some(len)),
        None => (lhs.as_str(), None),
    };

    let Some((kind, inline)) = keyword(name) else {
        if !is_identifier(name) || explicit.is_some() {
            return Err(TokenError::Malformed(text.to_string()));
        }
        if value.is_some() {
            return Err(TokenError::UnknownKind(text.to_string()));
        }
        return Ok(Token::new(TokenKind::Name(name.to_string()), None, None, text));
    };

    let length = match (inline, explicit) {
        (Some(_), Some(_)) => return Err(TokenError::Malformed(text.to_string())),
        (Some(n), None) => Some(Length::Bits(n)),
        (None, Some(raw)) => Some(parse_length(text, raw)?),
        (None, None) => None,
    };

    if length.is_some() && matches!(kind, TokenKind::Se | TokenKind::Ue) {
        return Err(TokenError::LengthNotAllowed(text.to_string()));
    }

    let length = match (&kind, length) {
        (TokenKind::Bytes, Some(Length::Bits(n))) => Some(Length::Bits(
            n.checked_mul(8)
                .ok_or_else(|| TokenError::InvalidLength(text.to_string()))?,
        )),
        (_, length) => length,
    };

    Ok(Token::new(kind, length, value, text))
}

/// An ordered list of parsed tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Format {
    tokens: Vec<Token>,
}

impl Format {
    /// Parses a comma separated token list. Empty items become [TokenKind::Empty].
    pub fn parse(format: &str) -> Result<Self, TokenError> {
        let tokens = format
            .split(',')
            .map(parse_token)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tokens })
    }

    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Sum of all numeric token lengths.
    pub fn fixed_bits(&self) -> usize {
        self.tokens.iter().filter_map(Token::bits).sum()
    }
}

impl FromStr for Format {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, TokenError> {
        Format::parse(s)
    }
}
