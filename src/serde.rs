//! JSON-deserializable format description.
//!
//! These types describe a pack/read format as data, for example a list of
//! fields shipped in a config file, and convert into a [Format] with the same
//! validation as [Format::parse].

use serde::{Deserialize, Serialize};

use crate::{
    errors::TokenError,
    token::{Format, Token, TokenKind, parse_token},
};

/// Top-level format definition: tokens in read order.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FormatDef {
    pub tokens: Vec<TokenDef>,
}

/// Value kind of a token.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KindDef {
    Bin,
    Oct,
    Hex,
    Bits,
    Bytes,
    Uint,
    Int,
    Se,
    Ue,
    /// Placeholder bound when packing.
    Name(String),
}

/// Explicit length: a number, or the name of a value supplied when packing.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum LengthDef {
    Bits(usize),
    Named(String),
}

/// Description of a single token.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct TokenDef {
    pub kind: KindDef,
    /// Length as written after `:`; a byte count for `bytes`.
    #[serde(default)]
    pub length: Option<LengthDef>,
    /// Literal value, or the name of a value supplied when packing.
    #[serde(default)]
    pub value: Option<String>,
}

impl TokenDef {
    /// The equivalent format-string token.
    pub fn to_text(&self) -> String {
        let mut text = match &self.kind {
            KindDef::Bin => TokenKind::Bin.to_string(),
            KindDef::Oct => TokenKind::Oct.to_string(),
            KindDef::Hex => TokenKind::Hex.to_string(),
            KindDef::Bits => TokenKind::Bits.to_string(),
            KindDef::Bytes => TokenKind::Bytes.to_string(),
            KindDef::Uint => TokenKind::Uint.to_string(),
            KindDef::Int => TokenKind::Int.to_string(),
            KindDef::Se => TokenKind::Se.to_string(),
            KindDef::Ue => TokenKind::Ue.to_string(),
            KindDef::Name(name) => name.clone(),
        };

        match &self.length {
            Some(LengthDef::Bits(n)) => text.push_str(&format!(":{n}")),
            Some(LengthDef::Named(name)) => text.push_str(&format!(":{name}")),
            None => {}
        }
        if let Some(value) = &self.value {
            text.push('=');
            text.push_str(value);
        }
        text
    }
}

impl TryFrom<&TokenDef> for Token {
    type Error = TokenError;

    fn try_from(def: &TokenDef) -> Result<Self, TokenError> {
        parse_token(&def.to_text())
    }
}

impl TryFrom<&FormatDef> for Format {
    type Error = TokenError;

    fn try_from(def: &FormatDef) -> Result<Self, TokenError> {
        let tokens = def
            .tokens
            .iter()
            .map(Token::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Format::from_tokens(tokens))
    }
}
