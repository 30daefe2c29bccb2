//! Token records handed to run sinks.
//!
//! A [`TokenRecord`] is plain data. A [`Token`] pairs a record with a borrow
//! of the token text inside the staging window; the borrow ends before the
//! next step runs, since the guest is free to reuse that memory. Sinks that
//! need the bytes later call [`Token::into_owned`].

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::ops::Range;

/// Bits of [`TokenRecord::special`] set by the reference scanner.
pub mod special {
    /// The token sits on the same line as the one before it.
    pub const SAME_LINE: u32 = 1;
}

/// One emitted token, with its offset relative to the staging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Offset of the first byte, relative to the staging start.
    pub offset: u32,
    /// Length in bytes.
    pub len: u32,
    /// Source line number.
    pub line_no: u32,
    /// Scanner-defined token type.
    pub type_tag: i32,
    /// Scanner-defined flags.
    pub special: u32,
}

impl TokenRecord {
    /// Offset one past the last byte.
    #[inline]
    pub const fn end(&self) -> u64 {
        self.offset as u64 + self.len as u64
    }

    /// Whether the token covers no bytes.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte range relative to the staging start.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.offset as usize..self.end() as usize
    }

    /// Decode the type tag with the reference scanner's table.
    pub fn kind(&self) -> Option<TokenKind> {
        TokenKind::from_tag(self.type_tag)
    }

    /// Whether the scanner flagged this token as continuing the previous line.
    pub const fn is_same_line(&self) -> bool {
        self.special & special::SAME_LINE != 0
    }
}

/// A token record plus a view of its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    record: TokenRecord,
    text: &'a [u8],
}

impl<'a> Token<'a> {
    /// Pair a record with its text.
    pub fn new(record: TokenRecord, text: &'a [u8]) -> Self {
        Self { record, text }
    }

    /// The underlying record.
    pub fn record(&self) -> TokenRecord {
        self.record
    }

    /// Offset relative to the staging start.
    pub fn offset(&self) -> u32 {
        self.record.offset
    }

    /// Length in bytes.
    pub fn len(&self) -> u32 {
        self.record.len
    }

    /// Whether the token covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    /// Source line number.
    pub fn line_no(&self) -> u32 {
        self.record.line_no
    }

    /// Scanner-defined token type.
    pub fn type_tag(&self) -> i32 {
        self.record.type_tag
    }

    /// Scanner-defined flags.
    pub fn special(&self) -> u32 {
        self.record.special
    }

    /// Raw token bytes.
    pub fn text(&self) -> &'a [u8] {
        self.text
    }

    /// Token text as UTF-8, if it is valid.
    pub fn as_str(&self) -> Option<&'a str> {
        std::str::from_utf8(self.text).ok()
    }

    /// Copy the text out so the token outlives the step.
    pub fn into_owned(self) -> OwnedToken {
        OwnedToken {
            record: self.record,
            text: self.text.to_vec(),
        }
    }
}

/// A token whose text has been copied out of the region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnedToken {
    /// The token record.
    pub record: TokenRecord,
    /// Copy of the token bytes.
    pub text: Vec<u8>,
}

impl OwnedToken {
    /// Borrow as a [`Token`].
    pub fn as_token(&self) -> Token<'_> {
        Token::new(self.record, &self.text)
    }

    /// Token text, replacing invalid UTF-8.
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }
}

/// Token types emitted by the reference JavaScript scanner.
///
/// The bridge never interprets tags; this table is a decoding aid for hosts
/// that run that scanner.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// End of input; carries no text.
    Eof = 0,
    /// Named thing.
    Lit = 1,
    /// `;`
    Semicolon = 2,
    /// Operator, including `in`, `instanceof`, `of` and `void`.
    Op = 3,
    /// Colon in a label or dictionary.
    Colon = 4,
    /// `{`
    Brace = 5,
    /// `[`
    Array = 6,
    /// `(`
    Paren = 7,
    /// `?` opening a ternary.
    Ternary = 8,
    /// `}`, `]`, `)` or the ternary `:`.
    Close = 9,
    /// String literal.
    String = 10,
    /// Regular expression literal.
    Regexp = 11,
    /// Numeric literal.
    Number = 12,
    /// Identifier.
    Symbol = 13,
    /// Keyword.
    Keyword = 14,
    /// Label to the left of a `:`.
    Label = 15,
}

impl TokenKind {
    /// Decode a type tag.
    pub const fn from_tag(tag: i32) -> Option<Self> {
        Some(match tag {
            0 => Self::Eof,
            1 => Self::Lit,
            2 => Self::Semicolon,
            3 => Self::Op,
            4 => Self::Colon,
            5 => Self::Brace,
            6 => Self::Array,
            7 => Self::Paren,
            8 => Self::Ternary,
            9 => Self::Close,
            10 => Self::String,
            11 => Self::Regexp,
            12 => Self::Number,
            13 => Self::Symbol,
            14 => Self::Keyword,
            15 => Self::Label,
            _ => return None,
        })
    }

    /// The tag value.
    pub const fn tag(self) -> i32 {
        self as i32
    }

    /// Whether tokens of this kind carry free-form text.
    pub const fn is_variable(self) -> bool {
        self as i32 >= Self::String as i32
    }
}
