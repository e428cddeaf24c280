// crates/command-gate-mcp/src/codec.rs
// ============================================================================
// Module: Base64 Codec
// Description: Text to base64 conversion under named text encodings.
// Purpose: Back the base64 tool with readable validation faults.
// Dependencies: base64, thiserror
// ============================================================================

//! ## Overview
//! [`transform`] validates the action first, then the encoding name, and
//! only then touches the input. Every failure is a distinct
//! [`Base64Error`] variant with a message fit for the end user.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Requested conversion direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base64Action {
    /// Text to base64.
    Encode,
    /// Base64 to text.
    Decode,
}

impl Base64Action {
    /// Parses an action label.
    ///
    /// # Errors
    ///
    /// Returns [`Base64Error::InvalidAction`] for anything but `encode` or
    /// `decode`.
    pub fn parse(label: &str) -> Result<Self, Base64Error> {
        match label {
            "encode" => Ok(Self::Encode),
            "decode" => Ok(Self::Decode),
            other => Err(Base64Error::InvalidAction(other.to_string())),
        }
    }
}

/// Supported text encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8.
    Utf8,
    /// 7-bit ASCII.
    Ascii,
    /// ISO-8859-1.
    Latin1,
    /// UTF-16, little endian, no BOM.
    Utf16Le,
    /// UTF-16, big endian, no BOM.
    Utf16Be,
}

impl TextEncoding {
    /// Resolves an encoding name or alias (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`Base64Error::UnknownEncoding`] for unsupported names.
    pub fn parse(name: &str) -> Result<Self, Base64Error> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            "utf-16le" | "utf-16-le" => Ok(Self::Utf16Le),
            "utf-16be" | "utf-16-be" => Ok(Self::Utf16Be),
            _ => Err(Base64Error::UnknownEncoding(name.to_string())),
        }
    }

    /// Returns the canonical encoding name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin-1",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
        }
    }

    /// Encodes `text` into bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Base64Error::Unencodable`] when a character has no
    /// representation in this encoding.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, Base64Error> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Ascii => narrow(self, text, 0x7f),
            Self::Latin1 => narrow(self, text, 0xff),
            Self::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Self::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
        }
    }

    /// Decodes `bytes` into text.
    ///
    /// # Errors
    ///
    /// Returns [`Base64Error::InvalidText`] when the bytes are not valid in
    /// this encoding.
    pub fn decode(self, bytes: &[u8]) -> Result<String, Base64Error> {
        let invalid = || Base64Error::InvalidText {
            encoding: self.name(),
        };
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|_| invalid()),
            Self::Ascii => {
                if bytes.is_ascii() {
                    Ok(bytes.iter().map(|byte| char::from(*byte)).collect())
                } else {
                    Err(invalid())
                }
            }
            Self::Latin1 => Ok(bytes.iter().map(|byte| char::from(*byte)).collect()),
            Self::Utf16Le | Self::Utf16Be => {
                let (pairs, rest) = bytes.as_chunks::<2>();
                if !rest.is_empty() {
                    return Err(invalid());
                }
                let units: Vec<u16> = pairs
                    .iter()
                    .map(|pair| {
                        if self == Self::Utf16Le {
                            u16::from_le_bytes(*pair)
                        } else {
                            u16::from_be_bytes(*pair)
                        }
                    })
                    .collect();
                String::from_utf16(&units).map_err(|_| invalid())
            }
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

/// Base64 tool failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Base64Error {
    /// Action was neither `encode` nor `decode`.
    #[error("Invalid action '{0}'. Must be 'encode' or 'decode'")]
    InvalidAction(String),
    /// Encoding name not supported.
    #[error("Unknown encoding '{0}'")]
    UnknownEncoding(String),
    /// Text contains a character the encoding cannot represent.
    #[error("Failed to encode text with {encoding}: character {character:?} is not representable")]
    Unencodable {
        /// Encoding name.
        encoding: &'static str,
        /// First offending character.
        character: char,
    },
    /// Input is not valid base64.
    #[error("Invalid base64 input: {0}")]
    InvalidBase64(String),
    /// Decoded bytes are not valid text in the encoding.
    #[error("Decoded data is not valid {encoding} text")]
    InvalidText {
        /// Encoding name.
        encoding: &'static str,
    },
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Encodes `text` as base64 under `encoding`.
///
/// # Errors
///
/// Returns [`Base64Error::Unencodable`] when the text cannot be represented.
pub fn encode(text: &str, encoding: TextEncoding) -> Result<String, Base64Error> {
    Ok(STANDARD.encode(encoding.encode(text)?))
}

/// Decodes base64 `data` (surrounding whitespace ignored) into text.
///
/// # Errors
///
/// Returns [`Base64Error::InvalidBase64`] or [`Base64Error::InvalidText`].
pub fn decode(data: &str, encoding: TextEncoding) -> Result<String, Base64Error> {
    let bytes =
        STANDARD.decode(data.trim()).map_err(|err| Base64Error::InvalidBase64(err.to_string()))?;
    encoding.decode(&bytes)
}

/// Runs the base64 tool: validates `action`, then `encoding`, then converts.
///
/// # Errors
///
/// Returns [`Base64Error`] for invalid actions, encodings, or input.
pub fn transform(text: &str, action: &str, encoding: &str) -> Result<String, Base64Error> {
    let action = Base64Action::parse(action)?;
    let encoding = TextEncoding::parse(encoding)?;
    match action {
        Base64Action::Encode => encode(text, encoding),
        Base64Action::Decode => decode(text, encoding),
    }
}

/// Encodes `text` into single bytes no larger than `max`.
fn narrow(encoding: TextEncoding, text: &str, max: u32) -> Result<Vec<u8>, Base64Error> {
    text.chars()
        .map(|character| {
            u8::try_from(u32::from(character))
                .ok()
                .filter(|byte| u32::from(*byte) <= max)
                .ok_or(Base64Error::Unencodable {
                    encoding: encoding.name(),
                    character,
                })
        })
        .collect()
}
