// src/eips/eip8021.rs
//! ERC-8021 transaction attribution.
//!
//! Schema 0 appends, after the ABI-encoded call data:
//!
//! ```text
//! codes (N bytes ASCII) || N (1 byte) || schemaId 0x00 (1 byte) || 0x8021 x 8 (16 bytes)
//! ```
//!
//! Parsers read it backwards from the end of the call data, so the original
//! call stays intact for the contract.

use alloy_primitives::Bytes;
use std::fmt;
use std::str::FromStr;

use crate::constants::{DEFAULT_ATTRIBUTION_TAG, ERC8021_MARKER, ERC8021_SCHEMA_ID};
use crate::error::EncodingError;

pub const MAX_TAG_LEN: usize = u8::MAX as usize;

/// Length byte + schema byte + marker.
pub const SUFFIX_OVERHEAD: usize = 1 + 1 + ERC8021_MARKER.len();

/// Application identifier carried in the suffix. Always encodable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributionTag(String);

impl AttributionTag {
    pub fn new(tag: impl Into<String>) -> Result<Self, EncodingError> {
        let tag = tag.into();
        check_tag(tag.as_bytes())?;
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn suffix(&self) -> Bytes {
        write_suffix(self.0.as_bytes())
    }

    /// `calldata || suffix`
    pub fn attribute(&self, calldata: &[u8]) -> Bytes {
        append_suffix(calldata, &self.suffix())
    }
}

impl Default for AttributionTag {
    fn default() -> Self {
        Self(DEFAULT_ATTRIBUTION_TAG.to_string())
    }
}

impl FromStr for AttributionTag {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for AttributionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn check_tag(tag: &[u8]) -> Result<u8, EncodingError> {
    if !tag.is_ascii() {
        return Err(EncodingError::NonAscii);
    }
    u8::try_from(tag.len()).map_err(|_| EncodingError::TagTooLong(tag.len()))
}

fn write_suffix(tag: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(tag.len() + SUFFIX_OVERHEAD);
    out.extend_from_slice(tag);
    // tag length was checked against the u8 range on construction
    out.push(tag.len() as u8);
    out.push(ERC8021_SCHEMA_ID);
    out.extend_from_slice(&ERC8021_MARKER);
    out.into()
}

/// Suffix bytes for `tag`.
pub fn encode_suffix(tag: &str) -> Result<Bytes, EncodingError> {
    check_tag(tag.as_bytes())?;
    Ok(write_suffix(tag.as_bytes()))
}

pub fn append_suffix(calldata: &[u8], suffix: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(calldata.len() + suffix.len());
    out.extend_from_slice(calldata);
    out.extend_from_slice(suffix);
    out.into()
}

/// Attributed call data split back into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedSuffix<'a> {
    pub calldata: &'a [u8],
    pub tag: &'a [u8],
}

/// Recognizes a schema 0 suffix at the end of `data`.
pub fn parse_suffix(data: &[u8]) -> Option<ParsedSuffix<'_>> {
    let marker_at = data.len().checked_sub(ERC8021_MARKER.len())?;
    if data[marker_at..] != ERC8021_MARKER {
        return None;
    }
    let schema_at = marker_at.checked_sub(1)?;
    if data[schema_at] != ERC8021_SCHEMA_ID {
        return None;
    }
    let len_at = schema_at.checked_sub(1)?;
    let tag_at = len_at.checked_sub(data[len_at] as usize)?;
    Some(ParsedSuffix {
        calldata: &data[..tag_at],
        tag: &data[tag_at..len_at],
    })
}
