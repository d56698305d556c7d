//! Analysis-file tagged sections and the four-character type codes that
//! identify them.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("four-character code must be 1..=4 ASCII bytes, got {0:?}")]
pub struct FourCcError(String);

/// A four-character tag identifier (e.g. `PCOB`, `PWV4`), stored as its
/// big-endian ASCII bytes, zero-padded on the right when shorter than 4
/// characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc([u8; 4]);

impl FourCc {
    /// Encode a string of 1..=4 ASCII characters.
    pub fn new(s: &str) -> Result<Self, FourCcError> {
        if s.is_empty() || s.len() > 4 || !s.is_ascii() {
            return Err(FourCcError(s.to_string()));
        }
        let mut bytes = [0u8; 4];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self(bytes))
    }

    /// Big-endian four-byte form, as the analysis file stores it.
    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0
    }

    /// Decode back to the original string, trimming the zero padding.
    pub fn decode(self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(4);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

/// A single tagged binary section within an analysis file (`.DAT`, `.EXT`,
/// `.2EX`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedSection {
    pub file_ext: String,
    pub type_tag: FourCc,
    pub body: Vec<u8>,
}

impl TaggedSection {
    pub fn new(file_ext: impl Into<String>, type_tag: FourCc, body: Vec<u8>) -> Self {
        Self {
            file_ext: file_ext.into(),
            type_tag,
            body,
        }
    }
}
