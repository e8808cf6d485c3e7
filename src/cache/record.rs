//! On-disk record format.
//!
//! One record per unit, three fields in fixed order: fingerprint,
//! generated source, compiled binary. The compiled binary is opaque and
//! may contain any byte value, so framing never relies on an in-band
//! sentinel: a fixed header declares the exact length of every field.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic        4 bytes  "TPLC"
//! version      1 byte
//! fp_len       u32
//! src_len      u32
//! bin_len      u32
//! fingerprint        fp_len bytes, UTF-8
//! generated_source   src_len bytes, UTF-8 (may be empty)
//! compiled_binary    bin_len bytes
//! ```
//!
//! A record either decodes completely or is rejected; a truncated file is
//! never surfaced as a valid record.

use std::string::FromUtf8Error;

use thiserror::Error;

const MAGIC: [u8; 4] = *b"TPLC";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1 + 4 * 3;

/// Errors from encoding or decoding a record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record too short: {actual} bytes, need at least {expected}")]
    Truncated { expected: usize, actual: usize },

    #[error("bad magic bytes")]
    BadMagic,

    #[error("unsupported record version {0}")]
    UnsupportedVersion(u8),

    #[error("declared field lengths ({declared} bytes) do not match payload ({actual} bytes)")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("text field is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("field of {0} bytes exceeds the record format limit")]
    FieldTooLarge(usize),
}

/// A unit's cached artifacts in their serialized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// Fingerprint the artifacts were stored under.
    pub fingerprint: String,
    /// Generated intermediate source; empty for sub-part units.
    pub generated_source: String,
    /// Compiled binary payload.
    pub compiled_binary: Vec<u8>,
}

impl CacheRecord {
    /// Serialize the record into its on-disk byte form.
    pub fn encode(&self) -> Result<Vec<u8>, RecordError> {
        let fp = self.fingerprint.as_bytes();
        let src = self.generated_source.as_bytes();
        let bin = &self.compiled_binary;

        let fp_len = field_len(fp.len())?;
        let src_len = field_len(src.len())?;
        let bin_len = field_len(bin.len())?;

        let mut out = Vec::with_capacity(HEADER_LEN + fp.len() + src.len() + bin.len());
        out.extend_from_slice(&MAGIC);
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&fp_len.to_le_bytes());
        out.extend_from_slice(&src_len.to_le_bytes());
        out.extend_from_slice(&bin_len.to_le_bytes());
        out.extend_from_slice(fp);
        out.extend_from_slice(src);
        out.extend_from_slice(bin);
        Ok(out)
    }

    /// Deserialize a record from its on-disk byte form.
    ///
    /// Rejects short headers, wrong magic, unknown versions, payloads
    /// whose size differs from the declared lengths (truncation as well
    /// as trailing bytes), and non-UTF-8 text fields.
    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() < HEADER_LEN {
            return Err(RecordError::Truncated {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        if bytes[..4] != MAGIC {
            return Err(RecordError::BadMagic);
        }
        let version = bytes[4];
        if version != FORMAT_VERSION {
            return Err(RecordError::UnsupportedVersion(version));
        }

        let fp_len = read_u32(bytes, 5) as usize;
        let src_len = read_u32(bytes, 9) as usize;
        let bin_len = read_u32(bytes, 13) as usize;

        let declared = fp_len
            .checked_add(src_len)
            .and_then(|n| n.checked_add(bin_len))
            .ok_or(RecordError::LengthMismatch {
                declared: usize::MAX,
                actual: bytes.len() - HEADER_LEN,
            })?;
        let actual = bytes.len() - HEADER_LEN;
        if declared != actual {
            return Err(RecordError::LengthMismatch { declared, actual });
        }

        let fp_end = HEADER_LEN + fp_len;
        let src_end = fp_end + src_len;

        Ok(Self {
            fingerprint: String::from_utf8(bytes[HEADER_LEN..fp_end].to_vec())?,
            generated_source: String::from_utf8(bytes[fp_end..src_end].to_vec())?,
            compiled_binary: bytes[src_end..].to_vec(),
        })
    }
}

fn field_len(len: usize) -> Result<u32, RecordError> {
    u32::try_from(len).map_err(|_| RecordError::FieldTooLarge(len))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
