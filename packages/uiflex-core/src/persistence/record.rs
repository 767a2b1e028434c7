//! On-disk record envelope.

use crc32fast::Hasher;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{FlexError, Result};

/// Current envelope format version.
pub const RECORD_FORMAT_VERSION: u32 = 1;

/// Envelope wrapping a JSON payload with its checksum.
///
/// The payload is stored as text so the checksum covers the exact bytes
/// that were written.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordEnvelope {
    pub format_version: u32,
    pub reference: String,
    pub checksum: u32,
    pub payload: String,
}

fn checksum(payload: &str) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload.as_bytes());
    hasher.finalize()
}

impl RecordEnvelope {
    /// Serializes a payload into an envelope.
    pub fn seal<T: Serialize>(reference: &str, payload: &T) -> Result<Self> {
        let payload = serde_json::to_string(payload)
            .map_err(|e| FlexError::SerializationError(e.to_string()))?;
        Ok(Self {
            format_version: RECORD_FORMAT_VERSION,
            reference: reference.to_string(),
            checksum: checksum(&payload),
            payload,
        })
    }

    /// Verifies and deserializes the payload.
    pub fn open<T: DeserializeOwned>(&self, reference: &str, verify: bool) -> Result<T> {
        if self.format_version != RECORD_FORMAT_VERSION {
            return Err(FlexError::SerializationError(format!(
                "Unsupported record format version: {}",
                self.format_version
            )));
        }
        if self.reference != reference {
            return Err(FlexError::DataCorruption(format!(
                "record holds reference '{}', expected '{}'",
                self.reference, reference
            )));
        }
        if verify {
            let actual = checksum(&self.payload);
            if actual != self.checksum {
                return Err(FlexError::DataCorruption(format!(
                    "checksum mismatch for '{}': expected {:08x}, got {:08x}",
                    reference, self.checksum, actual
                )));
            }
        }
        serde_json::from_str(&self.payload)
            .map_err(|e| FlexError::SerializationError(format!("Failed to parse record: {}", e)))
    }
}
