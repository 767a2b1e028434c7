use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::change::ChangeSet;
use crate::config::FlexConfig;
use crate::error::{FlexError, Result};
use crate::version::Version;

use super::io_utils::{classify_io_error, RetryPolicy};
use super::record::RecordEnvelope;
use super::ChangeStore;

/// Characters kept verbatim in record file names.
const FILE_NAME_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

/// Store writing one checksummed JSON record per reference.
///
/// Layout:
/// ```text
/// <data_dir>/changes/<reference>.json
/// <data_dir>/versions/<reference>.json
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
    retry: RetryPolicy,
    verify_checksums: bool,
}

impl JsonFileStore {
    /// Creates a file store with the given configuration.
    pub fn new(config: &FlexConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            retry: RetryPolicy::new(
                config.persistence_max_retries,
                config.persistence_retry_delay_ms,
            ),
            verify_checksums: config.checksum_verification,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the change record for a reference.
    pub fn changes_path(&self, reference: &str) -> Result<PathBuf> {
        self.record_path("changes", reference)
    }

    /// Path of the version record for a reference.
    pub fn versions_path(&self, reference: &str) -> Result<PathBuf> {
        self.record_path("versions", reference)
    }

    fn record_path(&self, kind: &str, reference: &str) -> Result<PathBuf> {
        if reference.is_empty() {
            return Err(FlexError::InvalidReference(reference.to_string()));
        }
        let file_name = format!("{}.json", utf8_percent_encode(reference, FILE_NAME_SET));
        Ok(self.data_dir.join(kind).join(file_name))
    }

    fn write_record<T: Serialize>(&self, path: &Path, reference: &str, payload: &T) -> Result<()> {
        let envelope = RecordEnvelope::seal(reference, payload)?;
        let json = serde_json::to_string_pretty(&envelope)
            .map_err(|e| FlexError::SerializationError(e.to_string()))?;

        self.retry.run("write_record", || {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)
                    .map_err(|e| classify_io_error(e, "Failed to create record directory"))?;
            }

            let temp_path = path.with_extension("json.tmp");
            let mut file = File::create(&temp_path)
                .map_err(|e| classify_io_error(e, "Failed to create temp file"))?;
            file.write_all(json.as_bytes())
                .map_err(|e| classify_io_error(e, "Failed to write record"))?;
            file.sync_all()
                .map_err(|e| classify_io_error(e, "Failed to sync record"))?;

            fs::rename(&temp_path, path)
                .map_err(|e| classify_io_error(e, "Failed to rename record file"))
        })
    }

    fn read_record<T: DeserializeOwned>(&self, path: &Path, reference: &str) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = self.retry.run("read_record", || {
            fs::read_to_string(path).map_err(|e| classify_io_error(e, "Failed to read record"))
        })?;
        let envelope: RecordEnvelope = serde_json::from_str(&contents).map_err(|e| {
            FlexError::DataCorruption(format!("Failed to parse record envelope: {}", e))
        })?;
        envelope.open(reference, self.verify_checksums).map(Some)
    }
}

impl ChangeStore for JsonFileStore {
    fn load(&self, reference: &str) -> Result<ChangeSet> {
        let path = self.changes_path(reference)?;
        Ok(self.read_record(&path, reference)?.unwrap_or_default())
    }

    fn save(&self, reference: &str, change_set: &ChangeSet) -> Result<()> {
        let path = self.changes_path(reference)?;
        self.write_record(&path, reference, change_set)
    }

    fn load_versions(&self, reference: &str) -> Result<Vec<Version>> {
        let path = self.versions_path(reference)?;
        Ok(self.read_record(&path, reference)?.unwrap_or_default())
    }

    fn save_versions(&self, reference: &str, versions: &[Version]) -> Result<()> {
        let path = self.versions_path(reference)?;
        self.write_record(&path, reference, &versions)
    }
}
