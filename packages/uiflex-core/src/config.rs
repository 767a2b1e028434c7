//! Change engine configuration.

use std::path::PathBuf;

use crate::change::Layer;

/// Change engine configuration.
#[derive(Debug, Clone)]
pub struct FlexConfig {
    /// Data directory for change and version records
    pub data_dir: PathBuf,
    /// Highest layer whose changes are applied
    pub max_layer: Layer,
    /// Condense change sets before they are saved
    pub condense_on_save: bool,
    /// Verify record checksums when loading
    pub checksum_verification: bool,
    /// Maximum retry attempts for transient I/O errors
    pub persistence_max_retries: u32,
    /// Delay between retry attempts in milliseconds
    pub persistence_retry_delay_ms: u64,
}

impl Default for FlexConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            max_layer: Layer::User,
            condense_on_save: true,
            checksum_verification: true,
            persistence_max_retries: 3,
            persistence_retry_delay_ms: 100,
        }
    }
}
