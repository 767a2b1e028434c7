//! Persistence boundary for change sets and versions.
//!
//! Records are JSON. Revert data is runtime state and is never written.

mod file_store;
pub mod io_utils;
mod memory_store;
mod record;

pub use file_store::JsonFileStore;
pub use memory_store::MemoryStore;
pub use record::{RecordEnvelope, RECORD_FORMAT_VERSION};

use crate::change::ChangeSet;
use crate::error::Result;
use crate::version::Version;

/// Storage collaborator for change and version records.
///
/// Unknown references load as an empty change set and an empty version list.
pub trait ChangeStore: Send + Sync {
    fn load(&self, reference: &str) -> Result<ChangeSet>;

    fn save(&self, reference: &str, change_set: &ChangeSet) -> Result<()>;

    fn load_versions(&self, reference: &str) -> Result<Vec<Version>>;

    fn save_versions(&self, reference: &str, versions: &[Version]) -> Result<()>;
}
