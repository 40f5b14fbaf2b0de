//! Error definitions for the mapping module.

use crate::host::StorageError;
use thiserror::Error;

/// Failure modes of mapping store operations.
///
/// Resolution never errors (it always falls back to the built-in default
/// table); these cover writes only, and each is fatal to that single
/// operation without corrupting the stored table.
#[derive(Debug, Error)]
pub enum MappingError {
    /// Insert attempted for a button the default table knows nothing about,
    /// so there is no group/label to derive for the new entry.
    #[error("button index {0} is not part of the default layout")]
    UnknownButtonIndex(u8),

    /// The host storage collaborator failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A stored table could not be serialized for persistence.
    #[error("failed to serialize mapping table: {0}")]
    Serialize(#[from] toml::ser::Error),
}
