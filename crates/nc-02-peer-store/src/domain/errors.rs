//! Store errors.

use thiserror::Error;

/// Errors raised by either peer store.
///
/// `Contention` is the only transient class: the store is locked by a
/// concurrent extractor or writer and the caller should retry later.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store is busy (e.g. an extraction is already open).
    #[error("{store} store is busy: {reason}")]
    Contention { store: &'static str, reason: String },

    /// Underlying database failed.
    #[error("{store} store backend error: {message}")]
    Backend { store: &'static str, message: String },

    /// A record could not be encoded.
    #[error("record serialization failed: {0}")]
    Serialization(String),

    /// Stored bytes could not be decoded.
    #[error("corrupted entry {key}: {reason}")]
    Corrupted { key: String, reason: String },
}

impl StoreError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Contention { .. })
    }
}
