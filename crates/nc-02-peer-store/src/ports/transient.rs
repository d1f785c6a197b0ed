//! Transient store contract.

use std::sync::atomic::{AtomicBool, Ordering};

use shared_types::PeerRecord;

use crate::domain::StoreError;

/// Write-optimized queue of records pending transfer.
///
/// # Concurrency
///
/// Any number of writers may `append` concurrently. At most one extraction
/// is open at a time; a concurrent `begin_extraction` fails with
/// [`StoreError::Contention`].
pub trait TransientStore: Send + Sync {
    /// Durably append one record.
    fn append(&self, record: &PeerRecord) -> Result<(), StoreError>;

    /// Open an extraction over every entry pending right now.
    ///
    /// Entries appended after this call are not part of the extraction and
    /// survive its commit.
    fn begin_extraction(&self) -> Result<Box<dyn Extraction + '_>, StoreError>;

    /// Number of entries currently pending.
    fn pending_count(&self) -> Result<usize, StoreError>;
}

/// An open read-and-remove transaction over the transient store.
///
/// Dropping an extraction without calling [`Extraction::commit`] rolls it
/// back: every entry stays pending.
pub trait Extraction: Send {
    /// The extracted batch.
    fn records(&self) -> &[PeerRecord];

    /// Durably remove the extracted entries and close the transaction.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Close the transaction leaving every entry pending.
    fn rollback(self: Box<Self>) {}
}

/// Single-holder flag guarding extraction.
///
/// Released on drop, so an extraction handle that goes out of scope for any
/// reason frees the store for the next extractor.
#[derive(Debug)]
pub struct ExtractionLock<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ExtractionLock<'a> {
    /// Acquire `flag` or report contention on `store`.
    pub fn try_acquire(flag: &'a AtomicBool, store: &'static str) -> Result<Self, StoreError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self { flag })
            .map_err(|_| StoreError::Contention {
                store,
                reason: "extraction already in progress".to_string(),
            })
    }
}

impl Drop for ExtractionLock<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
