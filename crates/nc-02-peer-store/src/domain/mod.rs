//! Domain Layer - record encoding, upsert staging and the error taxonomy.

pub mod codec;
pub mod errors;
pub mod upsert;

pub use codec::{decode_record, encode_record};
pub use errors::StoreError;
pub use upsert::{retention_cutoff, stage_upserts, StagedUpsert, UpsertSummary};
