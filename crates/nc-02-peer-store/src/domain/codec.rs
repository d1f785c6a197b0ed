//! Record encoding shared by the persistent adapters.

use shared_types::PeerRecord;

use super::errors::StoreError;

/// Serialize a record for storage.
pub fn encode_record(record: &PeerRecord) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Deserialize a stored record. `key` is only used for the error message.
pub fn decode_record(key: &[u8], bytes: &[u8]) -> Result<PeerRecord, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Corrupted {
        key: hex::encode(key),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::make_record;

    #[test]
    fn test_garbage_is_reported_as_corrupted() {
        let err = decode_record(&[0xde, 0xad], &[1, 2, 3]).unwrap_err();
        match err {
            StoreError::Corrupted { key, .. } => assert_eq!(key, "dead"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_encoded_record_decodes() {
        let record = make_record(4, 4, 1_000);
        let bytes = encode_record(&record).unwrap();
        assert_eq!(decode_record(b"k", &bytes).unwrap(), record);
    }
}
