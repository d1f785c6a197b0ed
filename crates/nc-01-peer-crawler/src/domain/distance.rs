//! Kademlia XOR metric.
//!
//! All functions are pure and deterministic.

use shared_types::NodeId;

use super::candidate::Candidate;

/// Full 256-bit XOR distance. Compares lexicographically, smaller is closer.
pub fn xor_distance(a: &NodeId, b: &NodeId) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = a.as_bytes()[i] ^ b.as_bytes()[i];
    }
    out
}

/// Bucket of `remote` relative to `local`: the index of the first differing
/// bit (0 = farthest half of the keyspace). `None` for identical ids.
pub fn bucket_index(local: &NodeId, remote: &NodeId) -> Option<usize> {
    let local_bytes = local.as_bytes();
    let remote_bytes = remote.as_bytes();

    for i in 0..32 {
        let xor = local_bytes[i] ^ remote_bytes[i];
        if xor != 0 {
            return Some(i * 8 + xor.leading_zeros() as usize);
        }
    }
    None
}

/// Sort candidates closest-first to `target`.
pub fn sort_by_distance(candidates: &mut [Candidate], target: &NodeId) {
    candidates.sort_by_cached_key(|c| xor_distance(&c.node_id, target));
}
