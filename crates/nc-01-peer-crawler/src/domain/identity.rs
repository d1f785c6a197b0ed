//! Local node identity.

use std::fmt;

use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use shared_types::NodeId;

use super::errors::CrawlerError;

/// secp256k1 key pair the crawler identifies itself with.
///
/// The node id is `keccak256` of the uncompressed public key without its
/// `0x04` prefix.
#[derive(Clone)]
pub struct LocalIdentity {
    secret: SecretKey,
    public_key: [u8; 64],
    node_id: NodeId,
}

impl LocalIdentity {
    /// Load from a 32-byte hex private key (optional `0x` prefix).
    pub fn from_hex(key: &str) -> Result<Self, CrawlerError> {
        let key = key.trim();
        let bytes = hex::decode(key.strip_prefix("0x").unwrap_or(key))
            .map_err(|e| CrawlerError::Identity(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(CrawlerError::Identity(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let secret =
            SecretKey::from_slice(&bytes).map_err(|_| CrawlerError::Identity("key is not a valid scalar".into()))?;
        Ok(Self::from_secret(secret))
    }

    /// Fresh random identity.
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::random(&mut OsRng))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let point = secret.public_key().to_encoded_point(false);
        let mut public_key = [0u8; 64];
        public_key.copy_from_slice(&point.as_bytes()[1..]);
        Self {
            node_id: NodeId::from_public_key(&public_key),
            secret,
            public_key,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn public_key(&self) -> &[u8; 64] {
        &self.public_key
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key)
    }

    /// Private key as hex, for persisting a generated identity.
    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret.to_bytes())
    }

    /// Sign a handshake challenge, proving we hold the key behind our node id.
    ///
    /// Returns the 64-byte `r || s` signature (low-S, RFC 6979 nonce).
    pub fn sign_challenge(&self, challenge: &[u8; 32]) -> [u8; 64] {
        let key = SigningKey::from(&self.secret);
        let signature: Signature = key.sign(&challenge_message(challenge));
        let mut out = [0u8; 64];
        out.copy_from_slice(&signature.to_bytes());
        out
    }
}

/// Check that `signature` over `challenge` was made by `public_key`.
pub fn verify_challenge(public_key: &[u8; 64], challenge: &[u8; 32], signature: &[u8]) -> bool {
    let mut sec1 = [0u8; 65];
    sec1[0] = 0x04;
    sec1[1..].copy_from_slice(public_key);
    let Ok(key) = VerifyingKey::from_sec1_bytes(&sec1) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(&challenge_message(challenge), &signature).is_ok()
}

/// Bytes signed for a challenge: a fixed tag followed by the challenge.
fn challenge_message(challenge: &[u8; 32]) -> Vec<u8> {
    let mut message = b"peer-crawler status challenge\0".to_vec();
    message.extend_from_slice(challenge);
    message
}

impl fmt::Debug for LocalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalIdentity")
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

/// Decode a 64-byte hex public key and check that it is on the curve.
pub fn parse_public_key(hex_key: &str) -> Option<[u8; 64]> {
    let bytes = hex::decode(hex_key).ok()?;
    if bytes.len() != 64 {
        return None;
    }
    let mut sec1 = [0u8; 65];
    sec1[0] = 0x04;
    sec1[1..].copy_from_slice(&bytes);
    PublicKey::from_sec1_bytes(&sec1).ok()?;

    let mut key = [0u8; 64];
    key.copy_from_slice(&bytes);
    Some(key)
}
