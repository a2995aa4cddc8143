//! Entity payload codecs
//!
//! Every payload written to or read from an index passes through a
//! [`DocumentCodec`]. The client never inspects payload bytes itself.

mod json;

pub use json::JsonCodec;

use crate::error::Result;

/// Turns entities into opaque payload bytes and back.
///
/// Codecs must be `Send + Sync`: one codec instance is shared by every
/// clone of a client and by parallel result decoding.
pub trait DocumentCodec<E>: Send + Sync {
    /// Encode an entity for storage
    fn encode(&self, entity: &E) -> Result<Vec<u8>>;

    /// Decode the payload stored under `key`.
    ///
    /// Fails with [`crate::ClientError::Decode`] naming the key when the
    /// bytes are not a valid payload.
    fn decode(&self, key: &str, payload: &[u8]) -> Result<E>;

    /// Short identifier, used in logs
    fn codec_id(&self) -> &str;
}
