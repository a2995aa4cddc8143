use super::DocumentCodec;
use crate::error::{ClientError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{de::DeserializeOwned, Serialize};
use std::io::{Read, Write};
use std::marker::PhantomData;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// JSON payloads, optionally gzip-compressed.
///
/// Decoding sniffs the gzip header, so a codec reads payloads written with
/// either setting.
pub struct JsonCodec<E> {
    compress: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E> JsonCodec<E> {
    pub fn new(compress: bool) -> Self {
        Self {
            compress,
            _entity: PhantomData,
        }
    }

    pub fn compressed() -> Self {
        Self::new(true)
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    pub fn is_compressed(&self) -> bool {
        self.compress
    }
}

impl<E> Default for JsonCodec<E> {
    fn default() -> Self {
        Self::compressed()
    }
}

impl<E> Clone for JsonCodec<E> {
    fn clone(&self) -> Self {
        Self::new(self.compress)
    }
}

impl<E> DocumentCodec<E> for JsonCodec<E>
where
    E: Serialize + DeserializeOwned,
{
    fn encode(&self, entity: &E) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(entity).map_err(|e| ClientError::Codec(e.to_string()))?;
        if !self.compress {
            return Ok(json);
        }

        let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
        encoder.write_all(&json)?;
        Ok(encoder.finish()?)
    }

    fn decode(&self, key: &str, payload: &[u8]) -> Result<E> {
        if payload.starts_with(&GZIP_MAGIC) {
            let mut json = Vec::with_capacity(payload.len() * 4);
            GzDecoder::new(payload)
                .read_to_end(&mut json)
                .map_err(|e| ClientError::decode(key, e))?;
            serde_json::from_slice(&json).map_err(|e| ClientError::decode(key, e))
        } else {
            serde_json::from_slice(payload).map_err(|e| ClientError::decode(key, e))
        }
    }

    fn codec_id(&self) -> &str {
        if self.compress {
            "json+gzip"
        } else {
            "json"
        }
    }
}
