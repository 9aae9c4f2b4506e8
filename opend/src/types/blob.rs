//! Serde helpers for byte blobs: written as base64, read from base64 or a
//! JSON array of bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum BlobRepr {
    Text(String),
    Bytes(Vec<u8>),
}

pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    match BlobRepr::deserialize(deserializer)? {
        BlobRepr::Text(text) => STANDARD.decode(text).map_err(serde::de::Error::custom),
        BlobRepr::Bytes(bytes) => Ok(bytes),
    }
}

/// Encode bytes the way blobs travel on the wire.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
