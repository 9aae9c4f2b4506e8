//! Principals: opaque account/canister identifiers in their textual form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha224};

use crate::error::{OpendError, Result};

const MAX_LENGTH_IN_BYTES: usize = 29;
const SELF_AUTHENTICATING_SUFFIX: u8 = 0x02;
const ANONYMOUS_SUFFIX: u8 = 0x04;
const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// An account or canister identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal(Vec<u8>);

impl Principal {
    /// Build a principal from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_LENGTH_IN_BYTES {
            return Err(OpendError::InvalidPrincipal(format!(
                "{} bytes exceeds the {MAX_LENGTH_IN_BYTES}-byte limit",
                bytes.len()
            )));
        }
        Ok(Self(bytes.to_vec()))
    }

    /// The anonymous caller (`2vxsx-fae`).
    pub fn anonymous() -> Self {
        Self(vec![ANONYMOUS_SUFFIX])
    }

    /// The management canister (`aaaaa-aa`). The marketplace also returns it
    /// from `mint` when minting failed.
    pub fn management() -> Self {
        Self(Vec::new())
    }

    /// Principal derived from a DER-encoded public key.
    pub fn self_authenticating(der_public_key: &[u8]) -> Self {
        let mut bytes = Sha224::digest(der_public_key).to_vec();
        bytes.push(SELF_AUTHENTICATING_SUFFIX);
        Self(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == [ANONYMOUS_SUFFIX]
    }

    /// Parse the dashed base32 text form, verifying the checksum.
    pub fn from_text(text: &str) -> Result<Self> {
        let lowered = text.trim().to_ascii_lowercase();
        let compact: String = lowered.chars().filter(|c| *c != '-').collect();
        let decoded = base32_decode(&compact)
            .ok_or_else(|| OpendError::InvalidPrincipal(format!("not base32: {text}")))?;
        if decoded.len() < 4 {
            return Err(OpendError::InvalidPrincipal(format!("too short: {text}")));
        }

        let (checksum, bytes) = decoded.split_at(4);
        let expected = crc32(bytes).to_be_bytes();
        if checksum != expected {
            return Err(OpendError::InvalidPrincipal(format!(
                "checksum mismatch: {text}"
            )));
        }

        let principal = Self::from_slice(bytes)?;
        if principal.to_text() != lowered {
            return Err(OpendError::InvalidPrincipal(format!(
                "not in canonical form: {text}"
            )));
        }
        Ok(principal)
    }

    /// Render the dashed base32 text form.
    pub fn to_text(&self) -> String {
        let mut data = crc32(&self.0).to_be_bytes().to_vec();
        data.extend_from_slice(&self.0);
        let encoded = base32_encode(&data);

        let mut out = String::with_capacity(encoded.len() + encoded.len() / 5);
        for (i, c) in encoded.chars().enumerate() {
            if i > 0 && i % 5 == 0 {
                out.push('-');
            }
            out.push(c);
        }
        out
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.to_text())
    }
}

impl FromStr for Principal {
    type Err = OpendError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_text(s)
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_text(&text).map_err(serde::de::Error::custom)
    }
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for c in text.bytes() {
        let value = BASE32_ALPHABET.iter().position(|&a| a == c)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    Some(out)
}

/// CRC-32 (IEEE 802.3, reflected).
fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xffff_ffffu32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xedb8_8320 & mask);
        }
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_text() {
        assert_eq!(Principal::anonymous().to_text(), "2vxsx-fae");
        assert!(Principal::from_text("2vxsx-fae").unwrap().is_anonymous());
    }

    #[test]
    fn test_management_text() {
        assert_eq!(Principal::management().to_text(), "aaaaa-aa");
        assert_eq!(
            Principal::from_text("aaaaa-aa").unwrap(),
            Principal::management()
        );
    }

    #[test]
    fn test_canister_id_bytes() {
        let p = Principal::from_text("ryjl3-tyaaa-aaaaa-aaaba-cai").unwrap();
        assert_eq!(p.as_slice(), &[0, 0, 0, 0, 0, 0, 0, 2, 1, 1]);
        assert_eq!(p.to_text(), "ryjl3-tyaaa-aaaaa-aaaba-cai");
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        assert!(Principal::from_text("ryjl3-tyaaa-aaaaa-aaaba-caa").is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(Principal::from_text("not a principal!").is_err());
        assert!(Principal::from_text("").is_err());
    }

    #[test]
    fn test_self_authenticating_is_29_bytes() {
        let p = Principal::self_authenticating(b"some der key");
        assert_eq!(p.as_slice().len(), 29);
        assert_eq!(p.as_slice()[28], 0x02);
        assert_eq!(Principal::from_text(&p.to_text()).unwrap(), p);
    }

    #[test]
    fn test_serde_uses_text_form() {
        let json = serde_json::to_string(&Principal::anonymous()).unwrap();
        assert_eq!(json, "\"2vxsx-fae\"");
        let back: Principal = serde_json::from_str(&json).unwrap();
        assert!(back.is_anonymous());
    }

    #[test]
    fn test_too_long_rejected() {
        assert!(Principal::from_slice(&[0u8; 30]).is_err());
    }
}
