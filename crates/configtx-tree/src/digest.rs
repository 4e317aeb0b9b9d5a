//! Configuration digests
//!
//! Provides [`ConfigDigest`], a 32-byte Blake3 digest over a canonical
//! encoding of a [`ConfigGroup`]. Replicas holding equal trees compute
//! equal digests regardless of map iteration order.

use crate::group::{ConfigGroup, ConfigPolicy, ConfigValue};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-byte configuration digest (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ConfigDigest([u8; 32]);

impl ConfigDigest {
    /// Create digest from byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DigestError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| DigestError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Digest of a configuration group and everything below it
    #[must_use]
    pub fn of_group(group: &ConfigGroup) -> Self {
        let mut hasher = blake3::Hasher::new();
        hash_group(&mut hasher, group);
        Self(*hasher.finalize().as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

// Length-prefixed framing keeps adjacent fields from aliasing.
fn put_bytes(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn put_u64(hasher: &mut blake3::Hasher, n: u64) {
    hasher.update(&n.to_le_bytes());
}

fn sorted<V>(map: &std::collections::HashMap<String, V>) -> Vec<(&String, &V)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
    entries
}

fn hash_group(hasher: &mut blake3::Hasher, group: &ConfigGroup) {
    put_u64(hasher, group.version);
    put_bytes(hasher, group.mod_policy.as_bytes());

    put_u64(hasher, group.values.len() as u64);
    for (key, value) in sorted(&group.values) {
        put_bytes(hasher, key.as_bytes());
        hash_value(hasher, value);
    }

    put_u64(hasher, group.policies.len() as u64);
    for (key, policy) in sorted(&group.policies) {
        put_bytes(hasher, key.as_bytes());
        hash_policy(hasher, policy);
    }

    put_u64(hasher, group.groups.len() as u64);
    for (name, child) in sorted(&group.groups) {
        put_bytes(hasher, name.as_bytes());
        hash_group(hasher, child);
    }
}

fn hash_value(hasher: &mut blake3::Hasher, value: &ConfigValue) {
    put_u64(hasher, value.version);
    put_bytes(hasher, &value.value);
    put_bytes(hasher, value.mod_policy.as_bytes());
}

fn hash_policy(hasher: &mut blake3::Hasher, policy: &ConfigPolicy) {
    put_u64(hasher, policy.version);
    hasher.update(&policy.policy.policy_type.to_le_bytes());
    put_bytes(hasher, &policy.policy.value);
    put_bytes(hasher, policy.mod_policy.as_bytes());
}

impl Display for ConfigDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for ConfigDigest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

// Hex text in every format, identical to `Display`.
impl serde::Serialize for ConfigDigest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ConfigDigest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <String as serde::Deserialize>::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when working with digests
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// Invalid digest length
    #[error("invalid digest length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
