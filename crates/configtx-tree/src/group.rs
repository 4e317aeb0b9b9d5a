//! Configuration groups, values and policies
//!
//! Provides [`ConfigGroup`], the node type of the configuration tree.

use crate::digest::ConfigDigest;
use crate::path::GroupPath;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named node of the configuration tree
///
/// Child names are map keys, so they are unique. The order in which
/// children are enumerated is unspecified; consumers must not depend on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigGroup {
    /// Modification counter for this group
    pub version: u64,

    /// Child groups keyed by name
    pub groups: HashMap<String, ConfigGroup>,

    /// Opaque values keyed by name
    pub values: HashMap<String, ConfigValue>,

    /// Opaque policies keyed by name
    pub policies: HashMap<String, ConfigPolicy>,

    /// Name of the policy governing modification of this group
    pub mod_policy: String,
}

impl ConfigGroup {
    /// Create empty group
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child group, returning self
    #[must_use]
    pub fn with_group(mut self, name: impl Into<String>, group: ConfigGroup) -> Self {
        self.groups.insert(name.into(), group);
        self
    }

    /// Add a value, returning self
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Add a policy, returning self
    #[must_use]
    pub fn with_policy(mut self, key: impl Into<String>, policy: ConfigPolicy) -> Self {
        self.policies.insert(key.into(), policy);
        self
    }

    /// Set the modification policy, returning self
    #[must_use]
    pub fn with_mod_policy(mut self, mod_policy: impl Into<String>) -> Self {
        self.mod_policy = mod_policy.into();
        self
    }

    /// Number of groups in this subtree, including self
    #[must_use]
    pub fn group_count(&self) -> usize {
        1 + self.groups.values().map(ConfigGroup::group_count).sum::<usize>()
    }

    /// Child group names in sorted order
    #[must_use]
    pub fn group_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.groups.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up a descendant group by path relative to this group
    ///
    /// The root path resolves to `self`.
    #[must_use]
    pub fn get(&self, path: &GroupPath) -> Option<&ConfigGroup> {
        path.segments()
            .iter()
            .try_fold(self, |group, segment| group.groups.get(segment))
    }

    /// Order-independent digest of this subtree
    #[inline]
    #[must_use]
    pub fn digest(&self) -> ConfigDigest {
        ConfigDigest::of_group(self)
    }

    /// Decode a group from JSON
    ///
    /// # Errors
    /// Returns error if the input is not a valid JSON encoding of a group
    pub fn from_json_str(input: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Decode a group from YAML
    ///
    /// # Errors
    /// Returns error if the input is not a valid YAML encoding of a group
    pub fn from_yaml_str(input: &str) -> Result<Self, DecodeError> {
        Ok(serde_yaml::from_str(input)?)
    }
}

/// Opaque configuration value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigValue {
    /// Modification counter
    pub version: u64,

    /// Encoded payload, interpreted only by value proposers
    #[serde(with = "crate::bytes")]
    pub value: Vec<u8>,

    /// Name of the policy governing modification of this value
    pub mod_policy: String,
}

impl ConfigValue {
    /// Create value at version 0 with no modification policy
    #[inline]
    #[must_use]
    pub fn new(value: Vec<u8>) -> Self {
        Self {
            version: 0,
            value,
            mod_policy: String::new(),
        }
    }
}

/// Opaque configuration policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPolicy {
    /// Modification counter
    pub version: u64,

    /// The policy itself
    pub policy: Policy,

    /// Name of the policy governing modification of this policy
    pub mod_policy: String,
}

impl ConfigPolicy {
    /// Create policy at version 0 with no modification policy
    #[inline]
    #[must_use]
    pub fn new(policy_type: i32, value: Vec<u8>) -> Self {
        Self {
            version: 0,
            policy: Policy { policy_type, value },
            mod_policy: String::new(),
        }
    }
}

/// Typed, encoded policy body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Policy kind discriminator, interpreted by policy proposers
    #[serde(rename = "type")]
    pub policy_type: i32,

    /// Encoded policy body
    #[serde(with = "crate::bytes")]
    pub value: Vec<u8>,
}

/// Errors decoding a configuration tree
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Malformed JSON
    #[error("json decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed YAML
    #[error("yaml decode error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
