//! Per-pass view of a configuration group

use crate::proposer::DeserializedValue;
use configtx_tree::ConfigGroup;
use std::collections::HashMap;
use std::fmt;

/// A configuration group plus the values deserialized from it
///
/// Lives for a single proposal pass of its group and is dropped when that
/// pass returns, whether or not it succeeded.
pub struct GroupWrapper<'a> {
    group: &'a ConfigGroup,
    deserialized: HashMap<String, DeserializedValue>,
}

impl<'a> GroupWrapper<'a> {
    /// Wrap a group with an empty cache
    #[inline]
    #[must_use]
    pub fn new(group: &'a ConfigGroup) -> Self {
        Self {
            group,
            deserialized: HashMap::with_capacity(group.values.len()),
        }
    }

    /// The wrapped group
    #[inline]
    #[must_use]
    pub fn group(&self) -> &'a ConfigGroup {
        self.group
    }

    /// Record the deserialized form of a value
    ///
    /// Returns `false` and keeps the first entry if `key` was already recorded.
    pub fn record(&mut self, key: &str, value: DeserializedValue) -> bool {
        if self.deserialized.contains_key(key) {
            return false;
        }
        self.deserialized.insert(key.to_string(), value);
        true
    }

    /// Deserialized value under `key`, if it has type `T`
    #[must_use]
    pub fn deserialized<T: 'static>(&self, key: &str) -> Option<&T> {
        self.deserialized.get(key)?.downcast_ref::<T>()
    }

    /// Number of values deserialized so far
    #[inline]
    #[must_use]
    pub fn deserialized_count(&self) -> usize {
        self.deserialized.len()
    }
}

impl fmt::Debug for GroupWrapper<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.deserialized.keys().collect();
        keys.sort();
        f.debug_struct("GroupWrapper")
            .field("groups", &self.group.groups.len())
            .field("deserialized", &keys)
            .finish()
    }
}
