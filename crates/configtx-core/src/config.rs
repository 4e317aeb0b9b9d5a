//! Manager configuration
//!
//! [`ManagerConfig`] is plain data, loadable from TOML:
//!
//! ```toml
//! channel_id = "mychannel"
//! root_group_key = "Channel"
//!
//! [sibling_order]
//! mode = "shuffled"
//! seed = 42
//! ```

use crate::error::ConfigError;
use configtx_tree::GroupPath;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Well-known key under which the channel's root group is proposed
pub const DEFAULT_ROOT_GROUP_KEY: &str = "Channel";

/// Configuration manager settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Channel this manager configures (used for log correlation)
    pub channel_id: String,
    /// Key of the real root group beneath the synthetic root
    pub root_group_key: String,
    /// Order in which sibling groups are proposed
    pub sibling_order: SiblingOrder,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            channel_id: "default".to_string(),
            root_group_key: DEFAULT_ROOT_GROUP_KEY.to_string(),
            sibling_order: SiblingOrder::default(),
        }
    }
}

impl ManagerConfig {
    /// Create default configuration for a channel
    #[inline]
    #[must_use]
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            ..Self::default()
        }
    }

    /// Set sibling order
    #[inline]
    #[must_use]
    pub fn with_sibling_order(mut self, order: SiblingOrder) -> Self {
        self.sibling_order = order;
        self
    }

    /// Set root group key
    #[inline]
    #[must_use]
    pub fn with_root_group_key(mut self, key: impl Into<String>) -> Self {
        self.root_group_key = key.into();
        self
    }

    /// Parse and validate configuration from TOML
    ///
    /// # Errors
    /// Returns error if the TOML is malformed or the configuration is invalid
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or its content is invalid
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Semantic checks
    ///
    /// # Errors
    /// Returns error if the channel id or root group key is unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_id.is_empty() {
            return Err(ConfigError::Invalid("channel_id must not be empty".into()));
        }
        if self.root_group_key.is_empty() {
            return Err(ConfigError::Invalid(
                "root_group_key must not be empty".into(),
            ));
        }
        if self.root_group_key.contains(GroupPath::SEPARATOR) {
            return Err(ConfigError::Invalid(format!(
                "root_group_key must not contain '{}': {}",
                GroupPath::SEPARATOR,
                self.root_group_key
            )));
        }
        Ok(())
    }
}

/// Order in which the children of a group are proposed
///
/// Outcomes never depend on this; it only changes the sequence of
/// proposer calls between siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SiblingOrder {
    /// Ascending by name
    #[default]
    Lexicographic,
    /// Descending by name
    ReverseLexicographic,
    /// Seeded permutation, distinct per group path
    Shuffled {
        /// Permutation seed
        seed: u64,
    },
}

impl SiblingOrder {
    /// Arrange the children of the group at `path`, keyed by name
    pub(crate) fn arrange<K: Ord, T>(self, path: &GroupPath, children: &mut [(K, T)]) {
        children.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        match self {
            Self::Lexicographic => {}
            Self::ReverseLexicographic => children.reverse(),
            Self::Shuffled { seed } => {
                let mut rng = StdRng::seed_from_u64(shuffle_seed(seed, path));
                children.shuffle(&mut rng);
            }
        }
    }
}

/// Per-group RNG seed: leading 8 bytes of Blake3 over the seed and path
fn shuffle_seed(seed: u64, path: &GroupPath) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    for segment in path.segments() {
        hasher.update(&(segment.len() as u64).to_le_bytes());
        hasher.update(segment.as_bytes());
    }
    let mut head = [0u8; 8];
    head.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
    u64::from_le_bytes(head)
}
