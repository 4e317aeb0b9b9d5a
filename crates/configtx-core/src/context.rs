//! Transaction context threaded through every proposer call

use configtx_tree::ConfigGroup;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ulid::Ulid;

/// Unique transaction identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxId(pub Ulid);

impl TxId {
    /// Generate new transaction ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TxId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation token for one configuration transaction
///
/// The same context is handed unchanged to every proposer call and every
/// commit or rollback of the resulting transaction. It carries the root
/// group being proposed, so proposers can read the tree they validate.
#[derive(Debug, Clone)]
pub struct TxContext {
    id: TxId,
    channel_id: Arc<str>,
    config: Arc<ConfigGroup>,
}

impl TxContext {
    /// Create context for proposing `config` on `channel_id`
    #[must_use]
    pub fn new(channel_id: impl Into<Arc<str>>, config: Arc<ConfigGroup>) -> Self {
        Self {
            id: TxId::new(),
            channel_id: channel_id.into(),
            config,
        }
    }

    /// Transaction identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Channel being configured
    #[inline]
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Root group under proposal
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConfigGroup {
        &self.config
    }

    /// Shared handle to the root group under proposal
    #[inline]
    #[must_use]
    pub fn config_arc(&self) -> &Arc<ConfigGroup> {
        &self.config
    }

    /// Check whether two contexts belong to the same transaction
    #[inline]
    #[must_use]
    pub fn same_transaction(&self, other: &TxContext) -> bool {
        self.id == other.id
    }
}
