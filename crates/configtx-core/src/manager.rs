//! Configuration manager
//!
//! Entry point for configuration transactions on one channel.
//!
//! # Workflow
//! 1. Wrap the channel's root group as the only child of a synthetic root
//! 2. Propose the synthetic root with the initializer's proposer pair
//! 3. Hand back the validated result, or commit / discard it directly

use crate::config::ManagerConfig;
use crate::context::{TxContext, TxId};
use crate::error::{ConfigError, ConfigTxError};
use crate::propose::propose_group;
use crate::proposer::Initializer;
use crate::result::TransactionResult;
use configtx_tree::{ConfigDigest, ConfigGroup, GroupPath};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A configuration accepted and committed by a [`ConfigManager`]
///
/// Serializable so a replica can publish what it applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedConfig {
    /// Number of configurations applied before this one
    pub sequence: u64,
    /// Transaction that committed it
    pub tx: TxId,
    /// Digest of `config`
    pub digest: ConfigDigest,
    /// The committed root group
    pub config: Arc<ConfigGroup>,
}

/// Drives configuration transactions for one channel
///
/// The manager does not serialize transactions; callers must keep at most
/// one reconfiguration in flight against the proposers it drives.
pub struct ConfigManager {
    config: ManagerConfig,
    initializer: Arc<dyn Initializer>,
    current: RwLock<Option<CommittedConfig>>,
}

impl ConfigManager {
    /// Create manager
    ///
    /// # Errors
    /// Returns error if `config` fails validation
    pub fn new(config: ManagerConfig, initializer: Arc<dyn Initializer>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            initializer,
            current: RwLock::new(None),
        })
    }

    /// Validate `root` and return the uncommitted result
    ///
    /// `root` is proposed under the well-known root group key, as the only
    /// child of an anonymous group. The same root is the transaction context
    /// handed to every proposer.
    ///
    /// # Errors
    /// Returns the first failure; every proposer touched has been rolled back
    pub fn process_config(
        &self,
        root: Arc<ConfigGroup>,
    ) -> Result<TransactionResult, ConfigTxError> {
        let ctx = TxContext::new(self.config.channel_id.as_str(), Arc::clone(&root));
        let synthetic =
            ConfigGroup::new().with_group(self.config.root_group_key.as_str(), (*root).clone());

        let outcome = propose_group(
            self.config.sibling_order,
            &ctx,
            GroupPath::root(),
            &synthetic,
            self.initializer.value_proposer(),
            self.initializer.policy_proposer(),
        );

        match outcome {
            Ok(result) => {
                tracing::debug!(
                    channel = %self.config.channel_id,
                    tx = %ctx.id(),
                    groups = result.group_count(),
                    "Configuration proposal validated"
                );
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(
                    channel = %self.config.channel_id,
                    tx = %ctx.id(),
                    failed_path = %e.failed_path(),
                    error = %e,
                    "Configuration proposal rejected"
                );
                Err(e)
            }
        }
    }

    /// Check that `root` would be accepted, without committing anything
    ///
    /// # Errors
    /// Returns the validation failure
    pub fn validate(&self, root: Arc<ConfigGroup>) -> Result<ConfigDigest, ConfigTxError> {
        let digest = root.digest();
        let result = self.process_config(root)?;
        result.rollback();

        tracing::info!(channel = %self.config.channel_id, digest = %digest.short(), "Configuration validated");
        Ok(digest)
    }

    /// Validate and commit `root`, making it the current configuration
    ///
    /// # Errors
    /// Returns the validation failure; the current configuration is unchanged
    pub fn apply(&self, root: Arc<ConfigGroup>) -> Result<CommittedConfig, ConfigTxError> {
        let digest = root.digest();
        let result = self.process_config(Arc::clone(&root))?;
        let tx = result.context().id();
        result.commit();

        let mut current = self.current.write();
        let committed = CommittedConfig {
            sequence: current.as_ref().map_or(0, |c| c.sequence + 1),
            tx,
            digest,
            config: root,
        };
        *current = Some(committed.clone());
        drop(current);

        tracing::info!(
            channel = %self.config.channel_id,
            sequence = committed.sequence,
            tx = %tx,
            digest = %digest.short(),
            "Configuration applied"
        );
        Ok(committed)
    }

    /// Most recently applied configuration
    #[must_use]
    pub fn current(&self) -> Option<CommittedConfig> {
        self.current.read().clone()
    }

    /// Path at which the channel's root group is proposed
    #[must_use]
    pub fn root_path(&self) -> GroupPath {
        GroupPath::root().child(self.config.root_group_key.as_str())
    }

    /// Channel this manager configures
    #[inline]
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.config.channel_id
    }

    /// Manager settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }
}

impl fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigManager")
            .field("config", &self.config)
            .field("current", &self.current.read().as_ref().map(|c| c.sequence))
            .finish_non_exhaustive()
    }
}
