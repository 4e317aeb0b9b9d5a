//! Proposer contracts
//!
//! Validation of each group is delegated to a pair of proposers, one for
//! values and one for policies. A proposer handles exactly one level of the
//! tree and hands out the proposers for that level's children.
//!
//! # Call sequence for one group
//! ```text
//! begin_value_proposals(children)  → deserializer + child value proposers
//! begin_policy_proposals(children) → child policy proposers
//!     (children proposed recursively)
//! deserializer.deserialize(key, raw)   for each value
//! propose_policy(key, policy)          for each policy
//! pre_commit()                         children first, then self
//!
//! later, exactly one of:
//! commit_proposals()    children first, then self
//! rollback_proposals()  children first, then self
//! ```

use crate::context::TxContext;
use configtx_tree::ConfigPolicy;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A deserialized configuration value
pub type DeserializedValue = Box<dyn Any + Send + Sync>;

/// Pending state that can be committed or discarded
///
/// Both operations are infallible; a failure inside them is a defect of the
/// implementation and is outside the transactional contract.
pub trait Transactional: Send + Sync {
    /// Make the pending proposal current
    fn commit_proposals(&self, ctx: &TxContext);

    /// Discard the pending proposal
    fn rollback_proposals(&self, ctx: &TxContext);
}

/// Validator for the values of one group
pub trait ValueProposer: Transactional {
    /// Start a proposal for this group
    ///
    /// `groups` names the group's children. The returned child proposers must
    /// be positionally aligned with `groups`, one per name.
    ///
    /// # Errors
    /// Returns error if the group's own preconditions are violated
    fn begin_value_proposals(
        &self,
        ctx: &TxContext,
        groups: &[String],
    ) -> anyhow::Result<ValueProposals>;

    /// Final validation gate once values, policies and children are proposed
    ///
    /// May be invoked more than once per transaction, so it must not
    /// change state.
    ///
    /// # Errors
    /// Returns error if the pending proposal is inconsistent
    fn pre_commit(&self, ctx: &TxContext) -> anyhow::Result<()>;
}

/// Validator for the policies of one group
pub trait PolicyProposer: Transactional {
    /// Start a proposal for this group
    ///
    /// Same alignment contract as [`ValueProposer::begin_value_proposals`].
    ///
    /// # Errors
    /// Returns error if the group's own preconditions are violated
    fn begin_policy_proposals(
        &self,
        ctx: &TxContext,
        groups: &[String],
    ) -> anyhow::Result<Vec<Arc<dyn PolicyProposer>>>;

    /// Propose one policy of this group
    ///
    /// # Errors
    /// Returns error if the policy is malformed or conflicts with others
    fn propose_policy(&self, ctx: &TxContext, key: &str, policy: &ConfigPolicy)
        -> anyhow::Result<()>;
}

/// Converts raw value payloads of one group into typed values
///
/// Only valid for the proposal pass that produced it.
pub trait ValueDeserializer: Send {
    /// Deserialize the payload stored under `key`
    ///
    /// # Errors
    /// Returns error if the key is unknown or the payload is malformed
    fn deserialize(&self, key: &str, value: &[u8]) -> anyhow::Result<DeserializedValue>;
}

/// Result of [`ValueProposer::begin_value_proposals`]
pub struct ValueProposals {
    /// Deserializer for this group's values
    pub deserializer: Box<dyn ValueDeserializer>,
    /// Child value proposers, aligned with the declared child names
    pub children: Vec<Arc<dyn ValueProposer>>,
}

impl ValueProposals {
    /// Create proposals
    #[inline]
    #[must_use]
    pub fn new(
        deserializer: Box<dyn ValueDeserializer>,
        children: Vec<Arc<dyn ValueProposer>>,
    ) -> Self {
        Self {
            deserializer,
            children,
        }
    }
}

impl fmt::Debug for ValueProposals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueProposals")
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

/// Source of the top-level proposer pair
pub trait Initializer: Send + Sync {
    /// Value proposer for the synthetic root
    fn value_proposer(&self) -> Arc<dyn ValueProposer>;

    /// Policy proposer for the synthetic root
    fn policy_proposer(&self) -> Arc<dyn PolicyProposer>;
}
