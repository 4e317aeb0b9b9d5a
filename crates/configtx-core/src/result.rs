//! Validated configuration transactions
//!
//! A [`TransactionResult`] is proof that a subtree passed its whole proposal
//! pass, pre-commit included. Its shape mirrors the subtree: one result per
//! group. Every cascade is post-order, children before their parent.

use crate::context::TxContext;
use crate::error::{ConfigTxError, ProposalStage};
use crate::proposer::{PolicyProposer, ValueProposer};
use configtx_tree::GroupPath;
use std::fmt;
use std::sync::Arc;

/// The handlers of one group together with its children's results
struct Node {
    ctx: TxContext,
    path: GroupPath,
    handler: Arc<dyn ValueProposer>,
    policy_handler: Arc<dyn PolicyProposer>,
    children: Vec<TransactionResult>,
}

impl Node {
    fn pre_commit(&self) -> Result<(), ConfigTxError> {
        for child in &self.children {
            child.pre_commit()?;
        }
        self.handler
            .pre_commit(&self.ctx)
            .map_err(|e| ConfigTxError::validation(&self.path, ProposalStage::PreCommit, None, e))
    }

    fn commit(self) {
        for child in self.children {
            child.commit();
        }
        self.handler.commit_proposals(&self.ctx);
        self.policy_handler.commit_proposals(&self.ctx);
    }

    fn rollback(self) {
        for child in self.children {
            child.rollback();
        }
        self.handler.rollback_proposals(&self.ctx);
        self.policy_handler.rollback_proposals(&self.ctx);
    }
}

/// A fully validated, not yet committed configuration subtree
///
/// Exactly one of [`commit`](Self::commit) or [`rollback`](Self::rollback)
/// should be called; both consume the result.
#[must_use = "a transaction result must be committed or rolled back"]
pub struct TransactionResult {
    node: Node,
}

impl TransactionResult {
    /// Re-run the pre-commit gate over the whole subtree
    ///
    /// # Errors
    /// Returns the first failure; nothing is rolled back
    pub fn pre_commit(&self) -> Result<(), ConfigTxError> {
        self.node.pre_commit()
    }

    /// Commit every group, children first
    pub fn commit(self) {
        self.node.commit();
    }

    /// Discard every group's proposal, children first
    pub fn rollback(self) {
        self.node.rollback();
    }

    /// Path of the group this result covers
    #[inline]
    #[must_use]
    pub fn path(&self) -> &GroupPath {
        &self.node.path
    }

    /// Transaction this result belongs to
    #[inline]
    #[must_use]
    pub fn context(&self) -> &TxContext {
        &self.node.ctx
    }

    /// Child results in the order they were proposed
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[TransactionResult] {
        &self.node.children
    }

    /// Number of groups covered, including this one
    #[must_use]
    pub fn group_count(&self) -> usize {
        1 + self
            .node
            .children
            .iter()
            .map(TransactionResult::group_count)
            .sum::<usize>()
    }

    /// Find the result for a descendant group
    #[must_use]
    pub fn find(&self, path: &GroupPath) -> Option<&TransactionResult> {
        if self.path() == path {
            return Some(self);
        }
        if !self.path().is_prefix_of(path) {
            return None;
        }
        self.children().iter().find_map(|child| child.find(path))
    }
}

impl fmt::Debug for TransactionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionResult")
            .field("tx", &self.node.ctx.id())
            .field("path", &self.node.path)
            .field("children", &self.node.children)
            .finish()
    }
}

/// A group whose proposal is still in progress
///
/// Holds the group's handlers and the results of children that already
/// succeeded. Turns into a [`TransactionResult`] only once pre-commit passes.
pub(crate) struct PendingResult {
    node: Node,
}

impl PendingResult {
    pub(crate) fn new(
        ctx: TxContext,
        path: GroupPath,
        handler: Arc<dyn ValueProposer>,
        policy_handler: Arc<dyn PolicyProposer>,
        capacity: usize,
    ) -> Self {
        Self {
            node: Node {
                ctx,
                path,
                handler,
                policy_handler,
                children: Vec::with_capacity(capacity),
            },
        }
    }

    pub(crate) fn push_child(&mut self, child: TransactionResult) {
        self.node.children.push(child);
    }

    pub(crate) fn path(&self) -> &GroupPath {
        &self.node.path
    }

    pub(crate) fn ctx(&self) -> &TxContext {
        &self.node.ctx
    }

    pub(crate) fn rollback(self) {
        self.node.rollback();
    }

    /// Run the pre-commit cascade and promote to a result
    ///
    /// On failure the whole pending subtree is rolled back.
    pub(crate) fn finish(self) -> Result<TransactionResult, ConfigTxError> {
        match self.node.pre_commit() {
            Ok(()) => Ok(TransactionResult { node: self.node }),
            Err(e) => {
                tracing::warn!(path = %self.node.path, error = %e, "Pre-commit failed, rolling back");
                self.node.rollback();
                Err(e)
            }
        }
    }
}
