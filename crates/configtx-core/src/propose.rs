//! Recursive group proposal
//!
//! Walks the configuration tree depth-first. Each call owns the rollback of
//! exactly what it built: its own handlers and its finished children. A
//! child that fails has already cleaned up after itself, so its parent never
//! touches it.

use crate::config::SiblingOrder;
use crate::context::TxContext;
use crate::error::{ConfigTxError, ProposalStage};
use crate::proposer::{PolicyProposer, ValueProposals, ValueProposer};
use crate::result::{PendingResult, TransactionResult};
use crate::wrapper::GroupWrapper;
use configtx_tree::{ConfigGroup, GroupPath};
use std::sync::Arc;

/// Propose `group` at `path` with the given handler pair
///
/// Returns the handlers passed in, plus every handler returned by the
/// recursive calls for the group's children, as one validated result.
pub(crate) fn propose_group(
    order: SiblingOrder,
    ctx: &TxContext,
    path: GroupPath,
    group: &ConfigGroup,
    handler: Arc<dyn ValueProposer>,
    policy_handler: Arc<dyn PolicyProposer>,
) -> Result<TransactionResult, ConfigTxError> {
    let mut children: Vec<(&String, &ConfigGroup)> = group.groups.iter().collect();
    order.arrange(&path, &mut children);
    let names: Vec<String> = children.iter().map(|(name, _)| (*name).clone()).collect();

    tracing::debug!(
        channel = ctx.channel_id(),
        tx = %ctx.id(),
        path = %path,
        groups = names.len(),
        "Beginning new config for group"
    );

    let ValueProposals {
        deserializer,
        children: value_children,
    } = handler
        .begin_value_proposals(ctx, &names)
        .map_err(|e| ConfigTxError::validation(&path, ProposalStage::BeginValueProposals, None, e))?;

    let policy_children = policy_handler
        .begin_policy_proposals(ctx, &names)
        .map_err(|e| ConfigTxError::validation(&path, ProposalStage::BeginPolicyProposals, None, e))?;

    if value_children.len() != names.len() || policy_children.len() != names.len() {
        tracing::error!(
            path = %path,
            groups = names.len(),
            value_handlers = value_children.len(),
            policy_handlers = policy_children.len(),
            "Proposer returned misaligned child handlers"
        );
        return Err(ConfigTxError::ContractViolation {
            path,
            groups: names.len(),
            value_handlers: value_children.len(),
            policy_handlers: policy_children.len(),
        });
    }

    let mut wrapper = GroupWrapper::new(group);
    let mut pending = PendingResult::new(
        ctx.clone(),
        path,
        handler,
        Arc::clone(&policy_handler),
        names.len(),
    );

    for (((name, child_group), value_child), policy_child) in
        children.into_iter().zip(value_children).zip(policy_children)
    {
        let child_path = pending.path().child(name.as_str());
        match propose_group(order, ctx, child_path, child_group, value_child, policy_child) {
            Ok(child) => pending.push_child(child),
            Err(e) => {
                let err = ConfigTxError::subgroup(pending.path(), e);
                tracing::warn!(path = %pending.path(), error = %err, "Subgroup failed, rolling back");
                pending.rollback();
                return Err(err);
            }
        }
    }

    let mut values: Vec<_> = wrapper.group().values.iter().collect();
    values.sort_unstable_by(|a, b| a.0.cmp(b.0));
    for (key, value) in values {
        match deserializer.deserialize(key, &value.value) {
            Ok(msg) => {
                let fresh = wrapper.record(key, msg);
                debug_assert!(fresh, "value key {key} deserialized twice");
            }
            Err(e) => return Err(abort(pending, ProposalStage::DeserializeValue, Some(key), e)),
        }
    }
    tracing::debug!(
        path = %pending.path(),
        deserialized = wrapper.deserialized_count(),
        "Deserialized group values"
    );

    let mut policies: Vec<_> = group.policies.iter().collect();
    policies.sort_unstable_by(|a, b| a.0.cmp(b.0));
    for (key, policy) in policies {
        if let Err(e) = policy_handler.propose_policy(pending.ctx(), key, policy) {
            return Err(abort(pending, ProposalStage::ProposePolicy, Some(key), e));
        }
    }

    pending.finish()
}

fn abort(
    pending: PendingResult,
    stage: ProposalStage,
    key: Option<&str>,
    source: anyhow::Error,
) -> ConfigTxError {
    let err = ConfigTxError::validation(pending.path(), stage, key, source);
    tracing::warn!(path = %pending.path(), error = %err, "Group proposal failed, rolling back");
    pending.rollback();
    err
}
