//! Testing utilities for configtx workspace
//!
//! Recording proposers with fault injection, plus tree fixtures.

#![allow(missing_docs)]

use configtx_core::{
    DeserializedValue, Initializer, PolicyProposer, TxContext, TxId, Transactional,
    ValueDeserializer, ValueProposals, ValueProposer,
};
use configtx_tree::{ConfigGroup, ConfigPolicy, ConfigValue, GroupPath};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Which proposer of a group's pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Value,
    Policy,
}

/// A proposer call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    BeginValues,
    BeginPolicies,
    Deserialize(String),
    ProposePolicy(String),
    PreCommit,
    Commit(Side),
    Rollback(Side),
}

/// A proposer call made for the group at `path`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    pub path: GroupPath,
    pub op: Op,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match &self.op {
            Op::BeginValues => "begin_values".to_string(),
            Op::BeginPolicies => "begin_policies".to_string(),
            Op::Deserialize(key) => format!("deserialize[{key}]"),
            Op::ProposePolicy(key) => format!("propose_policy[{key}]"),
            Op::PreCommit => "pre_commit".to_string(),
            Op::Commit(Side::Value) => "commit_values".to_string(),
            Op::Commit(Side::Policy) => "commit_policies".to_string(),
            Op::Rollback(Side::Value) => "rollback_values".to_string(),
            Op::Rollback(Side::Policy) => "rollback_policies".to_string(),
        };
        write!(f, "{op} {}", self.path)
    }
}

/// Injected misbehavior for the group at a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    FailBeginValues,
    FailBeginPolicies,
    FailDeserialize(String),
    FailPolicy(String),
    FailPreCommit,
    /// Return one child value proposer too few
    DropValueChild,
    /// Return one child policy proposer too few
    DropPolicyChild,
}

/// Shared event log and fault table for one test
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
    faults: Mutex<HashMap<GroupPath, Vec<Fault>>>,
    declared: Mutex<HashMap<GroupPath, Vec<String>>>,
    contexts: Mutex<HashSet<(TxId, usize)>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Inject `fault` at the group with display path `path`
    pub fn inject(&self, path: &str, fault: Fault) {
        let path: GroupPath = path.parse().expect("fault path must be absolute");
        self.faults.lock().entry(path).or_default().push(fault);
    }

    fn has_fault(&self, path: &GroupPath, fault: &Fault) -> bool {
        self.faults
            .lock()
            .get(path)
            .is_some_and(|faults| faults.contains(fault))
    }

    fn record(&self, ctx: &TxContext, path: &GroupPath, op: Op) {
        let config = Arc::as_ptr(ctx.config_arc()) as usize;
        self.contexts.lock().insert((ctx.id(), config));
        self.events.lock().push(Event {
            path: path.clone(),
            op,
        });
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Events rendered as strings, for readable assertions
    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
        self.declared.lock().clear();
        self.contexts.lock().clear();
    }

    /// Child names passed to the latest `begin_value_proposals` at `path`
    pub fn declared_groups(&self, path: &GroupPath) -> Option<Vec<String>> {
        self.declared.lock().get(path).cloned()
    }

    /// Distinct (transaction, root group address) pairs seen by any call
    pub fn contexts(&self) -> Vec<(TxId, usize)> {
        self.contexts.lock().iter().copied().collect()
    }

    /// Events whose op satisfies `pred`, in call order
    pub fn filter(&self, pred: impl Fn(&Op) -> bool) -> Vec<Event> {
        self.events().into_iter().filter(|e| pred(&e.op)).collect()
    }

    /// Paths whose value handler was committed, in call order
    pub fn committed(&self) -> Vec<GroupPath> {
        self.paths_for(&Op::Commit(Side::Value))
    }

    /// Paths whose value handler was rolled back, in call order
    pub fn rolled_back(&self) -> Vec<GroupPath> {
        self.paths_for(&Op::Rollback(Side::Value))
    }

    /// Paths whose value proposals were begun, in call order
    pub fn begun(&self) -> Vec<GroupPath> {
        self.paths_for(&Op::BeginValues)
    }

    fn paths_for(&self, op: &Op) -> Vec<GroupPath> {
        self.filter(|o| o == op).into_iter().map(|e| e.path).collect()
    }

    /// Count of events matching `op` exactly
    pub fn count(&self, op: &Op) -> usize {
        self.filter(|o| o == op).len()
    }
}

/// Value proposer that records every call and fails where told to
#[derive(Debug)]
pub struct RecordingValueProposer {
    path: GroupPath,
    recorder: Arc<Recorder>,
}

impl RecordingValueProposer {
    pub fn new(path: GroupPath, recorder: Arc<Recorder>) -> Self {
        Self { path, recorder }
    }
}

impl Transactional for RecordingValueProposer {
    fn commit_proposals(&self, ctx: &TxContext) {
        self.recorder.record(ctx, &self.path, Op::Commit(Side::Value));
    }

    fn rollback_proposals(&self, ctx: &TxContext) {
        self.recorder.record(ctx, &self.path, Op::Rollback(Side::Value));
    }
}

impl ValueProposer for RecordingValueProposer {
    fn begin_value_proposals(
        &self,
        ctx: &TxContext,
        groups: &[String],
    ) -> anyhow::Result<ValueProposals> {
        self.recorder.record(ctx, &self.path, Op::BeginValues);
        self.recorder
            .declared
            .lock()
            .insert(self.path.clone(), groups.to_vec());
        if self.recorder.has_fault(&self.path, &Fault::FailBeginValues) {
            anyhow::bail!("injected begin_value_proposals failure");
        }

        let mut children: Vec<Arc<dyn ValueProposer>> = groups
            .iter()
            .map(|name| {
                Arc::new(Self::new(self.path.child(name.as_str()), Arc::clone(&self.recorder)))
                    as Arc<dyn ValueProposer>
            })
            .collect();
        if self.recorder.has_fault(&self.path, &Fault::DropValueChild) {
            children.pop();
        }

        let deserializer = RecordingDeserializer {
            ctx: ctx.clone(),
            path: self.path.clone(),
            recorder: Arc::clone(&self.recorder),
        };
        Ok(ValueProposals::new(Box::new(deserializer), children))
    }

    fn pre_commit(&self, ctx: &TxContext) -> anyhow::Result<()> {
        self.recorder.record(ctx, &self.path, Op::PreCommit);
        if self.recorder.has_fault(&self.path, &Fault::FailPreCommit) {
            anyhow::bail!("injected pre_commit failure");
        }
        Ok(())
    }
}

/// Deserializer that keeps payloads as raw bytes
#[derive(Debug)]
pub struct RecordingDeserializer {
    ctx: TxContext,
    path: GroupPath,
    recorder: Arc<Recorder>,
}

impl ValueDeserializer for RecordingDeserializer {
    fn deserialize(&self, key: &str, value: &[u8]) -> anyhow::Result<DeserializedValue> {
        self.recorder
            .record(&self.ctx, &self.path, Op::Deserialize(key.to_string()));
        if self
            .recorder
            .has_fault(&self.path, &Fault::FailDeserialize(key.to_string()))
        {
            anyhow::bail!("injected deserialization failure for {key}");
        }
        Ok(Box::new(value.to_vec()))
    }
}

/// Policy proposer that records every call and fails where told to
#[derive(Debug)]
pub struct RecordingPolicyProposer {
    path: GroupPath,
    recorder: Arc<Recorder>,
}

impl RecordingPolicyProposer {
    pub fn new(path: GroupPath, recorder: Arc<Recorder>) -> Self {
        Self { path, recorder }
    }
}

impl Transactional for RecordingPolicyProposer {
    fn commit_proposals(&self, ctx: &TxContext) {
        self.recorder.record(ctx, &self.path, Op::Commit(Side::Policy));
    }

    fn rollback_proposals(&self, ctx: &TxContext) {
        self.recorder.record(ctx, &self.path, Op::Rollback(Side::Policy));
    }
}

impl PolicyProposer for RecordingPolicyProposer {
    fn begin_policy_proposals(
        &self,
        ctx: &TxContext,
        groups: &[String],
    ) -> anyhow::Result<Vec<Arc<dyn PolicyProposer>>> {
        self.recorder.record(ctx, &self.path, Op::BeginPolicies);
        if self.recorder.has_fault(&self.path, &Fault::FailBeginPolicies) {
            anyhow::bail!("injected begin_policy_proposals failure");
        }

        let mut children: Vec<Arc<dyn PolicyProposer>> = groups
            .iter()
            .map(|name| {
                Arc::new(Self::new(self.path.child(name.as_str()), Arc::clone(&self.recorder)))
                    as Arc<dyn PolicyProposer>
            })
            .collect();
        if self.recorder.has_fault(&self.path, &Fault::DropPolicyChild) {
            children.pop();
        }
        Ok(children)
    }

    fn propose_policy(
        &self,
        ctx: &TxContext,
        key: &str,
        _policy: &ConfigPolicy,
    ) -> anyhow::Result<()> {
        self.recorder
            .record(ctx, &self.path, Op::ProposePolicy(key.to_string()));
        if self
            .recorder
            .has_fault(&self.path, &Fault::FailPolicy(key.to_string()))
        {
            anyhow::bail!("injected policy failure for {key}");
        }
        Ok(())
    }
}

/// Initializer handing out recording proposers for the synthetic root
#[derive(Debug, Clone)]
pub struct RecordingInitializer {
    recorder: Arc<Recorder>,
}

impl RecordingInitializer {
    pub fn new(recorder: Arc<Recorder>) -> Arc<Self> {
        Arc::new(Self { recorder })
    }
}

impl Initializer for RecordingInitializer {
    fn value_proposer(&self) -> Arc<dyn ValueProposer> {
        Arc::new(RecordingValueProposer::new(
            GroupPath::root(),
            Arc::clone(&self.recorder),
        ))
    }

    fn policy_proposer(&self) -> Arc<dyn PolicyProposer> {
        Arc::new(RecordingPolicyProposer::new(
            GroupPath::root(),
            Arc::clone(&self.recorder),
        ))
    }
}

/// Install a test-writer tracing subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "configtx_core=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Channel tree with orderer and application sections
///
/// ```text
/// Channel  values: HashingAlgorithm, Consortium   policies: Admins, Readers
/// ├── Orderer      values: BatchSize              policies: BlockValidation
/// └── Application                                 policies: Admins
///     ├── Org1     values: MSP
///     └── Org2     values: MSP
/// ```
pub fn sample_channel() -> ConfigGroup {
    let org = |name: &str| {
        ConfigGroup::new().with_value("MSP", ConfigValue::new(name.as_bytes().to_vec()))
    };
    ConfigGroup::new()
        .with_value("HashingAlgorithm", ConfigValue::new(b"SHA256".to_vec()))
        .with_value("Consortium", ConfigValue::new(b"SampleConsortium".to_vec()))
        .with_policy("Admins", ConfigPolicy::new(3, b"MAJORITY Admins".to_vec()))
        .with_policy("Readers", ConfigPolicy::new(3, b"ANY Readers".to_vec()))
        .with_group(
            "Orderer",
            ConfigGroup::new()
                .with_value("BatchSize", ConfigValue::new(b"10".to_vec()))
                .with_policy("BlockValidation", ConfigPolicy::new(3, b"ANY Writers".to_vec())),
        )
        .with_group(
            "Application",
            ConfigGroup::new()
                .with_policy("Admins", ConfigPolicy::new(3, b"MAJORITY Admins".to_vec()))
                .with_group("Org1", org("Org1MSP"))
                .with_group("Org2", org("Org2MSP")),
        )
}

/// Paths of every group in `group`, rooted at `base`, in sorted order
pub fn group_paths(group: &ConfigGroup, base: &GroupPath) -> Vec<GroupPath> {
    let mut paths = vec![base.clone()];
    for name in group.group_names() {
        paths.extend(group_paths(&group.groups[name], &base.child(name)));
    }
    paths.sort();
    paths
}

/// Arbitrary configuration trees up to `depth` levels below the root
pub fn arb_tree(depth: u32) -> impl Strategy<Value = ConfigGroup> {
    let leaf = (
        proptest::collection::btree_set("[a-d]", 0..3),
        proptest::collection::btree_set("[p-r]", 0..2),
    )
        .prop_map(|(values, policies)| {
            let group = values.into_iter().fold(ConfigGroup::new(), |g, k| {
                let payload = k.as_bytes().to_vec();
                g.with_value(k, ConfigValue::new(payload))
            });
            policies.into_iter().fold(group, |g, k| {
                let payload = k.as_bytes().to_vec();
                g.with_policy(k, ConfigPolicy::new(1, payload))
            })
        });

    leaf.prop_recursive(depth, 24, 4, |inner| {
        (
            proptest::collection::btree_map("[A-F]", inner, 0..4),
            proptest::collection::btree_set("[a-d]", 0..3),
        )
            .prop_map(|(children, values)| {
                let group = children
                    .into_iter()
                    .fold(ConfigGroup::new(), |g, (name, child)| g.with_group(name, child));
                values.into_iter().fold(group, |g, k| {
                    let payload = k.as_bytes().to_vec();
                    g.with_value(k, ConfigValue::new(payload))
                })
            })
    })
}
