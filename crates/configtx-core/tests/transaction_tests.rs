use configtx_core::{
    ConfigGroup, ConfigManager, ConfigPolicy, ConfigTxError, ConfigValue, ErrorKind, GroupPath,
    ManagerConfig, ProposalStage, SiblingOrder,
};
use configtx_test_utils::{
    group_paths, init_tracing, sample_channel, Fault, Op, Recorder, RecordingInitializer, Side,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn manager(recorder: &Arc<Recorder>, order: SiblingOrder) -> ConfigManager {
    init_tracing();
    let config = ManagerConfig::new("testchannel").with_sibling_order(order);
    ConfigManager::new(config, RecordingInitializer::new(Arc::clone(recorder))).unwrap()
}

fn path(s: &str) -> GroupPath {
    s.parse().unwrap()
}

fn paths(list: &[&str]) -> Vec<GroupPath> {
    list.iter().map(|s| path(s)).collect()
}

fn sorted(mut v: Vec<GroupPath>) -> Vec<GroupPath> {
    v.sort();
    v
}

fn abc_channel() -> ConfigGroup {
    ConfigGroup::new()
        .with_group("A", ConfigGroup::new().with_group("A1", ConfigGroup::new()))
        .with_group("B", ConfigGroup::new())
        .with_group("C", ConfigGroup::new())
}

#[test]
fn full_call_sequence_for_small_tree() {
    let recorder = Recorder::new();
    let manager = manager(&recorder, SiblingOrder::Lexicographic);
    let tree = ConfigGroup::new()
        .with_value("V", ConfigValue::new(b"v".to_vec()))
        .with_policy("P", ConfigPolicy::new(1, b"p".to_vec()))
        .with_group("A", ConfigGroup::new().with_value("a", ConfigValue::new(b"a".to_vec())))
        .with_group("B", ConfigGroup::new());

    let result = manager.process_config(Arc::new(tree)).unwrap();
    assert_eq!(
        recorder.lines(),
        vec![
            "begin_values /",
            "begin_policies /",
            "begin_values /Channel",
            "begin_policies /Channel",
            "begin_values /Channel/A",
            "begin_policies /Channel/A",
            "deserialize[a] /Channel/A",
            "pre_commit /Channel/A",
            "begin_values /Channel/B",
            "begin_policies /Channel/B",
            "pre_commit /Channel/B",
            "deserialize[V] /Channel",
            "propose_policy[P] /Channel",
            "pre_commit /Channel/A",
            "pre_commit /Channel/B",
            "pre_commit /Channel",
            "pre_commit /Channel/A",
            "pre_commit /Channel/B",
            "pre_commit /Channel",
            "pre_commit /",
        ]
    );

    recorder.clear();
    result.commit();
    assert_eq!(
        recorder.lines(),
        vec![
            "commit_values /Channel/A",
            "commit_policies /Channel/A",
            "commit_values /Channel/B",
            "commit_policies /Channel/B",
            "commit_values /Channel",
            "commit_policies /Channel",
            "commit_values /",
            "commit_policies /",
        ]
    );
}

#[test]
fn successful_result_mirrors_tree() {
    let recorder = Recorder::new();
    let manager = manager(&recorder, SiblingOrder::Lexicographic);
    let tree = sample_channel();

    let result = manager.process_config(Arc::new(tree.clone())).unwrap();

    // One extra group for the synthetic root
    assert_eq!(result.group_count(), tree.group_count() + 1);
    assert!(result.path().is_root());
    assert_eq!(result.children().len(), 1);
    for p in group_paths(&tree, &manager.root_path()) {
        let found = result.find(&p).unwrap_or_else(|| panic!("no result for {p}"));
        let expected = tree.get(&GroupPath::new(p.segments()[1..].to_vec())).unwrap();
        assert_eq!(found.children().len(), expected.groups.len(), "children of {p}");
    }
    assert!(result.find(&path("/Channel/Missing")).is_none());

    assert_eq!(recorder.filter(|op| matches!(op, Op::Deserialize(_))).len(), 5);
    assert_eq!(recorder.filter(|op| matches!(op, Op::ProposePolicy(_))).len(), 4);
    result.rollback();
}

#[test]
fn commit_cascade_is_post_order() {
    let recorder = Recorder::new();
    let manager = manager(&recorder, SiblingOrder::ReverseLexicographic);
    let tree = sample_channel();

    let result = manager.process_config(Arc::new(tree.clone())).unwrap();
    recorder.clear();
    result.commit();

    let committed = recorder.committed();
    let mut expected = group_paths(&tree, &manager.root_path());
    expected.push(GroupPath::root());
    assert_eq!(sorted(committed.clone()), sorted(expected));

    for (i, parent) in committed.iter().enumerate() {
        for (j, other) in committed.iter().enumerate() {
            if parent != other && parent.is_prefix_of(other) {
                assert!(j < i, "{other} must commit before its ancestor {parent}");
            }
        }
    }
    assert_eq!(recorder.count(&Op::Commit(Side::Policy)), committed.len());
    assert!(recorder.rolled_back().is_empty());
}

#[test]
fn rollback_of_built_tree_is_post_order_and_commits_nothing() {
    let recorder = Recorder::new();
    let manager = manager(&recorder, SiblingOrder::Lexicographic);

    let result = manager.process_config(Arc::new(abc_channel())).unwrap();
    recorder.clear();
    result.rollback();

    assert_eq!(
        recorder.rolled_back(),
        paths(&["/Channel/A/A1", "/Channel/A", "/Channel/B", "/Channel/C", "/Channel", "/"])
    );
    assert!(recorder.committed().is_empty());
}

#[test]
fn sibling_pre_commit_failure_rolls_back_completed_siblings() {
    let recorder = Recorder::new();
    recorder.inject("/Channel/C", Fault::FailPreCommit);
    let manager = manager(&recorder, SiblingOrder::Lexicographic);

    let err = manager.process_config(Arc::new(abc_channel())).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StructuralFailure);
    assert_eq!(err.failed_path(), &path("/Channel/C"));
    assert_eq!(err.failed_stage(), Some(ProposalStage::PreCommit));
    assert_eq!(
        recorder.rolled_back(),
        paths(&["/Channel/C", "/Channel/A/A1", "/Channel/A", "/Channel/B", "/Channel", "/"])
    );
    assert_eq!(recorder.count(&Op::Rollback(Side::Policy)), 6);
    assert!(recorder.committed().is_empty());
}

#[test]
fn sibling_failure_outcome_independent_of_order() {
    let recorder = Recorder::new();
    recorder.inject("/Channel/C", Fault::FailPreCommit);
    let manager = manager(&recorder, SiblingOrder::ReverseLexicographic);

    let err = manager.process_config(Arc::new(abc_channel())).unwrap_err();

    // C is proposed first, so A and B are never begun.
    assert_eq!(err.failed_path(), &path("/Channel/C"));
    assert_eq!(recorder.begun(), paths(&["/", "/Channel", "/Channel/C"]));
    assert_eq!(recorder.rolled_back(), paths(&["/Channel/C", "/Channel", "/"]));
    assert!(recorder.committed().is_empty());
}

#[test]
fn short_value_handler_list_is_contract_violation() {
    let recorder = Recorder::new();
    recorder.inject("/Channel", Fault::DropValueChild);
    let manager = manager(&recorder, SiblingOrder::Lexicographic);

    let err = manager.process_config(Arc::new(abc_channel())).unwrap_err();

    assert!(err.is_contract_violation());
    assert!(matches!(
        err.root_cause(),
        ConfigTxError::ContractViolation { groups: 3, value_handlers: 2, policy_handlers: 3, .. }
    ));
    assert_eq!(err.failed_path(), &path("/Channel"));
    // Nothing below /Channel was proposed; only the synthetic root undoes itself.
    assert_eq!(recorder.begun(), paths(&["/", "/Channel"]));
    assert_eq!(recorder.rolled_back(), paths(&["/"]));
    assert!(recorder.committed().is_empty());
}

#[test]
fn short_policy_handler_list_is_contract_violation() {
    let recorder = Recorder::new();
    recorder.inject("/Channel/A", Fault::DropPolicyChild);
    let manager = manager(&recorder, SiblingOrder::Lexicographic);

    let err = manager.process_config(Arc::new(abc_channel())).unwrap_err();

    assert!(matches!(
        err.root_cause(),
        ConfigTxError::ContractViolation { groups: 1, value_handlers: 1, policy_handlers: 0, .. }
    ));
    assert_eq!(recorder.rolled_back(), paths(&["/Channel", "/"]));
}

#[test]
fn root_group_is_proposed_as_named_child() {
    let recorder = Recorder::new();
    init_tracing();
    let config = ManagerConfig::new("testchannel").with_root_group_key("Root");
    let manager =
        ConfigManager::new(config, RecordingInitializer::new(Arc::clone(&recorder))).unwrap();
    let tree = ConfigGroup::new()
        .with_value("Consortium", ConfigValue::new(b"c".to_vec()))
        .with_policy("Admins", ConfigPolicy::new(1, b"a".to_vec()));

    let result = manager.process_config(Arc::new(tree)).unwrap();

    assert_eq!(manager.root_path(), path("/Root"));
    assert_eq!(
        recorder.declared_groups(&GroupPath::root()),
        Some(vec!["Root".to_string()])
    );
    assert_eq!(
        recorder.filter(|op| matches!(op, Op::Deserialize(_) | Op::ProposePolicy(_))),
        vec![
            configtx_test_utils::Event {
                path: path("/Root"),
                op: Op::Deserialize("Consortium".into())
            },
            configtx_test_utils::Event {
                path: path("/Root"),
                op: Op::ProposePolicy("Admins".into())
            },
        ]
    );
    assert_eq!(result.children()[0].path(), &path("/Root"));
    result.commit();
}

#[test]
fn shuffled_children_are_proposed_with_their_own_groups() {
    let recorder = Recorder::new();
    let manager = manager(&recorder, SiblingOrder::Shuffled { seed: 3 });
    let names = ["A", "B", "C", "D", "E"];
    let tree = names.iter().fold(ConfigGroup::new(), |g, name| {
        let key = name.to_lowercase();
        g.with_group(
            *name,
            ConfigGroup::new().with_value(key.clone(), ConfigValue::new(key.into_bytes())),
        )
    });

    let result = manager.process_config(Arc::new(tree)).unwrap();

    assert_eq!(result.find(&path("/Channel")).unwrap().children().len(), names.len());
    let deserialized = recorder.filter(|op| matches!(op, Op::Deserialize(_)));
    assert_eq!(deserialized.len(), names.len());
    for event in deserialized {
        let group = event.path.last().unwrap().to_lowercase();
        assert_eq!(event.op, Op::Deserialize(group), "value read at {}", event.path);
    }
    result.rollback();
}

#[test]
fn one_context_reaches_every_call() {
    let recorder = Recorder::new();
    let manager = manager(&recorder, SiblingOrder::Lexicographic);
    let root = Arc::new(sample_channel());

    let result = manager.process_config(Arc::clone(&root)).unwrap();
    let tx = result.context().id();
    assert!(Arc::ptr_eq(result.context().config_arc(), &root));
    assert_eq!(result.context().channel_id(), "testchannel");
    result.commit();

    let contexts = recorder.contexts();
    assert_eq!(contexts, vec![(tx, Arc::as_ptr(&root) as usize)]);
}

#[test]
fn begin_value_failure_is_not_rolled_back_at_failing_group() {
    let recorder = Recorder::new();
    recorder.inject("/Channel/Application/Org2", Fault::FailBeginValues);
    let manager = manager(&recorder, SiblingOrder::Lexicographic);

    let err = manager.process_config(Arc::new(sample_channel())).unwrap_err();

    assert_eq!(err.failed_path(), &path("/Channel/Application/Org2"));
    assert_eq!(err.failed_stage(), Some(ProposalStage::BeginValueProposals));
    assert_eq!(
        recorder.rolled_back(),
        paths(&["/Channel/Application/Org1", "/Channel/Application", "/Channel", "/"])
    );
    // Orderer sorts after Application and is never reached.
    assert!(!recorder.begun().contains(&path("/Channel/Orderer")));
}

#[test]
fn begin_policy_failure_leaves_value_side_untouched_at_failing_group() {
    let recorder = Recorder::new();
    recorder.inject("/Channel/Orderer", Fault::FailBeginPolicies);
    let manager = manager(&recorder, SiblingOrder::Lexicographic);

    let err = manager.process_config(Arc::new(sample_channel())).unwrap_err();

    assert_eq!(err.failed_stage(), Some(ProposalStage::BeginPolicyProposals));
    assert!(recorder.begun().contains(&path("/Channel/Orderer")));
    assert!(!recorder.rolled_back().contains(&path("/Channel/Orderer")));
    assert!(recorder.rolled_back().contains(&path("/Channel/Application")));
}

#[test]
fn value_failure_after_children_rolls_back_children() {
    let recorder = Recorder::new();
    recorder.inject("/Channel", Fault::FailDeserialize("Consortium".into()));
    let manager = manager(&recorder, SiblingOrder::Lexicographic);

    let err = manager.process_config(Arc::new(sample_channel())).unwrap_err();

    assert_eq!(
        err.to_string(),
        "in group /: value deserialization failed at /Channel (key Consortium): \
         injected deserialization failure for Consortium"
    );
    assert_eq!(
        recorder.rolled_back(),
        paths(&[
            "/Channel/Application/Org1",
            "/Channel/Application/Org2",
            "/Channel/Application",
            "/Channel/Orderer",
            "/Channel",
            "/",
        ])
    );
    // Values are taken in key order, so HashingAlgorithm is never reached.
    assert_eq!(
        recorder
            .filter(|op| matches!(op, Op::Deserialize(_)))
            .iter()
            .filter(|e| e.path == path("/Channel"))
            .count(),
        1
    );
}

#[test]
fn policy_failure_reports_key() {
    let recorder = Recorder::new();
    recorder.inject("/Channel/Orderer", Fault::FailPolicy("BlockValidation".into()));
    let manager = manager(&recorder, SiblingOrder::Lexicographic);

    let err = manager.process_config(Arc::new(sample_channel())).unwrap_err();

    match err.root_cause() {
        ConfigTxError::Validation { stage, key, path: p, .. } => {
            assert_eq!(*stage, ProposalStage::ProposePolicy);
            assert_eq!(key.as_deref(), Some("BlockValidation"));
            assert_eq!(p, &path("/Channel/Orderer"));
        }
        other => panic!("unexpected root cause: {other:?}"),
    }
    assert!(recorder.committed().is_empty());
}

#[test]
fn pre_commit_can_be_rerun_on_result() {
    let recorder = Recorder::new();
    let manager = manager(&recorder, SiblingOrder::Lexicographic);
    let result = manager.process_config(Arc::new(abc_channel())).unwrap();

    recorder.clear();
    result.pre_commit().unwrap();
    assert_eq!(recorder.count(&Op::PreCommit), 6);
    result.rollback();
}

#[test]
fn validate_commits_nothing() {
    let recorder = Recorder::new();
    let manager = manager(&recorder, SiblingOrder::Lexicographic);
    let tree = sample_channel();

    let digest = manager.validate(Arc::new(tree.clone())).unwrap();

    assert_eq!(digest, tree.digest());
    assert!(recorder.committed().is_empty());
    assert_eq!(recorder.rolled_back().len(), tree.group_count() + 1);
    assert!(manager.current().is_none());
}

#[test]
fn apply_advances_sequence_and_failed_apply_keeps_current() {
    let recorder = Recorder::new();
    let manager = manager(&recorder, SiblingOrder::Lexicographic);

    let first = manager.apply(Arc::new(sample_channel())).unwrap();
    assert_eq!(first.sequence, 0);
    assert_eq!(first.digest, sample_channel().digest());

    let next = sample_channel().with_group("Consortiums", ConfigGroup::new());
    let second = manager.apply(Arc::new(next.clone())).unwrap();
    assert_eq!(second.sequence, 1);
    assert_ne!(second.digest, first.digest);

    recorder.inject("/Channel/Consortiums", Fault::FailPreCommit);
    recorder.clear();
    let err = manager.apply(Arc::new(next)).unwrap_err();
    assert_eq!(err.failed_path(), &path("/Channel/Consortiums"));
    assert!(recorder.committed().is_empty());

    let current = manager.current().unwrap();
    assert_eq!(current.sequence, 1);
    assert_eq!(current.digest, second.digest);
}

#[test]
fn manager_rejects_invalid_config() {
    let recorder = Recorder::new();
    let config = ManagerConfig::new("").with_root_group_key("Channel");
    assert!(ConfigManager::new(config, RecordingInitializer::new(recorder)).is_err());
}
