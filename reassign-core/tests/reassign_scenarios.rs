//! End-to-end reassignment scenarios exercising the public driver API.

use std::collections::BTreeMap;

use reassign_core::{
    ChainPosition, InMemoryTopology, JobVertexId, Options, RecordingSchedulerSink, TopologyAdapter,
};
use reassign_model::{
    CheckpointMetadata, KeyGroupRange, OpaqueKeyedStateHandle, OperatorId, OperatorState,
    OperatorStates, SubtaskIndex, SubtaskState,
};

fn checkpoint(
    op: OperatorId,
    old_parallelism: u32,
    max_parallelism: u32,
    subtasks: BTreeMap<SubtaskIndex, SubtaskState<OpaqueKeyedStateHandle>>,
) -> CheckpointMetadata<OpaqueKeyedStateHandle> {
    let state = OperatorState::new(op, old_parallelism, max_parallelism, subtasks).unwrap();
    let mut by_operator = BTreeMap::new();
    by_operator.insert(op, state);
    CheckpointMetadata {
        restore_checkpoint_id: 42,
        operator_states: OperatorStates::new(by_operator),
    }
}

/// Scenario 3 from the spec: scaling a single-operator chain down from 4
/// subtasks to 2 merges every old subtask's key groups into its new owner.
#[test]
fn scale_down_merges_key_groups_across_new_subtasks() {
    let op = OperatorId::from_raw(1);
    let mut subtasks = BTreeMap::new();
    for i in 0..4u32 {
        let handle = OpaqueKeyedStateHandle::new(KeyGroupRange::new(i, i), u64::from(i));
        subtasks.insert(
            SubtaskIndex::new(i),
            SubtaskState::new(vec![], vec![], vec![handle], vec![]).unwrap(),
        );
    }
    let checkpoint = checkpoint(op, 4, 4, subtasks);

    let mut topology = InMemoryTopology::new();
    let vertex = JobVertexId::from_raw(1);
    topology.add_vertex(vertex, vec![ChainPosition::new(op)], 2, 4, true);

    let mut sink = RecordingSchedulerSink::new();
    let diagnostics =
        reassign_core::reassign(&checkpoint, &mut topology, &BTreeMap::new(), &mut sink, Options::default())
            .unwrap();

    assert!(diagnostics.is_empty());
    assert_eq!(sink.calls.len(), 2);
    let snapshot0 = sink.snapshot_for(vertex, 0).unwrap();
    assert_eq!(snapshot0.get(op).unwrap().managed_keyed.len(), 2);
    let snapshot1 = sink.snapshot_for(vertex, 1).unwrap();
    assert_eq!(snapshot1.get(op).unwrap().managed_keyed.len(), 2);
}

/// A two-operator chain where only the head carries keyed state and the
/// upstream operator carries split-distributed operator list state.
#[test]
fn chained_operator_only_head_gets_keyed_state() {
    use reassign_model::{DistributionMode, OperatorStateHandle, StreamPartitions};

    let upstream = OperatorId::from_raw(1);
    let head = OperatorId::from_raw(2);

    let mut upstream_subtasks = BTreeMap::new();
    let mut streams = BTreeMap::new();
    streams.insert("buffer".to_string(), StreamPartitions::new(DistributionMode::SplitDistribute, vec![1, 2]));
    let handle = OperatorStateHandle::new(0, streams);
    upstream_subtasks.insert(
        SubtaskIndex::new(0),
        SubtaskState::new(vec![handle], vec![], vec![], vec![]).unwrap(),
    );

    let mut head_subtasks = BTreeMap::new();
    let keyed = OpaqueKeyedStateHandle::new(KeyGroupRange::new(0, 127), 0);
    head_subtasks.insert(
        SubtaskIndex::new(0),
        SubtaskState::new(vec![], vec![], vec![keyed], vec![]).unwrap(),
    );

    let upstream_state = OperatorState::new(upstream, 1, 128, upstream_subtasks).unwrap();
    let head_state = OperatorState::new(head, 1, 128, head_subtasks).unwrap();
    let mut by_operator = BTreeMap::new();
    by_operator.insert(upstream, upstream_state);
    by_operator.insert(head, head_state);
    let checkpoint = CheckpointMetadata {
        restore_checkpoint_id: 1,
        operator_states: OperatorStates::new(by_operator),
    };

    let mut topology = InMemoryTopology::new();
    let vertex = JobVertexId::from_raw(1);
    topology.add_vertex(
        vertex,
        vec![ChainPosition::new(upstream), ChainPosition::new(head)],
        2,
        128,
        true,
    );

    let mut sink = RecordingSchedulerSink::new();
    reassign_core::reassign(&checkpoint, &mut topology, &BTreeMap::new(), &mut sink, Options::default()).unwrap();

    for subtask_index in 0..2 {
        let snapshot = sink.snapshot_for(vertex, subtask_index).unwrap();
        assert!(!snapshot.get(head).unwrap().managed_keyed.is_empty());
        assert!(snapshot.get(upstream).unwrap().managed_keyed.is_empty());
    }
}

/// Scenario 6: unmapped prior state with `allow_non_restored_state` unset
/// aborts the whole reassignment, leaving the sink untouched.
#[test]
fn unmapped_state_aborts_before_any_submission() {
    let op = OperatorId::from_raw(77);
    let checkpoint = checkpoint(op, 1, 1, BTreeMap::new());

    let mut topology = InMemoryTopology::new();
    topology.add_vertex(
        JobVertexId::from_raw(1),
        vec![ChainPosition::new(OperatorId::from_raw(1))],
        1,
        1,
        true,
    );

    let mut sink = RecordingSchedulerSink::<OpaqueKeyedStateHandle>::new();
    let result = reassign_core::reassign(&checkpoint, &mut topology, &BTreeMap::new(), &mut sink, Options::default());

    assert!(result.is_err());
    assert!(sink.calls.is_empty());
}

#[test]
fn chain_length_mismatch_is_checked_before_per_operator_work() {
    let vertex = JobVertexId::from_raw(1);
    let mut topology = InMemoryTopology::new();
    topology.add_vertex(vertex, vec![ChainPosition::new(OperatorId::from_raw(1))], 1, 1, true);
    let mut prior_chain_lengths = BTreeMap::new();
    prior_chain_lengths.insert(vertex, 3);

    let checkpoint = checkpoint(OperatorId::from_raw(1), 1, 1, BTreeMap::new());
    let mut sink = RecordingSchedulerSink::<OpaqueKeyedStateHandle>::new();
    let result = reassign_core::reassign(&checkpoint, &mut topology, &prior_chain_lengths, &mut sink, Options::default());

    assert!(matches!(
        result.unwrap_err(),
        reassign_core::ReassignError::ChainLengthMismatch { .. }
    ));
}

/// An unconfigured max-parallelism mismatch is tolerated and reflected back
/// onto the topology adapter for the scheduler to observe.
#[test]
fn unconfigured_max_parallelism_is_adopted_from_restored_state() {
    let op = OperatorId::from_raw(1);
    let handle = OpaqueKeyedStateHandle::new(KeyGroupRange::new(0, 255), 0);
    let mut subtasks = BTreeMap::new();
    subtasks.insert(
        SubtaskIndex::new(0),
        SubtaskState::new(vec![], vec![], vec![handle], vec![]).unwrap(),
    );
    let checkpoint = checkpoint(op, 1, 256, subtasks);

    let mut topology = InMemoryTopology::new();
    let vertex = JobVertexId::from_raw(1);
    topology.add_vertex(vertex, vec![ChainPosition::new(op)], 1, 128, false);

    let mut sink = RecordingSchedulerSink::new();
    let diagnostics =
        reassign_core::reassign(&checkpoint, &mut topology, &BTreeMap::new(), &mut sink, Options::default())
            .unwrap();

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(topology.max_parallelism(vertex), 256);
}
