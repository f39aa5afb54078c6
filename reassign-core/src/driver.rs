//! The assignment driver: wires the preconditions checker, partitioner,
//! repartitioner and reassigner together and submits the result.

use std::collections::BTreeMap;

use reassign_model::{
    CheckpointMetadata, Diagnostic, KeyedStateHandle, OperatorStateHandle, SubtaskIndex,
    SubtaskState, TaskStateSnapshot,
};
use tracing::{debug, debug_span, info_span, warn};

use crate::error::ReassignError;
use crate::key_group_partitioner;
use crate::keyed_state_reassigner::{reassign_keyed_state, KeyedAssignment};
use crate::operator_state_repartitioner::{is_identity_fast_path_eligible, repartition_operator_state};
use crate::options::Options;
use crate::preconditions::check_preconditions;
use crate::scheduler_sink::SchedulerSink;
use crate::topology::{JobVertexId, TopologyAdapter};

/// Redistributes `checkpoint`'s operator states across `topology` and
/// delivers the result to `sink`.
///
/// Runs every check in the preconditions checker first: on any fatal error,
/// `sink` never observes a single call. On success, every `(vertex,
/// subtask_index)` pair with non-empty state is submitted in ascending
/// order, and the tolerated anomalies are returned as diagnostics.
pub fn reassign<K: KeyedStateHandle>(
    checkpoint: &CheckpointMetadata<K>,
    topology: &mut impl TopologyAdapter,
    prior_chain_lengths: &BTreeMap<JobVertexId, usize>,
    sink: &mut impl SchedulerSink<K>,
    options: Options,
) -> Result<Vec<Diagnostic>, ReassignError> {
    let span = info_span!(
        "restore_state",
        restore_checkpoint_id = checkpoint.restore_checkpoint_id
    );
    let _entered = span.enter();

    let mut diagnostics = Vec::with_capacity(options.diagnostics_capacity);
    diagnostics.extend(check_preconditions(
        &checkpoint.operator_states,
        topology,
        prior_chain_lengths,
        options.allow_non_restored_state,
    )?);
    for diagnostic in &diagnostics {
        warn!(%diagnostic, "tolerated precondition anomaly");
    }

    let mut vertex_ids = topology.vertex_ids();
    vertex_ids.sort();

    for vertex_id in vertex_ids {
        let _vertex_span = debug_span!("vertex", ?vertex_id).entered();
        let new_parallelism = topology.parallelism(vertex_id);
        let max_parallelism = topology.max_parallelism(vertex_id);
        let chain = topology.chain(vertex_id).to_vec();
        let last_index = chain.len().saturating_sub(1);

        let mut snapshots: Vec<TaskStateSnapshot<K>> = (0..new_parallelism)
            .map(|_| TaskStateSnapshot::new(checkpoint.restore_checkpoint_id))
            .collect();

        for (position_index, position) in chain.iter().enumerate() {
            let is_head = position_index == last_index;
            let lookup_key = position.lookup_key();

            let Some(operator_state) = checkpoint.operator_states.get(lookup_key) else {
                for snapshot in &mut snapshots {
                    snapshot.insert(position.primary_id, SubtaskState::empty());
                }
                continue;
            };

            debug!(operator_id = %position.primary_id, restored_as = %lookup_key, "assigning operator state");

            let managed_by_new = repartition_stream(
                operator_state.subtask_states().map(|(i, s)| (i, s.managed_operator.as_slice())),
                operator_state.old_parallelism(),
                new_parallelism,
            );
            let raw_by_new = repartition_stream(
                operator_state.subtask_states().map(|(i, s)| (i, s.raw_operator.as_slice())),
                operator_state.old_parallelism(),
                new_parallelism,
            );

            let keyed_by_new = if is_head {
                let partitions = key_group_partitioner::partition(max_parallelism, new_parallelism)?;
                Some(reassign_keyed_state(operator_state, new_parallelism, &partitions)?)
            } else {
                None
            };

            let keyed_by_new: Vec<Option<KeyedAssignment<K>>> = match keyed_by_new {
                Some(assignments) => assignments.into_iter().map(Some).collect(),
                None => (0..new_parallelism).map(|_| None).collect(),
            };

            for (((snapshot, managed), raw), keyed) in snapshots
                .iter_mut()
                .zip(managed_by_new)
                .zip(raw_by_new)
                .zip(keyed_by_new)
            {
                let (managed_keyed, raw_keyed) = match keyed {
                    Some(assignment) => (assignment.managed_keyed, assignment.raw_keyed),
                    None => (Vec::new(), Vec::new()),
                };
                snapshot.insert(
                    position.primary_id,
                    SubtaskState {
                        managed_operator: managed,
                        raw_operator: raw,
                        managed_keyed,
                        raw_keyed,
                    },
                );
            }
        }

        for (subtask_index, snapshot) in snapshots.into_iter().enumerate() {
            if snapshot.has_state() {
                sink.set_initial_state(vertex_id, subtask_index as u32, snapshot);
            }
        }
    }

    Ok(diagnostics)
}

/// Repartitions one operator-state collection (managed or raw), using the
/// identity fast path when parallelism is unchanged and eligible.
fn repartition_stream<'a>(
    old_subtasks: impl Iterator<Item = (SubtaskIndex, &'a [OperatorStateHandle])>,
    old_parallelism: u32,
    new_parallelism: u32,
) -> Vec<Vec<OperatorStateHandle>> {
    let old_states: Vec<(SubtaskIndex, &[OperatorStateHandle])> = old_subtasks.collect();
    if is_identity_fast_path_eligible(&old_states, old_parallelism, new_parallelism) {
        let mut by_new = vec![Vec::new(); new_parallelism as usize];
        for (index, handles) in old_states {
            by_new[index.as_usize()] = handles.to_vec();
        }
        by_new
    } else {
        repartition_operator_state(&old_states, new_parallelism)
    }
}
