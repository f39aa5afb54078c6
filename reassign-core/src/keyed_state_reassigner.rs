//! Keyed-state reassignment: only the chain head carries keyed state, and
//! only the head's handles are intersected against the new key-group
//! partitioning.

use reassign_model::{KeyGroupRange, KeyedStateHandle, OperatorState, SubtaskIndex};

use crate::error::ReassignError;

/// One new subtask's keyed-state assignment: managed and raw handle lists,
/// mirroring [`reassign_model::SubtaskState`]'s two keyed collections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyedAssignment<K: KeyedStateHandle> {
    pub managed_keyed: Vec<K>,
    pub raw_keyed: Vec<K>,
}

// Hand-written rather than derived: `derive(Default)` would add a
// `K: Default` bound that nothing about this type needs.
impl<K: KeyedStateHandle> Default for KeyedAssignment<K> {
    fn default() -> Self {
        Self {
            managed_keyed: Vec::new(),
            raw_keyed: Vec::new(),
        }
    }
}

/// Intersects `handle` against `partition` and validates the result is
/// actually contained in `partition` — a [`KeyedStateHandle`] backend that
/// violates this is buggy, not the reassignment input.
fn intersect_checked<K: KeyedStateHandle>(
    handle: &K,
    partition: KeyGroupRange,
    operator_id: reassign_model::OperatorId,
) -> Result<Option<K>, ReassignError> {
    let Some(narrowed) = handle.intersect(partition) else {
        return Ok(None);
    };
    let contained = partition.intersect(&narrowed.key_group_range()) == narrowed.key_group_range();
    debug_assert!(contained, "KeyedStateHandle::intersect returned a range outside its input");
    if !contained {
        return Err(ReassignError::HandleIntersectCorrupt { operator_id });
    }
    Ok(Some(narrowed))
}

/// Computes the keyed-state assignment for every new subtask of a chain's
/// head operator.
///
/// If `new_parallelism == operator_state.old_parallelism()`, each new
/// subtask `i` reuses old subtask `i`'s handles verbatim — no intersection
/// is performed, preserving any backend-internal locality the handle might
/// carry. Otherwise every old subtask's handles are intersected against
/// each new partition and the non-empty results collected.
pub fn reassign_keyed_state<K: KeyedStateHandle>(
    operator_state: &OperatorState<K>,
    new_parallelism: u32,
    new_partitions: &[KeyGroupRange],
) -> Result<Vec<KeyedAssignment<K>>, ReassignError> {
    debug_assert_eq!(new_partitions.len(), new_parallelism as usize);

    if new_parallelism == operator_state.old_parallelism() {
        return Ok((0..new_parallelism)
            .map(|i| {
                let state = operator_state.subtask_state(SubtaskIndex::new(i));
                KeyedAssignment {
                    managed_keyed: state.managed_keyed,
                    raw_keyed: state.raw_keyed,
                }
            })
            .collect());
    }

    let operator_id = operator_state.operator_id();
    let mut assignments: Vec<KeyedAssignment<K>> = (0..new_parallelism)
        .map(|_| KeyedAssignment::default())
        .collect();

    for (_, old_state) in operator_state.subtask_states() {
        for (new_index, partition) in new_partitions.iter().enumerate() {
            for handle in &old_state.managed_keyed {
                if let Some(narrowed) = intersect_checked(handle, *partition, operator_id)? {
                    assignments[new_index].managed_keyed.push(narrowed);
                }
            }
            for handle in &old_state.raw_keyed {
                if let Some(narrowed) = intersect_checked(handle, *partition, operator_id)? {
                    assignments[new_index].raw_keyed.push(narrowed);
                }
            }
        }
    }

    Ok(assignments)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use reassign_model::{OpaqueKeyedStateHandle, OperatorId};

    use super::*;

    /// A handle backend that always returns the full key-group space
    /// regardless of what it was asked to intersect against — the
    /// "implementation bug" `HandleIntersectCorrupt` exists to catch.
    #[derive(Clone, Debug, PartialEq)]
    struct CorruptHandle;

    impl KeyedStateHandle for CorruptHandle {
        fn key_group_range(&self) -> KeyGroupRange {
            KeyGroupRange::new(0, 99)
        }

        fn intersect(&self, _range: KeyGroupRange) -> Option<Self> {
            Some(Self)
        }
    }

    #[test]
    fn corrupt_intersection_result_is_rejected() {
        let mut subtasks = BTreeMap::new();
        subtasks.insert(
            SubtaskIndex::new(0),
            reassign_model::SubtaskState::new(vec![], vec![], vec![CorruptHandle], vec![]).unwrap(),
        );
        let state = OperatorState::new(OperatorId::from_raw(1), 2, 4, subtasks).unwrap();
        let partitions = crate::key_group_partitioner::partition(4, 4).unwrap();

        let result = reassign_keyed_state(&state, 4, &partitions);
        assert_eq!(
            result.unwrap_err(),
            ReassignError::HandleIntersectCorrupt {
                operator_id: OperatorId::from_raw(1)
            }
        );
    }

    fn op_state(
        old_parallelism: u32,
        max_parallelism: u32,
        subtasks: Vec<(u32, Vec<OpaqueKeyedStateHandle>)>,
    ) -> OperatorState<OpaqueKeyedStateHandle> {
        use reassign_model::SubtaskState;
        let mut map = BTreeMap::new();
        for (index, handles) in subtasks {
            map.insert(
                SubtaskIndex::new(index),
                SubtaskState::new(vec![], vec![], handles, vec![]).unwrap(),
            );
        }
        OperatorState::new(OperatorId::from_raw(1), old_parallelism, max_parallelism, map).unwrap()
    }

    /// Scenario 1 from the spec: identity fast path.
    #[test]
    fn identity_fast_path_reuses_handles_verbatim() {
        let h0 = OpaqueKeyedStateHandle::new(KeyGroupRange::new(0, 1), 0);
        let h1 = OpaqueKeyedStateHandle::new(KeyGroupRange::new(2, 3), 1);
        let state = op_state(2, 4, vec![(0, vec![h0.clone()]), (1, vec![h1.clone()])]);
        let partitions = crate::key_group_partitioner::partition(4, 2).unwrap();

        let assignments = reassign_keyed_state(&state, 2, &partitions).unwrap();
        assert_eq!(assignments[0].managed_keyed, vec![h0]);
        assert_eq!(assignments[1].managed_keyed, vec![h1]);
    }

    /// Scenario 2 from the spec: scale up 2 -> 4 intersects every old
    /// handle against the finer partitioning.
    #[test]
    fn scale_up_intersects_against_new_partitions() {
        let h0 = OpaqueKeyedStateHandle::new(KeyGroupRange::new(0, 1), 0);
        let h1 = OpaqueKeyedStateHandle::new(KeyGroupRange::new(2, 3), 1);
        let state = op_state(2, 4, vec![(0, vec![h0.clone()]), (1, vec![h1.clone()])]);
        let partitions = crate::key_group_partitioner::partition(4, 4).unwrap();

        let assignments = reassign_keyed_state(&state, 4, &partitions).unwrap();
        assert_eq!(assignments[0].managed_keyed, vec![h0.intersect(KeyGroupRange::new(0, 0)).unwrap()]);
        assert_eq!(assignments[1].managed_keyed, vec![h0.intersect(KeyGroupRange::new(1, 1)).unwrap()]);
        assert_eq!(assignments[2].managed_keyed, vec![h1.intersect(KeyGroupRange::new(2, 2)).unwrap()]);
        assert_eq!(assignments[3].managed_keyed, vec![h1.intersect(KeyGroupRange::new(3, 3)).unwrap()]);
    }

    /// Scenario 3 from the spec: scale down 4 -> 2 merges multiple old
    /// subtasks' handles into each new subtask.
    #[test]
    fn scale_down_merges_multiple_old_subtasks() {
        let handles: Vec<_> = (0..4u32)
            .map(|i| OpaqueKeyedStateHandle::new(KeyGroupRange::new(i, i), i as u64))
            .collect();
        let state = op_state(
            4,
            4,
            handles.iter().cloned().enumerate().map(|(i, h)| (i as u32, vec![h])).collect(),
        );
        let partitions = crate::key_group_partitioner::partition(4, 2).unwrap();

        let assignments = reassign_keyed_state(&state, 2, &partitions).unwrap();
        assert_eq!(assignments[0].managed_keyed.len(), 2);
        assert_eq!(assignments[1].managed_keyed.len(), 2);
        assert!(assignments[0]
            .managed_keyed
            .iter()
            .all(|h| h.key_group_range().hi() <= 1));
        assert!(assignments[1]
            .managed_keyed
            .iter()
            .all(|h| h.key_group_range().lo() >= 2));
    }

    #[test]
    fn coverage_and_non_overlap_hold_across_a_grid() {
        for max_parallelism in 1..=12u32 {
            for old_parallelism in 1..=max_parallelism {
                for new_parallelism in 1..=max_parallelism {
                    let old_partitions =
                        crate::key_group_partitioner::partition(max_parallelism, old_parallelism).unwrap();
                    let handles: Vec<(u32, Vec<OpaqueKeyedStateHandle>)> = old_partitions
                        .iter()
                        .enumerate()
                        .map(|(i, r)| (i as u32, vec![OpaqueKeyedStateHandle::new(*r, i as u64)]))
                        .collect();
                    let state = op_state(old_parallelism, max_parallelism, handles);
                    let new_partitions =
                        crate::key_group_partitioner::partition(max_parallelism, new_parallelism).unwrap();

                    let assignments = reassign_keyed_state(&state, new_parallelism, &new_partitions).unwrap();

                    for key_group in 0..max_parallelism {
                        let covering = assignments
                            .iter()
                            .filter(|a| {
                                a.managed_keyed
                                    .iter()
                                    .any(|h| h.key_group_range().contains(key_group))
                            })
                            .count();
                        assert_eq!(covering, 1, "key group {key_group} covered {covering} times");
                    }
                }
            }
        }
    }
}
