//! Prior-execution state index and the snapshots produced for a new
//! execution.

use std::collections::BTreeMap;

use crate::error::ModelError;
use crate::handle::{KeyedStateHandle, OperatorStateHandle};
use crate::ids::{OperatorId, SubtaskIndex};

/// The full set of handles one subtask recorded in one checkpoint, for one
/// operator.
///
/// The keyed-state rawness invariant (`managed_keyed.is_empty() =>
/// raw_keyed.is_empty()`) mirrors the fact that a keyed backend is either
/// queried only through its managed API or also exposes raw snapshots, never
/// raw-only — it is enforced by [`SubtaskState::new`], not by the field
/// types, since the four collections are otherwise independent.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubtaskState<K: KeyedStateHandle> {
    pub managed_operator: Vec<OperatorStateHandle>,
    pub raw_operator: Vec<OperatorStateHandle>,
    pub managed_keyed: Vec<K>,
    pub raw_keyed: Vec<K>,
}

// Hand-written rather than derived: `derive(Default)` would add a
// `K: Default` bound that nothing about this type actually needs (`Vec<K>`
// is `Default` regardless of `K`), and `KeyedStateHandle` does not require
// `Default`.
impl<K: KeyedStateHandle> Default for SubtaskState<K> {
    fn default() -> Self {
        Self {
            managed_operator: Vec::new(),
            raw_operator: Vec::new(),
            managed_keyed: Vec::new(),
            raw_keyed: Vec::new(),
        }
    }
}

impl<K: KeyedStateHandle> SubtaskState<K> {
    /// Builds a `SubtaskState`, checking the keyed rawness invariant.
    pub fn new(
        managed_operator: Vec<OperatorStateHandle>,
        raw_operator: Vec<OperatorStateHandle>,
        managed_keyed: Vec<K>,
        raw_keyed: Vec<K>,
    ) -> Result<Self, ModelError> {
        if managed_keyed.is_empty() && !raw_keyed.is_empty() {
            return Err(ModelError::RawKeyedWithoutManagedKeyed);
        }
        Ok(Self {
            managed_operator,
            raw_operator,
            managed_keyed,
            raw_keyed,
        })
    }

    /// An empty state: a stateless operator's placeholder.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether any of the four handle collections is non-empty.
    pub fn has_state(&self) -> bool {
        !self.managed_operator.is_empty()
            || !self.raw_operator.is_empty()
            || !self.managed_keyed.is_empty()
            || !self.raw_keyed.is_empty()
    }
}

/// One operator's recorded state across every subtask of the prior
/// execution, plus the parallelism bounds that state was written under.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperatorState<K: KeyedStateHandle> {
    operator_id: OperatorId,
    old_parallelism: u32,
    max_parallelism: u32,
    subtask_states: BTreeMap<SubtaskIndex, SubtaskState<K>>,
}

impl<K: KeyedStateHandle> OperatorState<K> {
    /// Builds an `OperatorState`, validating that `old_parallelism > 0`,
    /// `max_parallelism >= old_parallelism`, and every recorded subtask
    /// index lies in `[0, old_parallelism)`.
    pub fn new(
        operator_id: OperatorId,
        old_parallelism: u32,
        max_parallelism: u32,
        subtask_states: BTreeMap<SubtaskIndex, SubtaskState<K>>,
    ) -> Result<Self, ModelError> {
        if old_parallelism == 0 {
            return Err(ModelError::ZeroOldParallelism { operator_id });
        }
        if max_parallelism < old_parallelism {
            return Err(ModelError::MaxParallelismBelowOldParallelism {
                operator_id,
                old_parallelism,
                max_parallelism,
            });
        }
        for &subtask_index in subtask_states.keys() {
            if subtask_index.as_u32() >= old_parallelism {
                return Err(ModelError::SubtaskIndexOutOfBounds {
                    operator_id,
                    subtask_index,
                    old_parallelism,
                });
            }
        }
        Ok(Self {
            operator_id,
            old_parallelism,
            max_parallelism,
            subtask_states,
        })
    }

    pub const fn operator_id(&self) -> OperatorId {
        self.operator_id
    }

    pub const fn old_parallelism(&self) -> u32 {
        self.old_parallelism
    }

    pub const fn max_parallelism(&self) -> u32 {
        self.max_parallelism
    }

    /// The recorded state for one old subtask, or an empty placeholder if
    /// that subtask held no state for this operator.
    pub fn subtask_state(&self, subtask_index: SubtaskIndex) -> SubtaskState<K> {
        self.subtask_states
            .get(&subtask_index)
            .cloned()
            .unwrap_or_else(SubtaskState::empty)
    }

    /// Subtask states in ascending subtask-index order.
    pub fn subtask_states(&self) -> impl Iterator<Item = (SubtaskIndex, &SubtaskState<K>)> {
        self.subtask_states.iter().map(|(&idx, state)| (idx, state))
    }

    /// Whether any subtask recorded state for this operator.
    pub fn is_stateless(&self) -> bool {
        self.subtask_states.values().all(|s| !s.has_state())
    }
}

/// Ordered index of every stateful operator the prior execution recorded,
/// keyed by [`OperatorId`]. Built once from a checkpoint's metadata and
/// read-only thereafter.
#[derive(Clone, Debug, Default)]
pub struct OperatorStates<K: KeyedStateHandle> {
    by_operator: BTreeMap<OperatorId, OperatorState<K>>,
}

impl<K: KeyedStateHandle> OperatorStates<K> {
    pub fn new(by_operator: BTreeMap<OperatorId, OperatorState<K>>) -> Self {
        Self { by_operator }
    }

    pub fn get(&self, operator_id: OperatorId) -> Option<&OperatorState<K>> {
        self.by_operator.get(&operator_id)
    }

    pub fn contains(&self, operator_id: OperatorId) -> bool {
        self.by_operator.contains_key(&operator_id)
    }

    /// All recorded operator ids, ascending.
    pub fn operator_ids(&self) -> impl Iterator<Item = OperatorId> + '_ {
        self.by_operator.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (OperatorId, &OperatorState<K>)> {
        self.by_operator.iter().map(|(&id, state)| (id, state))
    }

    pub fn len(&self) -> usize {
        self.by_operator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_operator.is_empty()
    }
}

/// A checkpoint metadata record: the restore point id plus the
/// [`OperatorStates`] index it produced. This is the sole external input
/// the core reads the prior execution's state from.
#[derive(Clone, Debug)]
pub struct CheckpointMetadata<K: KeyedStateHandle> {
    pub restore_checkpoint_id: u64,
    pub operator_states: OperatorStates<K>,
}

/// Per new subtask attempt, the state it should restore: an `OperatorId ->
/// SubtaskState` mapping plus the checkpoint id that produced it.
#[derive(Clone, Debug)]
pub struct TaskStateSnapshot<K: KeyedStateHandle> {
    restore_checkpoint_id: u64,
    by_operator: BTreeMap<OperatorId, SubtaskState<K>>,
}

impl<K: KeyedStateHandle> TaskStateSnapshot<K> {
    pub fn new(restore_checkpoint_id: u64) -> Self {
        Self {
            restore_checkpoint_id,
            by_operator: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, operator_id: OperatorId, state: SubtaskState<K>) {
        self.by_operator.insert(operator_id, state);
    }

    pub const fn restore_checkpoint_id(&self) -> u64 {
        self.restore_checkpoint_id
    }

    pub fn get(&self, operator_id: OperatorId) -> Option<&SubtaskState<K>> {
        self.by_operator.get(&operator_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (OperatorId, &SubtaskState<K>)> {
        self.by_operator.iter().map(|(&id, state)| (id, state))
    }

    /// Whether any operator in this snapshot carries state, i.e. whether
    /// it's worth submitting to the scheduler at all.
    pub fn has_state(&self) -> bool {
        self.by_operator.values().any(SubtaskState::has_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::OpaqueKeyedStateHandle;
    use crate::key_group_range::KeyGroupRange;

    #[test]
    fn raw_keyed_without_managed_keyed_is_rejected() {
        let handle = OpaqueKeyedStateHandle::new(KeyGroupRange::new(0, 1), 0);
        let result = SubtaskState::<OpaqueKeyedStateHandle>::new(vec![], vec![], vec![], vec![handle]);
        assert!(matches!(result, Err(ModelError::RawKeyedWithoutManagedKeyed)));
    }

    #[test]
    fn operator_state_rejects_subtask_index_out_of_bounds() {
        let mut subtask_states = BTreeMap::new();
        subtask_states.insert(SubtaskIndex::new(2), SubtaskState::<OpaqueKeyedStateHandle>::empty());
        let result = OperatorState::new(OperatorId::from_raw(1), 2, 2, subtask_states);
        assert!(matches!(
            result,
            Err(ModelError::SubtaskIndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn operator_states_exposes_lookup_and_coverage() {
        let op = OperatorState::<OpaqueKeyedStateHandle>::new(
            OperatorId::from_raw(9),
            2,
            4,
            BTreeMap::new(),
        )
        .unwrap();
        let mut by_operator = BTreeMap::new();
        by_operator.insert(op.operator_id(), op);
        let states = OperatorStates::new(by_operator);
        assert!(states.contains(OperatorId::from_raw(9)));
        assert!(!states.contains(OperatorId::from_raw(10)));
        assert_eq!(states.len(), 1);
    }

    #[test]
    fn task_state_snapshot_has_state_only_when_nonempty() {
        let mut snapshot = TaskStateSnapshot::<OpaqueKeyedStateHandle>::new(7);
        assert!(!snapshot.has_state());
        snapshot.insert(OperatorId::from_raw(1), SubtaskState::empty());
        assert!(!snapshot.has_state());
        let handle = OpaqueKeyedStateHandle::new(KeyGroupRange::new(0, 0), 0);
        snapshot.insert(
            OperatorId::from_raw(2),
            SubtaskState::new(vec![], vec![], vec![handle], vec![]).unwrap(),
        );
        assert!(snapshot.has_state());
    }
}
