//! Stable identifiers for operators and subtasks.

use std::fmt;

/// A stable, opaque identifier for a stateful operator.
///
/// Generated once when an operator is first added to a job and never
/// recomputed from its position in the graph, so it survives topology edits
/// that don't touch the operator itself. Opaque beyond equality, ordering,
/// and hashing: the core never inspects the bits.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperatorId(u128);

impl OperatorId {
    /// Creates an `OperatorId` from a raw 128-bit value.
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Creates an `OperatorId` from its big-endian byte representation.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_be_bytes(bytes))
    }

    /// Reveals the underlying 128-bit value.
    pub const fn into_raw(self) -> u128 {
        self.0
    }
}

impl fmt::Debug for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperatorId({:032x})", self.0)
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// The index of a parallel instance of a `JobVertex`, in `[0, parallelism)`.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubtaskIndex(u32);

impl SubtaskIndex {
    /// Creates a `SubtaskIndex` from a raw value.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Reveals the raw index.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Reveals the raw index as a `usize`, for slice/Vec indexing.
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SubtaskIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SubtaskIndex {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

/// Identifies one operator instance: a specific operator running as a
/// specific subtask. Used to key per-instance reassignment results.
///
/// `Hash` is derived and combined through [`fnv::FnvHashMap`]/[`fnv::FnvHashSet`]
/// by callers rather than `std::collections::HashMap` — `FnvHasher` has no
/// per-process random seed, so the resulting hash is stable across processes,
/// which matters when two coordinators (primary and standby) must derive
/// the same iteration-independent structures from the same inputs.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperatorInstanceId {
    /// The subtask this instance runs as.
    pub subtask_index: SubtaskIndex,
    /// The operator this instance executes.
    pub operator_id: OperatorId,
}

impl OperatorInstanceId {
    /// Creates a new `OperatorInstanceId`.
    pub const fn new(subtask_index: SubtaskIndex, operator_id: OperatorId) -> Self {
        Self {
            subtask_index,
            operator_id,
        }
    }
}

/// A `HashMap` keyed by [`OperatorInstanceId`] with a process-stable hasher.
pub type OperatorInstanceMap<V> = fnv::FnvHashMap<OperatorInstanceId, V>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_id_round_trips_through_bytes() {
        let bytes = [0xAB; 16];
        let id = OperatorId::from_bytes(bytes);
        assert_eq!(format!("{id}").len(), 32);
    }

    #[test]
    fn subtask_index_display_matches_value() {
        assert_eq!(SubtaskIndex::new(7).to_string(), "7");
    }

    #[test]
    fn operator_instance_id_orders_by_subtask_then_operator() {
        let op_a = OperatorId::from_raw(1);
        let op_b = OperatorId::from_raw(2);
        let a = OperatorInstanceId::new(SubtaskIndex::new(0), op_b);
        let b = OperatorInstanceId::new(SubtaskIndex::new(1), op_a);
        assert!(a < b);
    }
}
