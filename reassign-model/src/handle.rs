//! Opaque state handle model.
//!
//! Handles point at persisted state without carrying payload bytes. The
//! core's only allowed operations on them are equality, intersection, and
//! iteration over operator-state streams — see the module-level contracts
//! below.

use std::fmt;

use crate::key_group_range::KeyGroupRange;

/// Capability trait implemented by keyed-state handle backends.
///
/// Different state backends (heap, incremental, …) represent keyed-state
/// handles differently and may intersect them differently (e.g. an
/// incremental backend might retain shared SST files across an intersection
/// rather than copying), so this is a trait rather than a single concrete
/// type. The reassignment core is generic over `K: KeyedStateHandle` and
/// never downcasts or inspects a handle beyond this contract.
pub trait KeyedStateHandle: Clone + fmt::Debug + PartialEq {
    /// The total key-group range this handle covers.
    fn key_group_range(&self) -> KeyGroupRange;

    /// Restricts this handle to `range`, or returns `None` if the
    /// intersection is empty. Implementations must preserve
    /// equality-under-identity-intersection: intersecting a handle with its
    /// own full range must return a handle equal to the original.
    fn intersect(&self, range: KeyGroupRange) -> Option<Self>;
}

/// A backend-agnostic keyed-state handle that simply remembers its range and
/// an opaque reference to the underlying persisted artifact.
///
/// This is the handle implementation the in-tree tests and the reference
/// `TopologyAdapter` use; production state backends provide their own
/// [`KeyedStateHandle`] implementations.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpaqueKeyedStateHandle {
    range: KeyGroupRange,
    /// Opaque reference to where the backend stored the bytes for this
    /// handle (e.g. a file id). Never interpreted by the core.
    artifact_ref: u64,
}

impl OpaqueKeyedStateHandle {
    /// Creates a handle covering `range`, backed by `artifact_ref`.
    pub const fn new(range: KeyGroupRange, artifact_ref: u64) -> Self {
        Self { range, artifact_ref }
    }

    /// The opaque artifact reference, exposed only for test assertions.
    pub const fn artifact_ref(&self) -> u64 {
        self.artifact_ref
    }
}

impl KeyedStateHandle for OpaqueKeyedStateHandle {
    fn key_group_range(&self) -> KeyGroupRange {
        self.range
    }

    fn intersect(&self, range: KeyGroupRange) -> Option<Self> {
        let narrowed = self.range.intersect(&range);
        if narrowed.is_empty() {
            None
        } else {
            Some(Self {
                range: narrowed,
                artifact_ref: self.artifact_ref,
            })
        }
    }
}

/// How an operator-state stream's sub-partitions are redistributed across
/// new subtasks.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DistributionMode {
    /// Sub-partitions are round-robined across new subtasks, one each.
    SplitDistribute,
    /// Every new subtask receives the full concatenated list.
    Union,
    /// Every new subtask receives an identical copy (all old subtasks held
    /// the same content).
    Broadcast,
}

/// The sub-partition layout of one state-stream, as recorded by the
/// producing subtask: how it should be redistributed, and the byte offsets
/// delimiting each sub-partition within the stream.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamPartitions {
    pub distribution_mode: DistributionMode,
    /// Byte offsets partitioning the stream; `offsets.len()` is the number
    /// of sub-partitions written by the producing subtask.
    pub offsets: Vec<i64>,
}

impl StreamPartitions {
    pub const fn new(distribution_mode: DistributionMode, offsets: Vec<i64>) -> Self {
        Self {
            distribution_mode,
            offsets,
        }
    }

    /// The number of sub-partitions this stream was split into.
    pub fn sub_partition_count(&self) -> usize {
        self.offsets.len()
    }
}

/// A handle to one subtask's operator (list) state: an opaque reference to
/// the single backing artifact (e.g. a file) the producing subtask wrote,
/// plus one stream per registered `OperatorStateStore`/`BroadcastStore`
/// name within it.
///
/// Repartitioning never merges sub-partitions from different delegates into
/// one handle — a new subtask that inherits sub-partitions originally
/// written by several old subtasks ends up with several `OperatorStateHandle`
/// values in its `managed_operator`/`raw_operator` list, one per
/// contributing delegate, each restricted to the sub-partitions it owns.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperatorStateHandle {
    delegate_ref: u64,
    streams: std::collections::BTreeMap<String, StreamPartitions>,
}

impl OperatorStateHandle {
    /// Creates a handle from its backing delegate reference and
    /// stream-name -> partition-layout map.
    pub fn new(delegate_ref: u64, streams: std::collections::BTreeMap<String, StreamPartitions>) -> Self {
        Self {
            delegate_ref,
            streams,
        }
    }

    /// Opaque reference to the backing artifact, never interpreted by the
    /// core — used only to tell two handles' origins apart.
    pub const fn delegate_ref(&self) -> u64 {
        self.delegate_ref
    }

    /// Iterates streams in stable (lexicographic, by name) order.
    pub fn streams(&self) -> impl Iterator<Item = (&str, &StreamPartitions)> {
        self.streams.iter().map(|(name, meta)| (name.as_str(), meta))
    }

    /// The partition layout for a single named stream, if present.
    pub fn stream(&self, name: &str) -> Option<&StreamPartitions> {
        self.streams.get(name)
    }

    /// Whether this handle carries any stream data at all.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
