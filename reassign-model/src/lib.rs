//! Value types for checkpoint state reassignment.
//!
//! This crate holds only pure, immutable data: operator and subtask
//! identifiers, key-group ranges, the opaque state-handle model, and the
//! prior-execution state index built from a checkpoint's metadata. It has
//! no notion of a topology, a partitioning algorithm, or a scheduler —
//! those live in `reassign-core`, which depends on this crate.
//!
//! Reassignment never mutates a value defined here; every operation
//! constructs fresh output from read-only input.

pub mod diagnostic;
pub mod error;
pub mod handle;
pub mod ids;
pub mod key_group_range;
pub mod state;

pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use error::ModelError;
pub use handle::{DistributionMode, KeyedStateHandle, OpaqueKeyedStateHandle, OperatorStateHandle, StreamPartitions};
pub use ids::{OperatorId, OperatorInstanceId, OperatorInstanceMap, SubtaskIndex};
pub use key_group_range::KeyGroupRange;
pub use state::{CheckpointMetadata, OperatorState, OperatorStates, SubtaskState, TaskStateSnapshot};
