//! Typed, fail-fast errors for the reassignment pipeline.
//!
//! Every variant carries enough context (the offending operator or vertex,
//! the values that disagreed) to reconstruct the diagnosis without
//! re-running the check that produced it. The core never panics on
//! malformed input — only on violated internal invariants, which are
//! reported as [`ReassignError::InternalInvariant`] rather than unwound via
//! `panic!`.

use reassign_model::OperatorId;
use thiserror::Error;

use crate::topology::JobVertexId;

/// A fatal error that aborts the current reassignment invocation. The
/// driver never performs partial recovery: an `Err` here means the caller
/// receives exactly this error and zero scheduler submissions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReassignError {
    /// `partition(max_parallelism, new_parallelism)` was called with
    /// `new_parallelism == 0` or `max_parallelism < new_parallelism`.
    #[error(
        "invalid parallelism: max_parallelism={max_parallelism}, new_parallelism={new_parallelism}"
    )]
    InvalidParallelism {
        max_parallelism: u32,
        new_parallelism: u32,
    },

    /// The restored `max_parallelism` is lower than the new topology's
    /// requested parallelism — there aren't enough key groups to go around.
    #[error(
        "operator {operator_id}: restored max_parallelism ({restored_max_parallelism}) is below \
         the new parallelism ({new_parallelism})"
    )]
    MaxParallelismTooLow {
        operator_id: OperatorId,
        restored_max_parallelism: u32,
        new_parallelism: u32,
    },

    /// The new topology fixed a `max_parallelism` that disagrees with the
    /// restored one, and the mismatch can't be silently resolved because the
    /// user explicitly pinned it.
    #[error(
        "operator {operator_id}: user-fixed max_parallelism ({configured_max_parallelism}) \
         differs from the restored max_parallelism ({restored_max_parallelism})"
    )]
    MaxParallelismMismatch {
        operator_id: OperatorId,
        configured_max_parallelism: u32,
        restored_max_parallelism: u32,
    },

    /// Prior state exists for an operator absent from every vertex's chain
    /// in the new topology, and `allow_non_restored_state` was `false`.
    #[error("operator {operator_id} has prior state but no matching operator in the new topology")]
    UnmappedState { operator_id: OperatorId },

    /// A non-head operator in a chain carried keyed state, violating the
    /// hard invariant that only chain heads do.
    #[error(
        "operator {operator_id} in vertex {vertex_id} is not the chain head but carries keyed state"
    )]
    KeyedStateOnNonHeadOperator {
        vertex_id: JobVertexId,
        operator_id: OperatorId,
    },

    /// The prior state's chain length for a vertex doesn't match the new
    /// topology's chain length for that vertex.
    #[error(
        "vertex {vertex_id}: prior chain length {prior_length} does not match new chain length \
         {new_length}"
    )]
    ChainLengthMismatch {
        vertex_id: JobVertexId,
        prior_length: usize,
        new_length: usize,
    },

    /// `KeyedStateHandle::intersect` returned a range not contained in its
    /// input range — an implementation bug in the handle backend.
    #[error(
        "operator {operator_id}: intersect() returned a range outside its input; this is a \
         state-backend bug, not a reassignment input error"
    )]
    HandleIntersectCorrupt { operator_id: OperatorId },

    /// Any other invariant failure, carrying the call site that detected it.
    #[error("internal invariant violated at {site}: {message}")]
    InternalInvariant {
        site: &'static str,
        message: String,
    },
}
