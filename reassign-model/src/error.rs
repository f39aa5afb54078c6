//! Errors raised while constructing model values. Reassignment-pipeline
//! errors (precondition failures, structural violations discovered while
//! reassigning) live in `reassign-core`; these are narrower and fire only
//! when a caller tries to build an invalid [`crate::state::OperatorState`]
//! or [`crate::state::SubtaskState`].

use thiserror::Error;

use crate::ids::{OperatorId, SubtaskIndex};

/// An invariant violation detected while constructing a model value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// `raw_keyed` was non-empty while `managed_keyed` was empty.
    #[error("raw keyed-state handles present without any managed keyed-state handles")]
    RawKeyedWithoutManagedKeyed,

    /// `OperatorState::old_parallelism` was zero.
    #[error("operator {operator_id} has old_parallelism == 0")]
    ZeroOldParallelism { operator_id: OperatorId },

    /// `max_parallelism < old_parallelism` for an operator.
    #[error(
        "operator {operator_id} has max_parallelism ({max_parallelism}) below its \
         old_parallelism ({old_parallelism})"
    )]
    MaxParallelismBelowOldParallelism {
        operator_id: OperatorId,
        old_parallelism: u32,
        max_parallelism: u32,
    },

    /// A recorded subtask index was `>= old_parallelism`.
    #[error(
        "operator {operator_id} recorded state for subtask {subtask_index}, which is out of \
         bounds for old_parallelism {old_parallelism}"
    )]
    SubtaskIndexOutOfBounds {
        operator_id: OperatorId,
        subtask_index: SubtaskIndex,
        old_parallelism: u32,
    },
}
