//! Non-fatal diagnostics surfaced alongside a successful reassignment.

use std::fmt;

use crate::ids::OperatorId;

/// The kind of anomaly a [`Diagnostic`] reports. Each variant corresponds to
/// a precondition that was *tolerated* rather than rejected — the fatal
/// counterparts are `reassign_core::ReassignError` variants instead.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum DiagnosticKind {
    /// The new topology's max-parallelism was overridden to match the
    /// restored value because it was not user-fixed.
    MaxParallelismOverridden,
    /// Prior state for an operator was skipped because no vertex in the new
    /// topology contains it and `allow_non_restored_state` was set.
    UnmappedStateSkipped,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MaxParallelismOverridden => "max_parallelism_overridden",
            Self::UnmappedStateSkipped => "unmapped_state_skipped",
        };
        write!(f, "{s}")
    }
}

/// A single non-fatal record emitted during reassignment: which operator it
/// concerns, what kind of anomaly was tolerated, and a human-readable
/// message. Mirrored into the `tracing` log as a `warn!` event by the
/// driver so a log-only consumer still observes it.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub operator_id: OperatorId,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(operator_id: OperatorId, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            operator_id,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] operator {}: {}", self.kind, self.operator_id, self.message)
    }
}
