//! Completeness & preconditions checker: runs before any reassignment
//! result becomes observable.

use std::collections::BTreeMap;

use reassign_model::{Diagnostic, DiagnosticKind, KeyedStateHandle, OperatorId, OperatorStates};

use crate::error::ReassignError;
use crate::topology::{JobVertexId, TopologyAdapter};

struct MatchedPosition {
    vertex_id: JobVertexId,
    is_head: bool,
}

/// Builds the reverse index from a chain position's lookup key (alt id if
/// present, else primary id) to where it sits in the new topology.
///
/// Two positions resolving to the same lookup key would silently misroute
/// one of them's restored state to the other's vertex, so a collision is
/// rejected rather than letting the later insert win.
fn index_positions(
    topology: &impl TopologyAdapter,
) -> Result<BTreeMap<OperatorId, MatchedPosition>, ReassignError> {
    let mut index = BTreeMap::new();
    for vertex_id in topology.vertex_ids() {
        let chain = topology.chain(vertex_id);
        let last = chain.len().saturating_sub(1);
        for (position_index, position) in chain.iter().enumerate() {
            let lookup_key = position.lookup_key();
            if index.contains_key(&lookup_key) {
                return Err(ReassignError::InternalInvariant {
                    site: "index_positions",
                    message: format!(
                        "operator {lookup_key} matches more than one chain position in the new topology"
                    ),
                });
            }
            index.insert(
                lookup_key,
                MatchedPosition {
                    vertex_id,
                    is_head: position_index == last,
                },
            );
        }
    }
    Ok(index)
}

/// Runs every check in §4.8, mutating `topology`'s max-parallelism for
/// vertices whose restored value was allowed to override it, and returns
/// the diagnostics recorded for tolerated anomalies. Returns the first
/// fatal error encountered; the caller must not act on a partial result.
pub fn check_preconditions<K: KeyedStateHandle>(
    operator_states: &OperatorStates<K>,
    topology: &mut impl TopologyAdapter,
    prior_chain_lengths: &BTreeMap<JobVertexId, usize>,
    allow_non_restored_state: bool,
) -> Result<Vec<Diagnostic>, ReassignError> {
    for vertex_id in topology.vertex_ids() {
        if let Some(&prior_length) = prior_chain_lengths.get(&vertex_id) {
            let new_length = topology.chain(vertex_id).len();
            if prior_length != new_length {
                return Err(ReassignError::ChainLengthMismatch {
                    vertex_id,
                    prior_length,
                    new_length,
                });
            }
        }
    }

    let positions = index_positions(topology)?;
    let mut diagnostics = Vec::new();

    for (operator_id, operator_state) in operator_states.iter() {
        let Some(position) = positions.get(&operator_id) else {
            if allow_non_restored_state {
                diagnostics.push(Diagnostic::new(
                    operator_id,
                    DiagnosticKind::UnmappedStateSkipped,
                    "prior state has no matching operator in the new topology; skipped",
                ));
                continue;
            }
            return Err(ReassignError::UnmappedState { operator_id });
        };

        if !position.is_head {
            let carries_keyed_state = operator_state
                .subtask_states()
                .any(|(_, state)| !state.managed_keyed.is_empty() || !state.raw_keyed.is_empty());
            if carries_keyed_state {
                return Err(ReassignError::KeyedStateOnNonHeadOperator {
                    vertex_id: position.vertex_id,
                    operator_id,
                });
            }
        }

        let new_parallelism = topology.parallelism(position.vertex_id);
        let new_max_parallelism = topology.max_parallelism(position.vertex_id);
        let restored_max_parallelism = operator_state.max_parallelism();

        if restored_max_parallelism < new_parallelism {
            return Err(ReassignError::MaxParallelismTooLow {
                operator_id,
                restored_max_parallelism,
                new_parallelism,
            });
        }

        if restored_max_parallelism != new_max_parallelism {
            if topology.is_max_parallelism_configured(position.vertex_id) {
                return Err(ReassignError::MaxParallelismMismatch {
                    operator_id,
                    configured_max_parallelism: new_max_parallelism,
                    restored_max_parallelism,
                });
            }
            topology.set_max_parallelism(position.vertex_id, restored_max_parallelism);
            diagnostics.push(Diagnostic::new(
                operator_id,
                DiagnosticKind::MaxParallelismOverridden,
                format!(
                    "overrode max_parallelism {new_max_parallelism} -> {restored_max_parallelism} \
                     to match restored state"
                ),
            ));
        }
    }

    Ok(diagnostics)
}
