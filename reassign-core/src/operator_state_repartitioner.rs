//! Operator (list) state repartitioning: round-robin for `SplitDistribute`,
//! full copy for `Union` and `Broadcast`.

use std::collections::BTreeMap;

use reassign_model::{DistributionMode, OperatorStateHandle, StreamPartitions, SubtaskIndex};

/// One sub-partition, tagged with the delegate it came from and the stream
/// it belongs to. The unit of redistribution: `offsets[]` entries are never
/// split further.
#[derive(Clone, Copy, Debug)]
struct SubPartition<'a> {
    delegate_ref: u64,
    stream_name: &'a str,
    mode: DistributionMode,
    offset: i64,
}

/// Collects every sub-partition of every stream, in old-subtask-index
/// ascending order and then original offset order within a subtask — the
/// order `SplitDistribute`'s round-robin assignment depends on.
fn collect_sub_partitions<'a>(
    old_states: &'a [(SubtaskIndex, &'a [OperatorStateHandle])],
) -> BTreeMap<&'a str, Vec<SubPartition<'a>>> {
    let mut by_stream: BTreeMap<&str, Vec<SubPartition>> = BTreeMap::new();
    for (_, handles) in old_states {
        for handle in *handles {
            for (stream_name, meta) in handle.streams() {
                let bucket = by_stream.entry(stream_name).or_default();
                for &offset in &meta.offsets {
                    bucket.push(SubPartition {
                        delegate_ref: handle.delegate_ref(),
                        stream_name,
                        mode: meta.distribution_mode,
                        offset,
                    });
                }
            }
        }
    }
    by_stream
}

fn singleton_handle(stream_name: &str, sub: &SubPartition) -> OperatorStateHandle {
    let mut streams = BTreeMap::new();
    streams.insert(
        stream_name.to_string(),
        StreamPartitions::new(sub.mode, vec![sub.offset]),
    );
    OperatorStateHandle::new(sub.delegate_ref, streams)
}

/// Redistributes one operator-state collection (managed or raw — the same
/// algorithm applies to both) across `new_parallelism` new subtasks.
///
/// `old_states` must be sorted ascending by [`SubtaskIndex`]; this is the
/// order [`reassign_model::OperatorState::subtask_states`] already yields.
pub fn repartition_operator_state(
    old_states: &[(SubtaskIndex, &[OperatorStateHandle])],
    new_parallelism: u32,
) -> Vec<Vec<OperatorStateHandle>> {
    let new_parallelism = new_parallelism as usize;
    let mut result: Vec<Vec<OperatorStateHandle>> = vec![Vec::new(); new_parallelism];
    if new_parallelism == 0 {
        return result;
    }

    let by_stream = collect_sub_partitions(old_states);

    for (stream_name, sub_partitions) in by_stream {
        if sub_partitions.is_empty() {
            continue;
        }
        match sub_partitions[0].mode {
            DistributionMode::SplitDistribute => {
                for (k, sub) in sub_partitions.iter().enumerate() {
                    result[k % new_parallelism].push(singleton_handle(stream_name, sub));
                }
            }
            DistributionMode::Union => {
                for target in result.iter_mut() {
                    for sub in &sub_partitions {
                        target.push(singleton_handle(stream_name, sub));
                    }
                }
            }
            DistributionMode::Broadcast => {
                // Every old subtask holds an identical copy; take the one
                // from the lowest old-subtask index, which is exactly the
                // one `collect_sub_partitions` placed first since it walks
                // `old_states` in ascending order and a broadcast stream
                // never spans more than one delegate per subtask.
                let lowest_delegate = sub_partitions[0].delegate_ref;
                let canonical: Vec<OperatorStateHandle> = sub_partitions
                    .iter()
                    .filter(|s| s.delegate_ref == lowest_delegate)
                    .map(|sub| singleton_handle(stream_name, sub))
                    .collect();
                for target in result.iter_mut() {
                    target.extend(canonical.iter().cloned());
                }
            }
        }
    }

    result
}

/// Whether a fast path may skip repartitioning entirely: parallelism is
/// unchanged and no stream uses `Union` (a `Union` stream is never
/// structurally a no-op, even at identity parallelism, since every new
/// subtask must receive the *full* concatenated list, not just its own).
pub fn is_identity_fast_path_eligible(
    old_states: &[(SubtaskIndex, &[OperatorStateHandle])],
    old_parallelism: u32,
    new_parallelism: u32,
) -> bool {
    old_parallelism == new_parallelism
        && !old_states.iter().any(|(_, handles)| {
            handles
                .iter()
                .flat_map(|h| h.streams())
                .any(|(_, meta)| meta.distribution_mode == DistributionMode::Union)
        })
}
