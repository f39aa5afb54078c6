//! The key-group partitioner: the single bit-stable contract this crate
//! owns. Any divergence from this formula from the one used at
//! checkpoint-write time silently corrupts all keyed state — it must never
//! be "improved" without a migration plan.

use reassign_model::KeyGroupRange;

use crate::error::ReassignError;

/// Splits `[0, max_parallelism)` into `new_parallelism` contiguous,
/// gap-free, non-overlapping ranges.
///
/// `range[i] = [i * max_parallelism / new_parallelism, (i + 1) *
/// max_parallelism / new_parallelism - 1]` using integer division. This
/// must byte-for-byte match the partitioner used when the keyed state being
/// restored was written.
pub fn partition(
    max_parallelism: u32,
    new_parallelism: u32,
) -> Result<Vec<KeyGroupRange>, ReassignError> {
    if new_parallelism == 0 || max_parallelism < new_parallelism {
        return Err(ReassignError::InvalidParallelism {
            max_parallelism,
            new_parallelism,
        });
    }
    let max_parallelism = u64::from(max_parallelism);
    let new_parallelism = u64::from(new_parallelism);
    let mut ranges = Vec::with_capacity(new_parallelism as usize);
    for i in 0..new_parallelism {
        let lo = i * max_parallelism / new_parallelism;
        let hi = (i + 1) * max_parallelism / new_parallelism - 1;
        ranges.push(KeyGroupRange::new(lo as u32, hi as u32));
    }
    Ok(ranges)
}
