//! Partition-level concurrency: at most `limit` partitions in flight, results in input order.

use crate::partitions::Partition;
use anyhow::Result;
use rayon::prelude::*;

/// Apply `f` to every partition, `limit` at a time. The call returns only after every
/// partition finished; the first failure aborts the run. Output order equals input order,
/// whatever order the workers complete in.
pub fn map_partitions_limited<T, F>(parts: &[Partition], limit: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Sync + Fn(&Partition) -> Result<T>,
{
    if limit <= 1 {
        return parts.iter().map(&f).collect();
    }
    let mut out = Vec::with_capacity(parts.len());
    for chunk in parts.chunks(limit) {
        let done: Vec<T> = chunk.par_iter().map(&f).collect::<Result<_>>()?;
        out.extend(done);
    }
    Ok(out)
}
