//! Sharding of a job's tasks across queue partitions

use fetcheach_common::RequestSpec;
use uuid::Uuid;

use crate::queue::TaskMessage;

/// Assign tasks to partitions round-robin by index
///
/// Returns one shard per partition actually used, so a job smaller than the
/// partition count only touches its first `len` partitions.
pub fn shard(
    job_id: Uuid,
    requests: Vec<Option<RequestSpec>>,
    partitions: usize,
) -> Vec<Vec<TaskMessage>> {
    let partitions = partitions.max(1).min(requests.len());
    let mut shards: Vec<Vec<TaskMessage>> = (0..partitions)
        .map(|_| Vec::with_capacity(requests.len() / partitions + 1))
        .collect();

    for (index, request) in requests.into_iter().enumerate() {
        shards[index % partitions].push(TaskMessage {
            job_id,
            index,
            request,
        });
    }

    shards
}

/// Send chunk size for a partition holding `per_partition` tasks
///
/// Small shards are sent in chunks of `min`, which keeps per-message work
/// small and concurrency high; large shards grow up to `max` to cut the
/// number of messages.
pub fn chunk_size(per_partition: usize, min: usize, max: usize) -> usize {
    per_partition.max(min).min(max).max(1)
}

/// Split `items` into owned chunks of at most `size`
pub fn into_chunks<T>(mut items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size));
    while !items.is_empty() {
        let rest = items.split_off(size.min(items.len()));
        chunks.push(items);
        items = rest;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requests(count: usize) -> Vec<Option<RequestSpec>> {
        (0..count)
            .map(|i| Some(RequestSpec::get(format!("https://example.com/{}", i))))
            .collect()
    }

    #[test]
    fn test_round_robin_assignment() {
        let shards = shard(Uuid::new_v4(), requests(7), 3);

        let indices: Vec<Vec<usize>> = shards
            .iter()
            .map(|shard| shard.iter().map(|m| m.index).collect())
            .collect();
        assert_eq!(indices, vec![vec![0, 3, 6], vec![1, 4], vec![2, 5]]);
    }

    #[test]
    fn test_small_job_uses_fewer_partitions() {
        let shards = shard(Uuid::new_v4(), requests(2), 100);
        assert_eq!(shards.len(), 2);
        assert!(shard(Uuid::new_v4(), Vec::new(), 100).is_empty());
    }

    #[test]
    fn test_every_task_is_sharded_once() {
        let job = Uuid::new_v4();
        let shards = shard(job, requests(1_000), 100);

        let mut seen: Vec<usize> = shards.iter().flatten().map(|m| m.index).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..1_000).collect::<Vec<_>>());
        assert!(shards.iter().flatten().all(|m| m.job_id == job));
    }

    #[test]
    fn test_chunk_size_is_adaptive() {
        assert_eq!(chunk_size(1, 6, 100), 6);
        assert_eq!(chunk_size(40, 6, 100), 40);
        assert_eq!(chunk_size(5_000, 6, 100), 100);
    }

    #[test]
    fn test_into_chunks() {
        let chunks = into_chunks((0..7).collect(), 3);
        assert_eq!(chunks, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        assert!(into_chunks(Vec::<u8>::new(), 3).is_empty());
    }
}
