use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

/// Maps vertex keys to partitions. Must be a pure function of the key for
/// the lifetime of a computation.
pub trait Partitioner: Send + Sync {
    fn partition_count(&self) -> usize;
    fn partition_of(&self, vertex_id: &str) -> usize;
}

/// Every vertex is local.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinglePartition;

impl Partitioner for SinglePartition {
    fn partition_count(&self) -> usize {
        1
    }

    fn partition_of(&self, _vertex_id: &str) -> usize {
        0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HashPartitioner {
    partitions: usize,
}

impl HashPartitioner {
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: partitions.max(1),
        }
    }
}

impl Partitioner for HashPartitioner {
    fn partition_count(&self) -> usize {
        self.partitions
    }

    fn partition_of(&self, vertex_id: &str) -> usize {
        partition_of_bytes(vertex_id.as_bytes(), self.partitions)
    }
}

pub fn partition_of_bytes(id: &[u8], partitions: usize) -> usize {
    let mut h = DefaultHasher::new();
    h.write(id);
    (h.finish() as usize) % partitions.max(1)
}
