//! Construction parameters for a [`FlashController`](crate::FlashController).
//!
//! Every rank must build its controller from the same global sizes
//! (`world_size`, vector counts, tables, probes). Only `my_rank` differs
//! between processes. Nothing here checks that agreement; mismatched inputs
//! silently produce diverging partition plans.

use crate::error::{FlashError, Result};
use serde::{Deserialize, Serialize};

/// Global problem size plus the identity of the local rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashConfig {
    /// Rank of this worker, in `0..world_size`.
    pub my_rank: usize,
    /// Number of cooperating workers.
    pub world_size: usize,
    /// Total data vectors across all ranks.
    pub num_data_vectors: usize,
    /// Total query vectors across all ranks.
    pub num_query_vectors: usize,
    /// LSH tables per query.
    pub num_tables: usize,
    /// Probes per table.
    pub num_query_probes: usize,
    /// Reservoir capacity per bucket.
    pub reservoir_size: usize,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            my_rank: 0,
            world_size: 1,
            num_data_vectors: 0,
            num_query_vectors: 0,
            num_tables: 1,
            num_query_probes: 1,
            reservoir_size: 32,
        }
    }
}

impl FlashConfig {
    pub fn new(my_rank: usize, world_size: usize) -> Self {
        Self {
            my_rank,
            world_size,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_vectors(mut self, num_data_vectors: usize, num_query_vectors: usize) -> Self {
        self.num_data_vectors = num_data_vectors;
        self.num_query_vectors = num_query_vectors;
        self
    }

    #[must_use]
    pub fn with_hashing(mut self, num_tables: usize, num_query_probes: usize) -> Self {
        self.num_tables = num_tables;
        self.num_query_probes = num_query_probes;
        self
    }

    #[must_use]
    pub fn with_reservoir_size(mut self, reservoir_size: usize) -> Self {
        self.reservoir_size = reservoir_size;
        self
    }

    /// Check preconditions. Runs before any buffer is allocated.
    pub fn validate(&self) -> Result<()> {
        if self.world_size == 0 {
            return Err(FlashError::invalid("world_size must be greater than 0"));
        }
        if self.my_rank >= self.world_size {
            return Err(FlashError::invalid(format!(
                "my_rank {} outside [0, {})",
                self.my_rank, self.world_size
            )));
        }
        if self.num_tables == 0 {
            return Err(FlashError::invalid("num_tables must be greater than 0"));
        }
        if self.num_query_probes == 0 {
            return Err(FlashError::invalid("num_query_probes must be greater than 0"));
        }
        if self.reservoir_size == 0 {
            return Err(FlashError::invalid("reservoir_size must be greater than 0"));
        }
        Ok(())
    }

    /// Hash slots produced per query vector.
    pub fn hashes_per_query(&self) -> Result<usize> {
        self.num_query_probes
            .checked_mul(self.num_tables)
            .ok_or(FlashError::exhausted("query hashes", usize::MAX))
    }

    /// Length of the global query-hash buffer.
    pub fn query_hash_len(&self) -> Result<usize> {
        self.hashes_per_query()?
            .checked_mul(self.num_query_vectors)
            .ok_or(FlashError::exhausted("query hashes", usize::MAX))
    }

    pub fn is_coordinator(&self) -> bool {
        self.my_rank == 0
    }
}
