//! Deterministic partitioning of the global vector space across ranks.
//!
//! Every rank computes the full plan for all ranks from the same global
//! sizes, without communicating. The scatter/gather layer relies on these
//! boundaries matching bit-for-bit on every process, so the planner is a
//! pure function of its inputs: no randomness, no floating point.
//!
//! # Layout
//!
//! Query vectors occupy the front of a shared global index space and data
//! vectors follow them:
//!
//! ```text
//! 0                  num_query             num_query + num_data
//! |--- query region ---|------- data region --------|
//! ```
//!
//! # Balance
//!
//! With `base = total / world` and `rem = total % world`, ranks `0..rem`
//! receive `base + 1` items and the rest receive `base`.
//!
//! ```rust
//! use flashctl::partition::PartitionPlanner;
//!
//! let planner = PartitionPlanner::new(3).unwrap();
//! let plan = planner.data(10, 0);
//! assert_eq!(plan.counts().collect::<Vec<_>>(), vec![4, 3, 3]);
//! assert_eq!(plan.offsets().collect::<Vec<_>>(), vec![0, 4, 7]);
//! ```

mod scatter;

pub use scatter::ScatterPlan;

use crate::error::{FlashError, Result};
use std::fmt;
use std::ops::Range;

/// One rank's share of a category: `count` items starting at `offset`.
///
/// An empty slice still carries an offset (clamped into the region), but
/// that offset does not name a real item and must not be dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Slice {
    pub count: usize,
    pub offset: usize,
}

impl Slice {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Index range covered by this slice. Empty when `count == 0`.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.count
    }
}

/// Per-rank `(count, offset)` table for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    slices: Vec<Slice>,
}

impl PartitionPlan {
    pub fn world_size(&self) -> usize {
        self.slices.len()
    }

    /// Slice owned by `rank`, if the rank exists.
    pub fn slice(&self, rank: usize) -> Option<Slice> {
        self.slices.get(rank).copied()
    }

    pub fn counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.slices.iter().map(|s| s.count)
    }

    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.slices.iter().map(|s| s.offset)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slice> {
        self.slices.iter()
    }

    pub fn as_slice(&self) -> &[Slice] {
        &self.slices
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.slices.iter().map(|s| s.count).sum()
    }
}

impl fmt::Display for PartitionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (rank, s) in self.slices.iter().enumerate() {
            writeln!(f, "[rank {rank}] offset {:>10} count {:>10}", s.offset, s.count)?;
        }
        Ok(())
    }
}

/// Computes balanced partition plans for a fixed world size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionPlanner {
    world_size: usize,
}

impl PartitionPlanner {
    /// Create a planner. A zero world size is rejected rather than divided by.
    pub fn new(world_size: usize) -> Result<Self> {
        if world_size == 0 {
            return Err(FlashError::invalid("world_size must be greater than 0"));
        }
        Ok(Self { world_size })
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    /// Count owned by `rank` when `total` items are split evenly.
    fn share(&self, total: usize, rank: usize) -> usize {
        let base = total / self.world_size;
        let remainder = total % self.world_size;
        if rank < remainder {
            base + 1
        } else {
            base
        }
    }

    /// Split `total` items across ranks.
    ///
    /// `offset[0] = base_offset` and each later offset is the running sum,
    /// clamped to `upper_bound`. Offsets never decrease: a bound below
    /// `base_offset` (an empty region) is raised to it.
    pub fn balanced(&self, total: usize, base_offset: usize, upper_bound: usize) -> PartitionPlan {
        let upper_bound = upper_bound.max(base_offset);
        let mut slices = Vec::with_capacity(self.world_size);
        let mut offset = base_offset;
        for rank in 0..self.world_size {
            let count = self.share(total, rank);
            slices.push(Slice { count, offset });
            offset = offset.saturating_add(count).min(upper_bound);
        }
        PartitionPlan { slices }
    }

    /// Data plan. The data region starts right after the query region and
    /// offsets are clamped to the last index of the combined space.
    pub fn data(&self, num_data_vectors: usize, num_query_vectors: usize) -> PartitionPlan {
        let region_end = num_data_vectors.saturating_add(num_query_vectors);
        self.balanced(
            num_data_vectors,
            num_query_vectors,
            region_end.saturating_sub(1),
        )
    }

    /// Query plan, starting at 0 and clamped to the last query index.
    pub fn query(&self, num_query_vectors: usize) -> PartitionPlan {
        self.balanced(num_query_vectors, 0, num_query_vectors.saturating_sub(1))
    }

    /// Hash-slot plan derived from a query plan.
    ///
    /// Counts are `query_count * probes * tables` and offsets are a plain
    /// running sum with no clamp.
    pub fn hashes(
        &self,
        query: &PartitionPlan,
        num_query_probes: usize,
        num_tables: usize,
    ) -> Result<PartitionPlan> {
        let per_query = num_query_probes
            .checked_mul(num_tables)
            .ok_or(FlashError::exhausted("hash plan", usize::MAX))?;
        let mut slices = Vec::with_capacity(query.world_size());
        let mut offset = 0usize;
        for q in query.iter() {
            let count = q
                .count
                .checked_mul(per_query)
                .ok_or(FlashError::exhausted("hash plan", usize::MAX))?;
            slices.push(Slice { count, offset });
            offset = offset
                .checked_add(count)
                .ok_or(FlashError::exhausted("hash plan", usize::MAX))?;
        }
        Ok(PartitionPlan { slices })
    }
}
