//! The per-rank FLASH controller.
//!
//! One controller lives in each worker process. It computes the partition
//! plan for every rank, keeps its own slice handy for the transport and
//! hashing layers, and owns every buffer the rank allocates.
//!
//! # Lifecycle
//!
//! ```text
//! FlashController::new ──► Initialized ──► destroy() / drop ──► gone
//!        │
//!        └─ Err(InvalidConfiguration | ResourceExhaustion), nothing allocated
//! ```
//!
//! `destroy` consumes the controller, so use after destruction does not
//! compile.

use crate::buffer::{BufferSet, ReleaseReport, VectorBuffers};
use crate::config::FlashConfig;
use crate::error::{FlashError, Result};
use crate::handles::{FrequencySketch, ReservoirSampler};
use crate::partition::{PartitionPlan, PartitionPlanner, ScatterPlan, Slice};
use tracing::{debug, info};

/// Partition tables kept by the controller: data, query and hash plans plus
/// the two ingestion scatter plans, each a counts/offsets pair.
const PLAN_ARRAYS: usize = 5 * 2;

pub struct FlashController<'a, R: ?Sized, S: ?Sized> {
    reservoir: &'a R,
    sketch: &'a S,
    config: FlashConfig,

    data_plan: PartitionPlan,
    query_plan: PartitionPlan,
    hash_plan: PartitionPlan,
    data_work: ScatterPlan,
    query_work: ScatterPlan,

    my_data: Slice,
    my_query: Slice,
    my_hash: Slice,

    buffers: BufferSet,
}

impl<'a, R, S> FlashController<'a, R, S>
where
    R: ReservoirSampler + ?Sized,
    S: FrequencySketch + ?Sized,
{
    /// Validate `config`, plan all ranks and allocate the query-hash buffer.
    ///
    /// Validation runs before anything is allocated.
    pub fn new(reservoir: &'a R, sketch: &'a S, config: FlashConfig) -> Result<Self> {
        config.validate()?;
        let query_hash_len = config.query_hash_len()?;

        let planner = PartitionPlanner::new(config.world_size)?;
        let data_plan = planner.data(config.num_data_vectors, config.num_query_vectors);
        let query_plan = planner.query(config.num_query_vectors);
        let hash_plan = planner.hashes(&query_plan, config.num_query_probes, config.num_tables)?;

        debug!(
            rank = config.my_rank,
            "data vector plan:\n{data_plan}query vector plan:\n{query_plan}"
        );

        let rank = config.my_rank;
        let (my_data, my_query, my_hash) = match (
            data_plan.slice(rank),
            query_plan.slice(rank),
            hash_plan.slice(rank),
        ) {
            (Some(d), Some(q), Some(h)) => (d, q, h),
            _ => {
                return Err(FlashError::invalid(format!(
                    "my_rank {rank} outside [0, {})",
                    config.world_size
                )))
            }
        };

        let buffers = BufferSet::new(query_hash_len, config.is_coordinator())?;

        debug!(
            rank,
            data_ct = my_data.count,
            data_offset = my_data.offset,
            query_ct = my_query.count,
            hash_ct = my_hash.count,
            "local slice"
        );
        info!(rank, world_size = config.world_size, "FLASH controller initialized");

        Ok(Self {
            reservoir,
            sketch,
            config,
            data_work: ScatterPlan::zeroed(config.world_size),
            query_work: ScatterPlan::zeroed(config.world_size),
            data_plan,
            query_plan,
            hash_plan,
            my_data,
            my_query,
            my_hash,
            buffers,
        })
    }

    pub fn config(&self) -> &FlashConfig {
        &self.config
    }

    pub fn my_rank(&self) -> usize {
        self.config.my_rank
    }

    pub fn world_size(&self) -> usize {
        self.config.world_size
    }

    pub fn my_data_vectors_ct(&self) -> usize {
        self.my_data.count
    }

    pub fn my_data_vectors_offset(&self) -> usize {
        self.my_data.offset
    }

    pub fn my_query_vectors_ct(&self) -> usize {
        self.my_query.count
    }

    pub fn my_query_vectors_offset(&self) -> usize {
        self.my_query.offset
    }

    pub fn my_hash_ct(&self) -> usize {
        self.my_hash.count
    }

    pub fn my_hash_offset(&self) -> usize {
        self.my_hash.offset
    }

    /// Data plan for every rank.
    pub fn data_plan(&self) -> &PartitionPlan {
        &self.data_plan
    }

    /// Query plan for every rank.
    pub fn query_plan(&self) -> &PartitionPlan {
        &self.query_plan
    }

    /// Hash-slot plan for every rank.
    pub fn hash_plan(&self) -> &PartitionPlan {
        &self.hash_plan
    }

    pub fn data_work(&self) -> &ScatterPlan {
        &self.data_work
    }

    pub fn query_work(&self) -> &ScatterPlan {
        &self.query_work
    }

    pub fn buffers(&self) -> &BufferSet {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut BufferSet {
        &mut self.buffers
    }

    pub fn reservoir(&self) -> &'a R {
        self.reservoir
    }

    pub fn sketch(&self) -> &'a S {
        self.sketch
    }

    /// Global query-hash buffer covering all ranks.
    pub fn query_hashes(&self) -> &[u32] {
        self.buffers.query_hashes()
    }

    pub fn query_hashes_mut(&mut self) -> &mut [u32] {
        self.buffers.query_hashes_mut()
    }

    /// This rank's window of the global query-hash buffer.
    pub fn my_query_hashes_mut(&mut self) -> &mut [u32] {
        let range = self.my_hash.range();
        &mut self.buffers.query_hashes_mut()[range]
    }

    /// Size this rank's data buffers for its slice holding `nnz` non-zeros.
    pub fn allocate_local_data(&mut self, nnz: usize) -> Result<()> {
        let vectors = self.my_data.count;
        self.buffers.data_mut().allocate(vectors, nnz)?;
        debug!(rank = self.my_rank(), vectors, nnz, "allocated local data buffers");
        Ok(())
    }

    /// Size this rank's query buffers for its slice holding `nnz` non-zeros.
    pub fn allocate_local_queries(&mut self, nnz: usize) -> Result<()> {
        let vectors = self.my_query.count;
        self.buffers.query_mut().allocate(vectors, nnz)?;
        debug!(rank = self.my_rank(), vectors, nnz, "allocated local query buffers");
        Ok(())
    }

    /// Allocate the coordinator's aggregation buffers.
    pub fn allocate_sparse(&mut self, num_vectors: usize, nnz: usize) -> Result<()> {
        let rank = self.my_rank();
        let sparse = self
            .buffers
            .sparse_mut()
            .ok_or(FlashError::NotCoordinator { rank })?;
        sparse.allocate(num_vectors, nnz)?;
        debug!(rank, num_vectors, nnz, "allocated sparse aggregation buffers");
        Ok(())
    }

    /// Record how many data elements each rank receives.
    pub fn record_data_work(&mut self, counts: &[usize]) -> Result<()> {
        self.data_work.record(counts)
    }

    /// Record how many query elements each rank receives.
    pub fn record_query_work(&mut self, counts: &[usize]) -> Result<()> {
        self.query_work.record(counts)
    }

    /// Hash this rank's loaded queries into its window of the global buffer.
    pub fn hash_local_queries(&mut self) -> Result<()> {
        let tables = self.reservoir.num_tables();
        if tables != self.config.num_tables {
            return Err(FlashError::invalid(format!(
                "reservoir has {tables} tables, controller planned {}",
                self.config.num_tables
            )));
        }
        let range = self.my_hash.range();
        let expected = self.my_query.count;
        let probes = self.config.num_query_probes;
        let reservoir = self.reservoir;

        let (queries, hashes): (&VectorBuffers, &mut [u32]) = self.buffers.query_and_hashes_mut();
        if queries.num_vectors() != expected {
            return Err(FlashError::LengthMismatch {
                what: "local queries",
                expected,
                actual: queries.num_vectors(),
            });
        }
        if !range.is_empty() {
            reservoir.hash_queries(queries.view(), probes, &mut hashes[range]);
        }
        Ok(())
    }

    /// Tear the controller down, releasing every buffer this rank owns.
    pub fn destroy(self) -> ReleaseReport {
        let rank = self.my_rank();
        let report = self.buffers.release(rank, PLAN_ARRAYS);
        debug!(rank, groups = report.groups_freed(), "FLASH controller destroyed");
        report
    }
}

impl<R: ?Sized, S: ?Sized> std::fmt::Debug for FlashController<'_, R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashController")
            .field("config", &self.config)
            .field("my_data", &self.my_data)
            .field("my_query", &self.my_query)
            .field("my_hash", &self.my_hash)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferState, CsrView};

    struct Tables(usize);

    impl ReservoirSampler for Tables {
        fn num_tables(&self) -> usize {
            self.0
        }

        fn hash_queries(&self, queries: CsrView<'_>, probes: usize, out: &mut [u32]) {
            assert_eq!(out.len(), queries.num_vectors() * probes * self.0);
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = i as u32 + 1;
            }
        }
    }

    struct Sketch;

    impl FrequencySketch for Sketch {
        fn depth(&self) -> usize {
            4
        }

        fn width(&self) -> usize {
            1024
        }
    }

    fn config(rank: usize, world: usize) -> FlashConfig {
        FlashConfig::new(rank, world)
            .with_vectors(10, 7)
            .with_hashing(2, 3)
    }

    #[test]
    fn local_slice_matches_plan() {
        let c = FlashController::new(&Tables(2), &Sketch, config(1, 3)).unwrap();
        assert_eq!(c.my_data_vectors_ct(), 3);
        assert_eq!(c.my_data_vectors_offset(), 11);
        assert_eq!(c.my_query_vectors_ct(), 2);
        assert_eq!(c.my_query_vectors_offset(), 3);
        assert_eq!(c.my_hash_ct(), 12);
        assert_eq!(c.my_hash_offset(), 18);
        assert_eq!(c.query_hashes().len(), 42);
    }

    #[test]
    fn hash_local_queries_fills_only_own_window() {
        let mut c = FlashController::new(&Tables(2), &Sketch, config(1, 3)).unwrap();
        c.allocate_local_queries(5).unwrap();
        c.hash_local_queries().unwrap();

        let window = c.my_hash_offset()..c.my_hash_offset() + c.my_hash_ct();
        for (i, &h) in c.query_hashes().iter().enumerate() {
            if window.contains(&i) {
                assert_ne!(h, 0);
            } else {
                assert_eq!(h, 0);
            }
        }
    }

    #[test]
    fn hash_without_loaded_queries_fails() {
        let mut c = FlashController::new(&Tables(2), &Sketch, config(0, 3)).unwrap();
        let err = c.hash_local_queries().unwrap_err();
        assert!(matches!(err, FlashError::LengthMismatch { .. }));
    }

    #[test]
    fn hash_rejects_table_mismatch() {
        let mut c = FlashController::new(&Tables(5), &Sketch, config(0, 3)).unwrap();
        c.allocate_local_queries(0).unwrap();
        assert!(matches!(
            c.hash_local_queries(),
            Err(FlashError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn sparse_allocation_requires_coordinator() {
        let mut worker = FlashController::new(&Tables(2), &Sketch, config(2, 3)).unwrap();
        assert_eq!(
            worker.allocate_sparse(17, 40),
            Err(FlashError::NotCoordinator { rank: 2 })
        );

        let mut coord = FlashController::new(&Tables(2), &Sketch, config(0, 3)).unwrap();
        coord.allocate_sparse(17, 40).unwrap();
        let report = coord.destroy();
        assert_eq!(report.sparse, Some(BufferState::Allocated(98)));
    }

    #[test]
    fn destroy_reports_plan_arrays() {
        let c = FlashController::new(&Tables(2), &Sketch, config(1, 3)).unwrap();
        let report = c.destroy();
        assert_eq!(report.rank, 1);
        assert_eq!(report.plan_arrays, 10);
        assert_eq!(report.query_hashes, BufferState::Allocated(42));
    }
}
