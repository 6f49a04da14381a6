//! Per-rank buffers sized from the partition plan.
//!
//! # Ownership
//!
//! A [`BufferSet`] owns every array a rank allocates:
//!
//! | Group | Allocated | Exists on |
//! |-------|-----------|-----------|
//! | query hashes | at construction | every rank |
//! | local data (CSR) | during ingestion | every rank |
//! | local queries (CSR) | during ingestion | every rank |
//! | sparse aggregation (CSR) | during ingestion | rank 0 only |
//!
//! Later-phase groups start [`BufferState::Unallocated`]. Releasing an
//! unallocated group is a no-op. The sparse group is an `Option` that is
//! `None` on every rank but the coordinator, so non-coordinator ranks have
//! nothing to allocate or free there.

use crate::error::{FlashError, Result};
use tracing::trace;

/// Lifecycle tag for one buffer group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferState {
    #[default]
    Unallocated,
    /// Allocated with this many elements in total across the group.
    Allocated(usize),
}

impl BufferState {
    pub fn is_allocated(&self) -> bool {
        matches!(self, BufferState::Allocated(_))
    }
}

/// Zero-filled vector whose reservation failure surfaces as an error
/// instead of aborting the process.
pub(crate) fn try_zeroed<T: Clone + Default>(buffer: &'static str, len: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| FlashError::exhausted(buffer, len))?;
    v.resize(len, T::default());
    Ok(v)
}

/// Borrowed CSR batch: vector `i` spans `indices[markers[i]..markers[i + 1]]`.
#[derive(Debug, Clone, Copy)]
pub struct CsrView<'a> {
    pub indices: &'a [u32],
    pub values: &'a [f32],
    pub markers: &'a [u32],
}

impl CsrView<'_> {
    /// Number of vectors described by the markers.
    pub fn num_vectors(&self) -> usize {
        self.markers.len().saturating_sub(1)
    }
}

/// Sparse vectors in CSR form: indices, values and `num_vectors + 1` markers.
#[derive(Debug, Default)]
pub struct VectorBuffers {
    indices: Vec<u32>,
    values: Vec<f32>,
    markers: Vec<u32>,
    state: BufferState,
}

impl VectorBuffers {
    pub fn unallocated() -> Self {
        Self::default()
    }

    /// Allocate zeroed storage for `num_vectors` vectors holding `nnz`
    /// non-zeros in total. Any previous contents are dropped first.
    pub fn allocate(&mut self, num_vectors: usize, nnz: usize) -> Result<()> {
        let marker_len = num_vectors
            .checked_add(1)
            .ok_or(FlashError::exhausted("markers", usize::MAX))?;

        // Drop the old arrays before reserving new ones.
        *self = Self::default();

        let indices = try_zeroed("indices", nnz)?;
        let values = try_zeroed("values", nnz)?;
        let markers = try_zeroed("markers", marker_len)?;
        let total = nnz
            .saturating_mul(2)
            .saturating_add(marker_len);

        *self = Self {
            indices,
            values,
            markers,
            state: BufferState::Allocated(total),
        };
        Ok(())
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    pub fn num_vectors(&self) -> usize {
        self.markers.len().saturating_sub(1)
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn view(&self) -> CsrView<'_> {
        CsrView {
            indices: &self.indices,
            values: &self.values,
            markers: &self.markers,
        }
    }

    pub fn indices_mut(&mut self) -> &mut [u32] {
        &mut self.indices
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn markers_mut(&mut self) -> &mut [u32] {
        &mut self.markers
    }

    /// Approximate heap usage in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.indices.len() * std::mem::size_of::<u32>()
            + self.values.len() * std::mem::size_of::<f32>()
            + self.markers.len() * std::mem::size_of::<u32>()
    }

    fn release(self) -> BufferState {
        self.state
    }
}

/// Aggregation buffers held only by the coordinator rank.
#[derive(Debug, Default)]
pub struct SparseBuffers {
    inner: VectorBuffers,
}

impl SparseBuffers {
    pub fn allocate(&mut self, num_vectors: usize, nnz: usize) -> Result<()> {
        self.inner.allocate(num_vectors, nnz)
    }

    pub fn state(&self) -> BufferState {
        self.inner.state()
    }

    pub fn buffers(&self) -> &VectorBuffers {
        &self.inner
    }

    pub fn buffers_mut(&mut self) -> &mut VectorBuffers {
        &mut self.inner
    }

    fn release(self) -> BufferState {
        self.inner.release()
    }
}

/// What a [`BufferSet`] held when it was released.
///
/// Each group appears once. `Unallocated` means nothing was freed for it;
/// `sparse` is `None` when the rank never had sparse buffers at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    pub rank: usize,
    pub plan_arrays: usize,
    pub data: BufferState,
    pub query: BufferState,
    pub sparse: Option<BufferState>,
    pub query_hashes: BufferState,
}

impl ReleaseReport {
    /// Number of groups that actually held storage.
    pub fn groups_freed(&self) -> usize {
        [self.data, self.query, self.query_hashes]
            .iter()
            .chain(self.sparse.iter())
            .filter(|s| s.is_allocated())
            .count()
    }
}

/// Every buffer one rank owns.
#[derive(Debug)]
pub struct BufferSet {
    data: VectorBuffers,
    query: VectorBuffers,
    sparse: Option<SparseBuffers>,
    query_hashes: Vec<u32>,
}

impl BufferSet {
    /// Allocate the query-hash buffer eagerly; other groups start unallocated.
    pub fn new(query_hash_len: usize, coordinator: bool) -> Result<Self> {
        let query_hashes = try_zeroed("query hashes", query_hash_len)?;
        trace!(query_hash_len, coordinator, "allocated query hash buffer");
        Ok(Self {
            data: VectorBuffers::unallocated(),
            query: VectorBuffers::unallocated(),
            sparse: coordinator.then(SparseBuffers::default),
            query_hashes,
        })
    }

    pub fn data(&self) -> &VectorBuffers {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut VectorBuffers {
        &mut self.data
    }

    pub fn query(&self) -> &VectorBuffers {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut VectorBuffers {
        &mut self.query
    }

    pub fn sparse(&self) -> Option<&SparseBuffers> {
        self.sparse.as_ref()
    }

    pub fn sparse_mut(&mut self) -> Option<&mut SparseBuffers> {
        self.sparse.as_mut()
    }

    pub fn query_hashes(&self) -> &[u32] {
        &self.query_hashes
    }

    pub fn query_hashes_mut(&mut self) -> &mut [u32] {
        &mut self.query_hashes
    }

    /// Split borrow: queries read-only, hashes writable.
    pub(crate) fn query_and_hashes_mut(&mut self) -> (&VectorBuffers, &mut [u32]) {
        (&self.query, &mut self.query_hashes)
    }

    pub fn memory_bytes(&self) -> usize {
        self.data.memory_bytes()
            + self.query.memory_bytes()
            + self.sparse.as_ref().map_or(0, |s| s.buffers().memory_bytes())
            + self.query_hashes.len() * std::mem::size_of::<u32>()
    }

    /// Consume the set, freeing every group exactly once.
    pub fn release(self, rank: usize, plan_arrays: usize) -> ReleaseReport {
        let query_hashes = BufferState::Allocated(self.query_hashes.len());
        ReleaseReport {
            rank,
            plan_arrays,
            data: self.data.release(),
            query: self.query.release(),
            sparse: self.sparse.map(SparseBuffers::release),
            query_hashes,
        }
    }
}
