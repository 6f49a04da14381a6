//! flashctl: per-rank partition and buffer control for distributed LSH search.
//!
//! A corpus of data vectors and a batch of query vectors are sharded across
//! a fixed group of worker processes ("ranks"). Each rank builds one
//! [`FlashController`] at start-up. The controller:
//!
//! - computes the same partition plan on every rank, from nothing but the
//!   global sizes, so scatter/gather boundaries agree without communication
//! - exposes its own `(count, offset)` slice for data, queries and hash slots
//! - owns the per-rank buffers and releases them exactly once
//!
//! # Partitioning
//!
//! `total` items over `world` ranks: ranks `0..total % world` get one item
//! more than the rest. Queries occupy global indices `0..num_query`; data
//! follows at `num_query..num_query + num_data`. Offsets are running sums
//! clamped to the last valid index, so a rank with zero items still reports
//! an in-range (but non-dereferenceable) offset.
//!
//! # External collaborators
//!
//! The LSH reservoir sampler and the count-min sketch are borrowed through
//! the [`ReservoirSampler`] and [`FrequencySketch`] traits. Their lifetimes
//! belong to the caller.
//!
//! ```rust
//! use flashctl::{CsrView, FlashConfig, FlashController, FrequencySketch, ReservoirSampler};
//!
//! struct Lsh;
//! impl ReservoirSampler for Lsh {
//!     fn num_tables(&self) -> usize { 2 }
//!     fn hash_queries(&self, _q: CsrView<'_>, _probes: usize, out: &mut [u32]) {
//!         out.fill(1);
//!     }
//! }
//! struct Cms;
//! impl FrequencySketch for Cms {
//!     fn depth(&self) -> usize { 4 }
//!     fn width(&self) -> usize { 256 }
//! }
//!
//! let config = FlashConfig::new(1, 3).with_vectors(10, 7).with_hashing(2, 3);
//! let controller = FlashController::new(&Lsh, &Cms, config).unwrap();
//! assert_eq!(controller.my_query_vectors_ct(), 2);
//! assert_eq!(controller.my_hash_ct(), 12);
//! controller.destroy();
//! ```

pub mod buffer;
pub mod config;
pub mod controller;
pub mod error;
pub mod handles;
pub mod partition;

pub use buffer::{BufferSet, BufferState, CsrView, ReleaseReport, SparseBuffers, VectorBuffers};
pub use config::FlashConfig;
pub use controller::FlashController;
pub use error::{FlashError, Result};
pub use handles::{FrequencySketch, ReservoirSampler};
pub use partition::{PartitionPlan, PartitionPlanner, ScatterPlan, Slice};
