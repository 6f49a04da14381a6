//! Interfaces of the external hashing and sketch backends.
//!
//! The controller borrows both for its whole lifetime and never owns,
//! constructs, or drops them.

use crate::buffer::CsrView;

/// LSH hash tables with per-bucket reservoirs.
pub trait ReservoirSampler {
    /// Number of hash tables the sampler maintains.
    fn num_tables(&self) -> usize;

    /// Hash every vector in `queries` with `probes` probes per table.
    ///
    /// `out` holds exactly `queries.num_vectors() * probes * num_tables()`
    /// slots, laid out query-major.
    fn hash_queries(&self, queries: CsrView<'_>, probes: usize, out: &mut [u32]);
}

/// Count-min sketch used for candidate filtering.
pub trait FrequencySketch {
    /// Number of hash rows.
    fn depth(&self) -> usize;

    /// Counters per row.
    fn width(&self) -> usize;
}
