//! Per-rank element counts for variable-length scatter.
//!
//! The vector plans count *vectors*; moving CSR data also needs the number
//! of non-zero *elements* each rank receives. Those are only known once the
//! coordinator has read the input, so the plan starts zeroed and is filled
//! during ingestion.

use super::Slice;
use crate::error::{FlashError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScatterPlan {
    slices: Vec<Slice>,
}

impl ScatterPlan {
    /// All-zero plan for `world_size` ranks.
    pub fn zeroed(world_size: usize) -> Self {
        Self {
            slices: vec![Slice::default(); world_size],
        }
    }

    /// Replace counts and recompute offsets as a running sum.
    pub fn record(&mut self, counts: &[usize]) -> Result<()> {
        if counts.len() != self.slices.len() {
            return Err(FlashError::LengthMismatch {
                what: "scatter counts",
                expected: self.slices.len(),
                actual: counts.len(),
            });
        }
        let mut slices = Vec::with_capacity(counts.len());
        let mut offset = 0usize;
        for &count in counts {
            slices.push(Slice { count, offset });
            offset = offset
                .checked_add(count)
                .ok_or(FlashError::exhausted("scatter plan", usize::MAX))?;
        }
        self.slices = slices;
        Ok(())
    }

    pub fn slice(&self, rank: usize) -> Option<Slice> {
        self.slices.get(rank).copied()
    }

    pub fn counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.slices.iter().map(|s| s.count)
    }

    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.slices.iter().map(|s| s.offset)
    }

    pub fn total(&self) -> usize {
        self.slices.iter().map(|s| s.count).sum()
    }

    pub fn world_size(&self) -> usize {
        self.slices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed() {
        let plan = ScatterPlan::zeroed(4);
        assert_eq!(plan.total(), 0);
        assert!(plan.offsets().all(|o| o == 0));
    }

    #[test]
    fn record_running_sum() {
        let mut plan = ScatterPlan::zeroed(3);
        plan.record(&[5, 0, 2]).unwrap();
        assert_eq!(plan.offsets().collect::<Vec<_>>(), vec![0, 5, 5]);
        assert_eq!(plan.total(), 7);
    }

    #[test]
    fn record_rejects_wrong_length() {
        let mut plan = ScatterPlan::zeroed(3);
        let err = plan.record(&[1, 2]).unwrap_err();
        assert_eq!(
            err,
            FlashError::LengthMismatch {
                what: "scatter counts",
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(plan.total(), 0);
    }
}
