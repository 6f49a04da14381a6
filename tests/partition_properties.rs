//! Property-based tests for the partition planner.
//!
//! Every rank computes the plan independently, so these invariants are what
//! keep ranks in agreement:
//! - counts sum to the total and differ by at most one
//! - the remainder lands on the lowest ranks
//! - offsets never decrease and never pass the clamp
//! - identical inputs give identical plans

use flashctl::PartitionPlanner;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn counts_conserve_total(total in 0usize..100_000, world in 1usize..512) {
        let planner = PartitionPlanner::new(world).unwrap();
        let plan = planner.query(total);
        prop_assert_eq!(plan.world_size(), world);
        prop_assert_eq!(plan.total(), total);
    }

    #[test]
    fn counts_are_balanced(total in 0usize..100_000, world in 1usize..512) {
        let plan = PartitionPlanner::new(world).unwrap().query(total);
        let max = plan.counts().max().unwrap();
        let min = plan.counts().min().unwrap();
        prop_assert!(max - min <= 1, "imbalance {} vs {}", max, min);
    }

    #[test]
    fn remainder_goes_to_lowest_ranks(total in 0usize..100_000, world in 1usize..512) {
        let plan = PartitionPlanner::new(world).unwrap().query(total);
        let base = total / world;
        let remainder = total % world;
        for (rank, count) in plan.counts().enumerate() {
            let expected = if rank < remainder { base + 1 } else { base };
            prop_assert_eq!(count, expected, "rank {}", rank);
        }
    }

    #[test]
    fn data_offsets_monotone_and_clamped(
        num_data in 0usize..10_000,
        num_query in 0usize..10_000,
        world in 1usize..256,
    ) {
        let plan = PartitionPlanner::new(world).unwrap().data(num_data, num_query);
        let upper = (num_data + num_query).saturating_sub(1).max(num_query);
        let offsets: Vec<usize> = plan.offsets().collect();
        prop_assert_eq!(offsets[0], num_query);
        for w in offsets.windows(2) {
            prop_assert!(w[1] >= w[0]);
        }
        for &o in &offsets[1..] {
            prop_assert!(o <= upper, "offset {} past {}", o, upper);
        }
    }

    #[test]
    fn query_offsets_monotone_and_clamped(total in 0usize..10_000, world in 1usize..256) {
        let plan = PartitionPlanner::new(world).unwrap().query(total);
        let upper = total.saturating_sub(1);
        let offsets: Vec<usize> = plan.offsets().collect();
        prop_assert_eq!(offsets[0], 0);
        for w in offsets.windows(2) {
            prop_assert!(w[1] >= w[0]);
        }
        prop_assert!(offsets.iter().all(|&o| o <= upper));
    }

    #[test]
    fn non_empty_slices_tile_the_region(
        num_data in 0usize..10_000,
        num_query in 0usize..10_000,
        world in 1usize..256,
    ) {
        let plan = PartitionPlanner::new(world).unwrap().data(num_data, num_query);
        let mut next = num_query;
        for slice in plan.iter().filter(|s| !s.is_empty()) {
            prop_assert_eq!(slice.offset, next);
            next = slice.range().end;
        }
        prop_assert_eq!(next, num_query + num_data);
    }

    #[test]
    fn plans_are_deterministic(
        num_data in 0usize..100_000,
        num_query in 0usize..100_000,
        world in 1usize..512,
    ) {
        let a = PartitionPlanner::new(world).unwrap();
        let b = PartitionPlanner::new(world).unwrap();
        prop_assert_eq!(a.data(num_data, num_query), b.data(num_data, num_query));
        prop_assert_eq!(a.query(num_query), b.query(num_query));
    }

    #[test]
    fn hash_counts_follow_query_counts(
        num_query in 0usize..10_000,
        world in 1usize..256,
        tables in 1usize..64,
        probes in 1usize..16,
    ) {
        let planner = PartitionPlanner::new(world).unwrap();
        let query = planner.query(num_query);
        let hashes = planner.hashes(&query, probes, tables).unwrap();
        for (q, h) in query.iter().zip(hashes.iter()) {
            prop_assert_eq!(h.count, q.count * probes * tables);
        }
        prop_assert_eq!(hashes.total(), num_query * probes * tables);

        let mut running = 0;
        for h in hashes.iter() {
            prop_assert_eq!(h.offset, running);
            running += h.count;
        }
    }
}
