use gradping::fixture::{FixtureEnvironment, RANGE_MAX, RANGE_MIN};
use proptest::prelude::*;
use rand::prelude::*;

proptest! {
    #[test]
    fn arrays_have_exact_sizes_and_range(
        seed: u64,
        dim in 0usize..6,
        num_to_sample in 0usize..8,
        num_sampled in 0usize..8,
    ) {
        let mut env = FixtureEnvironment::with_seed(seed);
        env.initialize(dim, num_to_sample, num_sampled);

        prop_assert_eq!(env.points_to_sample().len(), dim * num_to_sample);
        prop_assert_eq!(env.points_sampled().len(), dim * num_sampled);
        prop_assert_eq!(env.points_sampled_values().len(), num_sampled);
        prop_assert_eq!(env.current_point().len(), dim);

        for arr in [
            env.points_to_sample(),
            env.points_sampled(),
            env.points_sampled_values(),
            env.current_point(),
        ] {
            prop_assert!(arr.iter().all(|&v| (RANGE_MIN..=RANGE_MAX).contains(&v)));
        }
    }

    #[test]
    fn same_seed_same_data(
        seed: u64,
        dim in 1usize..6,
        num_to_sample in 1usize..8,
        num_sampled in 1usize..8,
    ) {
        let mut a = FixtureEnvironment::with_seed(seed);
        let mut b = FixtureEnvironment::with_seed(seed);
        a.initialize(dim, num_to_sample, num_sampled);
        b.initialize(dim, num_to_sample, num_sampled);

        prop_assert_eq!(a.points_to_sample(), b.points_to_sample());
        prop_assert_eq!(a.points_sampled(), b.points_sampled());
        prop_assert_eq!(a.points_sampled_values(), b.points_sampled_values());
        prop_assert_eq!(a.current_point(), b.current_point());
    }

    #[test]
    fn reinitializing_advances_the_stream(
        seed: u64,
        dim in 1usize..6,
        num_to_sample in 1usize..8,
        num_sampled in 1usize..8,
    ) {
        let mut env = FixtureEnvironment::with_seed(seed);
        env.initialize(dim, num_to_sample, num_sampled);
        let first = env.points_to_sample().to_vec();

        // Same shape, so no realloc; data must still be fully redrawn.
        env.initialize(dim, num_to_sample, num_sampled);
        prop_assert_ne!(env.points_to_sample(), &first[..]);
        prop_assert!(env
            .points_to_sample()
            .iter()
            .all(|&v| (RANGE_MIN..=RANGE_MAX).contains(&v)));
    }

    #[test]
    fn external_stream_is_the_reproducibility_boundary(
        fixture_seed_a: u64,
        fixture_seed_b: u64,
        stream_seed: u64,
        dim in 1usize..5,
        num_to_sample in 1usize..6,
        num_sampled in 1usize..6,
    ) {
        // Two environments with unrelated owned seeds produce identical data
        // when driven by identical external streams.
        let mut a = FixtureEnvironment::with_seed(fixture_seed_a);
        let mut b = FixtureEnvironment::with_seed(fixture_seed_b);

        let mut rng = StdRng::seed_from_u64(stream_seed);
        a.initialize_with(dim, num_to_sample, num_sampled, &mut rng);
        let mut rng = StdRng::seed_from_u64(stream_seed);
        b.initialize_with(dim, num_to_sample, num_sampled, &mut rng);

        prop_assert_eq!(a.points_to_sample(), b.points_to_sample());
        prop_assert_eq!(a.points_sampled(), b.points_sampled());
        prop_assert_eq!(a.points_sampled_values(), b.points_sampled_values());
        prop_assert_eq!(a.current_point(), b.current_point());
    }
}
