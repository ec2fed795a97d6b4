use consortium_common::{ModelParams, SolverOptions};
use consortium_engine::{shannon_diversity, temperature_factor, InteractionStructure, MicrobialEcosystem};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_interaction_matrix_shape_and_bounds(species in 1usize..40, seed in any::<u64>()) {
        let params = ModelParams::default();
        let mut rng = StdRng::seed_from_u64(seed);
        let s = InteractionStructure::generate(species, &params, &mut rng).unwrap();
        let m = s.interaction_matrix();

        prop_assert_eq!(m.dim(), (species, species));
        prop_assert_eq!(s.growth_rates().len(), species);
        for i in 0..species {
            for j in 0..species {
                let c = m[(i, j)];
                if i == j {
                    prop_assert_eq!(c, -0.05);
                } else {
                    prop_assert!(c == 0.0 || (0.01..0.1).contains(&c), "coefficient {} out of range", c);
                }
            }
        }
        for r in s.growth_rates() {
            prop_assert!((0.1..0.8).contains(r), "growth rate {} out of range", r);
        }
    }

    #[test]
    fn test_temperature_factor_monotone_in_distance(d1 in 0.0f64..60.0, d2 in 0.0f64..60.0) {
        prop_assume!((d1 - d2).abs() > 1e-6);
        let (near, far) = if d1 < d2 { (d1, d2) } else { (d2, d1) };
        prop_assert!(temperature_factor(30.0 + near) > temperature_factor(30.0 + far));
        prop_assert!(temperature_factor(30.0 - far) > 0.0);
        prop_assert!(temperature_factor(30.0 + near) <= 1.0);
    }

    #[test]
    fn test_diversity_bounds(pops in prop::collection::vec(0.0f64..100.0, 2..30)) {
        let survivors = pops.iter().filter(|&&p| p > 0.0).count();
        prop_assume!(survivors > 0);
        let h = shannon_diversity(&pops).unwrap();
        prop_assert!(h >= 0.0);
        prop_assert!(h <= (survivors as f64).ln() + 1e-9);
        if survivors >= 2 {
            prop_assert!(h > 0.0);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_biomass_non_negative_for_random_consortia(
        seed in any::<u64>(),
        species in 2usize..15,
        temperature in 20.0f64..40.0,
        intervention in 0.0f64..1.0,
        hours in 0.5f64..12.0
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let eco = MicrobialEcosystem::with_params(species, ModelParams::default(), SolverOptions::default(), &mut rng).unwrap();
        let population = vec![2.0; species];
        let run = eco.simulate(&population, hours, temperature, intervention).unwrap();
        prop_assert!(run.total_biomass.iter().all(|b| *b >= 0.0));
        prop_assert_eq!(*run.time.last().unwrap(), hours);
    }
}
