//! Summary metrics derived from a trajectory.

use crate::error::{EcosystemError, Result};
use ndarray::{Array2, ArrayView1, Axis};

/// Total biomass at each sample of a species-major table
/// (`populations[[i, k]]` = species `i` at sample `k`).
pub fn total_biomass(populations: &Array2<f64>) -> Vec<f64> {
    populations.sum_axis(Axis(0)).to_vec()
}

/// Shannon diversity index `H = -sum(p ln p)` of one population vector.
///
/// Species with a proportion of exactly zero are left out of the sum.
/// Zero (or non-finite) total biomass has no proportions and is rejected.
pub fn shannon_diversity<'a, V: Into<ArrayView1<'a, f64>>>(population: V) -> Result<f64> {
    let population = population.into();
    let total = population.sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(EcosystemError::metric(format!(
            "diversity is undefined for total biomass {}",
            total
        )));
    }
    Ok(-population
        .iter()
        .map(|&y| y / total)
        .filter(|&p| p > 0.0)
        .map(|p| p * p.ln())
        .sum::<f64>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn biomass_sums_each_column() {
        let pops = arr2(&[[1.0, 2.0, 3.0], [10.0, 20.0, 30.0]]);
        assert_eq!(total_biomass(&pops), vec![11.0, 22.0, 33.0]);
        assert!(total_biomass(&Array2::zeros((3, 0))).is_empty());
    }

    #[test]
    fn single_survivor_has_zero_diversity() {
        assert_eq!(shannon_diversity(&[0.0f64, 42.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn equal_populations_give_log_of_species_count() {
        for n in 2..=16 {
            let h = shannon_diversity(&vec![3.5f64; n]).unwrap();
            assert!((h - (n as f64).ln()).abs() < 1e-12, "n={} h={}", n, h);
        }
    }

    #[test]
    fn two_survivors_are_positive() {
        assert!(shannon_diversity(&arr1(&[1.0, 0.0, 1e-6])).unwrap() > 0.0);
    }

    #[test]
    fn zero_biomass_is_rejected() {
        let err = shannon_diversity(&[0.0f64, 0.0]).unwrap_err();
        assert!(matches!(err, EcosystemError::InvalidMetricInput(_)));
        assert!(shannon_diversity(&Vec::<f64>::new()).is_err());
    }
}
