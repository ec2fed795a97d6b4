//! Species interaction structure: who helps whom, and how fast each species grows alone.

use crate::error::{EcosystemError, Result};
use consortium_common::ModelParams;
use log::debug;
use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Uniform};

/// The fixed "genome" of a consortium. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionStructure {
    interaction_matrix: Array2<f64>,
    growth_rates: Array1<f64>,
}

impl InteractionStructure {
    /// Draws a random structure for `species_count` species.
    ///
    /// Draw order is fixed: the matrix row by row (a Bernoulli trial per
    /// off-diagonal pair, followed by a coefficient on success), then one
    /// growth rate per species. The same seeded `rng` therefore always
    /// reproduces the same structure.
    pub fn generate<R: Rng + ?Sized>(
        species_count: usize,
        params: &ModelParams,
        rng: &mut R,
    ) -> Result<Self> {
        if species_count == 0 {
            return Err(EcosystemError::configuration("species_count must be greater than 0"));
        }
        if !(params.self_competition < 0.0) {
            return Err(EcosystemError::configuration("self_competition must be negative"));
        }

        let interacts = Bernoulli::new(params.symbiosis_probability)
            .map_err(|e| EcosystemError::configuration(format!("symbiosis_probability: {}", e)))?;
        let coefficient = Uniform::new(params.symbiosis_min, params.symbiosis_max)
            .map_err(|e| EcosystemError::configuration(format!("symbiosis range: {}", e)))?;
        let growth = Uniform::new(params.growth_rate_min, params.growth_rate_max)
            .map_err(|e| EcosystemError::configuration(format!("growth rate range: {}", e)))?;

        // Row-major fill keeps the draw order independent of ndarray internals
        let mut interaction_matrix = Array2::<f64>::zeros((species_count, species_count));
        for ((i, j), c) in interaction_matrix.indexed_iter_mut() {
            if i == j {
                *c = params.self_competition;
            } else if interacts.sample(rng) {
                *c = coefficient.sample(rng);
            }
        }

        let growth_rates = Array1::from_shape_fn(species_count, |_| growth.sample(rng));

        let structure = Self { interaction_matrix, growth_rates };
        debug!(
            "Generated interaction structure: {} species, connectance {:.3}.",
            species_count,
            structure.connectance()
        );
        Ok(structure)
    }

    /// Wraps an explicitly given matrix and growth-rate vector.
    pub fn from_parts(interaction_matrix: Array2<f64>, growth_rates: Array1<f64>) -> Result<Self> {
        let (n, cols) = interaction_matrix.dim();
        if n != cols {
            return Err(EcosystemError::configuration(format!(
                "interaction matrix is {}x{}, expected a square matrix",
                n, cols
            )));
        }
        if n == 0 {
            return Err(EcosystemError::configuration("interaction matrix is empty"));
        }
        if growth_rates.len() != n {
            return Err(EcosystemError::configuration(format!(
                "{} growth rates for a {}x{} interaction matrix",
                growth_rates.len(),
                n,
                n
            )));
        }
        if growth_rates.iter().any(|r| !r.is_finite()) {
            return Err(EcosystemError::configuration("growth rates must be finite"));
        }
        if interaction_matrix.iter().any(|c| !c.is_finite()) {
            return Err(EcosystemError::configuration("interaction coefficients must be finite"));
        }
        Ok(Self { interaction_matrix, growth_rates })
    }

    /// Same as [`from_parts`](Self::from_parts), from nested rows.
    pub fn from_rows(rows: &[Vec<f64>], growth_rates: Vec<f64>) -> Result<Self> {
        let n = rows.len();
        if rows.iter().any(|r| r.len() != n) {
            return Err(EcosystemError::configuration("interaction matrix is not square"));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let matrix = Array2::from_shape_vec((n, n), flat)
            .map_err(|e| EcosystemError::configuration(format!("interaction matrix: {}", e)))?;
        Self::from_parts(matrix, Array1::from_vec(growth_rates))
    }

    pub fn species_count(&self) -> usize {
        self.growth_rates.len()
    }

    pub fn interaction_matrix(&self) -> &Array2<f64> {
        &self.interaction_matrix
    }

    pub fn growth_rates(&self) -> &Array1<f64> {
        &self.growth_rates
    }

    /// Fraction of off-diagonal pairs with a non-zero coefficient.
    pub fn connectance(&self) -> f64 {
        let n = self.species_count();
        if n < 2 {
            return 0.0;
        }
        let links = self
            .interaction_matrix
            .indexed_iter()
            .filter(|&((i, j), &c)| i != j && c != 0.0)
            .count();
        links as f64 / (n * (n - 1)) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn zero_species_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = InteractionStructure::generate(0, &ModelParams::default(), &mut rng).unwrap_err();
        assert!(matches!(err, EcosystemError::InvalidConfiguration(_)));
    }

    #[test]
    fn same_seed_same_structure() {
        let params = ModelParams::default();
        let a = InteractionStructure::generate(20, &params, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = InteractionStructure::generate(20, &params, &mut StdRng::seed_from_u64(42)).unwrap();
        let c = InteractionStructure::generate(20, &params, &mut StdRng::seed_from_u64(43)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn single_species_has_only_self_competition() {
        let mut rng = StdRng::seed_from_u64(5);
        let s = InteractionStructure::generate(1, &ModelParams::default(), &mut rng).unwrap();
        assert_eq!(s.interaction_matrix()[(0, 0)], -0.05);
        assert_eq!(s.connectance(), 0.0);
    }

    #[test]
    fn connectance_is_near_symbiosis_probability_for_large_consortia() {
        let mut rng = StdRng::seed_from_u64(2024);
        let s = InteractionStructure::generate(120, &ModelParams::default(), &mut rng).unwrap();
        assert!((s.connectance() - 0.3).abs() < 0.03, "connectance {}", s.connectance());
    }

    #[test]
    fn from_rows_checks_dimensions() {
        let rows = vec![vec![-0.05, 0.0], vec![0.0, -0.05]];
        assert!(InteractionStructure::from_rows(&rows, vec![0.5, 0.5]).is_ok());
        assert!(InteractionStructure::from_rows(&rows, vec![0.5]).is_err());
        assert!(InteractionStructure::from_rows(&[vec![1.0, 2.0]], vec![0.5]).is_err());
        assert!(InteractionStructure::from_rows(&[], vec![]).is_err());
    }

    #[test]
    fn from_parts_rejects_rectangular_matrix() {
        let err = InteractionStructure::from_parts(Array2::zeros((2, 3)), Array1::ones(2)).unwrap_err();
        assert!(matches!(err, EcosystemError::InvalidConfiguration(_)));
    }
}
