use crate::error::{Error, Result};
use crate::matrix::{Element, Matrix};

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Produces operand matrices with a fixed shape and pseudo random cells.
///
/// A seeded generator always yields the same sequence of matrices.
#[derive(Debug)]
pub struct MatrixGenerator {
    rng: StdRng,
}

impl MatrixGenerator {
    pub fn seeded(seed: u64) -> MatrixGenerator {
        MatrixGenerator {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> MatrixGenerator {
        MatrixGenerator {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded when `seed` is given, otherwise drawn from OS entropy
    pub fn new(seed: Option<u64>) -> MatrixGenerator {
        match seed {
            Some(seed) => MatrixGenerator::seeded(seed),
            None => MatrixGenerator::from_entropy(),
        }
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub fn generate<T: Element>(&mut self, rows: usize, cols: usize) -> Result<Matrix<T>> {
        if rows == 0 || cols == 0 {
            return Err(Error::config(format!(
                "cannot generate a {}x{} matrix",
                rows, cols
            )));
        }
        let cells = Matrix::<T>::cell_count(rows, cols).map_err(|_| {
            Error::config(format!(
                "cannot generate a {}x{} matrix, too many cells",
                rows, cols
            ))
        })?;
        let data = (0..cells)
            .map(|_| T::sample(&mut self.rng))
            .collect::<Vec<T>>();
        Matrix::from_vec(rows, cols, data)
    }
}
