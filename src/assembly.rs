use crate::error::{Error, Result};
use crate::matrix::{Element, Matrix, PartialResult};

use itertools::Itertools;

/// Concatenate partial results in ascending ordinal order.
///
/// The order of `partials` does not matter, only their ordinals do. The
/// ordinals must be exactly `0..partials.len()` and every partial must have
/// the same column count.
#[tracing::instrument(skip_all, fields(partials = partials.len()))]
pub fn merge<T: Element>(partials: Vec<PartialResult<T>>) -> Result<Matrix<T>> {
    let expected = partials.len();
    if expected == 0 {
        return Err(Error::MissingPartial {
            ordinal: 0,
            expected,
            problem: "missing",
        });
    }
    let cols = partials[0].data.cols();
    let total_rows = partials.iter().map(|p| p.data.rows()).sum::<usize>();
    let mut data = Vec::with_capacity(total_rows * cols);
    for (i, partial) in partials
        .into_iter()
        .sorted_by_key(|p| p.ordinal)
        .enumerate()
    {
        if partial.ordinal > i {
            return Err(Error::MissingPartial {
                ordinal: i,
                expected,
                problem: "missing",
            });
        }
        if partial.ordinal < i {
            return Err(Error::MissingPartial {
                ordinal: partial.ordinal,
                expected,
                problem: "duplicated",
            });
        }
        if partial.data.cols() != cols {
            return Err(Error::shape(
                "merge",
                format!(
                    "partial {} has {} columns, expected {}",
                    partial.ordinal,
                    partial.data.cols(),
                    cols
                ),
            ));
        }
        data.extend(partial.data.into_vec());
    }
    Matrix::from_vec(total_rows, cols, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(ordinal: usize, rows: Vec<Vec<i64>>) -> PartialResult<i64> {
        PartialResult {
            ordinal,
            data: Matrix::from_rows(rows).unwrap(),
        }
    }

    fn in_order() -> Vec<PartialResult<i64>> {
        vec![
            partial(0, vec![vec![1, 2], vec![3, 4]]),
            partial(1, vec![vec![5, 6], vec![7, 8]]),
            partial(2, vec![vec![9, 10]]),
        ]
    }

    #[test]
    fn concatenates_rows() {
        let m = merge(in_order()).unwrap();
        assert_eq!(m.shape(), (5, 2));
        assert_eq!(m.row(4), &[9, 10]);
    }

    #[test]
    fn shuffled_input_same_result() {
        let mut shuffled = in_order();
        shuffled.swap(0, 2);
        shuffled.swap(1, 2);
        assert_eq!(merge(shuffled).unwrap(), merge(in_order()).unwrap());
    }

    #[test]
    fn column_mismatch() {
        let mut parts = in_order();
        parts[1] = partial(1, vec![vec![5, 6, 0]]);
        assert!(matches!(
            merge(parts).unwrap_err(),
            Error::ShapeMismatch { context: "merge", .. }
        ));
    }

    #[test]
    fn gap_and_duplicate() {
        let mut parts = in_order();
        parts[1].ordinal = 3;
        assert!(matches!(
            merge(parts).unwrap_err(),
            Error::MissingPartial { ordinal: 1, problem: "missing", .. }
        ));

        let mut parts = in_order();
        parts[2].ordinal = 1;
        assert!(matches!(
            merge(parts).unwrap_err(),
            Error::MissingPartial { ordinal: 1, problem: "duplicated", .. }
        ));

        assert!(merge::<i64>(vec![]).is_err());
    }
}
