//! The chunk multiplication kernel. Pure functions only: no store access, no logging.

use crate::error::{Error, Result};
use crate::matrix::{Chunk, Element, Matrix, PartialResult};

/// Standard product of `a` (r x n) and `b` (n x c).
///
/// Each cell is accumulated in `T` over ascending `k`; integer cells wrap on overflow.
pub fn multiply<T: Element>(a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>> {
    if a.cols() != b.rows() {
        return Err(Error::shape(
            "multiply",
            format!(
                "left operand is {}x{} but right operand is {}x{}",
                a.rows(),
                a.cols(),
                b.rows(),
                b.cols()
            ),
        ));
    }
    let cols = b.cols();
    let mut out = vec![T::default(); a.rows() * cols];
    // i-k-j order: walks b and the output row by row
    for (a_row, out_row) in a.iter_rows().zip(out.chunks_exact_mut(cols)) {
        for (a_ik, b_row) in a_row.iter().zip(b.iter_rows()) {
            for (c_ij, b_kj) in out_row.iter_mut().zip(b_row) {
                *c_ij = c_ij.mul_acc(*a_ik, *b_kj);
            }
        }
    }
    Matrix::from_vec(a.rows(), cols, out)
}

/// Multiply one chunk of the left operand against the full right operand.
pub fn multiply_chunk<T: Element>(chunk: &Chunk<T>, b: &Matrix<T>) -> Result<PartialResult<T>> {
    Ok(PartialResult {
        ordinal: chunk.ordinal,
        data: multiply(&chunk.data, b)?,
    })
}
