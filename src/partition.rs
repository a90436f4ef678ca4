use crate::error::{Error, Result};
use crate::matrix::{Chunk, Element, Matrix};

/// Number of chunks a matrix with `rows` rows splits into. 0 for a zero height.
pub fn num_chunks(rows: usize, chunk_height: usize) -> usize {
    if chunk_height == 0 {
        return 0;
    }
    (rows + chunk_height - 1) / chunk_height
}

/// Split `matrix` into row-contiguous chunks of at most `chunk_height` rows.
///
/// Chunk `i` covers rows `[i * chunk_height, min((i + 1) * chunk_height, rows))`,
/// so only the last chunk can be shorter.
pub fn split<T: Element>(matrix: &Matrix<T>, chunk_height: usize) -> Result<Vec<Chunk<T>>> {
    if chunk_height == 0 {
        return Err(Error::config("chunk height must be at least 1"));
    }
    let rows = matrix.rows();
    (0..num_chunks(rows, chunk_height))
        .map(|ordinal| {
            let start = ordinal * chunk_height;
            let end = std::cmp::min(start + chunk_height, rows);
            Ok(Chunk {
                ordinal,
                first_row: start,
                data: matrix.slice_rows(start, end)?,
            })
        })
        .collect()
}
