//! Dense row-major matrices and the row-chunk views the protocol moves around.

use crate::error::{Error, Result};

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::ops::{Add, Mul};

/// The numeric cell types a [Matrix] can hold.
///
/// Products are accumulated in the cell type itself with [Element::mul_acc],
/// there is no widening.
pub trait Element:
    Copy
    + Default
    + PartialEq
    + Debug
    + Display
    + Add<Output = Self>
    + Mul<Output = Self>
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Draw a pseudo random cell value in `[0, 10)`
    fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self;

    /// `self + a * b`. Integer types wrap on overflow in every build profile,
    /// floats follow IEEE 754.
    fn mul_acc(self, a: Self, b: Self) -> Self;
}

macro_rules! impl_int_element {
    ($($t:ty),*) => {
        $(
            impl Element for $t {
                fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
                    rng.gen_range(0..10)
                }

                fn mul_acc(self, a: Self, b: Self) -> Self {
                    self.wrapping_add(a.wrapping_mul(b))
                }
            }
        )*
    };
}

macro_rules! impl_float_element {
    ($($t:ty),*) => {
        $(
            impl Element for $t {
                fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
                    rng.gen_range(0.0..10.0)
                }

                fn mul_acc(self, a: Self, b: Self) -> Self {
                    self + a * b
                }
            }
        )*
    };
}

impl_int_element!(i32, i64);
impl_float_element!(f32, f64);

/// A rectangular matrix, validated at construction and immutable afterwards.
///
/// Every matrix has at least one row and one column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix<T>", bound(deserialize = "T: Element"))]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

#[derive(Deserialize)]
struct RawMatrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Element> TryFrom<RawMatrix<T>> for Matrix<T> {
    type Error = Error;

    fn try_from(raw: RawMatrix<T>) -> Result<Self> {
        Matrix::from_vec(raw.rows, raw.cols, raw.data)
    }
}

impl<T: Element> Matrix<T> {
    /// Build a matrix from a row-major buffer.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::shape(
                "matrix",
                format!("matrix must be non-empty, got {}x{}", rows, cols),
            ));
        }
        let cells = Matrix::<T>::cell_count(rows, cols)?;
        if data.len() != cells {
            return Err(Error::shape(
                "matrix",
                format!(
                    "{}x{} matrix needs {} cells, got {}",
                    rows,
                    cols,
                    cells,
                    data.len()
                ),
            ));
        }
        Ok(Matrix { rows, cols, data })
    }

    /// `rows * cols`, or a shape error when the product does not fit in `usize`.
    pub fn cell_count(rows: usize, cols: usize) -> Result<usize> {
        rows.checked_mul(cols).ok_or_else(|| {
            Error::shape(
                "matrix",
                format!("{}x{} matrix has more cells than fit in memory", rows, cols),
            )
        })
    }

    /// Build a matrix from nested rows, rejecting ragged input.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let num_rows = rows.len();
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(num_rows * cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != cols {
                return Err(Error::shape(
                    "matrix",
                    format!("row {} has {} columns, row 0 has {}", i, row.len(), cols),
                ));
            }
            data.extend(row);
        }
        Matrix::from_vec(num_rows, cols, data)
    }

    /// A rows x cols matrix with every cell set to `T::default()`
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        let cells = Matrix::<T>::cell_count(rows, cols)?;
        Matrix::from_vec(rows, cols, vec![T::default(); cells])
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> std::slice::ChunksExact<'_, T> {
        self.data.chunks_exact(self.cols)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn to_rows(&self) -> Vec<Vec<T>> {
        self.iter_rows().map(|r| r.to_vec()).collect()
    }

    /// Copy rows `[start, end)` into a new matrix.
    pub(crate) fn slice_rows(&self, start: usize, end: usize) -> Result<Self> {
        if start >= end || end > self.rows {
            return Err(Error::shape(
                "matrix",
                format!("row range {}..{} outside 0..{}", start, end, self.rows),
            ));
        }
        Matrix::from_vec(
            end - start,
            self.cols,
            self.data[start * self.cols..end * self.cols].to_vec(),
        )
    }

    /// Render at most `max_rows` x `max_cols` cells followed by the matrix size.
    pub fn preview(&self, max_rows: usize, max_cols: usize) -> String {
        let mut out = String::new();
        for row in self.iter_rows().take(max_rows) {
            for val in row.iter().take(max_cols) {
                out.push_str(&format!("{:>6}", val));
            }
            if self.cols > max_cols {
                out.push_str(" ...");
            }
            out.push('\n');
        }
        if self.rows > max_rows {
            out.push_str("...\n");
        }
        out.push_str(&format!("Matrix Size: {}x{}", self.rows, self.cols));
        out
    }
}

/// A contiguous row slice of a parent matrix, tagged with its partition ordinal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Element"))]
pub struct Chunk<T> {
    pub ordinal: usize,
    /// index of this chunk's first row within the parent matrix
    pub first_row: usize,
    pub data: Matrix<T>,
}

impl<T: Element> Chunk<T> {
    pub fn rows(&self) -> usize {
        self.data.rows()
    }
}

/// The rows of the product that correspond to one [Chunk] of the left operand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Element"))]
pub struct PartialResult<T> {
    pub ordinal: usize,
    pub data: Matrix<T>,
}
