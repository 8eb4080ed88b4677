use std::any::Any;
use std::fmt::Debug;
use std::ops::RangeInclusive;

pub trait Scalar: Copy + PartialEq + Debug + Any {}
impl<T: Copy + PartialEq + Debug + Any> Scalar for T {}

/// Column-major 2D array with Fortran-style inclusive index bounds, indexed
/// as `(i, j)` with `i` varying fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct FortranArray2D<T: Scalar> {
    values: Vec<T>,

    start_row_idx: usize,
    start_column_idx: usize,

    num_rows: usize,
    num_columns: usize,
}

impl<T: Scalar> FortranArray2D<T>
where
    T: Default,
{
    pub fn new(
        start_row_idx: usize,
        start_column_idx: usize,
        end_row_idx: usize,
        end_column_idx: usize,
    ) -> Self {
        let num_rows = end_row_idx + 1 - start_row_idx;
        let num_columns = end_column_idx + 1 - start_column_idx;

        FortranArray2D {
            start_row_idx,
            start_column_idx,

            num_rows,
            num_columns,
            values: vec![T::default(); num_rows * num_columns],
        }
    }
}

impl<T: Scalar> FortranArray2D<T> {
    #[inline(always)]
    pub fn get(&self, row_idx: usize, column_idx: usize) -> T {
        let idx = self.index_from_row_and_column(row_idx, column_idx);
        self.values[idx]
    }

    #[inline(always)]
    pub fn set(&mut self, row_idx: usize, column_idx: usize, value: T) {
        let idx = self.index_from_row_and_column(row_idx, column_idx);
        self.values[idx] = value
    }

    pub fn rows(&self) -> RangeInclusive<usize> {
        self.start_row_idx..=self.start_row_idx + self.num_rows - 1
    }

    pub fn columns(&self) -> RangeInclusive<usize> {
        self.start_column_idx..=self.start_column_idx + self.num_columns - 1
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }

    /// True if any element inside the window satisfies `predicate`. The
    /// window is clipped to the array bounds.
    pub fn any_in_window<F>(
        &self,
        rows: RangeInclusive<usize>,
        columns: RangeInclusive<usize>,
        predicate: F,
    ) -> bool
    where
        F: Fn(T) -> bool,
    {
        let row_lo = (*rows.start()).max(*self.rows().start());
        let row_hi = (*rows.end()).min(*self.rows().end());
        let column_lo = (*columns.start()).max(*self.columns().start());
        let column_hi = (*columns.end()).min(*self.columns().end());

        (column_lo..=column_hi).any(|column_idx| {
            (row_lo..=row_hi).any(|row_idx| predicate(self.get(row_idx, column_idx)))
        })
    }

    #[inline(always)]
    fn index_from_row_and_column(&self, row_idx: usize, column_idx: usize) -> usize {
        (row_idx - self.start_row_idx) + (column_idx - self.start_column_idx) * (self.num_rows)
    }
}
