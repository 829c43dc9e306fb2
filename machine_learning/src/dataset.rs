use std::num::NonZeroUsize;

use ndarray::{ArrayView2, Axis, s};
use rand::Rng;

use crate::{MlErr, Result};

/// A supervised dataset. Every row holds `x_size` input values followed by `y_size` targets,
/// rows are stored contiguously.
#[derive(Clone, Debug)]
pub struct Dataset {
    data: Vec<f32>,
    x_size: usize,
    y_size: usize,
    len: usize,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `data` - The flat row-major samples.
    /// * `x_size` - The amount of input values per row.
    /// * `y_size` - The amount of target values per row.
    ///
    /// # Returns
    /// An error if the data is empty or does not split in whole rows.
    pub fn new(data: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        let row_size = x_size + y_size;

        if x_size == 0 || y_size == 0 {
            return Err(MlErr::InvalidInput("dataset rows need inputs and targets"));
        }

        if data.is_empty() {
            return Err(MlErr::InvalidInput("dataset is empty"));
        }

        if data.len() % row_size != 0 {
            return Err(MlErr::SizeMismatch {
                what: "dataset rows",
                got: data.len() % row_size,
                expected: 0,
            });
        }

        Ok(Self {
            len: data.len() / row_size,
            data,
            x_size,
            y_size,
        })
    }

    /// The amount of rows.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn x_size(&self) -> usize {
        self.x_size
    }

    pub fn y_size(&self) -> usize {
        self.y_size
    }

    /// Returns the inputs and targets of row `i`, if it exists.
    pub fn row(&self, i: usize) -> Option<(&[f32], &[f32])> {
        let row_size = self.x_size + self.y_size;
        let row = self.data.get(i * row_size..(i + 1) * row_size)?;
        Some(row.split_at(self.x_size))
    }

    /// Shuffles the rows in place.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let row_size = self.x_size + self.y_size;

        for i in (1..self.len).rev() {
            let j = rng.random_range(0..=i);
            if i == j {
                continue;
            }

            let (head, tail) = self.data.split_at_mut(i * row_size);
            head[j * row_size..(j + 1) * row_size].swap_with_slice(&mut tail[..row_size]);
        }
    }

    /// Splits the dataset in consecutive batches of at most `batch_size` rows.
    ///
    /// # Returns
    /// An iterator over `(x, y)` views, or an error if the data can't be viewed as a matrix.
    pub fn batches(
        &self,
        batch_size: NonZeroUsize,
    ) -> Result<impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView2<'_, f32>)>> {
        let full = ArrayView2::from_shape((self.len, self.x_size + self.y_size), &self.data)?;
        let batch_size = batch_size.get();
        let (len, x_size) = (self.len, self.x_size);

        Ok((0..len).step_by(batch_size).map(move |start| {
            let end = (start + batch_size).min(len);
            full.slice_move(s![start..end, ..]).split_at(Axis(1), x_size)
        }))
    }
}
