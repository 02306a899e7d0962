use ndarray::{Array1, Array4};

/// A batch of images, shaped `(n, c, h, w)`, and their class labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub x: Array4<f32>,
    pub y: Array1<usize>,
}

impl Batch {
    /// Returns the amount of samples in the batch.
    #[inline]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Anything that yields the batches of one epoch and knows how many it will yield.
pub trait BatchSource {
    /// Returns the amount of batches a single pass over this source yields.
    fn num_batches(&self) -> usize;

    /// Starts a new pass over the source.
    fn batches(&mut self) -> impl Iterator<Item = Batch> + '_;
}
