use ndarray::{Array1, Array4, Axis};

use super::Batch;
use crate::{MlErr, Result};

/// An image classification dataset held entirely in memory.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    images: Array4<f32>,
    labels: Array1<usize>,
    num_classes: usize,
}

impl InMemoryDataset {
    /// Creates a new dataset from owned buffers.
    ///
    /// # Arguments
    /// * `images` - The images, shaped `(n, c, h, w)`.
    /// * `labels` - One label per image.
    /// * `num_classes` - The amount of classes, every label must be below it.
    ///
    /// # Returns
    /// The dataset or an error if it's empty or the buffers don't agree.
    pub fn new(images: Array4<f32>, labels: Array1<usize>, num_classes: usize) -> Result<Self> {
        if labels.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        if images.len_of(Axis(0)) != labels.len() {
            return Err(MlErr::SizeMismatch {
                what: "dataset labels",
                got: labels.len(),
                expected: images.len_of(Axis(0)),
            });
        }

        if let Some(&label) = labels.iter().find(|&&label| label >= num_classes) {
            return Err(MlErr::LabelOutOfRange {
                label,
                classes: num_classes,
            });
        }

        Ok(Self {
            images,
            labels,
            num_classes,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[inline]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Returns the `(c, h, w)` shape of every image.
    pub fn image_dim(&self) -> (usize, usize, usize) {
        let (_, c, h, w) = self.images.dim();
        (c, h, w)
    }

    /// Gathers the samples at `indices` into a batch, panics if any index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> Batch {
        Batch {
            x: self.images.select(Axis(0), indices),
            y: self.labels.select(Axis(0), indices),
        }
    }

    /// Splits off the last `fraction` of the samples into a second dataset, typically used for
    /// validation.
    ///
    /// # Returns
    /// Both halves, or an error if either would be empty.
    pub fn split(self, fraction: f32) -> Result<(Self, Self)> {
        let n = self.len();
        let tail = ((n as f32) * fraction).round() as usize;
        let head = n.saturating_sub(tail);

        let (images_a, images_b) = self.images.view().split_at(Axis(0), head);
        let (labels_a, labels_b) = self.labels.view().split_at(Axis(0), head);

        Ok((
            Self::new(images_a.to_owned(), labels_a.to_owned(), self.num_classes)?,
            Self::new(images_b.to_owned(), labels_b.to_owned(), self.num_classes)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn dataset(n: usize) -> InMemoryDataset {
        let images = Array4::from_shape_fn((n, 1, 2, 2), |(i, ..)| i as f32);
        let labels = Array1::from_shape_fn(n, |i| i % 3);
        InMemoryDataset::new(images, labels, 3).unwrap()
    }

    #[test]
    fn rejects_empty_and_mismatched_buffers() {
        assert!(matches!(
            InMemoryDataset::new(Array4::zeros((0, 1, 2, 2)), Array1::zeros(0), 2),
            Err(MlErr::EmptyDataset)
        ));
        assert!(InMemoryDataset::new(Array4::zeros((2, 1, 2, 2)), array![0], 2).is_err());
        assert!(InMemoryDataset::new(Array4::zeros((1, 1, 2, 2)), array![5], 2).is_err());
    }

    #[test]
    fn select_gathers_in_the_given_order() {
        let batch = dataset(5).select(&[4, 1]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.y, array![1, 1]);
        assert_eq!(batch.x[[0, 0, 0, 0]], 4.);
        assert_eq!(batch.x[[1, 0, 1, 1]], 1.);
    }

    #[test]
    fn split_keeps_every_sample_once() {
        let (train, valid) = dataset(10).split(0.2).unwrap();
        assert_eq!((train.len(), valid.len()), (8, 2));
        assert_eq!(valid.select(&[0]).x[[0, 0, 0, 0]], 8.);
        assert_eq!(train.image_dim(), (1, 2, 2));
    }
}
