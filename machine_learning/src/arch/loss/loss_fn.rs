use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::Result;

/// A loss over a batch of logits and the class labels they should predict.
pub trait LossFn {
    /// Computes the mean loss of the batch.
    ///
    /// # Arguments
    /// * `y_pred` - The logits, one row per sample.
    /// * `y` - The label of each sample.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView1<usize>) -> Result<f32>;

    /// Computes the derivative of `loss` with respect to every logit.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView1<usize>) -> Result<Array2<f32>>;
}

impl<T: LossFn + ?Sized> LossFn for Box<T> {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView1<usize>) -> Result<f32> {
        (**self).loss(y_pred, y)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView1<usize>) -> Result<Array2<f32>> {
        (**self).loss_prime(y_pred, y)
    }
}
