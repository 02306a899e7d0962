use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::LossFn;
use crate::{MlErr, Result};

/// Softmax followed by the negative log likelihood of the target class, averaged over the batch.
///
/// With label smoothing `ε` the target distribution puts `1 - ε` on the labeled class and spreads
/// `ε` uniformly over all classes.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy {
    label_smoothing: f32,
}

impl CrossEntropy {
    /// Returns a new `CrossEntropy` without label smoothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new `CrossEntropy` with the given label smoothing, in `[0, 1]`.
    pub fn with_label_smoothing(label_smoothing: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&label_smoothing) {
            return Err(MlErr::InvalidHyperparameter {
                what: "label smoothing",
                value: label_smoothing,
            });
        }

        Ok(Self { label_smoothing })
    }

    /// Computes the row-wise log softmax of the logits, subtracting each row's maximum first.
    fn log_softmax(y_pred: ArrayView2<f32>) -> Array2<f32> {
        let mut out = y_pred.to_owned();

        for mut row in out.rows_mut() {
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| v - max);
            let log_sum = row.mapv(f32::exp).sum().ln();
            row.mapv_inplace(|v| v - log_sum);
        }

        out
    }

    /// The smoothed target distribution of each row.
    fn targets(&self, y: ArrayView1<usize>, classes: usize) -> Array2<f32> {
        let eps = self.label_smoothing;
        let mut q = Array2::from_elem((y.len(), classes), eps / classes as f32);

        for (mut row, &label) in q.rows_mut().into_iter().zip(y) {
            row[label] += 1. - eps;
        }

        q
    }

    fn check(y_pred: ArrayView2<f32>, y: ArrayView1<usize>) -> Result<()> {
        if y_pred.nrows() != y.len() {
            return Err(MlErr::SizeMismatch {
                what: "labels",
                got: y.len(),
                expected: y_pred.nrows(),
            });
        }

        let classes = y_pred.ncols();
        if let Some(&label) = y.iter().find(|&&label| label >= classes) {
            return Err(MlErr::LabelOutOfRange { label, classes });
        }

        Ok(())
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView1<usize>) -> Result<f32> {
        Self::check(y_pred, y)?;
        if y.is_empty() {
            return Ok(0.);
        }

        let log_p = Self::log_softmax(y_pred);
        let q = self.targets(y, y_pred.ncols());
        let total = -(&q * &log_p).sum_axis(Axis(1)).sum();
        Ok(total / y.len() as f32)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView1<usize>) -> Result<Array2<f32>> {
        Self::check(y_pred, y)?;
        if y.is_empty() {
            return Ok(Array2::zeros(y_pred.raw_dim()));
        }

        let p = Self::log_softmax(y_pred).mapv(f32::exp);
        let q = self.targets(y, y_pred.ncols());
        Ok((p - q) / y.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn uniform_logits_cost_log_of_the_class_count() {
        let ce = CrossEntropy::new();
        let loss = ce.loss(array![[0., 0., 0., 0.]].view(), array![2].view()).unwrap();
        assert!((loss - 4f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn gradient_is_softmax_minus_one_hot_over_batch() {
        let ce = CrossEntropy::new();
        let grad = ce
            .loss_prime(array![[0., 0.], [0., 0.]].view(), array![0, 1].view())
            .unwrap();
        let expected = array![[-0.25, 0.25], [0.25, -0.25]];
        assert!((grad - expected).iter().all(|d| d.abs() < 1e-6));
    }

    #[test]
    fn large_logits_stay_finite() {
        let ce = CrossEntropy::new();
        let loss = ce.loss(array![[1000., 0.]].view(), array![1].view()).unwrap();
        assert!(loss.is_finite());
        assert!((loss - 1000.).abs() < 1e-3);
    }

    #[test]
    fn label_smoothing_raises_the_loss_of_a_confident_prediction() {
        let logits = array![[10., 0., 0.]];
        let labels = array![0];
        let plain = CrossEntropy::new()
            .loss(logits.view(), labels.view())
            .unwrap();
        let smoothed = CrossEntropy::with_label_smoothing(0.1)
            .unwrap()
            .loss(logits.view(), labels.view())
            .unwrap();
        assert!(smoothed > plain);
    }

    #[test]
    fn labels_out_of_range_are_rejected() {
        let ce = CrossEntropy::new();
        assert!(matches!(
            ce.loss(array![[0., 0.]].view(), array![2].view()),
            Err(MlErr::LabelOutOfRange {
                label: 2,
                classes: 2
            })
        ));
    }

    #[test]
    fn row_count_must_match_labels() {
        let ce = CrossEntropy::new();
        assert!(ce.loss(array![[0., 0.]].view(), array![0, 1].view()).is_err());
    }
}
