use super::{Optimizer, optimizer::check_sizes};
use crate::Result;

/// Adaptive moment estimation with bias corrected first and second moments.
#[derive(Debug)]
pub struct Adam {
    lr: f32,
    b1: f32,
    b2: f32,
    eps: f32,
    /// Number of updates applied so far.
    t: i32,
    m: Vec<f32>,
    v: Vec<f32>,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters of the model it will update.
    /// * `lr` - The learning rate.
    /// * `b1` - Decay of the running mean of the gradient.
    /// * `b2` - Decay of the running mean of the squared gradient.
    /// * `eps` - Added to the denominator of every update.
    pub fn new(len: usize, lr: f32, b1: f32, b2: f32, eps: f32) -> Self {
        Self {
            lr,
            b1,
            b2,
            eps,
            t: 0,
            m: vec![0.; len],
            v: vec![0.; len],
        }
    }
}

impl Optimizer for Adam {
    fn learning_rate(&self) -> f32 {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_sizes(grad, params)?;
        check_sizes(&self.m, params)?;

        self.t = self.t.saturating_add(1);
        let (b1, b2, eps) = (self.b1, self.b2, self.eps);
        let m_hat = 1. / (1. - b1.powi(self.t));
        let v_hat = 1. / (1. - b2.powi(self.t));
        let lr = self.lr;

        for (i, (p, &g)) in params.iter_mut().zip(grad).enumerate() {
            let m = &mut self.m[i];
            let v = &mut self.v[i];

            *m = b1 * *m + (1. - b1) * g;
            *v = b2 * *v + (1. - b2) * g * g;
            *p -= lr * (*m * m_hat) / ((*v * v_hat).sqrt() + eps);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_by_the_learning_rate() {
        // With bias correction the first update is lr * g / |g|.
        let mut optimizer = Adam::new(2, 0.01, 0.9, 0.999, 1e-8);
        let mut params = [1., 1.];
        optimizer.update_params(&[4., -0.5], &mut params).unwrap();

        assert!((params[0] - 0.99).abs() < 1e-4);
        assert!((params[1] - 1.01).abs() < 1e-4);
    }

    #[test]
    fn learning_rate_can_be_overridden() {
        let mut optimizer = Adam::new(1, 0.01, 0.9, 0.999, 1e-8);
        optimizer.set_learning_rate(0.5);
        assert_eq!(optimizer.learning_rate(), 0.5);
    }

    #[test]
    fn mismatched_state_is_rejected() {
        let mut optimizer = Adam::new(3, 0.01, 0.9, 0.999, 1e-8);
        assert!(optimizer.update_params(&[0.; 2], &mut [0.; 2]).is_err());
    }
}
