use super::{Optimizer, optimizer::check_sizes};
use crate::Result;

/// Gradient descent over a velocity that accumulates past gradients, `v = mu * v + g`.
#[derive(Debug)]
pub struct GradientDescentWithMomentum {
    lr: f32,
    mu: f32,
    velocity: Vec<f32>,
}

impl GradientDescentWithMomentum {
    /// Creates a new `GradientDescentWithMomentum` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters of the model it will update.
    /// * `lr` - The learning rate.
    /// * `mu` - How much of the previous velocity carries over to the next step.
    pub fn new(len: usize, lr: f32, mu: f32) -> Self {
        Self {
            lr,
            mu,
            velocity: vec![0.; len],
        }
    }
}

impl Optimizer for GradientDescentWithMomentum {
    fn learning_rate(&self) -> f32 {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_sizes(grad, params)?;
        check_sizes(&self.velocity, params)?;

        for ((p, &g), v) in params.iter_mut().zip(grad).zip(&mut self.velocity) {
            *v = self.mu.mul_add(*v, g);
            *p -= self.lr * *v;
        }

        Ok(())
    }
}
