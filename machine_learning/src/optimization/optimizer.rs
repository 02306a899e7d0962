use crate::{MlErr, Result, arch::Model};

/// Defines the strategy for updating model parameters based on calculated gradients.
pub trait Optimizer {
    /// Returns the current learning rate.
    fn learning_rate(&self) -> f32;

    /// Overrides the learning rate, used by learning rate schedulers.
    fn set_learning_rate(&mut self, learning_rate: f32);

    /// Updates the provided slice of parameters using the accumulated gradient.
    ///
    /// # Arguments
    /// * `grad` - A reference to the model's gradient.
    /// * `params` - The parameters to update.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `grad` and `params`.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()>;

    /// Clears the gradient accumulated by the model.
    fn zero_grad<M: Model + ?Sized>(&mut self, model: &mut M)
    where
        Self: Sized,
    {
        model.zero_grad();
    }

    /// Takes one optimization step over the model's parameters with its accumulated gradient.
    fn step<M: Model + ?Sized>(&mut self, model: &mut M) -> Result<()>
    where
        Self: Sized,
    {
        let (params, grad) = model.params_and_grad();
        self.update_params(grad, params)
    }
}

impl<T: Optimizer + ?Sized> Optimizer for Box<T> {
    fn learning_rate(&self) -> f32 {
        (**self).learning_rate()
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        (**self).set_learning_rate(learning_rate);
    }

    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        (**self).update_params(grad, params)
    }
}

pub(super) fn check_sizes(grad: &[f32], params: &[f32]) -> Result<()> {
    if grad.len() != params.len() {
        return Err(MlErr::SizeMismatch {
            what: "gradient",
            got: grad.len(),
            expected: params.len(),
        });
    }

    Ok(())
}
