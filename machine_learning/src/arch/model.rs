use ndarray::{Array2, ArrayView4};

use crate::{MlErr, Result};

/// Whether a model is being trained or evaluated. Layers such as dropout behave differently
/// in each mode and backward passes are only allowed while training.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Train,
    Eval,
}

/// An image classifier whose parameters live in a single flat buffer.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Returns the current mode of the model.
    fn mode(&self) -> Mode;

    /// Switches the model to `mode`.
    fn set_mode(&mut self, mode: Mode);

    /// Switches the model to training mode.
    fn train(&mut self) {
        self.set_mode(Mode::Train);
    }

    /// Switches the model to evaluation mode.
    fn eval(&mut self) {
        self.set_mode(Mode::Eval);
    }

    /// Makes a forward pass through the model.
    ///
    /// # Arguments
    /// * `x` - A batch of images shaped `(batch, channels, height, width)`.
    ///
    /// # Returns
    /// The class scores (logits) shaped `(batch, classes)` or an error if occurred.
    fn forward(&mut self, x: ArrayView4<f32>) -> Result<Array2<f32>>;

    /// Backpropagates the gradient of the loss with respect to the last forward pass' output.
    /// The resulting parameter gradient is **added** to the gradient buffer, call `zero_grad`
    /// between steps.
    ///
    /// # Arguments
    /// * `d` - The gradient of the loss with respect to the logits.
    fn backward(&mut self, d: Array2<f32>) -> Result<()>;

    /// Sets every entry of the gradient buffer to zero.
    fn zero_grad(&mut self);

    /// Returns the model's parameters.
    fn params(&self) -> &[f32];

    /// Returns the model's parameters mutably.
    fn params_mut(&mut self) -> &mut [f32];

    /// Returns the parameters alongside the accumulated gradient.
    fn params_and_grad(&mut self) -> (&mut [f32], &[f32]);

    /// Overwrites the model's parameters.
    ///
    /// # Arguments
    /// * `params` - The new parameters, must have exactly `size()` entries.
    fn load_params(&mut self, params: &[f32]) -> Result<()> {
        let dst = self.params_mut();

        if dst.len() != params.len() {
            return Err(MlErr::SizeMismatch {
                what: "loaded parameters",
                got: params.len(),
                expected: dst.len(),
            });
        }

        dst.copy_from_slice(params);
        Ok(())
    }
}
