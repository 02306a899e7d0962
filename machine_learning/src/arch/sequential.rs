use ndarray::{Array2, ArrayView4, Ix2};
use rand::rngs::StdRng;

use super::{Mode, Model, layers::Layer};
use crate::{MlErr, Result, initialization::WeightInit};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The parameters of every layer are stored contiguously in a single buffer, in layer order,
/// and so is the gradient.
pub struct Sequential {
    layers: Vec<Layer>,
    params: Vec<f32>,
    grad: Vec<f32>,
    mode: Mode,
    rng: StdRng,
}

impl Sequential {
    /// Creates a new `Sequential` and initializes its parameters.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    /// * `init` - How to initialize the weights, biases always start at zero.
    /// * `rng` - The random number generator used for initialization and dropout.
    ///
    /// # Returns
    /// A new `Sequential` instance or an error if the initialization is invalid.
    pub fn new<I>(layers: I, init: WeightInit, mut rng: StdRng) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
    {
        let layers: Vec<Layer> = layers.into_iter().collect();
        let size = layers.iter().map(Layer::size).sum();
        let mut params = vec![0.; size];

        let mut offset = 0;
        for layer in &layers {
            let weights = layer.weights_len();
            if let Some((fan_in, fan_out)) = layer.fans() {
                init.fill(&mut rng, fan_in, fan_out, &mut params[offset..offset + weights])?;
            }

            offset += layer.size();
        }

        Ok(Self {
            layers,
            grad: vec![0.; size],
            params,
            mode: Mode::Train,
            rng,
        })
    }

    /// Returns the layers of this model.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.params.len()
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn forward(&mut self, x: ArrayView4<f32>) -> Result<Array2<f32>> {
        let Self {
            layers,
            params,
            mode,
            rng,
            ..
        } = self;

        let mut out = x.to_owned().into_dyn();
        let mut offset = 0;

        for layer in layers.iter_mut() {
            let size = layer.size();
            let layer_params = params
                .get(offset..offset + size)
                .ok_or(MlErr::SizeMismatch {
                    what: "parameters",
                    got: params.len(),
                    expected: offset + size,
                })?;

            out = layer.forward(layer_params, out, *mode, rng)?;
            offset += size;
        }

        Ok(out.into_dimensionality::<Ix2>()?)
    }

    fn backward(&mut self, d: Array2<f32>) -> Result<()> {
        if self.mode == Mode::Eval {
            return Err(MlErr::BackwardInEvalMode);
        }

        let Self {
            layers,
            params,
            grad,
            ..
        } = self;

        let mut d = d.into_dyn();
        let mut end = params.len();

        for layer in layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(())
    }

    fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    fn params(&self) -> &[f32] {
        &self.params
    }

    fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    fn params_and_grad(&mut self) -> (&mut [f32], &[f32]) {
        (&mut self.params, &self.grad)
    }
}
