use rand::rngs::StdRng;

use super::{
    LayerSpec, Sequential,
    layers::{Conv2d, Layer, MaxPool2d},
};
use crate::{MlErr, Result, initialization::WeightInit};

/// The shape of the activations flowing between two layers, without the batch axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Maps(usize, usize, usize),
    Flat(usize),
}

/// Builds a `Sequential` from `LayerSpec`s, inferring every layer's input size from the image
/// shape and the layers before it.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    input: (usize, usize, usize),
    layers: Vec<LayerSpec>,
    init: WeightInit,
}

impl ModelBuilder {
    /// Creates a new `ModelBuilder` for images shaped `(c, h, w)`.
    pub fn new(input: (usize, usize, usize)) -> Self {
        Self {
            input,
            layers: Vec::new(),
            init: WeightInit::default(),
        }
    }

    pub fn layer(mut self, spec: LayerSpec) -> Self {
        self.layers.push(spec);
        self
    }

    pub fn layers<I>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = LayerSpec>,
    {
        self.layers.extend(specs);
        self
    }

    pub fn init(mut self, init: WeightInit) -> Self {
        self.init = init;
        self
    }

    /// Instantiates every layer and initializes the parameters of the model.
    ///
    /// # Arguments
    /// * `rng` - The random number generator for initialization and dropout.
    ///
    /// # Returns
    /// The model or an error if some layer doesn't fit the output of the previous one, or the
    /// model doesn't end in a flat output.
    pub fn build(self, rng: StdRng) -> Result<Sequential> {
        let (c, h, w) = self.input;
        let mut shape = Shape::Maps(c, h, w);
        let mut layers = Vec::with_capacity(self.layers.len());

        for (i, spec) in self.layers.into_iter().enumerate() {
            let (layer, next) = instantiate(spec, shape).map_err(|e| match e {
                MlErr::InvalidLayer(msg) => MlErr::InvalidLayer(format!("layer {i}: {msg}")),
                e => e,
            })?;

            layers.push(layer);
            shape = next;
        }

        if !matches!(shape, Shape::Flat(_)) {
            return Err(MlErr::InvalidLayer(
                "the model must end with flat logits, add a flatten and a dense layer".into(),
            ));
        }

        Sequential::new(layers, self.init, rng)
    }
}

fn instantiate(spec: LayerSpec, shape: Shape) -> Result<(Layer, Shape)> {
    match (spec, shape) {
        (
            LayerSpec::Conv2d {
                out_channels,
                kernel,
                stride,
                padding,
                act_fn,
            },
            Shape::Maps(c, h, w),
        ) => {
            let act_fn = act_fn.map(Into::into);
            let conv = Conv2d::new(c, out_channels, kernel, stride, padding, act_fn);
            let (oh, ow) = conv.output_hw((h, w))?;
            Ok((Layer::Conv2d(conv), Shape::Maps(out_channels, oh, ow)))
        }
        (LayerSpec::MaxPool2d { size, stride }, Shape::Maps(c, h, w)) => {
            let pool = MaxPool2d::new(size, stride);
            let (oh, ow) = pool.output_hw((h, w))?;
            Ok((Layer::MaxPool2d(pool), Shape::Maps(c, oh, ow)))
        }
        (LayerSpec::Flatten, Shape::Maps(c, h, w)) => {
            Ok((Layer::flatten(), Shape::Flat(c * h * w)))
        }
        (LayerSpec::Dense { out, act_fn }, Shape::Flat(n)) => Ok((
            Layer::dense((n, out), act_fn.map(Into::into)),
            Shape::Flat(out),
        )),
        (LayerSpec::Dropout { p }, shape) => Ok((Layer::dropout(p)?, shape)),
        (spec, shape) => Err(MlErr::InvalidLayer(format!(
            "{spec:?} can't take an input shaped {shape:?}"
        ))),
    }
}
