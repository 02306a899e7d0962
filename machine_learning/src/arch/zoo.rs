//! Ready made architectures, selected by name.

use rand::rngs::StdRng;

use super::{ActFnSpec, LayerSpec, ModelBuilder, Sequential};
use crate::{MlErr, Result, initialization::WeightInit};

/// The names `create_model` accepts.
pub const MODEL_NAMES: [&str; 2] = ["simple_cnn", "lenet5"];

/// Creates one of the known architectures.
///
/// # Arguments
/// * `name` - One of `MODEL_NAMES`.
/// * `num_classes` - The amount of logits the model outputs.
/// * `in_channels` - The amount of channels of the input images.
/// * `image_size` - The height and width of the (square) input images.
/// * `init` - How to initialize the weights.
/// * `rng` - The random number generator for initialization and dropout.
///
/// # Returns
/// The model, or an error if the name is unknown or the images are too small for it.
pub fn create_model(
    name: &str,
    num_classes: usize,
    in_channels: usize,
    image_size: usize,
    init: WeightInit,
    rng: StdRng,
) -> Result<Sequential> {
    let layers = match name {
        "simple_cnn" => simple_cnn(num_classes),
        "lenet5" => lenet5(num_classes),
        _ => return Err(MlErr::UnknownModel(name.to_string())),
    };

    ModelBuilder::new((in_channels, image_size, image_size))
        .layers(layers)
        .init(init)
        .build(rng)
}

fn conv(out_channels: usize, kernel: usize, padding: usize) -> LayerSpec {
    LayerSpec::Conv2d {
        out_channels,
        kernel: (kernel, kernel),
        stride: 1,
        padding,
        act_fn: Some(ActFnSpec::Relu),
    }
}

fn pool() -> LayerSpec {
    LayerSpec::MaxPool2d { size: 2, stride: 2 }
}

fn dense(out: usize, relu: bool) -> LayerSpec {
    LayerSpec::Dense {
        out,
        act_fn: relu.then_some(ActFnSpec::Relu),
    }
}

/// Two 3x3 convolution blocks followed by a small classifier head.
fn simple_cnn(num_classes: usize) -> Vec<LayerSpec> {
    vec![
        conv(16, 3, 1),
        pool(),
        conv(32, 3, 1),
        pool(),
        LayerSpec::Flatten,
        LayerSpec::Dropout { p: 0.25 },
        dense(64, true),
        dense(num_classes, false),
    ]
}

/// LeNet-5 with ReLU activations and max pooling.
fn lenet5(num_classes: usize) -> Vec<LayerSpec> {
    vec![
        conv(6, 5, 2),
        pool(),
        conv(16, 5, 0),
        pool(),
        LayerSpec::Flatten,
        dense(120, true),
        dense(84, true),
        dense(num_classes, false),
    ]
}
