use ndarray::{ArrayD, Ix2, Ix4};
use rand::rngs::StdRng;

use super::{Conv2d, Dense, Dropout, Flatten, MaxPool2d};
use crate::{
    Result,
    arch::{Mode, activations::ActFn},
};

/// A layer of a `Sequential` model.
#[derive(Debug, Clone)]
pub enum Layer {
    Conv2d(Conv2d),
    MaxPool2d(MaxPool2d),
    Flatten(Flatten),
    Dense(Dense),
    Dropout(Dropout),
}
use Layer::*;

impl Layer {
    pub fn conv2d(
        in_channels: usize,
        out_channels: usize,
        kernel: (usize, usize),
        stride: usize,
        padding: usize,
        act_fn: Option<ActFn>,
    ) -> Self {
        Conv2d(Conv2d::new(
            in_channels,
            out_channels,
            kernel,
            stride,
            padding,
            act_fn,
        ))
    }

    pub fn max_pool2d(size: usize, stride: usize) -> Self {
        MaxPool2d(MaxPool2d::new(size, stride))
    }

    pub fn flatten() -> Self {
        Flatten(Flatten::default())
    }

    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Dense(Dense::new(dim, act_fn))
    }

    pub fn dropout(p: f32) -> Result<Self> {
        Ok(Dropout(Dropout::new(p)?))
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        match self {
            Conv2d(l) => l.size(),
            Dense(l) => l.size(),
            MaxPool2d(_) | Flatten(_) | Dropout(_) => 0,
        }
    }

    /// Returns how many of this layer's parameters are weights, they always come before the
    /// biases.
    pub fn weights_len(&self) -> usize {
        match self {
            Conv2d(l) => l.size() - l.out_channels(),
            Dense(l) => l.size() - l.dim().1,
            MaxPool2d(_) | Flatten(_) | Dropout(_) => 0,
        }
    }

    /// Returns the fan in and fan out of this layer's weights, if it has any.
    pub fn fans(&self) -> Option<(usize, usize)> {
        match self {
            Conv2d(l) => {
                let (kh, kw) = l.kernel();
                Some((l.in_channels() * kh * kw, l.out_channels() * kh * kw))
            }
            Dense(l) => Some(l.dim()),
            MaxPool2d(_) | Flatten(_) | Dropout(_) => None,
        }
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayD<f32>,
        mode: Mode,
        rng: &mut StdRng,
    ) -> Result<ArrayD<f32>> {
        let y = match self {
            Conv2d(l) => l.forward(params, x.into_dimensionality::<Ix4>()?)?.into_dyn(),
            MaxPool2d(l) => l.forward(x.into_dimensionality::<Ix4>()?)?.into_dyn(),
            Flatten(l) => l.forward(x)?.into_dyn(),
            Dense(l) => l.forward(params, x.into_dimensionality::<Ix2>()?)?.into_dyn(),
            Dropout(l) => l.forward(x, mode, rng),
        };

        Ok(y)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayD<f32>,
    ) -> Result<ArrayD<f32>> {
        let dx = match self {
            Conv2d(l) => l
                .backward(params, grad, d.into_dimensionality::<Ix4>()?)?
                .into_dyn(),
            MaxPool2d(l) => l.backward(d.into_dimensionality::<Ix4>()?)?.into_dyn(),
            Flatten(l) => l.backward(d)?,
            Dense(l) => l
                .backward(params, grad, d.into_dimensionality::<Ix2>()?)?
                .into_dyn(),
            Dropout(l) => l.backward(d),
        };

        Ok(dx)
    }
}
