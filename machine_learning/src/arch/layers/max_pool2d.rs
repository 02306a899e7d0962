use ndarray::prelude::*;

use crate::{MlErr, Result};

/// A 2D max pooling layer over square windows, without padding.
#[derive(Debug, Clone)]
pub struct MaxPool2d {
    size: usize,
    stride: usize,

    // Forward metadata
    input_dim: (usize, usize, usize, usize),
    argmax: Option<Array4<usize>>,
}

impl MaxPool2d {
    /// Creates a new `MaxPool2d` layer.
    ///
    /// # Arguments
    /// * `size` - The side of each pooling window.
    /// * `stride` - The step between consecutive windows, must be at least 1.
    pub fn new(size: usize, stride: usize) -> Self {
        Self {
            size,
            stride,
            input_dim: (0, 0, 0, 0),
            argmax: None,
        }
    }

    /// Computes the spatial size of the output for an input of the given height and width.
    pub fn output_hw(&self, (h, w): (usize, usize)) -> Result<(usize, usize)> {
        if self.stride == 0 {
            return Err(MlErr::InvalidLayer("max_pool2d stride must be at least 1".into()));
        }

        if self.size == 0 || h < self.size || w < self.size {
            return Err(MlErr::InvalidLayer(format!(
                "a {0}x{0} pooling window doesn't fit a {h}x{w} input",
                self.size
            )));
        }

        Ok((
            (h - self.size) / self.stride + 1,
            (w - self.size) / self.stride + 1,
        ))
    }

    pub fn forward(&mut self, x: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        let (oh, ow) = self.output_hw((h, w))?;

        let mut argmax = Array4::<usize>::zeros((n, c, oh, ow));
        let mut y = Array4::<f32>::zeros((n, c, oh, ow));

        for ((b, ch, oy, ox), out) in y.indexed_iter_mut() {
            let (y0, x0) = (oy * self.stride, ox * self.stride);
            let mut best = (f32::NEG_INFINITY, y0 * w + x0);

            for iy in y0..y0 + self.size {
                for ix in x0..x0 + self.size {
                    let v = x[[b, ch, iy, ix]];
                    if v > best.0 {
                        best = (v, iy * w + ix);
                    }
                }
            }

            *out = best.0;
            argmax[[b, ch, oy, ox]] = best.1;
        }

        self.input_dim = (n, c, h, w);
        self.argmax = Some(argmax);
        Ok(y)
    }

    /// Routes each output gradient back to the input position that won its window.
    pub fn backward(&mut self, d: Array4<f32>) -> Result<Array4<f32>> {
        let argmax = self
            .argmax
            .as_ref()
            .ok_or(MlErr::BackwardBeforeForward { layer: "max_pool2d" })?;

        if d.dim() != argmax.dim() {
            return Err(MlErr::SizeMismatch {
                what: "max_pool2d output gradient",
                got: d.len(),
                expected: argmax.len(),
            });
        }

        let (_, _, _, w) = self.input_dim;
        let mut dx = Array4::<f32>::zeros(self.input_dim);

        for ((b, ch, oy, ox), &g) in d.indexed_iter() {
            let i = argmax[[b, ch, oy, ox]];
            dx[[b, ch, i / w, i % w]] += g;
        }

        Ok(dx)
    }
}
