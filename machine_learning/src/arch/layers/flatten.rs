use ndarray::{Array2, ArrayD, IxDyn};

use crate::{MlErr, Result};

/// Collapses every axis but the first, turning `(n, c, h, w)` feature maps into `(n, c * h * w)`
/// rows.
#[derive(Debug, Clone, Default)]
pub struct Flatten {
    input_shape: Option<Vec<usize>>,
}

impl Flatten {
    pub fn forward(&mut self, x: ArrayD<f32>) -> Result<Array2<f32>> {
        let shape = x.shape().to_vec();
        let n = shape.first().copied().unwrap_or(0);
        let rest: usize = shape.iter().skip(1).product();

        let y = x
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((n, rest))?;

        self.input_shape = Some(shape);
        Ok(y)
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let shape = self
            .input_shape
            .as_ref()
            .ok_or(MlErr::BackwardBeforeForward { layer: "flatten" })?;

        Ok(d.as_standard_layout()
            .into_owned()
            .into_shape_with_order(IxDyn(shape.as_slice()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn forward_keeps_the_batch_axis() {
        let mut flatten = Flatten::default();
        let x = Array4::<f32>::zeros((3, 2, 4, 5)).into_dyn();
        assert_eq!(flatten.forward(x).unwrap().dim(), (3, 40));
    }

    #[test]
    fn backward_restores_the_input_shape() {
        let mut flatten = Flatten::default();
        let x = Array4::from_shape_fn((2, 1, 2, 2), |(n, _, i, j)| (n * 4 + i * 2 + j) as f32);
        let y = flatten.forward(x.clone().into_dyn()).unwrap();
        assert_eq!(y.row(1).to_vec(), vec![4., 5., 6., 7.]);

        let dx = flatten.backward(y.into_dyn()).unwrap();
        assert_eq!(dx, x.into_dyn());
    }
}
