use ndarray::ArrayD;
use rand::{Rng, rngs::StdRng};

use crate::{MlErr, Result, arch::Mode};

/// Inverted dropout: while training, zeroes each activation with probability `p` and scales
/// the survivors by `1 / (1 - p)`. In evaluation mode it's the identity.
#[derive(Debug, Clone)]
pub struct Dropout {
    p: f32,

    // Forward metadata
    mask: Option<ArrayD<f32>>,
}

impl Dropout {
    /// Creates a new `Dropout` layer.
    ///
    /// # Arguments
    /// * `p` - The probability of dropping an activation, in `[0, 1)`.
    ///
    /// # Returns
    /// The layer or an error if `p` is out of range.
    pub fn new(p: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(MlErr::InvalidHyperparameter {
                what: "dropout probability",
                value: p,
            });
        }

        Ok(Self { p, mask: None })
    }

    pub fn p(&self) -> f32 {
        self.p
    }

    pub fn forward(&mut self, x: ArrayD<f32>, mode: Mode, rng: &mut StdRng) -> ArrayD<f32> {
        if mode == Mode::Eval || self.p == 0. {
            self.mask = None;
            return x;
        }

        let keep = 1. - self.p;
        let mask = ArrayD::from_shape_fn(x.raw_dim(), |_| {
            if rng.random::<f32>() < keep {
                1. / keep
            } else {
                0.
            }
        });

        let y = x * &mask;
        self.mask = Some(mask);
        y
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> ArrayD<f32> {
        match &self.mask {
            Some(mask) => d * mask,
            None => d,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::SeedableRng;

    #[test]
    fn probability_must_be_below_one() {
        assert!(Dropout::new(1.).is_err());
        assert!(Dropout::new(-0.1).is_err());
        assert!(Dropout::new(0.5).is_ok());
    }

    #[test]
    fn eval_mode_is_the_identity() {
        let mut dropout = Dropout::new(0.9).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let x = Array2::from_elem((4, 4), 3.).into_dyn();
        assert_eq!(dropout.forward(x.clone(), Mode::Eval, &mut rng), x);
    }

    #[test]
    fn train_mode_drops_and_rescales() {
        let mut dropout = Dropout::new(0.5).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let x = Array2::<f32>::ones((64, 64)).into_dyn();
        let y = dropout.forward(x, Mode::Train, &mut rng);

        assert!(y.iter().all(|&v| v == 0. || v == 2.));
        let kept = y.iter().filter(|&&v| v > 0.).count() as f32 / y.len() as f32;
        assert!((kept - 0.5).abs() < 0.1);

        let d = dropout.backward(Array2::<f32>::ones((64, 64)).into_dyn());
        assert_eq!(d, y);
    }
}
