use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// How the weights of a layer are sampled. Biases always start at zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightInit {
    Const {
        value: f32,
    },
    Uniform {
        low: f32,
        high: f32,
    },
    Normal {
        mean: f32,
        std_dev: f32,
    },
    /// Kaiming normal: `N(0, sqrt(2 / fan_in))`, suited to ReLU networks.
    #[default]
    Kaiming,
    /// Xavier uniform: `U(-r, r)` with `r = sqrt(6 / (fan_in + fan_out))`.
    XavierUniform,
}

impl WeightInit {
    /// Fills `out` with freshly sampled weights.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `fan_in` - The number of input units of the weight tensor.
    /// * `fan_out` - The number of output units of the weight tensor.
    /// * `out` - The weights to overwrite.
    ///
    /// # Returns
    /// An error if the distribution's parameters are invalid.
    pub fn fill<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        fan_in: usize,
        fan_out: usize,
        out: &mut [f32],
    ) -> Result<()> {
        match *self {
            WeightInit::Const { value } => out.fill(value),
            WeightInit::Uniform { low, high } => sample(rng, uniform(low, high)?, out),
            WeightInit::Normal { mean, std_dev } => sample(rng, normal(mean, std_dev)?, out),
            WeightInit::Kaiming => {
                let std_dev = (2. / fan_in.max(1) as f32).sqrt();
                sample(rng, normal(0., std_dev)?, out);
            }
            WeightInit::XavierUniform => {
                let range = (6. / (fan_in + fan_out).max(1) as f32).sqrt();
                sample(rng, uniform(-range, range)?, out);
            }
        }

        Ok(())
    }
}

fn sample<R, D>(rng: &mut R, distribution: D, out: &mut [f32])
where
    R: Rng + ?Sized,
    D: Distribution<f32>,
{
    for w in out {
        *w = distribution.sample(rng);
    }
}

fn uniform(low: f32, high: f32) -> Result<Uniform<f32>> {
    Uniform::new(low, high).map_err(|_| MlErr::InvalidHyperparameter {
        what: "uniform range",
        value: high - low,
    })
}

fn normal(mean: f32, std_dev: f32) -> Result<Normal<f32>> {
    Normal::new(mean, std_dev).map_err(|_| MlErr::InvalidHyperparameter {
        what: "normal standard deviation",
        value: std_dev,
    })
}
