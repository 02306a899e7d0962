use ndarray::{Array1, Array4};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};

use super::InMemoryDataset;
use crate::{MlErr, Result};

/// Generates a dataset of noisy images where each class lights up its own horizontal band, so
/// a small convolutional model can learn it within a few epochs.
///
/// # Arguments
/// * `len` - The amount of samples, labels cycle through the classes.
/// * `num_classes` - The amount of classes, at most the image height.
/// * `image_dim` - The `(c, h, w)` shape of every image.
/// * `noise` - The standard deviation of the gaussian noise added to every pixel.
/// * `seed` - The seed of the noise.
pub fn synthetic_patterns(
    len: usize,
    num_classes: usize,
    image_dim: (usize, usize, usize),
    noise: f32,
    seed: u64,
) -> Result<InMemoryDataset> {
    let (c, h, w) = image_dim;
    if num_classes == 0 || num_classes > h {
        return Err(MlErr::InvalidHyperparameter {
            what: "synthetic class count",
            value: num_classes as f32,
        });
    }

    let normal = Normal::new(0., noise).map_err(|_| MlErr::InvalidHyperparameter {
        what: "synthetic noise",
        value: noise,
    })?;

    let mut rng = StdRng::seed_from_u64(seed);
    let band = h / num_classes;
    let labels = Array1::from_shape_fn(len, |i| i % num_classes);

    let images = Array4::from_shape_fn((len, c, h, w), |(i, _, y, _)| {
        let label = labels[i];
        let lit = (label * band..(label + 1) * band).contains(&y);
        let base = if lit { 1. } else { 0. };
        base + normal.sample(&mut rng)
    });

    InMemoryDataset::new(images, labels, num_classes)
}
