use std::num::NonZeroUsize;

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::{Batch, BatchSource, InMemoryDataset};

/// Produces the batches of an `InMemoryDataset`, optionally reshuffling its samples on every
/// pass.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: InMemoryDataset,
    batch_size: NonZeroUsize,
    shuffle: bool,
    drop_last: bool,
    order: Vec<usize>,
    rng: StdRng,
}

impl DataLoader {
    /// Creates a new `DataLoader` that yields the samples in order.
    ///
    /// # Arguments
    /// * `dataset` - The samples to iterate.
    /// * `batch_size` - The maximum amount of samples per batch.
    pub fn new(dataset: InMemoryDataset, batch_size: NonZeroUsize) -> Self {
        let order = (0..dataset.len()).collect();

        Self {
            dataset,
            batch_size,
            shuffle: false,
            drop_last: false,
            order,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Reshuffles the samples at the start of every pass, with a generator seeded by `seed`
    /// or by the operating system if `None`.
    pub fn shuffled(mut self, seed: Option<u64>) -> Self {
        self.shuffle = true;
        self.rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        self
    }

    /// Skips the last batch of a pass if it's smaller than `batch_size`.
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    pub fn dataset(&self) -> &InMemoryDataset {
        &self.dataset
    }

    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }
}

impl BatchSource for DataLoader {
    fn num_batches(&self) -> usize {
        let (n, size) = (self.dataset.len(), self.batch_size.get());

        if self.drop_last {
            n / size
        } else {
            n.div_ceil(size)
        }
    }

    fn batches(&mut self) -> impl Iterator<Item = Batch> + '_ {
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }

        let num_batches = self.num_batches();
        let dataset = &self.dataset;

        self.order
            .chunks(self.batch_size.get())
            .take(num_batches)
            .map(move |indices| dataset.select(indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array4};

    fn loader(n: usize, batch_size: usize) -> DataLoader {
        let images = Array4::from_shape_fn((n, 1, 1, 1), |(i, ..)| i as f32);
        let labels = Array1::zeros(n);
        let dataset = InMemoryDataset::new(images, labels, 1).unwrap();
        DataLoader::new(dataset, NonZeroUsize::new(batch_size).unwrap())
    }

    fn firsts(loader: &mut DataLoader) -> Vec<Vec<f32>> {
        loader
            .batches()
            .map(|b| b.x.iter().copied().collect())
            .collect()
    }

    #[test]
    fn yields_every_sample_in_order() {
        let mut dl = loader(5, 2);
        assert_eq!(dl.num_batches(), 3);
        assert_eq!(firsts(&mut dl), [vec![0., 1.], vec![2., 3.], vec![4.]]);
    }

    #[test]
    fn drop_last_skips_the_partial_batch() {
        let mut dl = loader(5, 2).drop_last(true);
        assert_eq!(dl.num_batches(), 2);
        assert_eq!(dl.batches().count(), 2);
    }

    #[test]
    fn shuffling_is_seeded_and_changes_between_passes() {
        let mut a = loader(32, 32).shuffled(Some(9));
        let mut b = loader(32, 32).shuffled(Some(9));

        let first = firsts(&mut a);
        assert_eq!(first, firsts(&mut b));
        assert_ne!(first, firsts(&mut a));

        let mut seen = first[0].clone();
        seen.sort_by(f32::total_cmp);
        assert_eq!(seen, (0..32).map(|i| i as f32).collect::<Vec<_>>());
    }
}
