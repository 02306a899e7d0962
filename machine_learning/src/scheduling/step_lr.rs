use std::num::NonZeroUsize;

use super::{LrScheduler, scheduler::Progress};
use crate::optimization::Optimizer;

/// Decays the learning rate by `gamma` every `step_size` steps.
#[derive(Debug, Clone)]
pub struct StepLr {
    step_size: NonZeroUsize,
    gamma: f32,
    progress: Progress,
}

impl StepLr {
    pub fn new(step_size: NonZeroUsize, gamma: f32) -> Self {
        Self {
            step_size,
            gamma,
            progress: Progress::default(),
        }
    }
}

impl LrScheduler for StepLr {
    fn step(&mut self, optimizer: &mut dyn Optimizer) {
        let (step_size, gamma) = (self.step_size.get(), self.gamma);
        self.progress.advance(optimizer, |base, steps| {
            base * gamma.powi((steps / step_size) as i32)
        });
    }

    fn last_lr(&self) -> Option<f32> {
        self.progress.last_lr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::GradientDescent;

    #[test]
    fn decays_once_per_step_size() {
        let mut optimizer = GradientDescent::new(1.);
        let mut scheduler = StepLr::new(NonZeroUsize::new(2).unwrap(), 0.5);

        let lrs: Vec<_> = (0..5)
            .map(|_| {
                scheduler.step(&mut optimizer);
                optimizer.learning_rate()
            })
            .collect();

        assert_eq!(lrs, [1., 0.5, 0.5, 0.25, 0.25]);
        assert_eq!(scheduler.last_lr(), Some(0.25));
    }
}
