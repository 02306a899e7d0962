use super::{LrScheduler, scheduler::Progress};
use crate::optimization::Optimizer;

/// Decays the learning rate by `gamma` every step.
#[derive(Debug, Clone)]
pub struct ExponentialLr {
    gamma: f32,
    progress: Progress,
}

impl ExponentialLr {
    pub fn new(gamma: f32) -> Self {
        Self {
            gamma,
            progress: Progress::default(),
        }
    }
}

impl LrScheduler for ExponentialLr {
    fn step(&mut self, optimizer: &mut dyn Optimizer) {
        let gamma = self.gamma;
        self.progress
            .advance(optimizer, |base, steps| base * gamma.powi(steps as i32));
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
    fn multiplies_by_gamma_each_step() {
        let mut optimizer = GradientDescent::new(1.);
        let mut scheduler = ExponentialLr::new(0.5);

        scheduler.step(&mut optimizer);
        scheduler.step(&mut optimizer);
        assert_eq!(optimizer.learning_rate(), 0.25);
    }
}
