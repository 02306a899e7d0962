use std::{f32::consts::PI, num::NonZeroUsize};

use super::{LrScheduler, scheduler::Progress};
use crate::optimization::Optimizer;

/// Anneals the learning rate from its base value down to `eta_min` along half a cosine over
/// `t_max` steps, then holds it at `eta_min`.
#[derive(Debug, Clone)]
pub struct CosineAnnealingLr {
    t_max: NonZeroUsize,
    eta_min: f32,
    progress: Progress,
}

impl CosineAnnealingLr {
    pub fn new(t_max: NonZeroUsize, eta_min: f32) -> Self {
        Self {
            t_max,
            eta_min,
            progress: Progress::default(),
        }
    }
}

impl LrScheduler for CosineAnnealingLr {
    fn step(&mut self, optimizer: &mut dyn Optimizer) {
        let (t_max, eta_min) = (self.t_max.get(), self.eta_min);
        self.progress.advance(optimizer, |base, steps| {
            let t = steps.min(t_max) as f32 / t_max as f32;
            eta_min + (base - eta_min) * (1. + (PI * t).cos()) / 2.
        });
    }

    fn last_lr(&self) -> Option<f32> {
        self.progress.last_lr()
    }
}
