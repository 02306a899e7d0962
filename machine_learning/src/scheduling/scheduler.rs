use crate::optimization::Optimizer;

/// Adjusts an optimizer's learning rate as training progresses.
///
/// The first call to `step` captures the optimizer's learning rate as the base rate, every call
/// then advances the schedule by one and writes the new rate into the optimizer.
pub trait LrScheduler {
    fn step(&mut self, optimizer: &mut dyn Optimizer);

    /// Returns the rate set by the latest `step`, if any.
    fn last_lr(&self) -> Option<f32>;
}

impl<T: LrScheduler + ?Sized> LrScheduler for Box<T> {
    fn step(&mut self, optimizer: &mut dyn Optimizer) {
        (**self).step(optimizer);
    }

    fn last_lr(&self) -> Option<f32> {
        (**self).last_lr()
    }
}

/// The bookkeeping shared by every schedule: the base rate, the amount of steps taken and the
/// latest rate.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct Progress {
    base_lr: Option<f32>,
    steps: usize,
    last_lr: Option<f32>,
}

impl Progress {
    /// Advances one step and applies the rate `schedule` computes from the base rate and the
    /// new step count.
    pub(super) fn advance<F>(&mut self, optimizer: &mut dyn Optimizer, schedule: F)
    where
        F: FnOnce(f32, usize) -> f32,
    {
        let base_lr = *self.base_lr.get_or_insert_with(|| optimizer.learning_rate());
        self.steps += 1;

        let lr = schedule(base_lr, self.steps);
        optimizer.set_learning_rate(lr);
        self.last_lr = Some(lr);
    }

    pub(super) fn last_lr(&self) -> Option<f32> {
        self.last_lr
    }
}
