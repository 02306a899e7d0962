/// Computes and stores the latest value and the running average of a metric.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AverageMeter {
    pub val: f32,
    pub sum: f32,
    pub count: usize,
    pub avg: f32,
}

impl AverageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Records `val` as the mean over `n` samples.
    pub fn update(&mut self, val: f32, n: usize) {
        self.val = val;
        self.sum += val * n as f32;
        self.count += n;

        if self.count > 0 {
            self.avg = self.sum / self.count as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_weighted_by_sample_count() {
        let mut meter = AverageMeter::new();
        meter.update(1., 1);
        meter.update(4., 3);

        assert_eq!(meter.val, 4.);
        assert_eq!(meter.sum, 13.);
        assert_eq!(meter.count, 4);
        assert_eq!(meter.avg, 3.25);
    }

    #[test]
    fn empty_meter_averages_to_zero() {
        let mut meter = AverageMeter::new();
        assert_eq!(meter.avg, 0.);

        meter.update(2., 0);
        assert_eq!(meter.avg, 0.);
    }

    #[test]
    fn reset_clears_everything() {
        let mut meter = AverageMeter::new();
        meter.update(3., 2);
        meter.reset();
        assert_eq!(meter, AverageMeter::default());
    }
}
