use std::fmt;

use serde::{Deserialize, Serialize};

/// The averages a train or validation step reports. Serializes as an ordered map with the
/// keys `loss`, `top1` and `top5`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub loss: f32,
    pub top1: f32,
    pub top5: f32,
}

impl Metrics {
    pub const KEYS: [&'static str; 3] = ["loss", "top1", "top5"];

    /// Returns the metrics as `(key, value)` pairs, in order.
    pub fn entries(&self) -> [(&'static str, f32); 3] {
        let [loss, top1, top5] = Self::KEYS;
        [(loss, self.loss), (top1, self.top1), (top5, self.top5)]
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.entries()
            .into_iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loss: {:.4}  top1: {:.2}%  top5: {:.2}%",
            self.loss, self.top1, self.top5
        )
    }
}
