use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use super::Metrics;
use crate::Result;

/// The metrics of a single completed epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train: Metrics,
    pub valid: Metrics,
    /// The optimizer's learning rate at the end of the epoch.
    pub lr: f32,
}

/// Everything `fit` observed, one record per completed epoch.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub records: Vec<EpochRecord>,
    pub stopped_early: bool,
}

impl History {
    pub fn push(&mut self, record: EpochRecord) {
        self.records.push(record);
    }

    pub fn epochs(&self) -> usize {
        self.records.len()
    }

    pub fn last(&self) -> Option<&EpochRecord> {
        self.records.last()
    }

    /// Returns the record with the lowest validation loss.
    pub fn best(&self) -> Option<&EpochRecord> {
        self.records
            .iter()
            .min_by(|a, b| a.valid.loss.total_cmp(&b.valid.loss))
    }

    /// Writes the history as pretty printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize, valid_loss: f32) -> EpochRecord {
        EpochRecord {
            epoch,
            train: Metrics::default(),
            valid: Metrics {
                loss: valid_loss,
                ..Default::default()
            },
            lr: 0.1,
        }
    }

    #[test]
    fn best_is_the_lowest_validation_loss() {
        let mut history = History::default();
        history.push(record(0, 0.9));
        history.push(record(1, 0.4));
        history.push(record(2, 0.6));

        assert_eq!(history.epochs(), 3);
        assert_eq!(history.best().map(|r| r.epoch), Some(1));
        assert_eq!(history.last().map(|r| r.epoch), Some(2));
    }

    #[test]
    fn saves_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut history = History::default();
        history.push(record(0, 0.5));
        history.stopped_early = true;
        history.save(&path).unwrap();

        let loaded: History =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, history);
    }
}
