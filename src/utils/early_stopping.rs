use std::path::PathBuf;

use log::{info, warn};
use machine_learning::arch::Model;

use super::checkpoint;
use crate::Result;

/// Decides, after every epoch, whether training should go on.
pub trait EarlyStopper<M: ?Sized> {
    /// Reports the validation loss of the epoch that just finished.
    fn observe(&mut self, val_loss: f32, model: &M) -> Result<()>;

    /// Whether training should stop.
    fn should_stop(&self) -> bool;
}

/// Stops training when the validation loss hasn't improved for `patience` epochs in a row,
/// saving the model each time it improves.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    delta: f32,
    checkpoint: Option<PathBuf>,

    counter: usize,
    best_score: Option<f32>,
    val_loss_min: f32,
    early_stop: bool,
}

impl EarlyStopping {
    /// Creates a new `EarlyStopping`.
    ///
    /// # Arguments
    /// * `patience` - How many epochs without improvement to tolerate.
    /// * `delta` - The minimum decrease of the loss that counts as an improvement.
    /// * `checkpoint` - Where to save the model on improvement, if anywhere.
    pub fn new(patience: usize, delta: f32, checkpoint: Option<PathBuf>) -> Self {
        Self {
            patience,
            delta,
            checkpoint,
            counter: 0,
            best_score: None,
            val_loss_min: f32::INFINITY,
            early_stop: false,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.early_stop
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    /// Returns the lowest validation loss seen so far.
    pub fn best_loss(&self) -> Option<f32> {
        self.best_score.map(|score| -score)
    }

    fn save_checkpoint<M: Model + ?Sized>(&mut self, val_loss: f32, model: &M) -> Result<()> {
        info!(
            "Validation loss decreased ({:.6} --> {val_loss:.6}). Saving model",
            self.val_loss_min
        );

        if let Some(path) = &self.checkpoint {
            checkpoint::save_params(model.params(), path)?;
        }

        self.val_loss_min = val_loss;
        Ok(())
    }
}

impl<M: Model + ?Sized> EarlyStopper<M> for EarlyStopping {
    fn observe(&mut self, val_loss: f32, model: &M) -> Result<()> {
        let score = -val_loss;

        match self.best_score {
            Some(best) if score < best + self.delta => {
                self.counter += 1;
                warn!(
                    "EarlyStopping counter: {} out of {}",
                    self.counter, self.patience
                );

                if self.counter >= self.patience {
                    self.early_stop = true;
                }
            }
            _ => {
                self.best_score = Some(score);
                self.save_checkpoint(val_loss, model)?;
                self.counter = 0;
            }
        }

        Ok(())
    }

    fn should_stop(&self) -> bool {
        self.early_stop
    }
}
