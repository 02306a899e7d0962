use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use machine_learning::{arch::LayerSpec, initialization::WeightInit};
use serde::Deserialize;

use crate::{
    Result, TrainErr,
    engine::{DEFAULT_LOG_INTERVAL, FitOptions, StepOptions},
};

/// A complete training run, as read from a JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainConfig {
    pub epochs: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    #[serde(default)]
    pub num_batches: Option<NonZeroUsize>,
    #[serde(default = "default_log_interval")]
    pub log_interval: NonZeroUsize,
    /// Seeds initialization, dropout and shuffling. Runs aren't reproducible without it.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "yes")]
    pub shuffle: bool,
    #[serde(default)]
    pub drop_last: bool,
    /// Run an evaluation pass over both loaders before training.
    #[serde(default)]
    pub sanity_check: bool,
    #[serde(default)]
    pub label_smoothing: f32,
    pub model: ModelConfig,
    pub dataset: DatasetConfig,
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
    #[serde(default)]
    pub early_stopping: Option<EarlyStoppingConfig>,
    #[serde(default)]
    pub history_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// One of the architectures in `machine_learning::arch::zoo`.
    Named(String),
    Custom(Vec<LayerSpec>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub architecture: Architecture,
    #[serde(default)]
    pub init: WeightInit,
    /// Parameters to warm start from.
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum DatasetConfig {
    Csv {
        train: PathBuf,
        /// Validation samples, split off the training file if absent.
        #[serde(default)]
        valid: Option<PathBuf>,
        image_dim: (usize, usize, usize),
        #[serde(default)]
        num_classes: Option<usize>,
        #[serde(default = "unit")]
        scale: f32,
        #[serde(default = "default_valid_split")]
        valid_split: f32,
    },
    Synthetic {
        len: usize,
        num_classes: usize,
        image_dim: (usize, usize, usize),
        #[serde(default)]
        noise: f32,
        #[serde(default = "default_valid_split")]
        valid_split: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum OptimizerConfig {
    GradientDescent {
        lr: f32,
    },
    GradientDescentWithMomentum {
        lr: f32,
        #[serde(default = "default_mu")]
        mu: f32,
    },
    Adam {
        lr: f32,
        #[serde(default = "default_b1")]
        b1: f32,
        #[serde(default = "default_b2")]
        b2: f32,
        #[serde(default = "default_eps")]
        eps: f32,
    },
}

impl OptimizerConfig {
    pub fn learning_rate(&self) -> f32 {
        match *self {
            Self::GradientDescent { lr }
            | Self::GradientDescentWithMomentum { lr, .. }
            | Self::Adam { lr, .. } => lr,
        }
    }
}

/// Learning rate schedules, stepped once per training batch.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum SchedulerConfig {
    Step {
        step_size: NonZeroUsize,
        gamma: f32,
    },
    Exponential {
        gamma: f32,
    },
    Cosine {
        t_max: NonZeroUsize,
        #[serde(default)]
        eta_min: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EarlyStoppingConfig {
    #[serde(default = "default_patience")]
    pub patience: usize,
    #[serde(default)]
    pub delta: f32,
    /// Where to save the best model.
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
}

fn default_log_interval() -> NonZeroUsize {
    DEFAULT_LOG_INTERVAL
}

fn yes() -> bool {
    true
}

fn unit() -> f32 {
    1.
}

fn default_valid_split() -> f32 {
    0.2
}

fn default_mu() -> f32 {
    0.9
}

fn default_b1() -> f32 {
    0.9
}

fn default_b2() -> f32 {
    0.999
}

fn default_eps() -> f32 {
    1e-8
}

fn default_patience() -> usize {
    7
}

impl TrainConfig {
    /// Loads and validates a `TrainConfig` from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, isn't valid JSON for a config, or holds
    /// values that make no sense for training.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses and validates a `TrainConfig` from a JSON string.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn step_options(&self) -> StepOptions {
        StepOptions {
            num_batches: self.num_batches,
            log_interval: self.log_interval,
        }
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            epochs: self.epochs,
            step: self.step_options(),
        }
    }

    fn validate(&self) -> Result<()> {
        let lr = self.optimizer.learning_rate();
        if !(lr.is_finite() && lr > 0.) {
            return invalid(format!("learning rate must be positive, got {lr}"));
        }

        if !(0.0..1.0).contains(&self.label_smoothing) {
            return invalid(format!(
                "label_smoothing must be in [0, 1), got {}",
                self.label_smoothing
            ));
        }

        if matches!(&self.model.architecture, Architecture::Custom(layers) if layers.is_empty()) {
            return invalid("a custom architecture needs at least one layer".into());
        }

        let (valid_split, (c, h, w)) = match &self.dataset {
            DatasetConfig::Csv {
                valid,
                valid_split,
                image_dim,
                ..
            } => (valid.is_none().then_some(*valid_split), *image_dim),
            DatasetConfig::Synthetic {
                len,
                num_classes,
                valid_split,
                image_dim,
                ..
            } => {
                if *len == 0 || *num_classes == 0 {
                    return invalid("the synthetic dataset needs samples and classes".into());
                }

                (Some(*valid_split), *image_dim)
            }
        };

        if c == 0 || h == 0 || w == 0 {
            return invalid(format!("image_dim must be positive, got ({c}, {h}, {w})"));
        }

        if let Some(split) = valid_split.filter(|&split| !(split > 0. && split < 1.)) {
            return invalid(format!("valid_split must be in (0, 1), got {split}"));
        }

        if let Some(SchedulerConfig::Step { gamma, .. } | SchedulerConfig::Exponential { gamma }) =
            self.scheduler
        {
            if !(gamma > 0. && gamma <= 1.) {
                return invalid(format!("scheduler gamma must be in (0, 1], got {gamma}"));
            }
        }

        if self.early_stopping.as_ref().is_some_and(|e| e.patience == 0) {
            return invalid("early stopping patience must be positive".into());
        }

        Ok(())
    }
}

fn invalid(msg: String) -> Result<()> {
    Err(TrainErr::InvalidConfig(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "epochs": 3,
        "batch_size": 16,
        "model": {"architecture": {"named": "simple_cnn"}},
        "dataset": {"kind": "synthetic", "len": 64, "num_classes": 4, "image_dim": [1, 8, 8]},
        "optimizer": {"kind": "adam", "lr": 0.001}
    }"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = TrainConfig::from_json(MINIMAL).unwrap();

        assert_eq!(config.epochs.get(), 3);
        assert_eq!(config.log_interval.get(), 100);
        assert_eq!(config.num_batches, None);
        assert!(config.shuffle);
        assert_eq!(config.model.init, WeightInit::Kaiming);
        assert_eq!(
            config.optimizer,
            OptimizerConfig::Adam {
                lr: 0.001,
                b1: 0.9,
                b2: 0.999,
                eps: 1e-8
            }
        );
        assert!(config.scheduler.is_none());
        assert!(config.early_stopping.is_none());
    }

    #[test]
    fn full_config_parses() {
        let json = r#"{
            "epochs": 10,
            "batch_size": 32,
            "num_batches": 5,
            "log_interval": 10,
            "seed": 42,
            "model": {
                "architecture": {"custom": [
                    {"kind": "conv2d", "out_channels": 4, "kernel": [3, 3], "padding": 1},
                    {"kind": "flatten"},
                    {"kind": "dense", "out": 2}
                ]},
                "init": {"kind": "xavier_uniform"}
            },
            "dataset": {
                "kind": "csv",
                "train": "train.csv",
                "image_dim": [1, 28, 28],
                "scale": 0.00392156862
            },
            "optimizer": {"kind": "gradient_descent_with_momentum", "lr": 0.1},
            "scheduler": {"kind": "cosine", "t_max": 100},
            "early_stopping": {"patience": 3, "checkpoint": "best.safetensors"},
            "history_path": "history.json"
        }"#;

        let config = TrainConfig::from_json(json).unwrap();
        let options = config.fit_options();

        assert_eq!(options.step.num_batches.map(NonZeroUsize::get), Some(5));
        assert_eq!(options.step.log_interval.get(), 10);
        assert!(matches!(
            config.model.architecture,
            Architecture::Custom(ref layers) if layers.len() == 3
        ));
        assert!(matches!(
            config.scheduler,
            Some(SchedulerConfig::Cosine { eta_min, .. }) if eta_min == 0.
        ));
        assert_eq!(
            config.early_stopping.map(|e| (e.patience, e.delta)),
            Some((3, 0.))
        );
    }

    #[test]
    fn zero_epochs_is_rejected() {
        let json = MINIMAL.replace("\"epochs\": 3", "\"epochs\": 0");
        assert!(matches!(
            TrainConfig::from_json(&json),
            Err(TrainErr::Json(_))
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let json = MINIMAL.replace("\"epochs\": 3", "\"epochs\": 3, \"epochz\": 3");
        assert!(TrainConfig::from_json(&json).is_err());
    }

    #[test]
    fn nonsense_values_are_invalid_configs() {
        let json = MINIMAL.replace("\"lr\": 0.001", "\"lr\": -1");
        assert!(matches!(
            TrainConfig::from_json(&json),
            Err(TrainErr::InvalidConfig(_))
        ));

        let json = MINIMAL.replace(
            "\"num_classes\": 4",
            "\"num_classes\": 4, \"valid_split\": 1.5",
        );
        assert!(matches!(
            TrainConfig::from_json(&json),
            Err(TrainErr::InvalidConfig(_))
        ));
    }
}
