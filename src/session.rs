use std::path::PathBuf;

use log::{debug, info};
use machine_learning::{
    arch::{Model, ModelBuilder, Sequential, loss::CrossEntropy, zoo},
    data::{self, DataLoader, InMemoryDataset},
    optimization::{Adam, GradientDescent, GradientDescentWithMomentum, Optimizer},
    scheduling::{CosineAnnealingLr, ExponentialLr, LrScheduler, StepLr},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    Result, TrainErr,
    config::{
        Architecture, DatasetConfig, ModelConfig, OptimizerConfig, SchedulerConfig, TrainConfig,
    },
    engine::{self, FitOptions, StepOptions},
    utils::{EarlyStopper, EarlyStopping, History, Metrics, checkpoint},
};

/// Everything a training run needs, built from a `TrainConfig`.
pub struct Session {
    model: Sequential,
    train_loader: DataLoader,
    valid_loader: DataLoader,
    criterion: CrossEntropy,
    optimizer: Box<dyn Optimizer>,
    scheduler: Option<Box<dyn LrScheduler>>,
    early_stopper: Option<EarlyStopping>,
    options: FitOptions,
    sanity_check: bool,
    history_path: Option<PathBuf>,
}

impl Session {
    /// Builds the datasets, the model and the optimization machinery the config describes.
    ///
    /// # Errors
    /// Returns an error if a dataset can't be loaded, the architecture doesn't fit the images or
    /// a warm start checkpoint doesn't fit the model.
    pub fn from_config(config: TrainConfig) -> Result<Self> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let (train_set, valid_set) = load_datasets(&config.dataset, rng.random())?;
        info!(
            "loaded {} training and {} validation samples",
            train_set.len(),
            valid_set.len()
        );

        let model = build_model(&config.model, &train_set, StdRng::from_rng(&mut rng))?;
        info!("model created with {} parameters", model.size());

        let optimizer = build_optimizer(config.optimizer, model.size());
        let scheduler = config.scheduler.map(build_scheduler);
        let early_stopper = config
            .early_stopping
            .as_ref()
            .map(|e| EarlyStopping::new(e.patience, e.delta, e.checkpoint.clone()));

        let mut train_loader =
            DataLoader::new(train_set, config.batch_size).drop_last(config.drop_last);
        if config.shuffle {
            train_loader = train_loader.shuffled(Some(rng.random()));
        }

        let valid_loader = DataLoader::new(valid_set, config.batch_size);
        let criterion = CrossEntropy::with_label_smoothing(config.label_smoothing)?;

        Ok(Self {
            model,
            train_loader,
            valid_loader,
            criterion,
            optimizer,
            scheduler,
            early_stopper,
            options: config.fit_options(),
            sanity_check: config.sanity_check,
            history_path: config.history_path,
        })
    }

    pub fn model(&self) -> &Sequential {
        &self.model
    }

    pub fn step_options(&self) -> &StepOptions {
        &self.options.step
    }

    /// Evaluates the untrained model over both loaders.
    pub fn sanity_fit(&mut self) -> Result<(Metrics, Metrics)> {
        engine::sanity_fit(
            &mut self.model,
            &mut self.train_loader,
            &mut self.valid_loader,
            &self.criterion,
            &self.options.step,
        )
    }

    /// Trains the model, writing the history to disk if the config asked for it.
    pub fn run(&mut self) -> Result<History> {
        if self.sanity_check {
            let (train, valid) = self.sanity_fit()?;
            info!("sanity check passed: train {train} | valid {valid}");
        }

        let early_stopper = self
            .early_stopper
            .as_mut()
            .map(|e| e as &mut dyn EarlyStopper<Sequential>);

        let history = engine::fit(
            &mut self.model,
            &mut self.train_loader,
            &mut self.valid_loader,
            &self.criterion,
            &mut self.optimizer,
            self.scheduler.as_deref_mut(),
            early_stopper,
            &self.options,
        )?;

        if let Some(path) = &self.history_path {
            history.save(path)?;
            info!("history saved to {}", path.display());
        }

        Ok(history)
    }
}

fn load_datasets(
    config: &DatasetConfig,
    seed: u64,
) -> Result<(InMemoryDataset, InMemoryDataset)> {
    let datasets = match config {
        DatasetConfig::Csv {
            train,
            valid,
            image_dim,
            num_classes,
            scale,
            valid_split,
        } => {
            let train_set = data::load_csv(train, *image_dim, *num_classes, *scale)?;

            match valid {
                Some(valid) => {
                    let num_classes = Some(train_set.num_classes());
                    let valid_set = data::load_csv(valid, *image_dim, num_classes, *scale)?;
                    (train_set, valid_set)
                }
                None => train_set.split(*valid_split)?,
            }
        }
        DatasetConfig::Synthetic {
            len,
            num_classes,
            image_dim,
            noise,
            valid_split,
        } => data::synthetic_patterns(*len, *num_classes, *image_dim, *noise, seed)?
            .split(*valid_split)?,
    };

    Ok(datasets)
}

fn build_model(
    config: &ModelConfig,
    dataset: &InMemoryDataset,
    rng: StdRng,
) -> Result<Sequential> {
    let (c, h, w) = dataset.image_dim();

    let mut model = match &config.architecture {
        Architecture::Named(name) => {
            if h != w {
                return Err(TrainErr::InvalidConfig(format!(
                    "{name} expects square images, got {h}x{w}"
                )));
            }

            zoo::create_model(name, dataset.num_classes(), c, h, config.init, rng)?
        }
        Architecture::Custom(layers) => ModelBuilder::new((c, h, w))
            .layers(layers.iter().copied())
            .init(config.init)
            .build(rng)?,
    };

    if let Some(path) = &config.checkpoint {
        let params = checkpoint::load_params(path)?;
        model.load_params(&params)?;
        info!("warm started from {}", path.display());
    }

    Ok(model)
}

fn build_optimizer(config: OptimizerConfig, len: usize) -> Box<dyn Optimizer> {
    debug!("optimizer: {config:?}");

    match config {
        OptimizerConfig::GradientDescent { lr } => Box::new(GradientDescent::new(lr)),
        OptimizerConfig::GradientDescentWithMomentum { lr, mu } => {
            Box::new(GradientDescentWithMomentum::new(len, lr, mu))
        }
        OptimizerConfig::Adam { lr, b1, b2, eps } => Box::new(Adam::new(len, lr, b1, b2, eps)),
    }
}

fn build_scheduler(config: SchedulerConfig) -> Box<dyn LrScheduler> {
    match config {
        SchedulerConfig::Step { step_size, gamma } => Box::new(StepLr::new(step_size, gamma)),
        SchedulerConfig::Exponential { gamma } => Box::new(ExponentialLr::new(gamma)),
        SchedulerConfig::Cosine { t_max, eta_min } => {
            Box::new(CosineAnnealingLr::new(t_max, eta_min))
        }
    }
}
