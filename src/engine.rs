//! The training loop: per batch train and validation steps, and a multi epoch driver with
//! early stopping.

use std::{num::NonZeroUsize, time::Instant};

use log::{debug, info};
use machine_learning::{
    arch::{Model, loss::LossFn},
    data::{Batch, BatchSource},
    optimization::Optimizer,
    scheduling::LrScheduler,
};
use ndarray::Array2;

use crate::{
    Result, TrainErr,
    utils::{AverageMeter, EarlyStopper, EpochRecord, History, Metrics, accuracy},
};

pub const DEFAULT_LOG_INTERVAL: NonZeroUsize = NonZeroUsize::new(100).unwrap();

/// Options shared by `train_step`, `val_step` and `sanity_fit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOptions {
    /// Stop after this many batches instead of exhausting the loader.
    pub num_batches: Option<NonZeroUsize>,
    /// Log the running metrics every this many batches.
    pub log_interval: NonZeroUsize,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            num_batches: None,
            log_interval: DEFAULT_LOG_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitOptions {
    pub epochs: NonZeroUsize,
    pub step: StepOptions,
}

/// The running meters of a single step.
#[derive(Debug, Default)]
struct StepMeters {
    batch_time: AverageMeter,
    losses: AverageMeter,
    top1: AverageMeter,
    top5: AverageMeter,
}

impl StepMeters {
    /// Scores a batch's output and records it, failing if the loss isn't finite.
    fn record<L: LossFn + ?Sized>(
        &mut self,
        criterion: &L,
        output: &Array2<f32>,
        batch: &Batch,
        batch_idx: usize,
    ) -> Result<()> {
        let loss = criterion.loss(output.view(), batch.y.view())?;
        if !loss.is_finite() {
            return Err(TrainErr::NonFiniteLoss {
                batch: batch_idx,
                loss,
            });
        }

        let accs = accuracy(output.view(), batch.y.view(), &[1, 5])?;
        let n = batch.len();

        self.losses.update(loss, n);
        self.top1.update(accs[0], n);
        self.top5.update(accs[1], n);
        Ok(())
    }

    fn log(&self, phase: &str) {
        let Self {
            batch_time,
            losses,
            top1,
            top5,
        } = self;

        info!(
            "Batch {phase} Time: {:.3} ({:.3})  Loss: {:>7.4} ({:>6.4})  Top 1 Accuracy: {:>7.4} ({:>7.4})  Top 5 Accuracy: {:>7.4} ({:>7.4})",
            batch_time.val,
            batch_time.avg,
            losses.val,
            losses.avg,
            top1.val,
            top1.avg,
            top5.val,
            top5.avg,
        );
    }

    fn metrics(&self) -> Metrics {
        Metrics {
            loss: self.losses.avg,
            top1: self.top1.avg,
            top5: self.top5.avg,
        }
    }
}

/// Whether the batch at `batch_idx` is the last one the step is allowed to process.
fn reached_limit(options: &StepOptions, batch_idx: usize) -> Option<usize> {
    options
        .num_batches
        .map(NonZeroUsize::get)
        .filter(|&n| batch_idx + 1 >= n)
}

fn should_log(options: &StepOptions, batch_idx: usize, last_idx: usize) -> bool {
    batch_idx == last_idx || batch_idx % options.log_interval.get() == 0
}

/// Performs one epoch of training: for every batch, computes the output and its loss, back
/// propagates it and steps the optimizer (and the scheduler, if any).
///
/// # Arguments
/// * `model` - The model to train, switched to training mode.
/// * `train_loader` - The training batches.
/// * `criterion` - The loss to minimize.
/// * `optimizer` - Updates the parameters after every batch.
/// * `scheduler` - Adjusts the learning rate after every batch.
/// * `options` - The batch limit and the log interval.
///
/// # Returns
/// The average loss, top 1 and top 5 accuracy over the processed batches.
pub fn train_step<M, D, L, O>(
    model: &mut M,
    train_loader: &mut D,
    criterion: &L,
    optimizer: &mut O,
    mut scheduler: Option<&mut (dyn LrScheduler + '_)>,
    options: &StepOptions,
) -> Result<Metrics>
where
    M: Model + ?Sized,
    D: BatchSource,
    L: LossFn + ?Sized,
    O: Optimizer,
{
    let start = Instant::now();
    model.train();

    let last_idx = train_loader.num_batches().saturating_sub(1);
    let mut meters = StepMeters::default();
    let mut batch_start = Instant::now();

    for (batch_idx, batch) in train_loader.batches().enumerate() {
        optimizer.zero_grad(model);
        let output = model.forward(batch.x.view())?;
        meters.record(criterion, &output, &batch, batch_idx)?;

        let d = criterion.loss_prime(output.view(), batch.y.view())?;
        model.backward(d)?;
        optimizer.step(model)?;

        if let Some(scheduler) = scheduler.as_deref_mut() {
            scheduler.step(optimizer);
        }

        meters
            .batch_time
            .update(batch_start.elapsed().as_secs_f32(), 1);
        batch_start = Instant::now();

        if should_log(options, batch_idx, last_idx) {
            meters.log("Train");
        }

        if let Some(n) = reached_limit(options, batch_idx) {
            info!("Done till {n} train batches");
            break;
        }
    }

    info!(
        "Time taken for train step = {:.3} sec",
        start.elapsed().as_secs_f32()
    );
    Ok(meters.metrics())
}

/// Performs one pass over the validation batches with the model in evaluation mode. The
/// parameters and their gradient are left untouched.
///
/// # Returns
/// The average loss, top 1 and top 5 accuracy over the processed batches.
pub fn val_step<M, D, L>(
    model: &mut M,
    val_loader: &mut D,
    criterion: &L,
    options: &StepOptions,
) -> Result<Metrics>
where
    M: Model + ?Sized,
    D: BatchSource,
    L: LossFn + ?Sized,
{
    eval_pass(model, val_loader, criterion, options, "validation")
}

/// Runs an evaluation pass over both loaders, checking that batches flow through the model,
/// the loss and the accuracy before committing to a full `fit`. Nothing is trained.
///
/// # Returns
/// The training and validation metrics of the untrained model.
pub fn sanity_fit<M, D, V, L>(
    model: &mut M,
    train_loader: &mut D,
    valid_loader: &mut V,
    criterion: &L,
    options: &StepOptions,
) -> Result<(Metrics, Metrics)>
where
    M: Model + ?Sized,
    D: BatchSource,
    V: BatchSource,
    L: LossFn + ?Sized,
{
    info!("Sanity checking the train loader");
    let train = eval_pass(model, train_loader, criterion, options, "sanity train")?;

    info!("Sanity checking the validation loader");
    let valid = eval_pass(model, valid_loader, criterion, options, "sanity validation")?;

    debug!("sanity fit: train {train} | valid {valid}");
    Ok((train, valid))
}

fn eval_pass<M, D, L>(
    model: &mut M,
    loader: &mut D,
    criterion: &L,
    options: &StepOptions,
    phase: &str,
) -> Result<Metrics>
where
    M: Model + ?Sized,
    D: BatchSource,
    L: LossFn + ?Sized,
{
    let start = Instant::now();
    model.eval();

    let last_idx = loader.num_batches().saturating_sub(1);
    let mut meters = StepMeters::default();
    let mut batch_start = Instant::now();

    let mut truncated = false;

    for (batch_idx, batch) in loader.batches().enumerate() {
        let output = model.forward(batch.x.view())?;
        meters.record(criterion, &output, &batch, batch_idx)?;

        meters
            .batch_time
            .update(batch_start.elapsed().as_secs_f32(), 1);
        batch_start = Instant::now();

        if should_log(options, batch_idx, last_idx) {
            meters.log("Inference");
        }

        if let Some(n) = reached_limit(options, batch_idx) {
            info!("Done till {n} {phase} batches");
            truncated = true;
            break;
        }
    }

    if !truncated {
        info!("Finished the {phase} epoch");
    }

    info!(
        "Time taken for {phase} step = {:.3} sec",
        start.elapsed().as_secs_f32()
    );
    Ok(meters.metrics())
}

/// Trains for `options.epochs` epochs, validating after each one.
///
/// # Arguments
/// * `model` - The model to train.
/// * `train_loader` - The training batches.
/// * `valid_loader` - The validation batches.
/// * `criterion` - The loss to minimize.
/// * `optimizer` - Updates the parameters after every batch.
/// * `scheduler` - Adjusts the learning rate after every batch.
/// * `early_stopper` - Sees every epoch's validation loss and may end training early.
/// * `options` - The amount of epochs and the step options.
///
/// # Returns
/// The metrics of every completed epoch.
#[allow(clippy::too_many_arguments)]
pub fn fit<M, D, V, L, O>(
    model: &mut M,
    train_loader: &mut D,
    valid_loader: &mut V,
    criterion: &L,
    optimizer: &mut O,
    mut scheduler: Option<&mut (dyn LrScheduler + '_)>,
    mut early_stopper: Option<&mut (dyn EarlyStopper<M> + '_)>,
    options: &FitOptions,
) -> Result<History>
where
    M: Model + ?Sized,
    D: BatchSource,
    V: BatchSource,
    L: LossFn + ?Sized,
    O: Optimizer,
{
    let mut history = History::default();

    for epoch in 0..options.epochs.get() {
        info!("Training Epoch = {epoch}");
        let train = train_step(
            model,
            train_loader,
            criterion,
            optimizer,
            scheduler.as_deref_mut(),
            &options.step,
        )?;

        info!("Validating Epoch = {epoch}");
        let valid = val_step(model, valid_loader, criterion, &options.step)?;

        debug!("Epoch {epoch}: train {train} | valid {valid}");
        history.push(EpochRecord {
            epoch,
            train,
            valid,
            lr: optimizer.learning_rate(),
        });

        if let Some(stopper) = early_stopper.as_deref_mut() {
            stopper.observe(valid.loss, model)?;

            if stopper.should_stop() {
                info!("Early Stopping. Ran out of Patience for validation loss");
                history.stopped_early = true;
                break;
            }
        }
    }

    Ok(history)
}
