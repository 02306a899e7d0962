use std::{env, process};

use anyhow::Context;
use log::info;

use cnn_trainer::{config::TrainConfig, session::Session};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("Usage: cnn_trainer <config.json>");
        process::exit(1);
    };

    let config = TrainConfig::from_file(&path)
        .with_context(|| format!("failed to load the config at {path}"))?;

    let mut session = Session::from_config(config).context("failed to set up training")?;
    let history = session.run().context("training failed")?;

    match history.best() {
        Some(best) => info!(
            "trained {} epochs{}, best validation epoch {}: {}",
            history.epochs(),
            if history.stopped_early {
                " (stopped early)"
            } else {
                ""
            },
            best.epoch,
            best.valid
        ),
        None => info!("no epoch completed"),
    }

    Ok(())
}
