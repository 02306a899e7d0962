use cnn_trainer::{
    TrainErr,
    config::TrainConfig,
    session::Session,
    utils::{History, checkpoint},
};
use machine_learning::arch::Model;
use tempfile::tempdir;

fn config(body: &str) -> TrainConfig {
    let json = format!(
        r#"{{
            "epochs": 4,
            "batch_size": 8,
            "log_interval": 2,
            "seed": 7,
            "model": {{"architecture": {{"named": "simple_cnn"}}}},
            "dataset": {{
                "kind": "synthetic",
                "len": 48,
                "num_classes": 3,
                "image_dim": [1, 8, 8],
                "noise": 0.1
            }},
            "optimizer": {{"kind": "adam", "lr": 0.005}}
            {body}
        }}"#
    );

    TrainConfig::from_json(&json).unwrap()
}

#[test]
fn run_writes_the_history_and_the_best_model() {
    let dir = tempdir().unwrap();
    let history_path = dir.path().join("history.json");
    let checkpoint_path = dir.path().join("best.safetensors");

    let body = format!(
        r#", "sanity_check": true,
            "scheduler": {{"kind": "step", "step_size": 4, "gamma": 0.5}},
            "early_stopping": {{"patience": 2, "checkpoint": {:?}}},
            "history_path": {:?}"#,
        checkpoint_path, history_path
    );

    let mut session = Session::from_config(config(&body)).unwrap();
    let history = session.run().unwrap();

    assert!((1..=4).contains(&history.epochs()));

    let saved: History =
        serde_json::from_str(&std::fs::read_to_string(&history_path).unwrap()).unwrap();
    assert_eq!(saved, history);

    // The first epoch always improves on an infinite loss.
    let params = checkpoint::load_params(&checkpoint_path).unwrap();
    assert_eq!(params.len(), session.model().size());
}

#[test]
fn runs_with_the_same_seed_are_identical() {
    let first = Session::from_config(config("")).unwrap().run().unwrap();
    let second = Session::from_config(config("")).unwrap().run().unwrap();

    assert_eq!(first, second);
    assert_eq!(first.epochs(), 4);
    assert!(!first.stopped_early);
}

#[test]
fn num_batches_is_honored_by_the_session() {
    let session = Session::from_config(config(r#", "num_batches": 1"#)).unwrap();
    assert_eq!(session.step_options().num_batches.map(|n| n.get()), Some(1));
}

#[test]
fn unknown_models_fail_to_build() {
    let json = r#"{
        "epochs": 1,
        "batch_size": 8,
        "model": {"architecture": {"named": "resnet1000"}},
        "dataset": {"kind": "synthetic", "len": 16, "num_classes": 2, "image_dim": [1, 8, 8]},
        "optimizer": {"kind": "gradient_descent", "lr": 0.1}
    }"#;

    let result = Session::from_config(TrainConfig::from_json(json).unwrap());
    assert!(matches!(result, Err(TrainErr::Ml(_))));
}

#[test]
fn mismatched_warm_start_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tiny.safetensors");
    checkpoint::save_params(&[0.; 3], &path).unwrap();

    let json = format!(
        r#"{{
            "epochs": 1,
            "batch_size": 8,
            "model": {{"architecture": {{"named": "lenet5"}}, "checkpoint": {path:?}}},
            "dataset": {{"kind": "synthetic", "len": 16, "num_classes": 2, "image_dim": [1, 28, 28]}},
            "optimizer": {{"kind": "gradient_descent", "lr": 0.1}}
        }}"#
    );

    let result = Session::from_config(TrainConfig::from_json(&json).unwrap());
    assert!(matches!(result, Err(TrainErr::Ml(_))));
}

#[test]
fn named_models_use_the_configured_init() {
    let json = r#"{
        "epochs": 1,
        "batch_size": 8,
        "seed": 3,
        "model": {
            "architecture": {"named": "simple_cnn"},
            "init": {"kind": "const", "value": 0.5}
        },
        "dataset": {"kind": "synthetic", "len": 16, "num_classes": 3, "image_dim": [1, 8, 8]},
        "optimizer": {"kind": "gradient_descent", "lr": 0.1}
    }"#;

    let session = Session::from_config(TrainConfig::from_json(json).unwrap()).unwrap();
    let params = session.model().params();

    // Biases start at zero, every weight takes the constant.
    let biases = params.iter().filter(|&&p| p == 0.).count();
    let weights = params.iter().filter(|&&p| p == 0.5).count();
    assert_eq!(biases, 16 + 32 + 64 + 3);
    assert_eq!(weights + biases, params.len());
}
