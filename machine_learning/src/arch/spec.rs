use serde::{Deserialize, Serialize};

use super::activations::ActFn;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActFnSpec {
    Relu,
    Sigmoid { amp: f32 },
}

impl From<ActFnSpec> for ActFn {
    fn from(value: ActFnSpec) -> Self {
        match value {
            ActFnSpec::Relu => ActFn::relu(),
            ActFnSpec::Sigmoid { amp } => ActFn::sigmoid(amp),
        }
    }
}

/// A layer described only by its own hyperparameters, its input size is inferred by the
/// `ModelBuilder` from the layers before it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerSpec {
    Conv2d {
        out_channels: usize,
        kernel: (usize, usize),
        #[serde(default = "one")]
        stride: usize,
        #[serde(default)]
        padding: usize,
        #[serde(default)]
        act_fn: Option<ActFnSpec>,
    },
    MaxPool2d {
        size: usize,
        stride: usize,
    },
    Flatten,
    Dense {
        out: usize,
        #[serde(default)]
        act_fn: Option<ActFnSpec>,
    },
    Dropout {
        p: f32,
    },
}

fn one() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layers_deserialize_with_defaults() {
        let json = r#"[
            {"kind": "conv2d", "out_channels": 8, "kernel": [3, 3], "act_fn": {"kind": "relu"}},
            {"kind": "max_pool2d", "size": 2, "stride": 2},
            {"kind": "flatten"},
            {"kind": "dense", "out": 10}
        ]"#;

        let layers: Vec<LayerSpec> = serde_json::from_str(json).unwrap();
        assert_eq!(
            layers[0],
            LayerSpec::Conv2d {
                out_channels: 8,
                kernel: (3, 3),
                stride: 1,
                padding: 0,
                act_fn: Some(ActFnSpec::Relu),
            }
        );
        assert_eq!(layers[2], LayerSpec::Flatten);
        assert_eq!(
            layers[3],
            LayerSpec::Dense {
                out: 10,
                act_fn: None
            }
        );
    }
}
