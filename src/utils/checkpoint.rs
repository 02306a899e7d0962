//! Model parameters on disk, stored as a safetensors file with a single flat `params` tensor.

use std::{fs, path::Path};

use log::debug;
use safetensors::{Dtype, SafeTensors, tensor::TensorView};

use crate::{Result, TrainErr};

const PARAMS: &str = "params";

/// Writes the flat parameters of a model to `path`.
pub fn save_params<P: AsRef<Path>>(params: &[f32], path: P) -> Result<()> {
    let path = path.as_ref();
    let bytes: &[u8] = bytemuck::cast_slice(params);
    let view = TensorView::new(Dtype::F32, vec![params.len()], bytes)?;

    safetensors::serialize_to_file([(PARAMS, view)], &None, path)?;
    debug!("saved {} parameters to {}", params.len(), path.display());
    Ok(())
}

/// Reads back the flat parameters written by `save_params`.
pub fn load_params<P: AsRef<Path>>(path: P) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let buf = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&buf)?;
    let tensor = tensors.tensor(PARAMS)?;

    if tensor.dtype() != Dtype::F32 {
        return Err(TrainErr::Checkpoint(format!(
            "expected f32 parameters in {}, found {:?}",
            path.display(),
            tensor.dtype()
        )));
    }

    let params: Vec<f32> = tensor
        .data()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    debug!("loaded {} parameters from {}", params.len(), path.display());
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let params = [0.5, -1.25, 3., f32::MIN_POSITIVE];

        save_params(&params, &path).unwrap();
        assert_eq!(load_params(&path).unwrap(), params);
    }

    #[test]
    fn missing_files_are_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_params(dir.path().join("nope.safetensors")),
            Err(TrainErr::Io(_))
        ));
    }

    #[test]
    fn garbage_is_a_checkpoint_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.safetensors");
        fs::write(&path, b"definitely not safetensors").unwrap();
        assert!(matches!(load_params(&path), Err(TrainErr::Checkpoint(_))));
    }
}
