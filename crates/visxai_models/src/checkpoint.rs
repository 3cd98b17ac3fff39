//! Weight files.
//!
//! Networks are stored with Burn's named MessagePack recorder at full
//! precision (`*.mpk`). A network built without a weight file keeps its
//! seeded random initialization.

use std::path::Path;

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};

use crate::error::{ModelError, Result};

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

/// Save a module's weights to `path`.
pub fn save_weights<B, M>(model: &M, path: impl AsRef<Path>) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref();
    model
        .clone()
        .save_file(path.to_path_buf(), &recorder())
        .map_err(|e| ModelError::Checkpoint(format!("saving {}: {e}", path.display())))
}

/// Load weights from `path` into `model`.
pub fn load_weights<B, M>(model: M, path: impl AsRef<Path>, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref();
    model
        .load_file(path.to_path_buf(), &recorder(), device)
        .map_err(|e| ModelError::Checkpoint(format!("loading {}: {e}", path.display())))
}

/// Load weights when a path is configured, otherwise return `model` as is.
pub fn maybe_load_weights<B, M>(model: M, path: Option<&Path>, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading weights");
            load_weights(model, path, device)
        }
        None => Ok(model),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnn::DigitCnnConfig;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn first_values(model: &crate::cnn::DigitCnn<TestBackend>) -> Vec<f32> {
        let x = Tensor::<TestBackend, 4>::ones([1, 1, 28, 28], &Default::default());
        use crate::traits::InspectableModel;
        model.forward_logits(x).into_data().to_vec().unwrap()
    }

    #[test]
    fn test_save_and_load_weights() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digits");

        TestBackend::seed(1);
        let saved = DigitCnnConfig::new().init::<TestBackend>(&device);
        save_weights(&saved, &path).unwrap();

        TestBackend::seed(2);
        let fresh = DigitCnnConfig::new().init::<TestBackend>(&device);
        let loaded = load_weights(fresh, &path, &device).unwrap();

        assert_eq!(first_values(&saved), first_values(&loaded));
    }

    #[test]
    fn test_missing_file_is_checkpoint_error() {
        let device = Default::default();
        let model = DigitCnnConfig::new().init::<TestBackend>(&device);
        let result = load_weights(model, "/nonexistent/weights", &device);
        assert!(matches!(result, Err(ModelError::Checkpoint(_))));
    }

    #[test]
    fn test_no_path_keeps_model() {
        let device = Default::default();
        let model = DigitCnnConfig::new().init::<TestBackend>(&device);
        let before = first_values(&model);
        let after = maybe_load_weights(model, None, &device).unwrap();
        assert_eq!(before, first_values(&after));
    }
}
