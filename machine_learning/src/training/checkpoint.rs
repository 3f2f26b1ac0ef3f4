use std::{
    collections::HashMap,
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use log::info;
use safetensors::{Dtype, SafeTensors, tensor::TensorView};

use super::{Callback, EpochLogs};
use crate::{MlErr, Result};

const PARAMS_TENSOR: &str = "params";

/// Periodically persists the model's parameters to `cp-<epoch:04>.ckpt` in `dir`.
#[derive(Debug)]
pub struct ModelCheckpoint {
    dir: PathBuf,
    period: NonZeroUsize,
}

impl ModelCheckpoint {
    /// Creates a new `ModelCheckpoint`.
    ///
    /// # Arguments
    /// * `dir` - The existing directory the checkpoints are written to.
    /// * `period` - Save every `period` epochs.
    pub fn new<P: Into<PathBuf>>(dir: P, period: NonZeroUsize) -> Self {
        Self {
            dir: dir.into(),
            period,
        }
    }

    /// The path the checkpoint for `epoch` is written to.
    pub fn path_for(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("cp-{epoch:04}.ckpt"))
    }
}

impl Callback for ModelCheckpoint {
    fn on_epoch_end(&mut self, logs: &EpochLogs, params: &[f32]) -> Result<()> {
        if logs.epoch % self.period.get() != 0 {
            return Ok(());
        }

        let path = self.path_for(logs.epoch);
        save_checkpoint(&path, params, logs.epoch)?;
        info!("epoch {}: saved checkpoint to {}", logs.epoch, path.display());
        Ok(())
    }
}

/// Writes `params` as a safetensors file holding a single flat `params` tensor.
pub fn save_checkpoint(path: &Path, params: &[f32], epoch: usize) -> Result<()> {
    let bytes: &[u8] = bytemuck::cast_slice(params);
    let view = TensorView::new(Dtype::F32, vec![params.len()], bytes)?;
    let metadata = HashMap::from([("epoch".to_string(), epoch.to_string())]);

    let data = safetensors::serialize([(PARAMS_TENSOR, &view)], &Some(metadata))?;
    fs::write(path, data)?;
    Ok(())
}

/// Reads back the parameters written by `save_checkpoint`.
pub fn load_checkpoint(path: &Path) -> Result<Vec<f32>> {
    let bytes = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&bytes)?;
    let view = tensors.tensor(PARAMS_TENSOR)?;

    if view.dtype() != Dtype::F32 {
        return Err(MlErr::Checkpoint(format!(
            "expected an F32 parameter tensor, got {:?}",
            view.dtype()
        )));
    }

    Ok(bytemuck::pod_collect_to_vec(view.data()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn logs(epoch: usize) -> EpochLogs {
        EpochLogs {
            epoch,
            steps: 1,
            validation_steps: 1,
            loss: 0.,
            val_loss: None,
            metrics: BTreeMap::new(),
            val_metrics: BTreeMap::new(),
        }
    }

    #[test]
    fn saves_every_period_epochs() {
        let dir = tempfile::tempdir().unwrap();
        let mut cp = ModelCheckpoint::new(dir.path(), NonZeroUsize::new(5).unwrap());

        for epoch in 1..=10 {
            cp.on_epoch_end(&logs(epoch), &[epoch as f32]).unwrap();
        }

        let mut saved: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        saved.sort();

        assert_eq!(saved, ["cp-0005.ckpt", "cp-0010.ckpt"]);
        assert_eq!(load_checkpoint(&cp.path_for(10)).unwrap(), [10.0]);
    }

    #[test]
    fn round_trips_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.ckpt");
        let params: Vec<f32> = (0..37).map(|i| i as f32 * 0.25 - 3.).collect();

        save_checkpoint(&path, &params, 3).unwrap();

        assert_eq!(load_checkpoint(&path).unwrap(), params);
    }

    #[test]
    fn garbage_is_a_checkpoint_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ckpt");
        fs::write(&path, b"not a checkpoint").unwrap();

        assert!(matches!(load_checkpoint(&path), Err(MlErr::Checkpoint(_))));
    }
}
