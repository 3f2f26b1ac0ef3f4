use super::{EpochLogs, FitOptions};
use crate::Result;

/// A hook the trainer invokes at the boundaries of the fit loop.
///
/// An error returned by a callback aborts the training.
pub trait Callback {
    fn on_train_begin(&mut self, _options: &FitOptions) -> Result<()> {
        Ok(())
    }

    /// Invoked after each epoch, once validation has run.
    ///
    /// # Arguments
    /// * `logs` - The epoch's results.
    /// * `params` - The model's parameters at the end of the epoch.
    fn on_epoch_end(&mut self, logs: &EpochLogs, params: &[f32]) -> Result<()>;
}
