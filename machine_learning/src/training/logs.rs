use std::collections::BTreeMap;

use serde::Serialize;

/// What happened during a single epoch of training.
#[derive(Clone, Debug, Serialize)]
pub struct EpochLogs {
    /// The epoch number, starting at 1.
    pub epoch: usize,
    pub steps: usize,
    pub validation_steps: usize,
    pub loss: f32,
    pub val_loss: Option<f32>,
    pub metrics: BTreeMap<String, f32>,
    pub val_metrics: BTreeMap<String, f32>,
}

/// The logs of every epoch of a `fit` call, in order.
pub type History = Vec<EpochLogs>;
