use std::{
    collections::BTreeMap,
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, info};
use ndarray::Array4;

use super::{Callback, EpochLogs, History};
use crate::{
    MlErr, Result,
    arch::{Model, loss::LossFn},
    optimization::Optimizer,
};

/// An `(input, target)` pair of NHWC batches.
pub type Batch = (Array4<f32>, Array4<f32>);

/// The loss and the metrics are boxed so heterogeneous objectives can be monitored together.
type BoxedLoss = Box<dyn LossFn + Send>;

/// How long a `fit` call runs for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FitOptions {
    pub epochs: NonZeroUsize,
    pub steps_per_epoch: NonZeroUsize,
    /// Batches drawn from the validation source after every epoch, zero disables validation.
    pub validation_steps: usize,
}

/// Asks a running `fit` to return before its next training step.
///
/// Clones share the same flag, so a handle taken before the fit moves to another thread can
/// still stop it.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Drives a model through minibatch gradient descent while keeping its parameters.
pub struct Trainer<M: Model, O: Optimizer> {
    model: M,
    params: Vec<f32>,
    grad: Vec<f32>,
    optimizer: O,
    loss_fn: BoxedLoss,
    metrics: Vec<BoxedLoss>,
    stop: StopHandle,
}

impl<M: Model, O: Optimizer> Trainer<M, O> {
    /// Binds a model, its initial parameters, an optimizer and the objectives together.
    ///
    /// # Arguments
    /// * `model` - The network to train.
    /// * `params` - The model's initial parameters.
    /// * `optimizer` - The update rule.
    /// * `loss_fn` - The objective to minimize.
    /// * `metrics` - Additional objectives that are only reported.
    ///
    /// # Returns
    /// The trainer or an error if the parameters don't fit the model.
    pub fn compile(
        model: M,
        params: Vec<f32>,
        optimizer: O,
        loss_fn: BoxedLoss,
        metrics: Vec<BoxedLoss>,
    ) -> Result<Self> {
        if params.len() != model.size() {
            return Err(MlErr::SizeMismatch {
                what: "compiled parameters",
                got: params.len(),
                expected: model.size(),
            });
        }

        Ok(Self {
            grad: vec![0.; params.len()],
            model,
            params,
            optimizer,
            loss_fn,
            metrics,
            stop: StopHandle::default(),
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn count_params(&self) -> usize {
        self.params.len()
    }

    pub fn loss_name(&self) -> &str {
        self.loss_fn.name()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Trains the model, pulling `steps_per_epoch` batches from `train` each epoch and
    /// `validation_steps` batches from `val` after it.
    ///
    /// # Arguments
    /// * `train` - The source of training batches.
    /// * `val` - The source of validation batches.
    /// * `options` - How long to train for.
    /// * `callbacks` - Hooks invoked at the start of training and after every epoch.
    ///
    /// # Returns
    /// The logs of every completed epoch or the first error that occurred. A stopped fit returns
    /// early with the epochs it finished.
    pub fn fit<T, V>(
        &mut self,
        train: &mut T,
        val: &mut V,
        options: FitOptions,
        callbacks: &mut [Box<dyn Callback + Send>],
    ) -> Result<History>
    where
        T: Iterator<Item = Batch>,
        V: Iterator<Item = Batch>,
    {
        for callback in callbacks.iter_mut() {
            callback.on_train_begin(&options)?;
        }

        let mut history = History::with_capacity(options.epochs.get());

        for epoch in 1..=options.epochs.get() {
            let steps = options.steps_per_epoch.get();
            let mut totals = Totals::new(self.metrics.len());

            for step in 1..=steps {
                if self.stop.is_stopped() {
                    info!("stopped at epoch {epoch}, step {step}");
                    return Ok(history);
                }

                let (x, y) = train.next().ok_or(MlErr::GeneratorExhausted {
                    split: "training",
                    epoch,
                    step,
                })?;

                let loss = self.train_step(&x, &y, &mut totals)?;
                if !loss.is_finite() {
                    return Err(MlErr::NonFiniteLoss { epoch, step, loss });
                }

                debug!(epoch = epoch, step = step, loss = loss; "train step");
            }

            let mut val_totals = Totals::new(self.metrics.len());
            for step in 1..=options.validation_steps {
                let (x, y) = val.next().ok_or(MlErr::GeneratorExhausted {
                    split: "validation",
                    epoch,
                    step,
                })?;

                self.evaluate_step(&x, &y, &mut val_totals)?;
            }

            let logs = EpochLogs {
                epoch,
                steps,
                validation_steps: options.validation_steps,
                loss: totals.loss / steps as f32,
                val_loss: (options.validation_steps > 0)
                    .then(|| val_totals.loss / options.validation_steps as f32),
                metrics: self.averaged(&totals.metrics, steps),
                val_metrics: match options.validation_steps {
                    0 => BTreeMap::new(),
                    n => self.averaged(&val_totals.metrics, n),
                },
            };

            match logs.val_loss {
                Some(val_loss) => info!(
                    "epoch {epoch}/{}: loss {:.6}, val_loss {val_loss:.6}",
                    options.epochs, logs.loss
                ),
                None => info!("epoch {epoch}/{}: loss {:.6}", options.epochs, logs.loss),
            }

            for callback in callbacks.iter_mut() {
                callback.on_epoch_end(&logs, &self.params)?;
            }

            history.push(logs);
        }

        Ok(history)
    }

    /// Evaluates the objectives on a batch without updating anything.
    ///
    /// # Returns
    /// The loss followed by every metric, in the order they were compiled.
    pub fn evaluate(&mut self, x: &Array4<f32>, y: &Array4<f32>) -> Result<Vec<f32>> {
        let mut totals = Totals::new(self.metrics.len());
        self.evaluate_step(x, y, &mut totals)?;

        let mut values = vec![totals.loss];
        values.extend(totals.metrics);
        Ok(values)
    }

    fn train_step(&mut self, x: &Array4<f32>, y: &Array4<f32>, totals: &mut Totals) -> Result<f32> {
        let y_pred = self.model.forward(&self.params, x.view())?;
        let loss = self.loss_fn.loss(y_pred.view(), y.view())?;
        self.add_metrics(&y_pred, y, totals)?;
        totals.loss += loss;

        if !loss.is_finite() {
            return Ok(loss);
        }

        let d = self.loss_fn.loss_prime(y_pred.view(), y.view())?;
        self.model.backward(&self.params, &mut self.grad, d)?;
        self.optimizer.update_params(&mut self.params, &self.grad)?;
        Ok(loss)
    }

    fn evaluate_step(&mut self, x: &Array4<f32>, y: &Array4<f32>, totals: &mut Totals) -> Result<()> {
        let y_pred = self.model.forward(&self.params, x.view())?;
        totals.loss += self.loss_fn.loss(y_pred.view(), y.view())?;
        self.add_metrics(&y_pred, y, totals)
    }

    fn add_metrics(&self, y_pred: &Array4<f32>, y: &Array4<f32>, totals: &mut Totals) -> Result<()> {
        for (metric, total) in self.metrics.iter().zip(totals.metrics.iter_mut()) {
            *total += metric.loss(y_pred.view(), y.view())?;
        }

        Ok(())
    }

    fn averaged(&self, totals: &[f32], steps: usize) -> BTreeMap<String, f32> {
        self.metrics
            .iter()
            .zip(totals)
            .map(|(metric, total)| (metric.name().to_string(), total / steps as f32))
            .collect()
    }
}

/// Running sums over the steps of an epoch.
struct Totals {
    loss: f32,
    metrics: Vec<f32>,
}

impl Totals {
    fn new(metrics: usize) -> Self {
        Self {
            loss: 0.,
            metrics: vec![0.; metrics],
        }
    }
}
