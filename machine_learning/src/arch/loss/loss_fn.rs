use ndarray::{Array4, ArrayView4};

use crate::Result;

pub trait LossFn {
    /// The name the loss is reported under.
    fn name(&self) -> &str;

    fn loss(&self, y_pred: ArrayView4<f32>, y: ArrayView4<f32>) -> Result<f32>;

    /// The derivative of `loss` with respect to `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView4<f32>, y: ArrayView4<f32>) -> Result<Array4<f32>>;
}
