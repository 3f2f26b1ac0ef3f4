use ndarray::{Array4, ArrayView4};
use rand::Rng;

use crate::Result;

/// A differentiable network over a flat parameter buffer.
///
/// Models never own their parameters: every pass receives them, so the same model can be driven
/// by a trainer, a checkpoint loader or a gradient check alike.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Makes a forward pass through the network, caching what the backward pass needs.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - A NHWC batch.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    fn forward(&mut self, params: &[f32], x: ArrayView4<f32>) -> Result<Array4<f32>>;

    /// Backpropagates `d`, the derivative of the loss with respect to the last output, writing
    /// the gradient of every parameter into `grad`.
    ///
    /// # Arguments
    /// * `params` - The model's parameters, the same ones used for the last forward pass.
    /// * `grad` - A buffer with the same layout as `params`.
    /// * `d` - The loss derivative with respect to the model's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to the model's input.
    fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array4<f32>)
    -> Result<Array4<f32>>;

    /// Samples a fresh set of parameters.
    fn init_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f32>>;

    /// Infers the `(h, w, c)` output shape for a `(h, w, c)` input.
    fn output_shape(&self, input: [usize; 3]) -> Result<[usize; 3]>;

    /// A human-readable table of the model's layers.
    fn summary(&self, input: [usize; 3]) -> Result<String>;
}
