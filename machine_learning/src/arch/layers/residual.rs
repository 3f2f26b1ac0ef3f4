use ndarray::{Array4, ArrayView4};
use rand::Rng;

use crate::{
    MlErr, Result,
    arch::{Model, Sequential},
};

/// Adds the input of a block to its output: `x + inner(x)`.
#[derive(Clone, Debug)]
pub struct Residual {
    inner: Sequential,
}

impl Residual {
    pub fn new(inner: Sequential) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Sequential {
        &self.inner
    }

    pub fn size(&self) -> usize {
        self.inner.size()
    }

    pub fn output_shape(&self, input: [usize; 3]) -> Result<[usize; 3]> {
        let out = self.inner.output_shape(input)?;

        if out != input {
            return Err(MlErr::ShapeMismatch {
                what: "residual block output",
                got: out.to_vec(),
                expected: input.to_vec(),
            });
        }

        Ok(out)
    }

    pub fn init_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f32>> {
        self.inner.init_params(rng)
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView4<f32>) -> Result<Array4<f32>> {
        let y = self.inner.forward(params, x)?;

        if y.dim() != x.dim() {
            return Err(MlErr::ShapeMismatch {
                what: "residual block output",
                got: y.shape().to_vec(),
                expected: x.shape().to_vec(),
            });
        }

        Ok(y + &x)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        let skip = d.clone();
        Ok(self.inner.backward(params, grad, d)? + &skip)
    }
}
