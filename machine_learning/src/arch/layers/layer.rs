use ndarray::{Array4, ArrayView4};
use rand::Rng;

use super::{Conv2d, Interlacer, Residual};
use crate::{
    Result,
    arch::{Domain, Sequential, activations::ActFn},
};

#[derive(Clone, Debug)]
pub enum Layer {
    Conv(Conv2d),
    Interlacer(Interlacer),
    Residual(Residual),
}

impl Layer {
    pub fn conv(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        act_fn: Option<ActFn>,
    ) -> Self {
        Self::Conv(Conv2d::new(in_channels, out_channels, kernel_size, act_fn))
    }

    pub fn interlacer(
        domain: Domain,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        act_fn: Option<ActFn>,
    ) -> Self {
        Self::Interlacer(Interlacer::new(
            domain,
            in_channels,
            out_channels,
            kernel_size,
            act_fn,
        ))
    }

    pub fn residual<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self::Residual(Residual::new(Sequential::new(layers)))
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        match self {
            Self::Conv(l) => l.size(),
            Self::Interlacer(l) => l.size(),
            Self::Residual(l) => l.size(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Conv(l) => l.name(),
            Self::Interlacer(l) => l.name(),
            Self::Residual(_) => "residual".to_string(),
        }
    }

    pub fn output_shape(&self, input: [usize; 3]) -> Result<[usize; 3]> {
        match self {
            Self::Conv(l) => l.output_shape(input),
            Self::Interlacer(l) => l.output_shape(input),
            Self::Residual(l) => l.output_shape(input),
        }
    }

    pub fn init_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f32>> {
        match self {
            Self::Conv(l) => l.init_params(rng),
            Self::Interlacer(l) => l.init_params(rng),
            Self::Residual(l) => l.init_params(rng),
        }
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView4<f32>) -> Result<Array4<f32>> {
        match self {
            Self::Conv(l) => l.forward(params, x),
            Self::Interlacer(l) => l.forward(params, x),
            Self::Residual(l) => l.forward(params, x),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        match self {
            Self::Conv(l) => l.backward(params, grad, d),
            Self::Interlacer(l) => l.backward(params, grad, d),
            Self::Residual(l) => l.backward(params, grad, d),
        }
    }

    /// Appends one summary row per layer, nesting the inner layers of residual blocks.
    pub(crate) fn describe(
        &self,
        input: [usize; 3],
        depth: usize,
        rows: &mut Vec<[String; 3]>,
    ) -> Result<[usize; 3]> {
        let out = self.output_shape(input)?;
        let [h, w, c] = out;
        let indent = "  ".repeat(depth);

        rows.push([
            format!("{indent}{}", self.name()),
            format!("(None, {h}, {w}, {c})"),
            self.size().to_string(),
        ]);

        if let Self::Residual(l) = self {
            l.inner().describe(input, depth + 1, rows)?;
        }

        Ok(out)
    }
}
