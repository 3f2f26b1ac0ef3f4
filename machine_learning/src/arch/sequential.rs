use std::mem;

use ndarray::{Array4, ArrayView4};
use rand::Rng;

use super::{Model, layers::Layer};
use crate::{MlErr, Result};

const SUMMARY_WIDTHS: [usize; 3] = [40, 24, 12];

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub(crate) fn describe(
        &self,
        mut input: [usize; 3],
        depth: usize,
        rows: &mut Vec<[String; 3]>,
    ) -> Result<[usize; 3]> {
        for layer in &self.layers {
            input = layer.describe(input, depth, rows)?;
        }

        Ok(input)
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();

        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn forward(&mut self, params: &[f32], x: ArrayView4<f32>) -> Result<Array4<f32>> {
        self.check_len("parameters", params.len())?;

        let mut rest = params;
        let mut out = x.to_owned();

        for layer in self.layers.iter_mut() {
            let (head, tail) = rest.split_at(layer.size());
            out = layer.forward(head, out.view())?;
            rest = tail;
        }

        Ok(out)
    }

    fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        self.check_len("parameters", params.len())?;
        self.check_len("gradient", grad.len())?;

        let mut params_rest = params;
        let mut grad_rest = grad;

        for layer in self.layers.iter_mut().rev() {
            let split = params_rest.len() - layer.size();

            let (params_head, params_tail) = params_rest.split_at(split);
            let (grad_head, grad_tail) = mem::take(&mut grad_rest).split_at_mut(split);

            d = layer.backward(params_tail, grad_tail, d)?;
            params_rest = params_head;
            grad_rest = grad_head;
        }

        Ok(d)
    }

    fn init_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f32>> {
        let mut params = Vec::with_capacity(self.size());

        for layer in &self.layers {
            params.extend(layer.init_params(rng)?);
        }

        Ok(params)
    }

    fn output_shape(&self, input: [usize; 3]) -> Result<[usize; 3]> {
        self.layers
            .iter()
            .try_fold(input, |shape, layer| layer.output_shape(shape))
    }

    fn summary(&self, input: [usize; 3]) -> Result<String> {
        let [h, w, c] = input;
        let mut rows = vec![[
            "input".to_string(),
            format!("(None, {h}, {w}, {c})"),
            "0".to_string(),
        ]];
        self.describe(input, 0, &mut rows)?;

        let width: usize = SUMMARY_WIDTHS.iter().sum();
        let rule = |c: &str| c.repeat(width);
        let format_row = |[name, shape, params]: &[String; 3]| {
            let [wn, ws, wp] = SUMMARY_WIDTHS;
            format!("{name:<wn$}{shape:<ws$}{params:>wp$}")
        };

        let header = ["Layer (type)", "Output Shape", "Param #"].map(String::from);
        let mut lines = vec![rule("_"), format_row(&header), rule("=")];
        lines.extend(rows.iter().map(format_row));
        lines.push(rule("="));
        lines.push(format!("Total params: {}", self.size()));
        lines.push(rule("_"));

        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::activations::ActFn;
    use rand::{SeedableRng, rngs::StdRng};

    fn small_net() -> Sequential {
        Sequential::new([
            Layer::conv(2, 4, 3, Some(ActFn::relu())),
            Layer::residual([
                Layer::conv(4, 4, 3, Some(ActFn::relu())),
                Layer::conv(4, 4, 3, None),
            ]),
            Layer::conv(4, 2, 3, None),
        ])
    }

    #[test]
    fn size_matches_initialized_params() {
        let net = small_net();
        let params = net.init_params(&mut StdRng::seed_from_u64(0)).unwrap();

        assert_eq!(net.size(), (9 * 2 + 1) * 4 + 2 * (9 * 4 + 1) * 4 + (9 * 4 + 1) * 2);
        assert_eq!(params.len(), net.size());
    }

    #[test]
    fn output_shape_follows_the_layers() {
        assert_eq!(small_net().output_shape([8, 8, 2]).unwrap(), [8, 8, 2]);
        assert!(small_net().output_shape([8, 8, 3]).is_err());
    }

    #[test]
    fn forward_rejects_wrong_param_count() {
        let mut net = small_net();
        let err = net
            .forward(&[0.; 3], Array4::zeros((1, 4, 4, 2)).view())
            .unwrap_err();

        assert!(matches!(err, MlErr::SizeMismatch { got: 3, .. }));
    }

    #[test]
    fn summary_lists_every_layer() {
        let summary = small_net().summary([8, 8, 2]).unwrap();

        assert!(summary.contains("residual"));
        assert_eq!(summary.matches("conv2d").count(), 4);
        assert!(summary.contains("(None, 8, 8, 4)"));
        assert!(summary.contains(&format!("Total params: {}", small_net().size())));
    }
}
