use ndarray::{Array4, ArrayView4};
use rand::Rng;

use super::Conv2d;
use crate::{
    MlErr, Result,
    arch::{
        activations::ActFn,
        fourier::{Domain, Fourier},
    },
};

/// Mixes features from both sides of the Fourier transform.
///
/// For an input `x` living in `domain` it computes `primal(x) + T⁻¹(dual(T x))`, where `T` moves
/// a tensor into the dual domain. The output stays in `domain`.
#[derive(Clone, Debug)]
pub struct Interlacer {
    domain: Domain,
    primal: Conv2d,
    dual: Conv2d,
    fourier: Option<Fourier>,
}

impl Interlacer {
    pub fn new(
        domain: Domain,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        act_fn: Option<ActFn>,
    ) -> Self {
        Self {
            domain,
            primal: Conv2d::new(in_channels, out_channels, kernel_size, act_fn),
            dual: Conv2d::new(in_channels, out_channels, kernel_size, act_fn),
            fourier: None,
        }
    }

    pub fn size(&self) -> usize {
        self.primal.size() + self.dual.size()
    }

    pub fn name(&self) -> String {
        format!("interlacer[{}] {}", self.domain, self.primal.name())
    }

    pub fn output_shape(&self, input: [usize; 3]) -> Result<[usize; 3]> {
        let [_, _, c] = input;

        if c % 2 != 0 {
            return Err(MlErr::OddChannels { got: c });
        }

        let out = self.primal.output_shape(input)?;
        if out[2] % 2 != 0 {
            return Err(MlErr::OddChannels { got: out[2] });
        }

        Ok(out)
    }

    pub fn init_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f32>> {
        let mut params = self.primal.init_params(rng)?;
        params.extend(self.dual.init_params(rng)?);
        Ok(params)
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView4<f32>) -> Result<Array4<f32>> {
        self.check_len("interlacer parameters", params.len())?;

        let (_, h, w, _) = x.dim();
        if !self.fourier.as_ref().is_some_and(|fourier| fourier.fits(h, w)) {
            self.fourier = Some(Fourier::new(h, w));
        }

        let Self {
            domain,
            primal,
            dual,
            fourier: Some(fourier),
        } = self
        else {
            return Err(MlErr::NoForwardPass { layer: "interlacer" });
        };

        let (primal_params, dual_params) = params.split_at(primal.size());
        let dual_domain = domain.dual();

        let x_dual = fourier.to_domain(x, *domain, dual_domain)?;
        let p = primal.forward(primal_params, x)?;
        let q = dual.forward(dual_params, x_dual.view())?;

        Ok(p + &fourier.to_domain(q.view(), dual_domain, *domain)?)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        self.check_len("interlacer parameters", params.len())?;
        self.check_len("interlacer gradient", grad.len())?;

        let Self {
            domain,
            primal,
            dual,
            fourier: Some(fourier),
        } = self
        else {
            return Err(MlErr::NoForwardPass { layer: "interlacer" });
        };

        let (primal_params, dual_params) = params.split_at(primal.size());
        let (primal_grad, dual_grad) = grad.split_at_mut(primal.size());
        let dual_domain = domain.dual();

        // The transforms are unitary, their adjoints are the transforms in the other direction.
        let d_dual = fourier.to_domain(d.view(), *domain, dual_domain)?;
        let dx_dual = dual.backward(dual_params, dual_grad, d_dual)?;
        let dx_primal = primal.backward(primal_params, primal_grad, d)?;

        Ok(dx_primal + &fourier.to_domain(dx_dual.view(), dual_domain, *domain)?)
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size() {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size(),
            });
        }

        Ok(())
    }
}
