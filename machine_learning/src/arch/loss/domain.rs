use ndarray::{Array4, ArrayView4, Zip};

use super::{LossFn, Norm};
use crate::{
    MlErr, Result,
    arch::fourier::{Domain, FourierCache},
};

/// Magnitudes below this are f32 round-off of a zero, where the modulus has no gradient.
const MAGNITUDE_EPS: f32 = 1e-6;

/// A loss measured in a chosen domain, regardless of the domain the network outputs in.
///
/// Predictions and targets are moved from `output` into `compared` with the orthonormal Fourier
/// transform before applying the norm. The magnitude variant compares the modulus of every
/// complex channel instead of its real and imaginary parts.
#[derive(Debug)]
pub struct DomainLoss {
    name: String,
    output: Domain,
    compared: Domain,
    norm: Norm,
    magnitude: bool,
    fourier: FourierCache,
}

impl DomainLoss {
    fn new(prefix: &str, output: Domain, compared: Domain, norm: Norm, magnitude: bool) -> Self {
        Self {
            name: format!("{prefix}_{}", norm.name()),
            output,
            compared,
            norm,
            magnitude,
            fourier: FourierCache::new(),
        }
    }

    /// A loss computed on images, for a network that outputs in `output`.
    pub fn image(output: Domain, norm: Norm) -> Self {
        Self::new("image", output, Domain::Image, norm, false)
    }

    /// A loss computed on k-space, for a network that outputs in `output`.
    pub fn fourier(output: Domain, norm: Norm) -> Self {
        Self::new("fourier", output, Domain::Freq, norm, false)
    }

    /// A loss computed on image magnitudes, for a network that outputs in `output`.
    pub fn image_magnitude(output: Domain, norm: Norm) -> Self {
        Self::new("image_mag", output, Domain::Image, norm, true)
    }

    pub fn output(&self) -> Domain {
        self.output
    }

    pub fn compared(&self) -> Domain {
        self.compared
    }

    pub fn norm(&self) -> Norm {
        self.norm
    }

    fn to_compared(
        &self,
        y_pred: ArrayView4<f32>,
        y: ArrayView4<f32>,
    ) -> Result<(Array4<f32>, Array4<f32>)> {
        if y_pred.dim() != y.dim() {
            return Err(MlErr::ShapeMismatch {
                what: "loss target",
                got: y.shape().to_vec(),
                expected: y_pred.shape().to_vec(),
            });
        }

        let (_, h, w, _) = y_pred.dim();
        let fourier = self.fourier.get(h, w);

        Ok((
            fourier.to_domain(y_pred, self.output, self.compared)?,
            fourier.to_domain(y, self.output, self.compared)?,
        ))
    }
}

impl LossFn for DomainLoss {
    fn name(&self) -> &str {
        &self.name
    }

    fn loss(&self, y_pred: ArrayView4<f32>, y: ArrayView4<f32>) -> Result<f32> {
        let (p, t) = self.to_compared(y_pred, y)?;

        if self.magnitude {
            let (mp, mt) = (magnitude(&p)?, magnitude(&t)?);
            return Ok(self.norm.loss(mp.view(), mt.view()));
        }

        Ok(self.norm.loss(p.view(), t.view()))
    }

    fn loss_prime(&self, y_pred: ArrayView4<f32>, y: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (p, t) = self.to_compared(y_pred, y)?;

        let d = if self.magnitude {
            let (mp, mt) = (magnitude(&p)?, magnitude(&t)?);
            let dm = self.norm.loss_prime(mp.view(), mt.view());
            magnitude_prime(&p, &mp, &dm)
        } else {
            self.norm.loss_prime(p.view(), t.view())
        };

        // The adjoint of a unitary transform is its inverse.
        let (_, h, w, _) = d.dim();
        self.fourier
            .get(h, w)
            .to_domain(d.view(), self.compared, self.output)
    }
}

/// The modulus of every complex channel pair: `(b, h, w, 2c) -> (b, h, w, c)`.
fn magnitude(x: &Array4<f32>) -> Result<Array4<f32>> {
    let (b, h, w, c) = x.dim();

    if c % 2 != 0 {
        return Err(MlErr::OddChannels { got: c });
    }

    Ok(Array4::from_shape_fn((b, h, w, c / 2), |(n, i, j, k)| {
        let re = x[[n, i, j, 2 * k]];
        let im = x[[n, i, j, 2 * k + 1]];
        (re * re + im * im).sqrt()
    }))
}

/// Chains the derivative `dm` with respect to the magnitudes back to the complex channels.
fn magnitude_prime(x: &Array4<f32>, m: &Array4<f32>, dm: &Array4<f32>) -> Array4<f32> {
    let mut d = Array4::zeros(x.raw_dim());

    Zip::indexed(&mut d).for_each(|(n, i, j, k), d| {
        let m = m[[n, i, j, k / 2]];
        if m > MAGNITUDE_EPS {
            *d = dm[[n, i, j, k / 2]] * x[[n, i, j, k]] / m;
        }
    });

    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Fourier;

    fn sample(seed: usize) -> Array4<f32> {
        Array4::from_shape_fn((2, 4, 4, 2), |(n, i, j, k)| {
            (((n + seed) * 13 + i * 7 + j * 3 + k * 5) % 17) as f32 / 17. - 0.5
        })
    }

    #[test]
    fn names_follow_metric_convention() {
        assert_eq!(DomainLoss::image(Domain::Freq, Norm::L1).name(), "image_l1");
        assert_eq!(DomainLoss::fourier(Domain::Freq, Norm::L2).name(), "fourier_l2");
        assert_eq!(
            DomainLoss::image_magnitude(Domain::Image, Norm::L1).name(),
            "image_mag_l1"
        );
    }

    #[test]
    fn same_domain_is_the_plain_norm() {
        let (p, t) = (sample(0), sample(1));
        let loss = DomainLoss::image(Domain::Image, Norm::L2);

        let got = loss.loss(p.view(), t.view()).unwrap();
        assert!((got - Norm::L2.loss(p.view(), t.view())).abs() < 1e-7);
    }

    #[test]
    fn l2_is_the_same_in_both_domains() {
        // Parseval: the orthonormal transform preserves squared distances.
        let (p, t) = (sample(0), sample(1));

        let image = DomainLoss::image(Domain::Freq, Norm::L2);
        let fourier = DomainLoss::fourier(Domain::Freq, Norm::L2);

        let a = image.loss(p.view(), t.view()).unwrap();
        let b = fourier.loss(p.view(), t.view()).unwrap();
        assert!((a - b).abs() < 1e-5);
    }

    #[test]
    fn image_loss_on_freq_output_transforms_first() {
        let fourier = Fourier::new(4, 4);
        let (p, t) = (sample(0), sample(1));
        let (kp, kt) = (
            fourier.fft2(p.view()).unwrap(),
            fourier.fft2(t.view()).unwrap(),
        );

        let loss = DomainLoss::image(Domain::Freq, Norm::L1);
        let got = loss.loss(kp.view(), kt.view()).unwrap();

        assert!((got - Norm::L1.loss(p.view(), t.view())).abs() < 1e-5);
    }

    #[test]
    fn loss_prime_matches_finite_differences() {
        const H: f32 = 1e-2;

        // Magnitude losses are only smooth away from zero, so the k-space cases are built from
        // images whose every pixel is well clear of it.
        let fourier = Fourier::new(4, 4);
        let k = |seed| fourier.fft2(sample(seed).view()).unwrap();

        let cases = [
            (DomainLoss::image(Domain::Freq, Norm::L2), sample(0), sample(3)),
            (DomainLoss::fourier(Domain::Image, Norm::L2), sample(0), sample(3)),
            (DomainLoss::image_magnitude(Domain::Image, Norm::L2), sample(0), sample(3)),
            (DomainLoss::image_magnitude(Domain::Freq, Norm::L2), k(0), k(3)),
        ];

        for (loss, p, t) in cases {
            let d = loss.loss_prime(p.view(), t.view()).unwrap();

            for idx in [[0, 0, 0, 0], [1, 2, 3, 1], [0, 3, 1, 0]] {
                let mut plus = p.clone();
                plus[idx] += H;
                let mut minus = p.clone();
                minus[idx] -= H;

                let numeric = (loss.loss(plus.view(), t.view()).unwrap()
                    - loss.loss(minus.view(), t.view()).unwrap())
                    / (2. * H);
                assert!(
                    (numeric - d[idx]).abs() < 1e-3,
                    "{}: {numeric} != {}",
                    loss.name(),
                    d[idx]
                );
            }
        }
    }

    #[test]
    fn round_off_magnitudes_carry_no_gradient() {
        let mut x = Array4::zeros((1, 1, 2, 2));
        x[[0, 0, 0, 0]] = 7e-8;
        x[[0, 0, 0, 1]] = -3e-8;
        x[[0, 0, 1, 0]] = 0.6;
        x[[0, 0, 1, 1]] = 0.8;

        let m = magnitude(&x).unwrap();
        let d = magnitude_prime(&x, &m, &Array4::ones(m.raw_dim()));

        assert_eq!(d[[0, 0, 0, 0]], 0.);
        assert_eq!(d[[0, 0, 0, 1]], 0.);
        assert!((d[[0, 0, 1, 0]] - 0.6).abs() < 1e-6);
        assert!((d[[0, 0, 1, 1]] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn mismatched_targets_fail() {
        let loss = DomainLoss::fourier(Domain::Freq, Norm::L1);
        let err = loss
            .loss(sample(0).view(), Array4::zeros((1, 4, 4, 2)).view())
            .unwrap_err();

        assert!(matches!(err, MlErr::ShapeMismatch { .. }));
    }
}
