use std::{f64::consts::PI, fmt, sync::Arc};

use ndarray::{Array2, Array4, ArrayView2, ArrayView4, Axis, Zip, s};
use parking_lot::Mutex;

use crate::{MlErr, Result};

/// The space a complex tensor lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    /// k-space.
    Freq,
    Image,
}

impl Domain {
    /// Returns the domain reached by a Fourier transform from this one.
    pub fn dual(self) -> Self {
        match self {
            Domain::Freq => Domain::Image,
            Domain::Image => Domain::Freq,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Domain::Freq => "FREQ",
            Domain::Image => "IMAGE",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The real and imaginary parts of an orthonormal DFT matrix of size `n`.
#[derive(Clone, Debug)]
struct DftMatrix {
    cos: Array2<f32>,
    sin: Array2<f32>,
}

impl DftMatrix {
    fn new(n: usize) -> Self {
        let scale = 1. / (n as f64).sqrt();
        let theta = |j: usize, k: usize| 2. * PI * ((j * k) % n) as f64 / n as f64;

        Self {
            cos: Array2::from_shape_fn((n, n), |(j, k)| (theta(j, k).cos() * scale) as f32),
            sin: Array2::from_shape_fn((n, n), |(j, k)| (theta(j, k).sin() * scale) as f32),
        }
    }

    fn len(&self) -> usize {
        self.cos.nrows()
    }
}

/// Orthonormal 2-D discrete Fourier transform over NHWC tensors whose channels are pairs of
/// real and imaginary parts.
///
/// The transform is unitary, so `ifft2` is the adjoint of `fft2` and the other way around. The
/// backward pass of either one is therefore the other.
#[derive(Clone, Debug)]
pub struct Fourier {
    rows: DftMatrix,
    cols: DftMatrix,
}

impl Fourier {
    /// Creates a new `Fourier` for images of `h` rows and `w` columns.
    pub fn new(h: usize, w: usize) -> Self {
        Self {
            rows: DftMatrix::new(h),
            cols: DftMatrix::new(w),
        }
    }

    /// Whether this transform can be applied to `h` x `w` images.
    pub fn fits(&self, h: usize, w: usize) -> bool {
        self.rows.len() == h && self.cols.len() == w
    }

    /// Forward transform, from image space to k-space.
    pub fn fft2(&self, x: ArrayView4<f32>) -> Result<Array4<f32>> {
        self.transform(x, -1.)
    }

    /// Inverse transform, from k-space to image space.
    pub fn ifft2(&self, x: ArrayView4<f32>) -> Result<Array4<f32>> {
        self.transform(x, 1.)
    }

    /// Moves `x` from domain `from` to domain `to`, copying it if they are the same.
    pub fn to_domain(&self, x: ArrayView4<f32>, from: Domain, to: Domain) -> Result<Array4<f32>> {
        match (from, to) {
            (Domain::Image, Domain::Freq) => self.fft2(x),
            (Domain::Freq, Domain::Image) => self.ifft2(x),
            _ => Ok(x.to_owned()),
        }
    }

    fn transform(&self, x: ArrayView4<f32>, sign: f32) -> Result<Array4<f32>> {
        let (b, h, w, c) = x.dim();

        if !self.fits(h, w) {
            return Err(MlErr::ShapeMismatch {
                what: "fourier input",
                got: vec![b, h, w, c],
                expected: vec![b, self.rows.len(), self.cols.len(), c],
            });
        }

        if c % 2 != 0 {
            return Err(MlErr::OddChannels { got: c });
        }

        let mut out = Array4::zeros((b, h, w, c));

        Zip::from(out.axis_iter_mut(Axis(0)))
            .and(x.axis_iter(Axis(0)))
            .par_for_each(|mut out, x| {
                for k in 0..c / 2 {
                    let re = x.slice(s![.., .., 2 * k]);
                    let im = x.slice(s![.., .., 2 * k + 1]);
                    let (yr, yi) = self.plane(re, im, sign);

                    out.slice_mut(s![.., .., 2 * k]).assign(&yr);
                    out.slice_mut(s![.., .., 2 * k + 1]).assign(&yi);
                }
            });

        Ok(out)
    }

    /// Transforms a single complex plane: `Y = F_h X F_w` with `F = C + i * sign * S`.
    fn plane(
        &self,
        re: ArrayView2<f32>,
        im: ArrayView2<f32>,
        sign: f32,
    ) -> (Array2<f32>, Array2<f32>) {
        let DftMatrix { cos: ch, sin: sh } = &self.rows;
        let DftMatrix { cos: cw, sin: sw } = &self.cols;

        let ar = ch.dot(&re) - sh.dot(&im) * sign;
        let ai = ch.dot(&im) + sh.dot(&re) * sign;

        let yr = ar.dot(cw) - ai.dot(sw) * sign;
        let yi = ai.dot(cw) + ar.dot(sw) * sign;
        (yr, yi)
    }
}

/// A shared, lazily built `Fourier` that gets rebuilt whenever the image size changes.
#[derive(Debug, Default)]
pub struct FourierCache {
    inner: Mutex<Option<Arc<Fourier>>>,
}

impl FourierCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a transform for `h` x `w` images.
    pub fn get(&self, h: usize, w: usize) -> Arc<Fourier> {
        let mut inner = self.inner.lock();

        match inner.as_ref() {
            Some(fourier) if fourier.fits(h, w) => fourier.clone(),
            _ => {
                let fourier = Arc::new(Fourier::new(h, w));
                *inner = Some(fourier.clone());
                fourier
            }
        }
    }
}
