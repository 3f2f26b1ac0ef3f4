use ndarray::{Array2, Array3, Array4, ArrayView1, ArrayView2, ArrayView4, ArrayViewMut1, ArrayViewMut2, Axis, Zip, linalg};
use rand::Rng;

use crate::{
    MlErr, Result,
    arch::{activations::ActFn, initialization},
};

/// A "same" zero-padded 2-D convolution over NHWC tensors, computed as an im2col expansion
/// followed by a single matrix product.
///
/// The parameters are laid out as the `(k * k * in, out)` weight matrix followed by `out` biases.
#[derive(Clone, Debug)]
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    dims: Option<(usize, usize, usize)>,
    cols: Array2<f32>,
    z: Array2<f32>,
}

impl Conv2d {
    /// Creates a new `Conv2d`.
    ///
    /// # Arguments
    /// * `in_channels` - The channels of the incoming tensor.
    /// * `out_channels` - The amount of filters.
    /// * `kernel_size` - The side of the square kernel, expected to be odd.
    /// * `act_fn` - An optional nonlinearity applied to the output.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        act_fn: Option<ActFn>,
    ) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel_size,
            act_fn,
            size: (kernel_size * kernel_size * in_channels + 1) * out_channels,
            dims: None,
            cols: Array2::zeros((0, 0)),
            z: Array2::zeros((0, 0)),
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn name(&self) -> String {
        let act = self.act_fn.map_or("linear", |act_fn| act_fn.name());
        format!("conv2d {k}x{k} ({act})", k = self.kernel_size)
    }

    pub fn output_shape(&self, [h, w, c]: [usize; 3]) -> Result<[usize; 3]> {
        if c != self.in_channels {
            return Err(MlErr::SizeMismatch {
                what: "conv2d input channels",
                got: c,
                expected: self.in_channels,
            });
        }

        Ok([h, w, self.out_channels])
    }

    /// Samples fresh parameters: Kaiming normal weights and zeroed biases.
    pub fn init_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f32>> {
        let fan_in = self.kernel_size * self.kernel_size * self.in_channels;
        let mut params = initialization::kaiming(rng, fan_in * self.out_channels, fan_in)?;
        params.resize(self.size, 0.);
        Ok(params)
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (b, h, w, c) = x.dim();
        self.output_shape([h, w, c])?;

        let (weights, biases) = self.view_params(params)?;
        self.cols = im2col(x, self.kernel_size)?;

        let mut z = Array2::zeros((b * h * w, self.out_channels));
        linalg::general_mat_mul(1.0, &self.cols, &weights, 0.0, &mut z);
        z += &biases;

        let a = match &self.act_fn {
            Some(act_fn) => z.mapv(|z| act_fn.f(z)),
            None => z.clone(),
        };

        self.z = z;
        self.dims = Some((b, h, w));
        Ok(a.into_shape_with_order((b, h, w, self.out_channels))?)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        let (b, h, w) = self.dims.ok_or(MlErr::NoForwardPass { layer: "conv2d" })?;
        let expected = (b, h, w, self.out_channels);

        if d.dim() != expected {
            return Err(MlErr::ShapeMismatch {
                what: "conv2d delta",
                got: d.shape().to_vec(),
                expected: vec![b, h, w, self.out_channels],
            });
        }

        let mut d = d
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((b * h * w, self.out_channels))?;

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &self.cols.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        let (weights, _) = self.view_params(params)?;
        let dcols = d.dot(&weights.t());

        col2im(dcols, (b, h, w, self.in_channels), self.kernel_size)
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("conv2d gradient", grad.len())?;

        let w_size = self.size - self.out_channels;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.weights_dim(), dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.out_channels, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("conv2d parameters", params.len())?;

        let w_size = self.size - self.out_channels;
        let weights = ArrayView2::from_shape(self.weights_dim(), &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.out_channels, &params[w_size..])?;
        Ok((weights, biases))
    }

    fn weights_dim(&self) -> (usize, usize) {
        let k = self.kernel_size;
        (k * k * self.in_channels, self.out_channels)
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }
}

/// Returns the source coordinate `i + di - pad` if it falls inside `0..len`.
fn tap(i: usize, di: usize, pad: usize, len: usize) -> Option<usize> {
    (i + di).checked_sub(pad).filter(|&src| src < len)
}

/// Unfolds every `k` x `k` neighbourhood of `x` into a row of a `(b * h * w, k * k * c)` matrix.
fn im2col(x: ArrayView4<f32>, k: usize) -> Result<Array2<f32>> {
    let (b, h, w, c) = x.dim();
    let pad = k / 2;
    let mut cols = Array3::zeros((b, h * w, k * k * c));

    Zip::from(cols.axis_iter_mut(Axis(0)))
        .and(x.axis_iter(Axis(0)))
        .par_for_each(|mut rows, img| {
            for i in 0..h {
                for j in 0..w {
                    let mut row = rows.row_mut(i * w + j);

                    for di in 0..k {
                        let Some(y) = tap(i, di, pad, h) else {
                            continue;
                        };

                        for dj in 0..k {
                            let Some(col) = tap(j, dj, pad, w) else {
                                continue;
                            };

                            let base = (di * k + dj) * c;
                            for ch in 0..c {
                                row[base + ch] = img[[y, col, ch]];
                            }
                        }
                    }
                }
            }
        });

    Ok(cols.into_shape_with_order((b * h * w, k * k * c))?)
}

/// Folds the rows of `dcols` back onto the image they were unfolded from, adding overlaps.
fn col2im(
    dcols: Array2<f32>,
    (b, h, w, c): (usize, usize, usize, usize),
    k: usize,
) -> Result<Array4<f32>> {
    let pad = k / 2;
    let dcols = dcols.into_shape_with_order((b, h * w, k * k * c))?;
    let mut dx = Array4::zeros((b, h, w, c));

    Zip::from(dx.axis_iter_mut(Axis(0)))
        .and(dcols.axis_iter(Axis(0)))
        .par_for_each(|mut img, rows| {
            for i in 0..h {
                for j in 0..w {
                    let row = rows.row(i * w + j);

                    for di in 0..k {
                        let Some(y) = tap(i, di, pad, h) else {
                            continue;
                        };

                        for dj in 0..k {
                            let Some(col) = tap(j, dj, pad, w) else {
                                continue;
                            };

                            let base = (di * k + dj) * c;
                            for ch in 0..c {
                                img[[y, col, ch]] += row[base + ch];
                            }
                        }
                    }
                }
            }
        });

    Ok(dx)
}
