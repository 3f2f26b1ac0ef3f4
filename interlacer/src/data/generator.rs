use std::{f32::consts::PI, sync::Arc};

use log::error;
use machine_learning::{
    arch::{Domain, Fourier},
    training::Batch,
};
use ndarray::{Array3, Array4, ArrayViewMut3, Axis, s};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::index};

use crate::config::{Task, TrainingConfig};

/// Largest simulated in-plane translation, in pixels.
const MAX_SHIFT: f32 = 2.;

/// Which split a generator feeds, the validation stream is seeded apart from the training one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    fn rng(self, seed: Option<u64>) -> StdRng {
        match (self, seed) {
            (Self::Train, Some(seed)) => StdRng::seed_from_u64(seed),
            (Self::Val, Some(seed)) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            (_, None) => StdRng::from_os_rng(),
        }
    }
}

/// An endless stream of `(corrupted input, clean target)` k-space batches.
///
/// Every batch draws `batch_size` images at random, takes them to k-space, corrupts a fixed
/// number of k-space lines according to the task and hands out the input in the input domain
/// and the target in the output domain.
#[derive(Debug)]
pub struct KspaceGenerator {
    images: Arc<Array3<f32>>,
    fourier: Fourier,
    task: Task,
    input_domain: Domain,
    output_domain: Domain,
    corrupted_lines: usize,
    batch_size: usize,
    rng: StdRng,
}

impl KspaceGenerator {
    pub fn new(images: Arc<Array3<f32>>, config: &TrainingConfig, split: Split) -> Self {
        let (_, h, w) = images.dim();

        Self {
            fourier: Fourier::new(h, w),
            task: config.task,
            input_domain: config.input_domain,
            output_domain: config.output_domain,
            corrupted_lines: (config.corruption_frac * h as f32).round() as usize,
            batch_size: config.batch_size.get(),
            rng: split.rng(config.seed),
            images,
        }
    }

    /// The amount of k-space lines corrupted in every sample.
    pub fn corrupted_lines(&self) -> usize {
        self.corrupted_lines
    }

    fn batch(&mut self) -> machine_learning::Result<Batch> {
        let (len, h, w) = self.images.dim();
        let mut clean = Array4::zeros((self.batch_size, h, w, 2));

        for mut sample in clean.outer_iter_mut() {
            let i = self.rng.random_range(0..len);
            sample
                .index_axis_mut(Axis(2), 0)
                .assign(&self.images.index_axis(Axis(0), i));
        }

        let target_k = self.fourier.fft2(clean.view())?;
        let mut input_k = target_k.clone();
        for sample in input_k.outer_iter_mut() {
            match self.task {
                Task::Undersample => undersample(sample, self.corrupted_lines, &mut self.rng),
                Task::Motion => shift_lines(sample, self.corrupted_lines, &mut self.rng),
            }
        }

        let input = match self.input_domain {
            Domain::Freq => input_k,
            Domain::Image => self.fourier.ifft2(input_k.view())?,
        };

        let target = match self.output_domain {
            Domain::Freq => target_k,
            Domain::Image => clean,
        };

        Ok((input, target))
    }
}

impl Iterator for KspaceGenerator {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        match self.batch() {
            Ok(batch) => Some(batch),
            Err(e) => {
                error!("failed to generate a batch: {e}");
                None
            }
        }
    }
}

/// Zeroes `lines` random k-space rows of a `(h, w, 2)` sample, never the DC row.
fn undersample<R: Rng + ?Sized>(mut k: ArrayViewMut3<f32>, lines: usize, rng: &mut R) {
    let rows = k.dim().0;
    let lines = lines.min(rows.saturating_sub(1));

    for row in index::sample(rng, rows.saturating_sub(1), lines) {
        k.slice_mut(s![row + 1, .., ..]).fill(0.);
    }
}

/// Applies the phase ramp of a random translation to `lines` random k-space rows of a
/// `(h, w, 2)` sample, as if the subject moved while those rows were acquired.
fn shift_lines<R: Rng + ?Sized>(mut k: ArrayViewMut3<f32>, lines: usize, rng: &mut R) {
    let (rows, cols, _) = k.dim();
    let lines = lines.min(rows);

    for row in index::sample(rng, rows, lines) {
        let dy = rng.random_range(-MAX_SHIFT..=MAX_SHIFT);
        let dx = rng.random_range(-MAX_SHIFT..=MAX_SHIFT);
        let ky = signed_frequency(row, rows);

        for col in 0..cols {
            let kx = signed_frequency(col, cols);
            let theta = -2. * PI * (dy * ky / rows as f32 + dx * kx / cols as f32);
            let (sin, cos) = theta.sin_cos();

            let re = k[[row, col, 0]];
            let im = k[[row, col, 1]];
            k[[row, col, 0]] = re * cos - im * sin;
            k[[row, col, 1]] = re * sin + im * cos;
        }
    }
}

/// Maps an unshifted DFT index to its signed frequency.
fn signed_frequency(i: usize, n: usize) -> f32 {
    if i < n.div_ceil(2) {
        i as f32
    } else {
        i as f32 - n as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(task: &str, frac: &str, input: &str, output: &str) -> TrainingConfig {
        let text = format!(
            "[DATA]\ndataset = MNIST\ntask = {task}\ninput_domain = {input}\n\
             output_domain = {output}\ncorruption_frac = {frac}\nbatch_size = 3\n\
             [MODEL]\narchitecture = CONV\nnonlinearity = relu\nkernel_size = 3\n\
             num_features = 4\nnum_layers = 2\n\
             [TRAINING]\nloss_type = image\nloss = L1\nnum_epochs = 1\nseed = 11\n"
        );
        TrainingConfig::parse(&text).unwrap()
    }

    fn images() -> Arc<Array3<f32>> {
        Arc::new(Array3::from_shape_fn((5, 8, 8), |(n, i, j)| {
            ((n * 13 + i * 7 + j * 3) % 10) as f32 / 10.
        }))
    }

    fn row_energy(k: &Array4<f32>, sample: usize, row: usize) -> f32 {
        k.slice(s![sample, row, .., ..]).iter().map(|v| v * v).sum()
    }

    #[test]
    fn batches_have_fixed_shape_and_never_end() {
        let generator = KspaceGenerator::new(
            images(),
            &config("undersample", "0.25", "FREQ", "FREQ"),
            Split::Train,
        );

        let batches: Vec<_> = generator.take(10).collect();

        assert_eq!(batches.len(), 10);
        assert!(
            batches
                .iter()
                .all(|(x, y)| x.dim() == (3, 8, 8, 2) && y.dim() == (3, 8, 8, 2))
        );
    }

    #[test]
    fn undersampling_zeroes_lines_but_keeps_dc() {
        let mut generator = KspaceGenerator::new(
            images(),
            &config("undersample", "0.5", "FREQ", "FREQ"),
            Split::Train,
        );
        assert_eq!(generator.corrupted_lines(), 4);

        let (x, y) = generator.next().unwrap();

        for sample in 0..3 {
            let zeroed = (0..8).filter(|&row| row_energy(&x, sample, row) == 0.).count();
            assert_eq!(zeroed, 4);
            assert_eq!(row_energy(&x, sample, 0), row_energy(&y, sample, 0));
        }
    }

    #[test]
    fn motion_preserves_energy_per_line() {
        let mut generator = KspaceGenerator::new(
            images(),
            &config("motion", "0.5", "FREQ", "FREQ"),
            Split::Train,
        );

        let (x, y) = generator.next().unwrap();

        for sample in 0..3 {
            for row in 0..8 {
                let (a, b) = (row_energy(&x, sample, row), row_energy(&y, sample, row));
                assert!((a - b).abs() < 1e-3 * b.max(1.));
            }
        }
        assert_ne!(x, y);
    }

    #[test]
    fn image_target_is_the_clean_image() {
        let mut generator = KspaceGenerator::new(
            images(),
            &config("undersample", "0", "IMAGE", "IMAGE"),
            Split::Val,
        );

        let (x, y) = generator.next().unwrap();

        assert!(y.index_axis(Axis(3), 1).iter().all(|&v| v == 0.));
        assert!(y.iter().all(|&v| (0. ..=1.).contains(&v)));
        assert!((&x - &y).iter().all(|v| v.abs() < 1e-4));
    }

    #[test]
    fn seeded_splits_are_reproducible_and_distinct() {
        let config = config("motion", "0.25", "FREQ", "IMAGE");
        let first = KspaceGenerator::new(images(), &config, Split::Train).next().unwrap();
        let again = KspaceGenerator::new(images(), &config, Split::Train).next().unwrap();
        let val = KspaceGenerator::new(images(), &config, Split::Val).next().unwrap();

        assert_eq!(first, again);
        assert_ne!(first, val);
    }

    #[test]
    fn signed_frequencies_wrap_around() {
        let freqs: Vec<_> = (0..5).map(|i| signed_frequency(i, 5)).collect();

        assert_eq!(freqs, [0., 1., 2., -2., -1.]);
        assert_eq!(signed_frequency(4, 8), -4.);
    }
}
