use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::{MlErr, Result};

/// Samples `n` weights using Kaiming normal initialization.
///
/// # Arguments
/// * `rng` - A random number generator.
/// * `n` - The amount of weights to sample.
/// * `fan_in` - The number of inputs feeding each output unit.
///
/// # Returns
/// An error if the calculated standard deviation is not finite.
pub fn kaiming<R: Rng + ?Sized>(rng: &mut R, n: usize, fan_in: usize) -> Result<Vec<f32>> {
    let std_dev = (2. / fan_in.max(1) as f32).sqrt();
    let normal =
        Normal::new(0., std_dev).map_err(|e| MlErr::InvalidDistribution(e.to_string()))?;

    Ok((0..n).map(|_| normal.sample(rng)).collect())
}
