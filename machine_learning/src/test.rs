#![cfg(test)]

use std::{iter, num::NonZeroUsize};

use ndarray::{Array, Array4};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    arch::{
        Domain, Fourier, Model, Sequential,
        activations::ActFn,
        layers::Layer,
        loss::{DomainLoss, LossFn, Norm},
    },
    optimization::Adam,
    training::{FitOptions, Trainer},
};

fn kspace_batch(b: usize, n: usize) -> Array4<f32> {
    let images = Array::from_shape_fn((b, n, n, 2), |(b, i, j, c)| match c {
        0 => ((b + 1) as f32 * 0.3 + i as f32 * 0.2 - j as f32 * 0.1).sin(),
        _ => 0.,
    });

    Fourier::new(n, n).fft2(images.view()).unwrap()
}

fn interlaced_net() -> Sequential {
    Sequential::new([Layer::residual([
        Layer::interlacer(Domain::Freq, 2, 4, 3, Some(ActFn::tanh())),
        Layer::conv(4, 2, 1, None),
    ])])
}

#[test]
fn interlaced_net_gradient_matches_finite_differences() {
    let mut model = interlaced_net();
    let loss_fn = DomainLoss::image(Domain::Freq, Norm::L2);
    let params = model.init_params(&mut StdRng::seed_from_u64(7)).unwrap();

    let x = kspace_batch(2, 4);
    let y = &x * 0.5;

    let y_pred = model.forward(&params, x.view()).unwrap();
    let d = loss_fn.loss_prime(y_pred.view(), y.view()).unwrap();
    let mut grad = vec![0.; model.size()];
    model.backward(&params, &mut grad, d).unwrap();

    let mut loss_at = |params: &[f32]| {
        let y_pred = model.forward(params, x.view()).unwrap();
        loss_fn.loss(y_pred.view(), y.view()).unwrap()
    };

    let eps = 1e-2;
    for i in (0..params.len()).step_by(7) {
        let mut plus = params.clone();
        let mut minus = params.clone();
        plus[i] += eps;
        minus[i] -= eps;

        let numeric = (loss_at(&plus) - loss_at(&minus)) / (2. * eps);
        let tolerance = 1e-2 + 0.05 * numeric.abs();
        assert!(
            (numeric - grad[i]).abs() < tolerance,
            "param {i}: numeric {numeric}, analytic {}",
            grad[i]
        );
    }
}

#[test]
fn interlacer_learns_to_scale_the_image() {
    let model = Sequential::new([Layer::interlacer(Domain::Freq, 2, 2, 1, None)]);
    let params = model.init_params(&mut StdRng::seed_from_u64(3)).unwrap();
    let mut trainer = Trainer::compile(
        model,
        params,
        Adam::new(5e-2),
        Box::new(DomainLoss::image(Domain::Freq, Norm::L2)),
        vec![Box::new(DomainLoss::fourier(Domain::Freq, Norm::L1))],
    )
    .unwrap();

    let x = kspace_batch(4, 4);
    let y = &x * 0.5;
    let mut batches = iter::repeat((x, y));
    let options = FitOptions {
        epochs: NonZeroUsize::new(30).unwrap(),
        steps_per_epoch: NonZeroUsize::new(10).unwrap(),
        validation_steps: 1,
    };

    let history = trainer
        .fit(&mut batches.clone(), &mut batches, options, &mut [])
        .unwrap();

    let first = history[0].val_loss.unwrap();
    let last = history[29].val_loss.unwrap();
    assert!(last < 0.1 * first, "val_loss went from {first} to {last}");
    assert!(history[29].val_metrics.contains_key("fourier_l1"));
}
