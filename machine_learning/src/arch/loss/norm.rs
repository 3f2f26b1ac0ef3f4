use ndarray::{Array, ArrayView, Dimension, Zip};

/// The distance used to compare a prediction with its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Norm {
    /// Mean absolute error.
    L1,
    /// Mean squared error.
    L2,
}

impl Norm {
    pub fn name(self) -> &'static str {
        match self {
            Norm::L1 => "l1",
            Norm::L2 => "l2",
        }
    }

    pub fn loss<D: Dimension>(self, y_pred: ArrayView<f32, D>, y: ArrayView<f32, D>) -> f32 {
        let n = y_pred.len().max(1) as f32;

        let total = Zip::from(&y_pred).and(&y).fold(0., |acc, &p, &t| {
            let e = p - t;
            acc + match self {
                Norm::L1 => e.abs(),
                Norm::L2 => e * e,
            }
        });

        total / n
    }

    pub fn loss_prime<D: Dimension>(
        self,
        y_pred: ArrayView<f32, D>,
        y: ArrayView<f32, D>,
    ) -> Array<f32, D> {
        let n = y_pred.len().max(1) as f32;

        Zip::from(&y_pred).and(&y).map_collect(|&p, &t| {
            let e = p - t;
            match self {
                Norm::L1 if e == 0. => 0.,
                Norm::L1 => e.signum() / n,
                Norm::L2 => 2. * e / n,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn l1_is_the_mean_absolute_error() {
        let p = array![1., -2., 3., 0.];
        let t = array![0., 0., 0., 0.];

        assert_eq!(Norm::L1.loss(p.view(), t.view()), 1.5);
        assert_eq!(
            Norm::L1.loss_prime(p.view(), t.view()),
            array![0.25_f32, -0.25, 0.25, 0.]
        );
    }

    #[test]
    fn l2_is_the_mean_squared_error() {
        let p = array![1., -2., 3., 0.];
        let t = array![1., 0., 1., 0.];

        assert_eq!(Norm::L2.loss(p.view(), t.view()), 2.);
        assert_eq!(
            Norm::L2.loss_prime(p.view(), t.view()),
            array![0_f32, -1., 1., 0.]
        );
    }
}
