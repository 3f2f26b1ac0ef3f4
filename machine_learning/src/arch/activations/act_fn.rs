use super::{Relu, Sigmoid, Tanh};

/// The element-wise nonlinearities a layer can apply to its output.
#[derive(Clone, Copy, Debug)]
pub enum ActFn {
    Relu(Relu),
    Sigmoid(Sigmoid),
    Tanh(Tanh),
}

impl ActFn {
    pub fn relu() -> Self {
        Self::Relu(Relu)
    }

    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid(Sigmoid::new(amp))
    }

    pub fn tanh() -> Self {
        Self::Tanh(Tanh)
    }

    /// The short name used in model summaries.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Relu(_) => "relu",
            Self::Sigmoid(_) => "sigmoid",
            Self::Tanh(_) => "tanh",
        }
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Self::Relu(a) => a.f(x),
            Self::Sigmoid(a) => a.f(x),
            Self::Tanh(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Self::Relu(a) => a.df(x),
            Self::Sigmoid(a) => a.df(x),
            Self::Tanh(a) => a.df(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_df(act_fn: &ActFn, x: f32) -> f32 {
        const H: f32 = 1e-3;
        (act_fn.f(x + H) - act_fn.f(x - H)) / (2. * H)
    }

    #[test]
    fn derivatives_match_finite_differences() {
        for act_fn in [ActFn::relu(), ActFn::sigmoid(1.), ActFn::tanh()] {
            for x in [-2.0, -0.5, 0.3, 1.7] {
                let got = act_fn.df(x);
                let expected = numeric_df(&act_fn, x);
                assert!(
                    (got - expected).abs() < 1e-2,
                    "{}: df({x}) = {got}, expected {expected}",
                    act_fn.name()
                );
            }
        }
    }

    #[test]
    fn relu_clamps_negatives() {
        let relu = ActFn::relu();
        assert_eq!(relu.f(-3.), 0.);
        assert_eq!(relu.f(2.5), 2.5);
        assert_eq!(relu.df(-3.), 0.);
        assert_eq!(relu.df(2.5), 1.);
    }
}
