#[derive(Clone, Copy, Debug, Default)]
pub struct Sigmoid {
    amp: f32,
}

impl Sigmoid {
    pub fn new(amp: f32) -> Self {
        Self { amp }
    }

    pub fn f(&self, z: f32) -> f32 {
        self.amp * logistic(z)
    }

    pub fn df(&self, z: f32) -> f32 {
        let s = logistic(z);
        self.amp * s * (1. - s)
    }
}

/// Saturates to `0` or `1` instead of overflowing for large `|z|`.
fn logistic(z: f32) -> f32 {
    1. / (1. + (-z).exp())
}
