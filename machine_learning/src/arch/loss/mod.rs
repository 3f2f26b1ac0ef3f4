mod domain;
mod loss_fn;
mod norm;

pub use domain::DomainLoss;
pub use loss_fn::LossFn;
pub use norm::Norm;
