pub mod activations;
pub mod fourier;
mod initialization;
pub mod layers;
pub mod loss;
mod model;
mod sequential;

pub use fourier::{Domain, Fourier, FourierCache};
pub use model::Model;
pub use sequential::Sequential;
