mod conv;
mod interlacer;
mod layer;
mod residual;

pub use conv::Conv2d;
pub use interlacer::Interlacer;
pub use layer::Layer;
pub use residual::Residual;
