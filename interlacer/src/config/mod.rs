mod ini;
mod training;

pub use ini::Ini;
pub use training::{Architecture, Dataset, LossType, Nonlinearity, Task, TrainingConfig};
