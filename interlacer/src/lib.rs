pub mod cli;
pub mod config;
pub mod data;
pub mod device;
pub mod error;
pub mod losses;
pub mod models;
pub mod run;
pub mod train;

pub use cli::TrainArgs;
pub use device::DeviceContext;
pub use error::{ConfigError, DataLoadError, Result, TrainError};
pub use run::{RunContext, RunGuard};
pub use train::{Launch, fit_options, prepare};
