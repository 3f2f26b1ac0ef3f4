mod callback;
mod checkpoint;
mod event_log;
mod logs;
mod trainer;

pub use callback::Callback;
pub use checkpoint::{ModelCheckpoint, load_checkpoint, save_checkpoint};
pub use event_log::EventLogger;
pub use logs::{EpochLogs, History};
pub use trainer::{Batch, FitOptions, StopHandle, Trainer};
