use std::{
    fs::OpenOptions,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::Serialize;

use super::{Callback, EpochLogs};
use crate::Result;

const EVENTS_FILE: &str = "events.jsonl";

#[derive(Serialize)]
struct Event<'a> {
    wall_time: f64,
    /// The L2 norm of the parameters at the end of the epoch.
    param_norm: f32,
    #[serde(flatten)]
    logs: &'a EpochLogs,
}

/// Appends the scalars of every epoch, plus the parameter norm, as a JSON line to `events.jsonl` inside a log directory.
#[derive(Debug)]
pub struct EventLogger {
    path: PathBuf,
}

impl EventLogger {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            path: dir.as_ref().join(EVENTS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Callback for EventLogger {
    fn on_epoch_end(&mut self, logs: &EpochLogs, params: &[f32]) -> Result<()> {
        let wall_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        let param_norm = params.iter().map(|p| p * p).sum::<f32>().sqrt();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);

        let event = Event {
            wall_time,
            param_norm,
            logs,
        };
        serde_json::to_writer(&mut writer, &event)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}
