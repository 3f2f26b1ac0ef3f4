use std::{env, fmt, num::NonZeroUsize, thread};

use log::info;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Result, TrainError};

/// Overrides the amount of compute threads.
pub const THREADS_ENV: &str = "INTERLACER_THREADS";

/// A compute device. Training only ever uses the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu(i) => write!(f, "cpu:{i}"),
        }
    }
}

/// The compute context a run executes in, set up once by the process.
#[derive(Debug)]
pub struct DeviceContext {
    device: Device,
    pool: ThreadPool,
}

impl DeviceContext {
    /// Picks the device and sizes the thread pool from `INTERLACER_THREADS`, falling back to the
    /// available parallelism.
    pub fn init() -> Result<Self> {
        let threads = match env::var(THREADS_ENV) {
            Ok(value) => parse_threads(&value)?,
            Err(_) => thread::available_parallelism().map_or(1, NonZeroUsize::get),
        };

        Self::with_threads(threads)
    }

    pub fn with_threads(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("interlacer-compute-{i}"))
            .build()
            .map_err(|e| TrainError::Device(e.to_string()))?;

        let device = Device::Cpu(0);
        info!("using {device} with {} compute thread(s)", pool.current_num_threads());

        Ok(Self { device, pool })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `op` with every parallel kernel scheduled on this context's threads.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

fn parse_threads(value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<NonZeroUsize>()
        .map(NonZeroUsize::get)
        .map_err(|e| TrainError::Device(format!("{THREADS_ENV}={value:?}: {e}")))
}
