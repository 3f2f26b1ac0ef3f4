use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{info, warn};
use rand::Rng;

use crate::error::{Result, TrainError};

pub const DEBUG_JOB_PREFIX: &str = "debug_job";
pub const SUFFIX_SEPARATOR: char = '*';
pub const SUMMARY_FILE: &str = "summary.txt";
pub const TENSORBOARD_DIR: &str = "tensorboard";

/// Derives the name a run is stored under.
///
/// Debug runs throw away `base` and get a throwaway `debug_job<digit>` name, a `suffix` is
/// appended after a literal `*`.
pub fn job_name<R: Rng + ?Sized>(
    base: &str,
    debug: bool,
    suffix: Option<&str>,
    rng: &mut R,
) -> String {
    let mut name = if debug {
        format!("{DEBUG_JOB_PREFIX}{}", rng.random_range(0..10))
    } else {
        base.to_string()
    };

    if let Some(suffix) = suffix {
        name.push(SUFFIX_SEPARATOR);
        name.push_str(suffix);
    }

    name
}

/// The directory a run lives in: `root/[experiment/]job_name`, debug runs never go under an
/// experiment.
pub fn run_dir(root: &Path, experiment: Option<&str>, debug: bool, job_name: &str) -> PathBuf {
    match experiment {
        Some(experiment) if !debug => root.join(experiment).join(job_name),
        _ => root.join(job_name),
    }
}

/// Creates the checkpoint directory and its parents, it's fine if it already exists.
pub fn create_checkpoint_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Creates the tensorboard directory under `checkpoint_dir`, refusing to reuse an existing one.
pub fn create_tensorboard_dir(checkpoint_dir: &Path) -> Result<PathBuf> {
    let dir = checkpoint_dir.join(TENSORBOARD_DIR);

    match fs::create_dir(&dir) {
        Ok(()) => Ok(dir),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(TrainError::RunExists(dir)),
        Err(e) => Err(e.into()),
    }
}

/// Removes a debug run's directory tree once it goes out of scope.
///
/// Cleanup is best effort, failures are only logged.
#[derive(Debug)]
#[must_use = "dropping the guard removes a debug run right away"]
pub struct RunGuard {
    dir: PathBuf,
    armed: bool,
}

impl RunGuard {
    pub fn new(dir: PathBuf, debug: bool) -> Self {
        Self { dir, armed: debug }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        match fs::remove_dir_all(&self.dir) {
            Ok(()) => info!("deleted temp debug logs at {}", self.dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to delete {}: {e}", self.dir.display()),
        }
    }
}

/// Where everything a run produces is stored.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub job_name: String,
    pub checkpoint_dir: PathBuf,
    pub tensorboard_dir: PathBuf,
    pub summary_path: PathBuf,
}

impl RunContext {
    /// Lays out a fresh run directory.
    ///
    /// In order: creates the checkpoint directory, copies the config into it as
    /// `<job_name>_config.ini`, writes the model summary and creates the tensorboard directory.
    /// The guard is armed as soon as the checkpoint directory exists, so a failing debug setup
    /// still cleans after itself.
    ///
    /// # Arguments
    /// * `root` - The training directory every run is stored under.
    /// * `experiment` - An optional grouping directory, ignored for debug runs.
    /// * `debug` - Whether the run directory is temporary.
    /// * `job_name` - The run's name, see `job_name`.
    /// * `config_path` - The config file the run was launched with.
    /// * `summary` - The text of the model summary.
    ///
    /// # Errors
    /// `TrainError::RunExists` if the run's tensorboard directory is already there.
    pub fn create(
        root: &Path,
        experiment: Option<&str>,
        debug: bool,
        job_name: &str,
        config_path: &Path,
        summary: &str,
    ) -> Result<(Self, RunGuard)> {
        let checkpoint_dir = run_dir(root, experiment, debug, job_name);
        create_checkpoint_dir(&checkpoint_dir)?;
        let guard = RunGuard::new(checkpoint_dir.clone(), debug);
        info!("set up checkpointing in {}", checkpoint_dir.display());

        fs::copy(
            config_path,
            checkpoint_dir.join(format!("{job_name}_config.ini")),
        )?;

        let summary_path = checkpoint_dir.join(SUMMARY_FILE);
        fs::write(&summary_path, summary)?;

        let tensorboard_dir = create_tensorboard_dir(&checkpoint_dir)?;

        let context = Self {
            job_name: job_name.to_string(),
            checkpoint_dir,
            tensorboard_dir,
            summary_path,
        };

        Ok((context, guard))
    }
}
