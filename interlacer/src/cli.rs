use std::path::PathBuf;

use clap::Parser;

use crate::error::{Result, TrainError};

/// Train a Fourier-domain neural network to correct corrupted k-space data.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct TrainArgs {
    /// Path to the .ini experiment config.
    pub config: PathBuf,
    /// Groups this run under an experiment directory.
    #[arg(long)]
    pub experiment: Option<String>,
    /// Descriptive suffix appended to the job name.
    #[arg(long)]
    pub suffix: Option<String>,
    /// Run a tiny smoke test and delete its logs on exit.
    #[arg(long, default_value_t = false)]
    pub debug: bool,
    /// Directory every run is stored under.
    #[arg(long, env = "INTERLACER_TRAIN_DIR", default_value = "training")]
    pub train_dir: PathBuf,
    /// Directory the datasets are read from.
    #[arg(long, env = "INTERLACER_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,
}

impl TrainArgs {
    /// Checks the arguments before anything is read.
    pub fn validate(&self) -> Result<()> {
        if !self.config.is_file() {
            return Err(TrainError::Usage(format!(
                "config {} is not a file",
                self.config.display()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_full_command_line() {
        let args = TrainArgs::try_parse_from([
            "train",
            "exp.ini",
            "--experiment",
            "loss_comparison_runs",
            "--suffix",
            "trial1",
            "--debug",
            "--train-dir",
            "/tmp/runs",
        ])
        .unwrap();

        assert_eq!(args.config, PathBuf::from("exp.ini"));
        assert_eq!(args.experiment.as_deref(), Some("loss_comparison_runs"));
        assert_eq!(args.suffix.as_deref(), Some("trial1"));
        assert!(args.debug);
        assert_eq!(args.train_dir, PathBuf::from("/tmp/runs"));
    }

    #[test]
    fn config_is_required() {
        assert!(TrainArgs::try_parse_from(["train", "--debug"]).is_err());
    }

    #[test]
    fn missing_config_file_is_a_usage_error() {
        let args = TrainArgs::try_parse_from(["train", "/definitely/not/here.ini"]).unwrap();

        assert!(matches!(args.validate(), Err(TrainError::Usage(_))));
    }
}
