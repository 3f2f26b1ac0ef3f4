use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use machine_learning::MlErr;

/// The result type used across the launcher.
pub type Result<T> = std::result::Result<T, TrainError>;

/// Problems with the experiment configuration, all caught before anything touches the disk.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Syntax {
        line: usize,
        msg: String,
    },
    MissingKey {
        section: &'static str,
        key: &'static str,
    },
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    UnknownArchitecture(String),
    UnrecognizedLossType(String),
}

impl ConfigError {
    pub(crate) fn invalid<V: fmt::Display, R: Into<String>>(
        key: &'static str,
        value: V,
        reason: R,
    ) -> Self {
        Self::InvalidValue {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "reading {}: {source}", path.display()),
            Self::Syntax { line, msg } => write!(f, "line {line}: {msg}"),
            Self::MissingKey { section, key } => write!(f, "missing key [{section}] {key}"),
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value {value:?} for {key}: {reason}")
            }
            Self::UnknownArchitecture(name) => write!(f, "unknown architecture {name:?}"),
            Self::UnrecognizedLossType(name) => write!(f, "unrecognized loss type {name:?}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Problems reading the image arrays a dataset is made of.
#[derive(Debug)]
pub enum DataLoadError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Malformed {
        path: PathBuf,
        reason: String,
    },
    NotSquare {
        height: usize,
        width: usize,
    },
    SideMismatch {
        train: usize,
        val: usize,
    },
    Empty {
        split: &'static str,
    },
}

impl DataLoadError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed<R: Into<String>>(path: &Path, reason: R) -> Self {
        Self::Malformed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DataLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "reading {}: {source}", path.display()),
            Self::Malformed { path, reason } => {
                write!(f, "malformed dataset file {}: {reason}", path.display())
            }
            Self::NotSquare { height, width } => {
                write!(f, "images must be square, got {height}x{width}")
            }
            Self::SideMismatch { train, val } => write!(
                f,
                "train images are {train} pixels wide but validation images are {val}"
            ),
            Self::Empty { split } => write!(f, "the {split} split holds no images"),
        }
    }
}

impl std::error::Error for DataLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// All errors that can stop a training launch.
#[derive(Debug)]
pub enum TrainError {
    /// Bad command line arguments, nothing was done.
    Usage(String),
    Config(ConfigError),
    DataLoad(DataLoadError),
    /// The run's tensorboard directory is already there, refuse to clobber it.
    RunExists(PathBuf),
    /// The compute context couldn't be set up.
    Device(String),
    /// The framework failed while building or fitting the model.
    Training(MlErr),
    Io(io::Error),
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(msg) => write!(f, "usage error: {msg}"),
            Self::Config(e) => write!(f, "config error: {e}"),
            Self::DataLoad(e) => write!(f, "data load error: {e}"),
            Self::RunExists(path) => write!(
                f,
                "tensorboard logs have already been created under {}",
                path.display()
            ),
            Self::Device(msg) => write!(f, "device error: {msg}"),
            Self::Training(e) => write!(f, "training failed: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for TrainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::DataLoad(e) => Some(e),
            Self::Training(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for TrainError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<DataLoadError> for TrainError {
    fn from(e: DataLoadError) -> Self {
        Self::DataLoad(e)
    }
}

impl From<MlErr> for TrainError {
    fn from(e: MlErr) -> Self {
        Self::Training(e)
    }
}

impl From<io::Error> for TrainError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
