use std::{fmt, fs, num::NonZeroUsize, path::Path};

use machine_learning::arch::{Domain, activations::ActFn, loss::Norm};

use super::Ini;
use crate::error::ConfigError;

const DATA: &str = "DATA";
const MODEL: &str = "MODEL";
const TRAINING: &str = "TRAINING";

const DEFAULT_LEARNING_RATE: f32 = 1e-3;

/// Keys joined into the job name when the config doesn't name the job.
const JOB_NAME_KEYS: [(&str, &str); 14] = [
    (DATA, "dataset"),
    (DATA, "task"),
    (DATA, "input_domain"),
    (DATA, "output_domain"),
    (DATA, "corruption_frac"),
    (MODEL, "architecture"),
    (MODEL, "nonlinearity"),
    (MODEL, "kernel_size"),
    (MODEL, "num_features"),
    (MODEL, "num_layers"),
    (TRAINING, "loss_type"),
    (TRAINING, "loss"),
    (TRAINING, "num_epochs"),
    (DATA, "batch_size"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Mri,
    Mnist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Drop whole k-space lines.
    Undersample,
    /// Shift the phase of whole k-space lines as if the subject moved while they were acquired.
    Motion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Conv,
    ConvResidual,
    InterlacerResidual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nonlinearity {
    Relu,
    Sigmoid,
    Tanh,
    Linear,
}

impl Nonlinearity {
    /// The activation this nonlinearity stands for, `None` for the identity.
    pub fn act_fn(self) -> Option<ActFn> {
        match self {
            Self::Relu => Some(ActFn::relu()),
            Self::Sigmoid => Some(ActFn::sigmoid(1.)),
            Self::Tanh => Some(ActFn::tanh()),
            Self::Linear => None,
        }
    }
}

/// Which domain the training loss compares prediction and target in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossType {
    Image,
    Freq,
}

/// A value that can be read from a config entry.
trait ConfigValue: Sized {
    fn parse_value(key: &'static str, value: &str) -> Result<Self, ConfigError>;
}

/// Maps the accepted spellings of a value to their variants.
fn lookup<T: Copy>(
    table: &[(&str, T)],
    key: &'static str,
    value: &str,
) -> Result<T, ConfigError> {
    table
        .iter()
        .find(|(name, _)| *name == value)
        .map(|&(_, v)| v)
        .ok_or_else(|| {
            let expected: Vec<_> = table.iter().map(|(name, _)| *name).collect();
            ConfigError::invalid(key, value, format!("expected one of {}", expected.join(", ")))
        })
}

impl ConfigValue for Dataset {
    fn parse_value(key: &'static str, value: &str) -> Result<Self, ConfigError> {
        lookup(&[("MRI", Self::Mri), ("MNIST", Self::Mnist)], key, value)
    }
}

impl ConfigValue for Task {
    fn parse_value(key: &'static str, value: &str) -> Result<Self, ConfigError> {
        lookup(
            &[("undersample", Self::Undersample), ("motion", Self::Motion)],
            key,
            value,
        )
    }
}

impl ConfigValue for Domain {
    fn parse_value(key: &'static str, value: &str) -> Result<Self, ConfigError> {
        lookup(&[("FREQ", Self::Freq), ("IMAGE", Self::Image)], key, value)
    }
}

impl ConfigValue for Architecture {
    fn parse_value(_key: &'static str, value: &str) -> Result<Self, ConfigError> {
        match value {
            "CONV" => Ok(Self::Conv),
            "CONV_RESIDUAL" => Ok(Self::ConvResidual),
            "INTERLACER_RESIDUAL" => Ok(Self::InterlacerResidual),
            other => Err(ConfigError::UnknownArchitecture(other.to_string())),
        }
    }
}

impl ConfigValue for Nonlinearity {
    fn parse_value(key: &'static str, value: &str) -> Result<Self, ConfigError> {
        lookup(
            &[
                ("relu", Self::Relu),
                ("sigmoid", Self::Sigmoid),
                ("tanh", Self::Tanh),
                ("linear", Self::Linear),
            ],
            key,
            value,
        )
    }
}

impl ConfigValue for LossType {
    fn parse_value(_key: &'static str, value: &str) -> Result<Self, ConfigError> {
        match value {
            "image" => Ok(Self::Image),
            "freq" => Ok(Self::Freq),
            other => Err(ConfigError::UnrecognizedLossType(other.to_string())),
        }
    }
}

impl ConfigValue for Norm {
    fn parse_value(key: &'static str, value: &str) -> Result<Self, ConfigError> {
        lookup(&[("L1", Self::L1), ("L2", Self::L2)], key, value)
    }
}

macro_rules! numeric_config_value {
    ($($t:ty),*) => {
        $(
            impl ConfigValue for $t {
                fn parse_value(key: &'static str, value: &str) -> Result<Self, ConfigError> {
                    value
                        .parse()
                        .map_err(|e| ConfigError::invalid(key, value, format!("{e}")))
                }
            }
        )*
    };
}

numeric_config_value!(f32, u64, usize, NonZeroUsize);

impl fmt::Display for LossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Image => "image",
            Self::Freq => "freq",
        })
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Conv => "CONV",
            Self::ConvResidual => "CONV_RESIDUAL",
            Self::InterlacerResidual => "INTERLACER_RESIDUAL",
        })
    }
}

/// An experiment, as described by its `.ini` file.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub dataset: Dataset,
    pub task: Task,
    pub input_domain: Domain,
    pub output_domain: Domain,
    pub corruption_frac: f32,
    pub batch_size: NonZeroUsize,

    pub architecture: Architecture,
    pub nonlinearity: Nonlinearity,
    pub kernel_size: usize,
    pub num_features: NonZeroUsize,
    pub num_layers: NonZeroUsize,

    pub loss_type: LossType,
    pub loss: Norm,
    pub num_epochs: NonZeroUsize,
    pub job_name: String,
    pub learning_rate: f32,
    pub seed: Option<u64>,
}

impl TrainingConfig {
    /// Reads and validates the config at `path`.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::parse(text)?;

        let config = Self {
            dataset: parse(&ini, DATA, "dataset")?,
            task: parse(&ini, DATA, "task")?,
            input_domain: parse(&ini, DATA, "input_domain")?,
            output_domain: parse(&ini, DATA, "output_domain")?,
            corruption_frac: parse(&ini, DATA, "corruption_frac")?,
            batch_size: parse(&ini, DATA, "batch_size")?,

            architecture: parse(&ini, MODEL, "architecture")?,
            nonlinearity: parse(&ini, MODEL, "nonlinearity")?,
            kernel_size: parse(&ini, MODEL, "kernel_size")?,
            num_features: parse(&ini, MODEL, "num_features")?,
            num_layers: parse(&ini, MODEL, "num_layers")?,

            loss_type: parse(&ini, TRAINING, "loss_type")?,
            loss: parse(&ini, TRAINING, "loss")?,
            num_epochs: parse(&ini, TRAINING, "num_epochs")?,
            job_name: match ini.get(TRAINING, "job_name") {
                Some(name) => name.to_string(),
                None => JOB_NAME_KEYS
                    .iter()
                    .map(|&(section, key)| ini.require(section, key))
                    .collect::<Result<Vec<_>, _>>()?
                    .join("-"),
            },
            learning_rate: parse_opt(&ini, TRAINING, "learning_rate")?
                .unwrap_or(DEFAULT_LEARNING_RATE),
            seed: parse_opt(&ini, TRAINING, "seed")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.corruption_frac) {
            return Err(ConfigError::invalid(
                "corruption_frac",
                self.corruption_frac,
                "must lie in [0, 1]",
            ));
        }

        if self.kernel_size % 2 == 0 {
            return Err(ConfigError::invalid(
                "kernel_size",
                self.kernel_size,
                "must be odd",
            ));
        }

        if self.architecture == Architecture::InterlacerResidual && self.num_features.get() % 2 != 0
        {
            return Err(ConfigError::invalid(
                "num_features",
                self.num_features,
                "interlacer layers need an even amount of features",
            ));
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.) {
            return Err(ConfigError::invalid(
                "learning_rate",
                self.learning_rate,
                "must be positive",
            ));
        }

        if self.job_name.is_empty() {
            return Err(ConfigError::invalid("job_name", "", "must not be empty"));
        }

        Ok(())
    }
}

fn parse<T: ConfigValue>(
    ini: &Ini,
    section: &'static str,
    key: &'static str,
) -> Result<T, ConfigError> {
    T::parse_value(key, ini.require(section, key)?)
}

fn parse_opt<T: ConfigValue>(
    ini: &Ini,
    section: &'static str,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    ini.get(section, key)
        .map(|value| T::parse_value(key, value))
        .transpose()
}
