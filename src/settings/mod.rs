//! Loading and validation of settings.
//!
//! Values defined in the configuration file can be overridden by environment variables with the
//! prefix `FEDSIM`, e.g. `FEDSIM_FEDERATION__SEED=3`. An example configuration file can be found
//! in the `configs/` directory located in the repository root.

pub mod schedule;

use std::{
    fmt,
    path::{Path, PathBuf},
};

use config::{Config, ConfigError, Environment};
use serde::{
    de::{self, Deserializer, Visitor},
    Deserialize,
};
use thiserror::Error;
use tracing_subscriber::filter::EnvFilter;
use validator::{Validate, ValidationError, ValidationErrors};

pub use self::schedule::{preset, RoundSchedule, Tier};
use crate::{model::TrainingParams, participant::DataSet};

#[derive(Error, Debug)]
/// An error related to loading and validation of settings.
pub enum SettingsError {
    #[error("configuration loading failed: {0}")]
    Loading(#[from] ConfigError),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

#[derive(Debug, Validate, Deserialize)]
/// The combined settings.
///
/// Each section in the configuration file corresponds to the identically named settings field.
/// All sections but `federation` are optional.
pub struct Settings {
    #[validate]
    pub federation: FederationSettings,
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub metrics: MetricsSettings,
    #[serde(default)]
    pub checkpoint: CheckpointSettings,
    #[serde(default)]
    #[validate]
    pub gpustat: GpuStatSettings,
    #[serde(default)]
    pub log: LoggingSettings,
}

impl Settings {
    /// Loads and validates the settings via a configuration file.
    ///
    /// # Errors
    /// Fails when the loading of the configuration file or its validation failed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let settings: Settings = Self::load(path)?;
        settings.validate()?;
        Ok(settings)
    }

    fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("fedsim")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Validate, Deserialize, Clone)]
#[validate(schema(function = "validate_federation"))]
/// The simulation settings.
pub struct FederationSettings {
    /// The name of the dataset, e.g. `femnist`.
    pub dataset: String,

    /// The name of the model, which must be registered for the dataset.
    pub model: String,

    /// The preset tier which fills in the round schedule values that aren't set explicitly.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [federation]
    /// tier = "small"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// FEDSIM_FEDERATION__TIER=small
    /// ```
    #[serde(default)]
    pub tier: Tier,

    /// The number of rounds.
    pub num_rounds: Option<u64>,

    /// Evaluates every `eval_every` rounds and after the last round.
    #[validate(range(min = 1))]
    pub eval_every: Option<u64>,

    /// The number of participants selected per round.
    pub clients_per_round: Option<usize>,

    /// The seed of the participant selection and of all model randomness.
    #[serde(default)]
    pub seed: u64,

    /// The number of local epochs.
    #[serde(default = "default_num_epochs")]
    pub num_epochs: u32,

    /// The local batch size.
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1))]
    pub batch_size: usize,

    /// Trains a single pass over this fraction of the local samples instead of whole epochs.
    /// The value must be in `(0, 1]`.
    pub minibatch: Option<f64>,

    /// Overrides the default learning rate of the model.
    pub lr: Option<f64>,

    /// Evaluates on the validation instead of the test data.
    #[serde(default)]
    pub use_val_set: bool,

    /// Evaluates all participants instead of the selected ones.
    #[serde(default)]
    pub test_all: bool,
}

fn default_num_epochs() -> u32 {
    1
}

fn default_batch_size() -> usize {
    10
}

impl FederationSettings {
    /// Gets the round schedule, filling in missing values from the dataset preset.
    ///
    /// Returns `None` if a value is neither set nor available from a preset.
    pub fn schedule(&self) -> Option<RoundSchedule> {
        let preset = preset(&self.dataset, self.tier);
        Some(RoundSchedule {
            num_rounds: self.num_rounds.or_else(|| Some(preset?.num_rounds))?,
            eval_every: self.eval_every.or_else(|| Some(preset?.eval_every))?,
            clients_per_round: self
                .clients_per_round
                .or_else(|| Some(preset?.clients_per_round))?,
        })
    }

    /// Gets the local training parameters.
    pub fn training(&self) -> TrainingParams {
        TrainingParams {
            num_epochs: self.num_epochs,
            batch_size: self.batch_size,
            minibatch: self.minibatch,
        }
    }

    /// Gets the held-out data set.
    pub fn eval_set(&self) -> DataSet {
        DataSet::eval(self.use_val_set)
    }

    /// Checks the federation settings.
    fn validate_federation(&self) -> Result<(), ValidationError> {
        self.validate_schedule()?;
        self.validate_minibatch()?;
        self.validate_lr()
    }

    fn validate_schedule(&self) -> Result<(), ValidationError> {
        match self.schedule() {
            Some(schedule) if schedule.eval_every >= 1 => Ok(()),
            Some(_) => Err(ValidationError::new("invalid evaluation frequency")),
            None => Err(ValidationError::new("incomplete round schedule")),
        }
    }

    fn validate_minibatch(&self) -> Result<(), ValidationError> {
        match self.minibatch {
            Some(fraction) if !(0. < fraction && fraction <= 1.) => {
                Err(ValidationError::new("invalid minibatch fraction"))
            }
            _ => Ok(()),
        }
    }

    fn validate_lr(&self) -> Result<(), ValidationError> {
        match self.lr {
            Some(lr) if !(lr.is_finite() && lr > 0.) => {
                Err(ValidationError::new("invalid learning rate"))
            }
            _ => Ok(()),
        }
    }
}

/// A wrapper for validate derive.
fn validate_federation(s: &FederationSettings) -> Result<(), ValidationError> {
    s.validate_federation()
}

#[derive(Debug, Default, Deserialize, Clone)]
/// The data settings.
pub struct DataSettings {
    /// The directory holding the `train`, `test` and `val` partitions.
    ///
    /// Defaults to `../data/<dataset>/data`.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [data]
    /// dir = "data/femnist"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// FEDSIM_DATA__DIR=data/femnist
    /// ```
    pub dir: Option<PathBuf>,
}

impl DataSettings {
    /// Gets the training and the evaluation data directory.
    pub fn partition_dirs(&self, dataset: &str, eval_set: DataSet) -> (PathBuf, PathBuf) {
        let dir = self.dir.clone().unwrap_or_else(|| {
            Path::new("..").join("data").join(dataset).join("data")
        });
        (
            dir.join(DataSet::Train.to_string()),
            dir.join(eval_set.to_string()),
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
/// The metrics log settings.
pub struct MetricsSettings {
    /// The directory of the logs.
    #[serde(default = "default_metrics_dir")]
    pub dir: PathBuf,
    /// The base name of the logs, which are suffixed with `_stat` and `_sys`.
    #[serde(default = "default_metrics_name")]
    pub name: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            dir: default_metrics_dir(),
            name: default_metrics_name(),
        }
    }
}

fn default_metrics_dir() -> PathBuf {
    PathBuf::from("metrics")
}

fn default_metrics_name() -> String {
    "metrics".to_string()
}

#[derive(Debug, Deserialize, Clone)]
/// The checkpoint settings.
pub struct CheckpointSettings {
    /// The directory of the checkpoints. A model is saved to `<dir>/<dataset>/<model>.ckpt`.
    #[serde(default = "default_checkpoint_dir")]
    pub dir: PathBuf,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            dir: default_checkpoint_dir(),
        }
    }
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

#[derive(Debug, Validate, Deserialize, Clone)]
#[validate(schema(function = "validate_gpustat"))]
/// The GPU sampling settings.
pub struct GpuStatSettings {
    /// Samples the GPUs during the simulation.
    #[serde(default)]
    pub enable: bool,
    /// The monitor program.
    #[serde(default = "default_gpustat_program")]
    pub program: String,
    /// Additional arguments of the monitor.
    #[serde(default)]
    pub args: Vec<String>,
    /// The sampling interval in minutes. Must amount to at least one second.
    #[serde(default = "default_gpustat_interval")]
    pub interval: f64,
}

impl Default for GpuStatSettings {
    fn default() -> Self {
        Self {
            enable: false,
            program: default_gpustat_program(),
            args: Vec::new(),
            interval: default_gpustat_interval(),
        }
    }
}

fn default_gpustat_program() -> String {
    crate::gpustat::DEFAULT_PROGRAM.to_string()
}

fn default_gpustat_interval() -> f64 {
    1.
}

/// A wrapper for validate derive.
fn validate_gpustat(s: &GpuStatSettings) -> Result<(), ValidationError> {
    if s.interval.is_finite() && s.interval * 60. >= 1. {
        Ok(())
    } else {
        Err(ValidationError::new("invalid sampling interval"))
    }
}

#[derive(Debug, Deserialize)]
/// The logging settings.
pub struct LoggingSettings {
    /// A comma-separated list of logging directives. More information about logging directives
    /// can be found [here].
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [log]
    /// filter = "info"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// FEDSIM_LOG__FILTER=info
    /// ```
    ///
    /// [here]: https://docs.rs/tracing-subscriber/0.3.15/tracing_subscriber/filter/struct.EnvFilter.html#directives
    #[serde(deserialize_with = "deserialize_env_filter")]
    pub filter: EnvFilter,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: EnvFilter::new("info"),
        }
    }
}

fn deserialize_env_filter<'de, D>(deserializer: D) -> Result<EnvFilter, D::Error>
where
    D: Deserializer<'de>,
{
    struct EnvFilterVisitor;

    impl<'de> Visitor<'de> for EnvFilterVisitor {
        type Value = EnvFilter;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "a valid tracing filter directive")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            EnvFilter::try_new(value)
                .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(value), &self))
        }
    }

    deserializer.deserialize_str(EnvFilterVisitor)
}
