//! Models trained by the participants.
//!
//! The simulator itself is agnostic of the machine learning framework. A model only has to
//! implement [`ClientModel`], which exposes its parameters as a flat vector of `f64` weights
//! (a [`Model`]) and runs local training and evaluation on a [`Partition`].
//!
//! Models are resolved by dataset and model name from a [`ModelRegistry`].

pub mod aggregation;
pub mod majority;
pub mod registry;

use std::{collections::BTreeMap, mem, slice::Iter};

use derive_more::{From, Index, IndexMut, Into};
use rand::RngCore;
use serde::{Deserialize, Serialize};

pub use self::{
    aggregation::{Aggregation, AggregationError},
    majority::MajorityModel,
    registry::{ModelFactory, ModelParams, ModelRegistry, RegistryError},
};
use crate::participant::Partition;

/// The metric which every evaluation must report.
pub const ACCURACY_KEY: &str = "accuracy";

/// Errors raised by a [`ClientModel`].
pub type ModelError = anyhow::Error;

/// Metric values by metric name.
pub type MetricValues = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, From, Index, IndexMut, Into, Serialize, Deserialize)]
/// The parameters of a model as a flat vector of weights.
pub struct Model(Vec<f64>);

impl Model {
    /// Creates a model of `len` zero weights.
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.; len])
    }

    /// Gets the number of weights of this model.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Creates an iterator that yields references to the weights of this model.
    pub fn iter(&self) -> Iter<f64> {
        self.0.iter()
    }

    /// Gets the size of the weights in bytes.
    pub fn size_in_bytes(&self) -> u64 {
        (self.len() * mem::size_of::<f64>()) as u64
    }
}

impl AsRef<[f64]> for Model {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

/// The local training parameters of a round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    /// The number of passes over the training samples.
    pub num_epochs: u32,
    /// The number of samples per batch.
    pub batch_size: usize,
    /// If set, a single pass over this fraction of the training samples replaces the epochs.
    pub minibatch: Option<f64>,
}

impl TrainingParams {
    /// Gets the number of samples a minibatch pass runs over, `None` when training in epochs.
    pub fn minibatch_len(&self, num_samples: usize) -> Option<usize> {
        self.minibatch
            .map(|fraction| ((fraction * num_samples as f64).floor() as usize).max(1))
    }
}

/// The result of a local training.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalUpdate {
    /// The number of samples the update was trained on.
    pub num_samples: usize,
    /// The number of local computations, e.g. FLOPs.
    pub computations: u64,
    /// The updated parameters.
    pub model: Model,
}

/// A model that can be trained and evaluated on the data of a participant.
///
/// A single instance is shared by all participants: the orchestrator loads the global
/// parameters via [`set_params()`] before every local training and evaluation.
///
/// [`set_params()`]: ClientModel::set_params
pub trait ClientModel: Send {
    /// Gets the current parameters.
    fn params(&self) -> Model;

    /// Replaces the current parameters.
    ///
    /// # Errors
    /// Fails if the parameters don't fit the model.
    fn set_params(&mut self, params: &Model) -> Result<(), ModelError>;

    /// Trains the current parameters on a partition.
    ///
    /// All randomness, e.g. the shuffling of the samples, must be drawn from `rng`.
    fn train(
        &mut self,
        data: &Partition,
        params: &TrainingParams,
        rng: &mut dyn RngCore,
    ) -> Result<LocalUpdate, ModelError>;

    /// Evaluates the current parameters on a partition.
    ///
    /// The metrics must include the [`ACCURACY_KEY`].
    fn test(&mut self, data: &Partition) -> Result<MetricValues, ModelError>;
}
