//! Weighted averaging of local updates into the global model.

use thiserror::Error;

use crate::model::Model;

/// Errors which can occur during the aggregation.
#[derive(Debug, Error, PartialEq)]
pub enum AggregationError {
    #[error("the model to aggregate has {actual} weights, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("the aggregation weight {0} is invalid")]
    InvalidWeight(f64),
}

/// An aggregator of models, weighted by the number of samples they were trained on.
#[derive(Debug, Clone)]
pub struct Aggregation {
    sum: Vec<f64>,
    total_weight: f64,
    nb_models: usize,
}

impl Aggregation {
    /// Creates an empty aggregation of models with `len` weights.
    pub fn new(len: usize) -> Self {
        Self {
            sum: vec![0.; len],
            total_weight: 0.,
            nb_models: 0,
        }
    }

    /// Gets the number of aggregated models.
    pub fn len(&self) -> usize {
        self.nb_models
    }

    pub fn is_empty(&self) -> bool {
        self.nb_models == 0
    }

    /// Checks whether a model can be aggregated with the given weight.
    pub fn validate_aggregation(&self, weight: f64, model: &Model) -> Result<(), AggregationError> {
        if model.len() != self.sum.len() {
            return Err(AggregationError::LengthMismatch {
                expected: self.sum.len(),
                actual: model.len(),
            });
        }
        if !weight.is_finite() || weight < 0. {
            return Err(AggregationError::InvalidWeight(weight));
        }
        Ok(())
    }

    /// Adds a weighted model to the aggregation.
    ///
    /// # Errors
    /// Fails if [`validate_aggregation()`] fails, the aggregation is left unchanged then.
    ///
    /// [`validate_aggregation()`]: Aggregation::validate_aggregation
    pub fn aggregate(&mut self, weight: f64, model: &Model) -> Result<(), AggregationError> {
        self.validate_aggregation(weight, model)?;
        for (sum, value) in self.sum.iter_mut().zip(model.iter()) {
            *sum += weight * value;
        }
        self.total_weight += weight;
        self.nb_models += 1;
        Ok(())
    }

    /// Gets the weighted average of the aggregated models.
    ///
    /// Returns `None` if nothing or only zero-weighted models have been aggregated.
    pub fn finish(self) -> Option<Model> {
        if self.total_weight <= 0. {
            return None;
        }
        let total = self.total_weight;
        Some(self.sum.into_iter().map(|sum| sum / total).collect::<Vec<_>>().into())
    }
}
