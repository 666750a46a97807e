//! Per-participant metrics and their weighted aggregation.
//!
//! Every round produces a [`MetricRecord`] holding the metric values reported by each
//! participant together with its weight, the number of samples of the participant. Aggregation
//! always walks the participants in id order, hence the output doesn't depend on the order in
//! which participants were selected or reported.

pub mod writer;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

pub use self::writer::{MetricsError, MetricsWriter};
use crate::{model::MetricValues, stats::Summary};

/// Metric values and weights by participant id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricRecord {
    metrics: BTreeMap<String, MetricValues>,
    weights: BTreeMap<String, f64>,
}

impl MetricRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the metrics of a participant, replacing any previous record of it.
    pub fn insert(&mut self, id: impl Into<String>, weight: f64, metrics: MetricValues) {
        let id = id.into();
        self.weights.insert(id.clone(), weight);
        self.metrics.insert(id, metrics);
    }

    /// Gets the number of participants.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Iterates over the participants in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64, &MetricValues)> {
        self.metrics.iter().map(move |(id, metrics)| {
            let weight = self.weights.get(id).copied().unwrap_or_default();
            (id.as_str(), weight, metrics)
        })
    }

    /// Gets the metric values of a participant.
    pub fn get(&self, id: &str) -> Option<&MetricValues> {
        self.metrics.get(id)
    }

    /// Gets the weight of a participant.
    pub fn weight(&self, id: &str) -> Option<f64> {
        self.weights.get(id).copied()
    }

    /// Gets the sorted names of all metrics reported by any participant.
    pub fn metric_names(&self) -> BTreeSet<&str> {
        self.metrics
            .values()
            .flat_map(|metrics| metrics.keys().map(String::as_str))
            .collect()
    }
}

/// Aggregates every metric over the participants which reported it.
///
/// The mean is weighted by the participant weights, the percentiles aren't. Metrics whose
/// reporting participants have a total weight of zero are left out, an empty record yields an
/// empty aggregate.
pub fn aggregate_weighted(record: &MetricRecord) -> BTreeMap<String, Summary> {
    record
        .metric_names()
        .into_iter()
        .filter_map(|name| {
            let (values, weights): (Vec<f64>, Vec<f64>) = record
                .iter()
                .filter_map(|(_, weight, metrics)| Some((*metrics.get(name)?, weight)))
                .unzip();
            Some((name.to_string(), Summary::weighted(&values, &weights)?))
        })
        .collect()
}
