//! Append-only sample series shared between the sampling task and its readers.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use derive_more::Display;
use serde::Serialize;

use crate::{gpustat::reading::GpuReading, stats::Summary};

/// A metric recorded per device.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GpuMetric {
    #[display(fmt = "temperature")]
    Temperature,
    #[display(fmt = "utilization")]
    Utilization,
    #[display(fmt = "memory")]
    Memory,
    #[display(fmt = "total_memory")]
    TotalMemory,
    #[display(fmt = "memory_percentage")]
    MemoryPercentage,
}

/// The samples of one device, in recording order.
pub type DeviceSeries = BTreeMap<GpuMetric, Vec<f64>>;

/// Per-device sample series.
///
/// Clones share the same underlying series. A single sampling task appends while any number of
/// readers take snapshots; readers may observe a series that is one reading behind.
#[derive(Debug, Clone, Default)]
pub struct SampleSeries(Arc<RwLock<BTreeMap<u32, DeviceSeries>>>);

impl SampleSeries {
    /// Creates empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reading to the series of its device.
    pub fn record(&self, reading: &GpuReading) {
        let mut devices = self.write();
        let series = devices.entry(reading.device).or_default();
        for (metric, value) in reading.values().iter() {
            series.entry(*metric).or_default().push(*value);
        }
    }

    /// Checks whether no reading has been recorded so far.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copies all samples recorded so far.
    pub fn snapshot(&self) -> BTreeMap<u32, DeviceSeries> {
        self.read().clone()
    }

    /// Summarizes every series, optionally restricted to a single device.
    pub fn summary(&self, device: Option<u32>) -> Vec<SeriesSummary> {
        self.read()
            .iter()
            .filter(|(id, _)| device.map_or(true, |device| device == **id))
            .flat_map(|(id, series)| {
                series.iter().map(move |(metric, samples)| SeriesSummary {
                    device: *id,
                    metric: *metric,
                    summary: Summary::of(samples),
                })
            })
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<u32, DeviceSeries>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<u32, DeviceSeries>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The summary of a single device metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub device: u32,
    pub metric: GpuMetric,
    /// `None` if no samples have been recorded.
    pub summary: Option<Summary>,
}

impl fmt::Display for SeriesSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPU[{}]-{}: ", self.device, self.metric)?;
        match self.summary {
            Some(Summary {
                mean,
                p10,
                p50,
                p90,
            }) => write!(
                f,
                "{:.1}, 10th percentile: {:.1}, 50th percentile: {:.1}, 90th percentile: {:.1}",
                mean, p10, p50, p90
            ),
            None => write!(f, "no data"),
        }
    }
}
