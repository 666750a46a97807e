//! Parsing of the per-device lines printed by the monitor.

use std::convert::TryFrom;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::gpustat::series::GpuMetric;

/// Matches e.g. `[0] GeForce RTX 2080 Ti | 41'C,   0 % |  1119 / 11019 MB | root(1115M)`.
static GPUSTAT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d+)\][\w -]*\|\s*(\d+)'C,\s+(\d+) % \|\s+(\d+)\s*/\s*(\d+) MB \|").unwrap()
});

/// A single reading of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuReading {
    /// The device index.
    pub device: u32,
    /// The temperature in degree Celsius.
    pub temperature: u64,
    /// The utilization in percent.
    pub utilization: u64,
    /// The used memory in MB.
    pub memory_used: u64,
    /// The total memory in MB.
    pub memory_total: u64,
}

impl GpuReading {
    /// Parses a monitor line.
    ///
    /// Returns `None` for lines that don't describe a device, including readings which report a
    /// total memory of zero.
    pub fn parse(line: &str) -> Option<Self> {
        let captures = GPUSTAT_LINE.captures(line)?;
        let field = |index: usize| -> Option<u64> { captures.get(index)?.as_str().parse().ok() };

        let reading = Self {
            device: u32::try_from(field(1)?).ok()?,
            temperature: field(2)?,
            utilization: field(3)?,
            memory_used: field(4)?,
            memory_total: field(5)?,
        };
        if reading.memory_total == 0 {
            return None;
        }
        Some(reading)
    }

    /// The share of used memory.
    pub fn memory_ratio(&self) -> f64 {
        self.memory_used as f64 / self.memory_total as f64
    }

    /// The values of this reading, one per recorded metric.
    pub fn values(&self) -> [(GpuMetric, f64); 5] {
        [
            (GpuMetric::Temperature, self.temperature as f64),
            (GpuMetric::Utilization, self.utilization as f64),
            (GpuMetric::Memory, self.memory_used as f64),
            (GpuMetric::TotalMemory, self.memory_total as f64),
            (GpuMetric::MemoryPercentage, self.memory_ratio()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reading() {
        let line = "[0] GeForce RTX 2080 Ti | 41'C,   0 % |  1119 / 11019 MB | root(1115M)";
        let reading = GpuReading::parse(line).unwrap();

        assert_eq!(
            reading,
            GpuReading {
                device: 0,
                temperature: 41,
                utilization: 0,
                memory_used: 1119,
                memory_total: 11019,
            }
        );
        assert!((reading.memory_ratio() - 0.1016).abs() < 1e-4);
    }

    #[test]
    fn test_parse_without_annotations() {
        let line = "[12] Tesla V100-SXM2-16GB | 63'C, 100 % | 15870 / 16160 MB |";
        let reading = GpuReading::parse(line).unwrap();
        assert_eq!(reading.device, 12);
        assert_eq!(reading.utilization, 100);
        assert_eq!(reading.memory_total, 16160);
    }

    #[test]
    fn test_parse_padded_memory() {
        // both memory fields are right-aligned
        let line = "[3] Tesla T4 | 50'C,  20 % |   500 /  1000 MB |";
        let reading = GpuReading::parse(line).unwrap();
        assert_eq!(reading.device, 3);
        assert_eq!(reading.memory_used, 500);
        assert_eq!(reading.memory_total, 1000);
        assert_eq!(reading.memory_ratio(), 0.5);

        let line = "[1] GeForce GTX 1080 |  9'C,   0 % |     2 /  8119 MB |";
        let reading = GpuReading::parse(line).unwrap();
        assert_eq!(reading.temperature, 9);
        assert_eq!(reading.memory_used, 2);
        assert_eq!(reading.memory_total, 8119);
    }

    #[test]
    fn test_skip_other_lines() {
        assert!(GpuReading::parse("").is_none());
        assert!(GpuReading::parse("gpu-node-01  Mon Oct 19 12:00:00 2026  470.57.02").is_none());
        assert!(GpuReading::parse("[0] GeForce RTX 2080 Ti | ??'C, 0 % | 1 / 2 MB |").is_none());
        assert!(GpuReading::parse("[0] Broken | 41'C,   0 % |  0 / 0 MB |").is_none());
    }

    #[test]
    fn test_values_in_metric_order() {
        let reading = GpuReading {
            device: 1,
            temperature: 50,
            utilization: 20,
            memory_used: 500,
            memory_total: 1000,
        };
        let values = reading.values();
        assert_eq!(values[0], (GpuMetric::Temperature, 50.));
        assert_eq!(values[4], (GpuMetric::MemoryPercentage, 0.5));
    }
}
