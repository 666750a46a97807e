//! Background sampling of GPU readings.
//!
//! A [`GpuStat`] spawns the `gpustat` monitor (or any program printing lines in the same format)
//! with a sampling interval and streams its standard output on a tokio task. Every line that
//! describes a device is parsed into a [`GpuReading`] and appended to the per-device
//! [`SampleSeries`]. Lines in any other format are skipped.
//!
//! The sampler is independent of the rounds of a simulation. It has to be stopped explicitly,
//! either via [`GpuStat::stop()`] or by dropping it.

pub mod reading;
pub mod series;

use std::{collections::BTreeMap, process::Stdio, time::Duration};

use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStdout, Command},
    sync::oneshot,
    task::JoinHandle,
    time,
};
use tracing::{debug, error_span, info, trace, warn};
use tracing_futures::Instrument;

pub use self::{
    reading::GpuReading,
    series::{DeviceSeries, GpuMetric, SampleSeries, SeriesSummary},
};

/// The default monitor program.
pub const DEFAULT_PROGRAM: &str = "gpustat";

/// Errors which can occur when starting the sampler.
#[derive(Debug, Error)]
pub enum GpuStatError {
    #[error("failed to launch the monitor `{program}`: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },
    #[error("the monitor has no standard output")]
    NoStdout,
}

/// The handle of a running sampling task.
#[derive(Debug)]
struct Worker {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// A background sampler of GPU readings.
#[derive(Debug)]
pub struct GpuStat {
    program: String,
    args: Vec<String>,
    series: SampleSeries,
    worker: Option<Worker>,
}

impl Default for GpuStat {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuStat {
    /// Creates a sampler for the `gpustat` monitor.
    pub fn new() -> Self {
        Self::with_program(DEFAULT_PROGRAM)
    }

    /// Creates a sampler for a custom monitor program.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            series: SampleSeries::new(),
            worker: None,
        }
    }

    /// Adds an argument which is passed to the monitor before the interval.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Checks whether a sampling task is running.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Starts sampling every `interval` minutes.
    ///
    /// Returns `Ok(false)` without doing anything if the sampler is already running. Samples of
    /// previous runs are kept. Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Fails if the monitor can't be launched.
    pub fn start(&mut self, interval: f64) -> Result<bool, GpuStatError> {
        if self.worker.is_some() {
            debug!("sampler is already running");
            return Ok(false);
        }

        let secs = interval_secs(interval);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--interval")
            .arg(secs.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GpuStatError::Launch {
                program: self.program.clone(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or(GpuStatError::NoStdout)?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let span = error_span!("gpustat", program = %self.program, interval = secs);
        let handle = tokio::spawn(
            sample(child, stdout, self.series.clone(), stop_rx).instrument(span),
        );
        info!("started sampling `{}` every {}s", self.program, secs);

        self.worker = Some(Worker { stop_tx, handle });
        Ok(true)
    }

    /// Stops sampling and waits for the sampling task to finish.
    ///
    /// Waits at most `timeout` if one is given. Stopping a sampler which isn't running does
    /// nothing. Always returns `true`.
    pub async fn stop(&mut self, timeout: Option<Duration>) -> bool {
        let Worker { stop_tx, handle } = match self.worker.take() {
            Some(worker) => worker,
            None => return true,
        };
        // the task may have already finished on its own
        let _ = stop_tx.send(());

        let joined = match timeout {
            Some(timeout) => match time::timeout(timeout, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("sampling task didn't stop within {:?}", timeout);
                    return true;
                }
            },
            None => handle.await,
        };
        if let Err(err) = joined {
            warn!("sampling task failed: {}", err);
        }
        info!("stopped sampling");
        true
    }

    /// Gets a handle to the recorded series.
    pub fn series(&self) -> SampleSeries {
        self.series.clone()
    }

    /// Summarizes the recorded series, optionally restricted to a single device.
    pub fn summary(&self, device: Option<u32>) -> Vec<SeriesSummary> {
        self.series.summary(device)
    }

    /// Gets all samples recorded so far.
    pub fn all_stats(&self) -> BTreeMap<u32, DeviceSeries> {
        self.series.snapshot()
    }
}

impl Drop for GpuStat {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
        }
    }
}

/// Converts the interval from minutes into whole seconds.
fn interval_secs(minutes: f64) -> u64 {
    (minutes * 60.).trunc().max(0.) as u64
}

async fn sample(
    mut child: Child,
    stdout: ChildStdout,
    series: SampleSeries,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut reader = BufReader::new(stdout);
    let mut line = Vec::new();
    let mut streaming = true;

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            read = reader.read_until(b'\n', &mut line), if streaming => match read {
                Ok(0) => {
                    debug!("monitor closed its output");
                    streaming = false;
                }
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    match GpuReading::parse(&text) {
                        Some(reading) => {
                            trace!("recording reading of GPU[{}]", reading.device);
                            series.record(&reading);
                        }
                        None => trace!("skipping line: {}", text.trim_end()),
                    }
                    line.clear();
                }
                Err(err) => {
                    warn!("failed to read from the monitor: {}", err);
                    streaming = false;
                }
            },
        }
    }

    if let Err(err) = child.kill().await {
        debug!("monitor already exited: {}", err);
    }
}
