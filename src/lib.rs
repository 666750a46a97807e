//! # fedsim: round-based federated learning simulations
//!
//! A simulation federates a model over the participants of a [LEAF]-style dataset. Every round
//! samples a few participants with a seeded [`selector`], trains the global model on each of
//! them and averages the local models, weighted by their number of samples, into the next global
//! model. The [`state_machine`] evaluates the global model on the held-out data every few rounds
//! and appends all metrics to CSV logs.
//!
//! Alongside a simulation, the [`gpustat`] sampler records the temperature, utilization and
//! memory of the local GPUs in the background.
//!
//! The `coordinator` binary runs a simulation as configured by the [`settings`].
//!
//! [LEAF]: https://leaf.cmu.edu
//!
//! # Modules
//! - [`state_machine`]: the orchestration of the rounds.
//! - [`model`]: the model interface, the weighted aggregation and the model registry.
//! - [`metrics`]: the weighted metric summaries and the CSV logs.
//! - [`storage`]: the participant data and the model checkpoints.
//! - [`gpustat`]: the background GPU sampler.
//! - [`launch`]: the distributed launch environment.

pub mod gpustat;
pub mod launch;
pub mod metrics;
pub mod model;
pub mod participant;
pub mod selector;
pub mod settings;
pub mod state_machine;
pub mod stats;
pub mod storage;
