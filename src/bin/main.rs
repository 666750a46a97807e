use std::{path::PathBuf, process};

use anyhow::Context;
use fedsim::{
    gpustat::GpuStat,
    launch::LaunchEnv,
    metrics::MetricsWriter,
    model::ModelRegistry,
    settings::{CheckpointSettings, DataSettings, FederationSettings, MetricsSettings, Settings},
    state_machine::{coordinator::CoordinatorState, RunReport, StateMachineInitializer},
    storage::{load_participants, CheckpointStore},
};
use structopt::StructOpt;
use tokio::signal;
use tracing_subscriber::*;

#[macro_use]
extern crate tracing;

#[derive(Debug, StructOpt)]
#[structopt(name = "Coordinator")]
struct Opt {
    /// Path of the configuration file
    #[structopt(short, parse(from_os_str))]
    config_path: PathBuf,
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();

    let settings = Settings::new(opt.config_path).unwrap_or_else(|err| {
        eprintln!("{}", err);
        process::exit(1);
    });
    let Settings {
        federation: federation_settings,
        data: data_settings,
        metrics: metrics_settings,
        checkpoint: checkpoint_settings,
        gpustat: gpustat_settings,
        log: log_settings,
    } = settings;

    let _fmt_subscriber = FmtSubscriber::builder()
        .with_env_filter(log_settings.filter)
        .with_ansi(true)
        .init();

    let launch = LaunchEnv::from_env();
    info!("launch environment: {}", launch);
    if !launch.is_primary() {
        info!("shutting down: not the primary process of the node");
        return;
    }

    let mut sampler = gpustat_settings
        .args
        .iter()
        .fold(GpuStat::with_program(&gpustat_settings.program), |sampler, arg| {
            sampler.arg(arg)
        });
    if gpustat_settings.enable {
        match sampler.start(gpustat_settings.interval) {
            Ok(_) => info!("sampling the gpus every {} minutes", gpustat_settings.interval),
            Err(err) => warn!("gpu sampling is disabled: {}", err),
        }
    }

    let outcome = tokio::select! {
        outcome = simulate(
            federation_settings,
            data_settings,
            metrics_settings,
            checkpoint_settings,
        ) => Some(outcome),
        _ = signal::ctrl_c() => {
            warn!("shutting down: interrupted");
            None
        }
    };

    sampler.stop(None).await;
    if gpustat_settings.enable {
        match serde_json::to_string(&sampler.all_stats()) {
            Ok(stats) => info!("gpu samples: {}", stats),
            Err(err) => warn!("failed to serialize the gpu samples: {}", err),
        }
        for summary in sampler.summary(None) {
            info!("{}", summary);
        }
    }

    match outcome {
        Some(Ok(report)) => info!(
            "simulation finished after {:.3}s with accuracies {:?}",
            report.total_time.as_secs_f64(),
            report.accuracies,
        ),
        Some(Err(err)) => {
            error!("simulation failed: {:#}", err);
            process::exit(1);
        }
        None => {}
    }
}

/// Loads the participants and runs all rounds.
async fn simulate(
    federation: FederationSettings,
    data: DataSettings,
    metrics: MetricsSettings,
    checkpoint: CheckpointSettings,
) -> anyhow::Result<RunReport> {
    let schedule = federation
        .schedule()
        .context("incomplete round schedule")?;
    let model = ModelRegistry::with_defaults().resolve(
        &federation.dataset,
        &federation.model,
        federation.seed,
        federation.lr,
    )?;

    let (train_dir, eval_dir) = data.partition_dirs(&federation.dataset, federation.eval_set());
    let participants = load_participants(&train_dir, &eval_dir)
        .await
        .with_context(|| format!("failed to load the {} dataset", federation.dataset))?;

    let (state_machine, _event_subscriber) = StateMachineInitializer::new(
        CoordinatorState::new(&federation, schedule),
        participants,
        model,
        MetricsWriter::new(&metrics.dir, &metrics.name),
        CheckpointStore::new(checkpoint.dir),
    )
    .init();

    Ok(state_machine.run().await?)
}
