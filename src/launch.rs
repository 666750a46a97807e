//! Distributed launch parameters of a SLURM job step.
//!
//! A simulation may be started once per task of a job step. Only the first task on every node
//! runs the simulation; the others exit right away. Outside of SLURM everything falls back to a
//! single process of rank `0`.

use std::{env, fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// The port of the coordinator address.
pub const DEFAULT_PORT: u16 = 23344;

/// Matches the first node of a compressed node list, e.g. `gpu-[12-15,20]`.
static NODE_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\w-]*)\[(\d*)[-+,+\d]*\]").unwrap());

/// The launch parameters of this process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchEnv {
    /// The global rank of this process.
    pub rank: u32,
    /// The rank of this process on its node.
    pub local_rank: u32,
    /// The number of processes. `0` outside of a job step.
    pub world_size: u32,
    /// The coordinator address, e.g. `tcp://node12:23344`.
    pub host_addr: Option<String>,
}

impl LaunchEnv {
    /// Reads the launch parameters from the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok(), DEFAULT_PORT)
    }

    /// Reads the launch parameters with a custom variable lookup.
    ///
    /// Falls back to the single process defaults if any variable is missing or invalid.
    pub fn from_lookup<F>(lookup: F, port: u16) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match Self::try_from_lookup(&lookup, port) {
            Ok(launch) => launch,
            Err(var) => {
                debug!(
                    "{} is missing or invalid: falling back to a single process",
                    var
                );
                Self::default()
            }
        }
    }

    fn try_from_lookup<F>(lookup: &F, port: u16) -> Result<Self, &'static str>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rank = parse_var(lookup, "SLURM_PROCID")?;
        let local_rank = parse_var(lookup, "SLURM_LOCALID")?;
        let world_size = parse_var(lookup, "SLURM_NTASKS")?;
        let nodes = lookup("SLURM_STEP_NODELIST").ok_or("SLURM_STEP_NODELIST")?;
        let host = node_host(&nodes).ok_or("SLURM_STEP_NODELIST")?;

        Ok(Self {
            rank,
            local_rank,
            world_size,
            host_addr: Some(format!("tcp://{}:{}", host, port)),
        })
    }

    /// Checks whether this process runs the simulation on its node.
    pub fn is_primary(&self) -> bool {
        self.local_rank == 0
    }
}

impl fmt::Display for LaunchEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rank {}/{} (local rank {}) at {}",
            self.rank,
            self.world_size,
            self.local_rank,
            self.host_addr.as_deref().unwrap_or("localhost"),
        )
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<T, &'static str>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .ok_or(key)
}

/// Gets the first host of a node list.
///
/// A single host is returned as is, a compressed list like `node[12-15]` yields `node12`.
pub fn node_host(nodes: &str) -> Option<String> {
    if !nodes.contains('[') {
        return Some(nodes.to_string());
    }
    let captures = NODE_LIST.captures(nodes)?;
    Some(format!("{}{}", &captures[1], &captures[2]))
}
