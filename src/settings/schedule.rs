//! Round schedules and the per-dataset presets.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// The size tier of a simulation preset.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[display(fmt = "small")]
    Small,
    #[display(fmt = "medium")]
    Medium,
    #[display(fmt = "large")]
    Large,
}

impl Default for Tier {
    fn default() -> Self {
        Self::Large
    }
}

/// The number of rounds, the evaluation frequency and the number of participants per round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSchedule {
    pub num_rounds: u64,
    pub eval_every: u64,
    pub clients_per_round: usize,
}

impl RoundSchedule {
    pub const fn new(num_rounds: u64, eval_every: u64, clients_per_round: usize) -> Self {
        Self {
            num_rounds,
            eval_every,
            clients_per_round,
        }
    }
}

const LEAF_CHAR: [RoundSchedule; 3] = [
    RoundSchedule::new(6, 2, 2),
    RoundSchedule::new(8, 2, 2),
    RoundSchedule::new(20, 1, 2),
];

const LEAF_IMAGE: [RoundSchedule; 3] = [
    RoundSchedule::new(30, 10, 2),
    RoundSchedule::new(100, 10, 2),
    RoundSchedule::new(400, 20, 2),
];

const PRESETS: [(&str, [RoundSchedule; 3]); 6] = [
    (
        "sent140",
        [
            RoundSchedule::new(10, 2, 2),
            RoundSchedule::new(16, 2, 2),
            RoundSchedule::new(24, 2, 2),
        ],
    ),
    ("femnist", LEAF_IMAGE),
    ("shakespeare", LEAF_CHAR),
    ("celeba", LEAF_IMAGE),
    ("synthetic", LEAF_CHAR),
    ("reddit", LEAF_CHAR),
];

/// Gets the preset schedule of a dataset.
pub fn preset(dataset: &str, tier: Tier) -> Option<RoundSchedule> {
    let (_, schedules) = PRESETS.iter().find(|(name, _)| *name == dataset)?;
    Some(match tier {
        Tier::Small => schedules[0],
        Tier::Medium => schedules[1],
        Tier::Large => schedules[2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(
            preset("femnist", Tier::Large),
            Some(RoundSchedule::new(400, 20, 2))
        );
        assert_eq!(
            preset("sent140", Tier::Medium),
            Some(RoundSchedule::new(16, 2, 2))
        );
        assert_eq!(
            preset("reddit", Tier::Small),
            Some(RoundSchedule::new(6, 2, 2))
        );
        assert_eq!(preset("mnist", Tier::Large), None);
    }

    #[test]
    fn test_default_tier() {
        assert_eq!(Tier::default(), Tier::Large);
        assert_eq!(Tier::Medium.to_string(), "medium");
    }
}
