//! Roster descriptor: the full input for one simulation run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sim::error::{SimError, SimResult};

pub const ROSTER_SIZE: usize = 3;

/// Where the rotation script comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AplSource {
    File(PathBuf),
    Inline(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roster {
    /// Exactly three character ids.
    pub characters: Vec<u32>,
    pub enemy_index: u32,
    /// Multiplier on enemy thresholds (buildup, stun).
    #[serde(default = "default_adjustment")]
    pub enemy_adjustment: f64,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub apl: AplSource,
    #[serde(default)]
    pub seed: u64,
}

fn default_adjustment() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Normal,
    Hard,
    Nightmare,
}

impl Difficulty {
    pub fn threshold_scale(self) -> f64 {
        match self {
            Difficulty::Normal => 1.0,
            Difficulty::Hard => 1.25,
            Difficulty::Nightmare => 1.6,
        }
    }
}

impl Roster {
    /// Structural validation. Resolvability of the ids against the data
    /// repo is checked separately at `Simulation::init`.
    pub fn validate(&self) -> SimResult<()> {
        if self.characters.len() != ROSTER_SIZE {
            return Err(SimError::Config(format!(
                "roster must contain exactly {ROSTER_SIZE} characters, got {}",
                self.characters.len()
            )));
        }
        let mut seen = self.characters.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != ROSTER_SIZE {
            return Err(SimError::Config(
                "roster contains duplicate character ids".to_string(),
            ));
        }
        if self.enemy_adjustment <= 0.0 {
            return Err(SimError::Config(format!(
                "enemy adjustment must be positive, got {}",
                self.enemy_adjustment
            )));
        }
        Ok(())
    }

    /// Combined multiplier applied to enemy gauges.
    pub fn enemy_scale(&self) -> f64 {
        self.enemy_adjustment * self.difficulty.threshold_scale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(characters: Vec<u32>) -> Roster {
        Roster {
            characters,
            enemy_index: 11001,
            enemy_adjustment: 1.0,
            difficulty: Difficulty::Normal,
            apl: AplSource::Inline(String::new()),
            seed: 0,
        }
    }

    #[test]
    fn wrong_roster_size_fails_fast() {
        assert!(roster(vec![1211, 1091]).validate().is_err());
        assert!(roster(vec![1211, 1091, 1300, 1400]).validate().is_err());
        assert!(roster(vec![1211, 1091, 1300]).validate().is_ok());
    }

    #[test]
    fn duplicate_characters_fail_fast() {
        assert!(roster(vec![1211, 1211, 1300]).validate().is_err());
    }

    #[test]
    fn difficulty_scales_thresholds() {
        let mut r = roster(vec![1211, 1091, 1300]);
        r.difficulty = Difficulty::Nightmare;
        r.enemy_adjustment = 2.0;
        assert!((r.enemy_scale() - 3.2).abs() < 1e-12);
    }
}
