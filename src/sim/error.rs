//! Kernel error taxonomy.
//!
//! Three tiers, matching how failures are handled at runtime:
//! configuration errors fail fast before the first tick, lookup errors
//! are caught at the clock boundary and surface as a failed run, and
//! invariant violations abort the run outright because they indicate a
//! corrupted simulation. Script problems are not errors at all; the
//! parser logs and skips the offending line.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown skill tag '{0}'")]
    UnknownSkill(String),

    #[error("unknown buff index '{0}'")]
    UnknownBuff(String),

    #[error("unknown character {0}")]
    UnknownCharacter(u32),

    #[error("unknown enemy {0}")]
    UnknownEnemy(u32),

    #[error("simulation invariant violated: {0}")]
    Invariant(String),

    #[error("data file error: {0}")]
    Data(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    /// True for errors that corrupt the run and must abort it, as
    /// opposed to lookup failures that merely fail the run's result.
    pub fn is_hard(&self) -> bool {
        matches!(self, SimError::Invariant(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_errors_are_hard() {
        assert!(SimError::Invariant("debuff outside enemy pool".into()).is_hard());
        assert!(!SimError::UnknownSkill("1211_NA_9".into()).is_hard());
        assert!(!SimError::Config("roster size".into()).is_hard());
    }
}
