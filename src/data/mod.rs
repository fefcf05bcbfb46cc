pub mod character;
pub mod element;
pub mod enemy;
pub mod repo;
pub mod roster;
pub mod skill;

use serde::{Deserialize, Serialize};

pub use character::{CharacterRecord, CharacterState};
pub use element::Element;
pub use enemy::EnemyRecord;
pub use repo::{normalize_lookup, DataRepo};
pub use roster::{AplSource, Difficulty, Roster, ROSTER_SIZE};
pub use skill::{cid_from_tag, SkillRecord};

/// Identifies the beneficiary of a buff or the owner of a pool.
/// Debuffs always live under `Enemy`; character buffs never do.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OwnerId {
    Character(u32),
    Enemy,
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OwnerId::Character(cid) => write!(f, "{cid}"),
            OwnerId::Enemy => f.write_str("enemy"),
        }
    }
}
