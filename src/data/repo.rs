//! Immutable reference tables, resolved by id or normalized name.
//! Loaded once, shared read-only across runs.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::data::character::CharacterRecord;
use crate::data::element::Element;
use crate::data::enemy::EnemyRecord;
use crate::data::skill::SkillRecord;
use crate::sim::error::{SimError, SimResult};

#[derive(Debug, Clone, Default)]
pub struct DataRepo {
    characters: HashMap<u32, CharacterRecord>,
    skills: HashMap<String, SkillRecord>,
    enemies: HashMap<u32, EnemyRecord>,
    /// Directory holding per-character default rotation scripts
    /// (`<cid>.txt` / `<cid>.toml`), injected ahead of user scripts.
    pub default_apl_dir: Option<PathBuf>,
}

/// Normalize a string for lookup: lowercase, collapse spaces/underscores.
pub fn normalize_lookup(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '_' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Debug, Clone, serde::Deserialize)]
struct DataFile {
    #[serde(default)]
    characters: Vec<CharacterRecord>,
    #[serde(default)]
    skills: Vec<SkillRecord>,
    #[serde(default)]
    enemies: Vec<EnemyRecord>,
}

impl DataRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` / `*.yaml` / `*.yml` record file in a directory.
    /// Files may carry any mix of characters, skills and enemies.
    pub fn load_dir(dir: impl AsRef<Path>) -> SimResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(SimError::Data(format!(
                "data directory '{}' does not exist",
                dir.display()
            )));
        }
        let mut repo = Self::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            let raw = fs::read_to_string(&path)?;
            let file: DataFile = match ext {
                "json" => serde_json::from_str(&raw)
                    .map_err(|e| SimError::Data(format!("{}: {e}", path.display())))?,
                "yaml" | "yml" => serde_yaml::from_str(&raw)
                    .map_err(|e| SimError::Data(format!("{}: {e}", path.display())))?,
                _ => continue,
            };
            for c in file.characters {
                repo.add_character(c);
            }
            for s in file.skills {
                repo.add_skill(s);
            }
            for e in file.enemies {
                repo.add_enemy(e);
            }
        }
        let default_dir = dir.join("default_apl");
        if default_dir.is_dir() {
            repo.default_apl_dir = Some(default_dir);
        }
        Ok(repo)
    }

    pub fn add_character(&mut self, record: CharacterRecord) {
        self.characters.insert(record.cid, record);
    }

    pub fn add_skill(&mut self, record: SkillRecord) {
        self.skills.insert(record.tag.clone(), record);
    }

    pub fn add_enemy(&mut self, record: EnemyRecord) {
        self.enemies.insert(record.index, record);
    }

    pub fn character(&self, cid: u32) -> SimResult<&CharacterRecord> {
        self.characters
            .get(&cid)
            .ok_or(SimError::UnknownCharacter(cid))
    }

    pub fn skill(&self, tag: &str) -> SimResult<&SkillRecord> {
        self.skills
            .get(tag)
            .ok_or_else(|| SimError::UnknownSkill(tag.to_string()))
    }

    pub fn enemy(&self, index: u32) -> SimResult<&EnemyRecord> {
        self.enemies.get(&index).ok_or(SimError::UnknownEnemy(index))
    }

    /// Resolve a character by cid string or normalized name.
    pub fn resolve_character(&self, name_or_id: &str) -> Option<&CharacterRecord> {
        if let Ok(cid) = name_or_id.parse::<u32>() {
            if let Some(record) = self.characters.get(&cid) {
                return Some(record);
            }
        }
        let normalized = normalize_lookup(name_or_id);
        self.characters
            .values()
            .find(|c| normalize_lookup(&c.name) == normalized)
    }

    pub fn skills_of(&self, cid: u32) -> Vec<&SkillRecord> {
        let mut skills: Vec<_> = self.skills.values().filter(|s| s.cid == cid).collect();
        skills.sort_by(|a, b| a.tag.cmp(&b.tag));
        skills
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// Built-in sample roster data used by the CLI, benches and tests.
    pub fn demo() -> Self {
        let mut repo = Self::new();
        for (cid, name, atk, element, regen) in [
            (1211u32, "Rina", 1800.0, Element::Electric, 0.25),
            (1091u32, "Miyabi", 2100.0, Element::Ice, 0.20),
            (1300u32, "Caesar", 1500.0, Element::Physical, 0.30),
        ] {
            repo.add_character(CharacterRecord {
                cid,
                name: name.to_string(),
                atk,
                crit_chance: 0.3,
                crit_damage: 0.6,
                anomaly_mastery: 110.0,
                energy_regen: regen,
                energy_max: 120.0,
            });
            for stage in 1..=3u32 {
                repo.add_skill(SkillRecord {
                    tag: format!("{cid}_NA_{stage}"),
                    cid,
                    element,
                    lead_ticks: 4,
                    duration_ticks: 24 + 6 * stage,
                    hit_offsets: vec![12, 24 + 6 * stage],
                    dmg_ratio: 0.5 + 0.25 * stage as f64,
                    buildup_per_hit: 18.0,
                    stun_per_hit: 6.0,
                    labels: BTreeSet::new(),
                    active_generation: true,
                    effective_buildup: true,
                    trigger_level: 1,
                    energy_gain: 1.2,
                });
            }
            repo.add_skill(SkillRecord {
                tag: format!("{cid}_E_EX"),
                cid,
                element,
                lead_ticks: 6,
                duration_ticks: 60,
                hit_offsets: vec![20, 40, 60],
                dmg_ratio: 2.4,
                buildup_per_hit: 45.0,
                stun_per_hit: 18.0,
                labels: BTreeSet::new(),
                active_generation: true,
                effective_buildup: true,
                trigger_level: 2,
                energy_gain: 0.0,
            });
            repo.add_skill(SkillRecord {
                tag: format!("{cid}_CoAttack"),
                cid,
                element,
                lead_ticks: 0,
                duration_ticks: 12,
                hit_offsets: vec![12],
                dmg_ratio: 0.4,
                buildup_per_hit: 8.0,
                stun_per_hit: 2.0,
                labels: ["additional_damage".to_string()].into_iter().collect(),
                active_generation: false,
                effective_buildup: false,
                trigger_level: 0,
                energy_gain: 0.0,
            });
        }
        repo.add_enemy(EnemyRecord {
            index: 11001,
            name: "Dullahan".to_string(),
            base_anomaly_max: 3000.0,
            anomaly_max: Default::default(),
            stun_max: 600.0,
            stun_duration: 600,
            freeze_resistance: 0.2,
            defense: 60.0,
        });
        repo
    }
}
