//! Run output: per-hit and per-tick records, buff activity, CSV/JSON
//! export.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::buff::BuffActivity;
use crate::data::{Element, OwnerId};
use crate::sim::error::SimResult;

/// One resolved hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitRecord {
    pub tick: u64,
    pub cid: u32,
    pub skill_tag: String,
    pub element: Element,
    pub dmg_expect: f64,
    pub dmg_crit: f64,
    pub buildup: f64,
    pub stun: f64,
}

/// One tick's totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickRecord {
    pub tick: u64,
    pub damage: f64,
    pub dot_damage: f64,
    pub anomaly_activations: u32,
    pub enemy_stunned: bool,
}

#[derive(Debug, Clone, Serialize)]
struct BuffRow<'a> {
    tick: u64,
    owner: String,
    buff: &'a str,
    count: u32,
}

/// Buff activity keyed by (owner, tick, buff index). Re-recording the
/// same key overwrites, so one row per buff per tick.
#[derive(Debug, Default)]
pub struct BuffActivityLog {
    entries: BTreeMap<(OwnerId, u64, String), u32>,
}

impl BuffActivityLog {
    pub fn record(&mut self, activity: &BuffActivity) {
        self.entries.insert(
            (activity.owner, activity.tick, activity.index.clone()),
            activity.count,
        );
    }

    pub fn record_all(&mut self, activities: &[BuffActivity]) {
        for activity in activities {
            self.record(activity);
        }
    }

    pub fn count_at(&self, owner: OwnerId, tick: u64, index: &str) -> Option<u32> {
        self.entries
            .get(&(owner, tick, index.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Aggregate figures for one finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Wall-clock time the summary was produced, RFC 3339.
    pub generated_at: String,
    pub ticks: u64,
    pub total_damage: f64,
    pub dot_damage: f64,
    pub damage_per_tick: f64,
    pub hit_count: usize,
    pub anomaly_activations: u32,
    pub stunned_ticks: u64,
    pub damage_by_character: BTreeMap<u32, f64>,
}

/// Everything a run writes down.
#[derive(Debug, Default)]
pub struct Report {
    pub hits: Vec<HitRecord>,
    pub ticks: Vec<TickRecord>,
    pub buff_log: BuffActivityLog,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> RunSummary {
        let total_damage: f64 = self.ticks.iter().map(|t| t.damage).sum();
        let dot_damage: f64 = self.ticks.iter().map(|t| t.dot_damage).sum();
        let ticks = self.ticks.len() as u64;
        let mut damage_by_character = BTreeMap::new();
        for hit in &self.hits {
            *damage_by_character.entry(hit.cid).or_insert(0.0) += hit.dmg_expect;
        }
        RunSummary {
            generated_at: chrono::Utc::now().to_rfc3339(),
            ticks,
            total_damage,
            dot_damage,
            damage_per_tick: if ticks > 0 { total_damage / ticks as f64 } else { 0.0 },
            hit_count: self.hits.len(),
            anomaly_activations: self.ticks.iter().map(|t| t.anomaly_activations).sum(),
            stunned_ticks: self.ticks.iter().filter(|t| t.enemy_stunned).count() as u64,
            damage_by_character,
        }
    }

    pub fn write_hits_csv(&self, path: &Path) -> SimResult<()> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        for hit in &self.hits {
            writer
                .serialize(hit)
                .map_err(|err| crate::sim::error::SimError::Data(err.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_buffs_csv(&self, path: &Path) -> SimResult<()> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        for ((owner, tick, index), count) in &self.buff_log.entries {
            writer
                .serialize(BuffRow {
                    tick: *tick,
                    owner: owner.to_string(),
                    buff: index,
                    count: *count,
                })
                .map_err(|err| crate::sim::error::SimError::Data(err.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn summary_json(&self) -> SimResult<String> {
        serde_json::to_string_pretty(&self.summary())
            .map_err(|err| crate::sim::error::SimError::Data(err.to_string()))
    }
}
