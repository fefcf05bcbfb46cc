//! Parameter sweeps: independent runs distributed across workers.
//!
//! Runs share no mutable state; each variant builds a fresh kernel from
//! its roster descriptor, so a failed run only fails its own slot in the
//! output.

use rayon::prelude::*;
use tracing::warn;

use crate::data::{DataRepo, Roster};
use crate::parallel::pool::WorkerPool;
use crate::report::RunSummary;
use crate::sim::Simulation;

/// Split `total` items into up to `num_batches` ranges `[start, end)`.
/// Batches are as equal in size as possible; later batches may be smaller.
pub fn batch_ranges(total: usize, num_batches: usize) -> Vec<(usize, usize)> {
    if total == 0 || num_batches == 0 {
        return Vec::new();
    }
    let num_batches = num_batches.min(total);
    let base = total / num_batches;
    let remainder = total % num_batches;
    let mut ranges = Vec::with_capacity(num_batches);
    let mut start = 0;
    for i in 0..num_batches {
        let size = base + if i < remainder { 1 } else { 0 };
        let end = start + size;
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// One roster to evaluate in a sweep.
#[derive(Debug, Clone)]
pub struct SweepVariant {
    pub label: String,
    pub roster: Roster,
}

/// Result slot for one variant. Failures are carried as strings so the
/// whole sweep output stays `Send` and serializable.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub label: String,
    pub result: Result<RunSummary, String>,
}

fn run_one(variant: &SweepVariant, data: &DataRepo, ticks: u64) -> SweepOutcome {
    let result = Simulation::init(variant.roster.clone(), data.clone())
        .and_then(|mut sim| sim.run(ticks))
        .map_err(|err| {
            warn!(label = %variant.label, %err, "sweep variant failed");
            err.to_string()
        });
    SweepOutcome {
        label: variant.label.clone(),
        result,
    }
}

/// Run every variant, in parallel, each against its own fresh kernel.
/// Output order matches input order regardless of completion order.
pub fn run_sweep(
    variants: &[SweepVariant],
    data: &DataRepo,
    ticks: u64,
    pool: &WorkerPool,
) -> Vec<SweepOutcome> {
    pool.install(|| {
        variants
            .par_iter()
            .map(|variant| run_one(variant, data, ticks))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AplSource, Difficulty};

    #[test]
    fn batch_ranges_even_split() {
        let r = batch_ranges(100, 4);
        assert_eq!(r, vec![(0, 25), (25, 50), (50, 75), (75, 100)]);
    }

    #[test]
    fn batch_ranges_with_remainder() {
        let r = batch_ranges(10, 3);
        assert_eq!(r, vec![(0, 4), (4, 7), (7, 10)]);
    }

    #[test]
    fn batch_ranges_more_batches_than_items() {
        assert_eq!(batch_ranges(3, 10).len(), 3);
    }

    #[test]
    fn batch_ranges_empty() {
        assert!(batch_ranges(0, 5).is_empty());
        assert!(batch_ranges(10, 0).is_empty());
    }

    fn variant(label: &str, seed: u64, enemy_index: u32) -> SweepVariant {
        SweepVariant {
            label: label.to_string(),
            roster: Roster {
                characters: vec![1211, 1091, 1300],
                enemy_index,
                enemy_adjustment: 1.0,
                difficulty: Difficulty::Normal,
                apl: AplSource::Inline(
                    "1211|action|1211_NA_1\n1091|action|1091_NA_1\n1300|action|1300_NA_1"
                        .to_string(),
                ),
                seed,
            },
        }
    }

    #[test]
    fn failed_variant_does_not_poison_the_sweep() {
        let data = DataRepo::demo();
        let variants = vec![
            variant("good", 1, 11001),
            variant("bad-enemy", 2, 99999),
            variant("also-good", 3, 11001),
        ];
        let outcomes = run_sweep(&variants, &data, 100, &WorkerPool::with_workers(2).unwrap());
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].label, "good");
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_err());
        assert!(outcomes[2].result.is_ok());
    }

    #[test]
    fn sweep_is_deterministic_per_variant() {
        let data = DataRepo::demo();
        let variants = vec![variant("a", 42, 11001)];
        let first = run_sweep(&variants, &data, 200, &WorkerPool::default_workers());
        let second = run_sweep(&variants, &data, 200, &WorkerPool::default_workers());
        let (Ok(a), Ok(b)) = (&first[0].result, &second[0].result) else {
            panic!("variant failed");
        };
        assert_eq!(a.total_damage, b.total_damage);
    }
}
