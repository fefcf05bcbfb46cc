//! Per-run enemy state: stun gauge, one anomaly bar per element, and
//! the active dot list.

use tracing::debug;

use crate::anomaly::{AnomalyBar, Dot, DotCtx};
use crate::apl::StatusView;
use crate::data::{Difficulty, Element, EnemyRecord};

/// Baseline status duration per element. Physical assault is a short
/// stagger; the elemental statuses persist.
fn basic_duration(element: Element) -> u64 {
    match element {
        Element::Physical => 60,
        _ => 600,
    }
}

#[derive(Debug)]
pub struct EnemyState {
    pub record: EnemyRecord,
    /// One bar per element, indexed by `Element::index`.
    pub bars: Vec<AnomalyBar>,
    pub dots: Vec<Dot>,
    pub stun_gauge: f64,
    pub stun_max: f64,
    pub stunned: bool,
    pub stun_until: u64,
}

impl EnemyState {
    pub fn new(record: EnemyRecord, adjustment: f64, difficulty: Difficulty) -> Self {
        let scale = adjustment * difficulty.threshold_scale();
        let bars = Element::ALL
            .into_iter()
            .map(|element| {
                let max = record.anomaly_max_for(element, scale);
                AnomalyBar::new(element, max, basic_duration(element))
            })
            .collect();
        let stun_max = record.stun_max * scale;
        Self {
            record,
            bars,
            dots: Vec::new(),
            stun_gauge: 0.0,
            stun_max,
            stunned: false,
            stun_until: 0,
        }
    }

    pub fn bar(&self, element: Element) -> &AnomalyBar {
        &self.bars[element.index()]
    }

    pub fn bar_mut(&mut self, element: Element) -> &mut AnomalyBar {
        &mut self.bars[element.index()]
    }

    pub fn any_anomaly_active(&self) -> bool {
        self.bars.iter().any(|bar| bar.active)
    }

    pub fn add_stun(&mut self, amount: f64) {
        if !self.stunned {
            self.stun_gauge = (self.stun_gauge + amount.max(0.0)).min(self.stun_max);
        }
    }

    /// Flip into the stunned window once the gauge fills. Returns true
    /// on the tick the stun begins.
    pub fn check_stun(&mut self, tick: u64) -> bool {
        if !self.stunned && self.stun_gauge >= self.stun_max {
            self.stunned = true;
            self.stun_until = tick + u64::from(self.record.stun_duration);
            self.stun_gauge = 0.0;
            debug!(tick, until = self.stun_until, "enemy stunned");
            return true;
        }
        if self.stunned && tick >= self.stun_until {
            self.stunned = false;
            debug!(tick, "enemy recovered from stun");
        }
        false
    }

    pub fn stun_pct(&self) -> f64 {
        if self.stun_max <= 0.0 {
            return 0.0;
        }
        (self.stun_gauge / self.stun_max).min(1.0)
    }

    /// Expire dots and status durations for this tick. Returns the dots
    /// that ended, for logging.
    pub fn lifecycle(&mut self, tick: u64) -> usize {
        let any_active = self.any_anomaly_active();
        let ctx = DotCtx { tick, any_anomaly_active: any_active };
        let mut ended = 0;
        for dot in &mut self.dots {
            if dot.should_end(&ctx) {
                dot.end(tick);
                ended += 1;
            }
        }
        self.dots.retain(|dot| dot.dy.active);
        for bar in &mut self.bars {
            bar.check(tick);
            bar.ready_judge(tick);
        }
        ended
    }

    /// Snapshot for the rotation evaluator's `status` namespace.
    pub fn status_view(&self) -> StatusView {
        let mut view = StatusView {
            stunned: self.stunned,
            stun_pct: self.stun_pct(),
            ..StatusView::default()
        };
        for bar in &self.bars {
            if bar.active {
                view.active_anomalies.insert(bar.element);
            }
            view.anomaly_pct.insert(bar.element, bar.buildup_pct());
        }
        view
    }
}
