//! Tick-accurate combat simulation kernel for a squad action RPG:
//! rotation scripting, skill scheduling, buff lifecycles, elemental
//! anomalies, and the per-tick clock that drives them.

pub mod anomaly;
pub mod apl;
pub mod buff;
pub mod cli;
pub mod data;
pub mod event;
pub mod parallel;
pub mod preload;
pub mod report;
pub mod sim;
