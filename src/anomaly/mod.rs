pub mod bar;
pub mod dot;

pub use bar::{AnomalyBar, AnomalyKind, PendingSnapshot, ANOMALY_BASE_CD};
pub use dot::{Dot, DotCtx, DotDynamic, DotExit, DotFeature, PersistWhileAnomalous};
