pub mod aggregate;
#[allow(clippy::module_inception)]
pub mod buff;
pub mod manager;
pub mod strategy;

pub use aggregate::{aggregate, fingerprint, AggregateCache};
pub use buff::{Buff, BuffDynamic, BuffFeature, BuffTrigger, EffectScope, EffectTarget, ExitPolicy};
pub use manager::{BuffActivity, BuffManager};
pub use strategy::{strategy_for, BuffStrategy, OverchargeRecord, OverchargeStrategy, TriggerCtx};
