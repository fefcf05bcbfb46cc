pub mod batch;
pub mod pool;

pub use batch::{batch_ranges, run_sweep, SweepOutcome, SweepVariant};
pub use pool::WorkerPool;
