pub mod clock;
pub mod enemy;
pub mod error;
pub mod rng;

pub use clock::Simulation;
pub use enemy::EnemyState;
pub use error::{SimError, SimResult};
pub use rng::{fold_seed, Rng};
