pub mod classifier;
pub mod executor;
pub mod ledger;
pub mod quota;
pub mod random;
pub mod run;
pub mod scheduler;
pub mod traversal;

pub use random::fresh_seed;
pub use run::EngagementRun;
