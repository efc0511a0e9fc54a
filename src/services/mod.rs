pub mod aggregator;
pub mod engine;
pub mod learner;
pub mod normalizers;
pub mod policy;
pub mod scheduler;
pub mod sqlite_store;
pub mod store;
pub mod technical;

pub use aggregator::{aggregate_horizon, HorizonAggregate, SignalAggregator};
pub use engine::{AdjustmentReport, OutcomeReceipt, SignalEngine};
pub use learner::{AdaptiveWeightLearner, WeightAdjustment, MAX_STEP, MIN_WEIGHT};
pub use normalizers::SignalNormalizer;
pub use policy::{decide, HoldReason, ACTION_THRESHOLD};
pub use scheduler::{SignalFeed, TraderScheduler, TraderStatus};
pub use sqlite_store::SqliteStore;
pub use store::TraderStore;
pub use technical::TechnicalEvaluator;
