//! Persistence contract for trader configuration and learning history.

use uuid::Uuid;

use crate::error::Result;
use crate::types::{DecisionOutcome, TraderPersonality, WeightHistoryEntry};

/// Storage for personalities, settled outcomes and weight history.
///
/// Implementations must be safe to share between traders; the engine
/// serializes calls for any single trader.
pub trait TraderStore: Send + Sync {
    /// Stored personality, unvalidated. `None` for an unknown trader.
    fn load_personality(&self, trader_id: &str) -> Result<Option<TraderPersonality>>;

    fn save_personality(&self, trader_id: &str, personality: &TraderPersonality) -> Result<()>;

    /// Ids of every trader with a stored personality.
    fn trader_ids(&self) -> Result<Vec<String>>;

    /// Weight changes for a trader, newest first.
    fn weight_history(&self, trader_id: &str, limit: usize) -> Result<Vec<WeightHistoryEntry>>;

    /// Store a settled outcome as pending.
    fn save_outcome(&self, outcome: &DecisionOutcome) -> Result<()>;

    /// Outcomes not yet consumed by a learning pass, oldest first.
    fn pending_outcomes(&self, trader_id: &str) -> Result<Vec<DecisionOutcome>>;

    /// Mark outcomes as consumed without changing weights.
    fn archive_outcomes(&self, trader_id: &str, ids: &[Uuid]) -> Result<()>;

    /// Atomically save the personality, append the history entry and
    /// archive the consumed outcomes. Either all of it lands or none.
    fn commit_weight_update(
        &self,
        trader_id: &str,
        personality: &TraderPersonality,
        entry: &WeightHistoryEntry,
        consumed: &[Uuid],
    ) -> Result<()>;
}
