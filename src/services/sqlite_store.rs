//! SQLite persistence layer for trader personalities and learning history.
//!
//! Tables:
//! - `traders`: one JSON personality per trader
//! - `weight_history`: append-only audit of weight changes
//! - `decision_outcomes`: settled decisions, pending until a learning pass
//!   consumes them

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use super::store::TraderStore;
use crate::error::{AppError, Result};
use crate::types::{
    DecisionOutcome, Horizon, SignalAction, SignalWeights, SourceAttribution, TraderPersonality,
    WeightChangeReason, WeightHistoryEntry,
};

/// SQLite store for trader data.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS traders (
                trader_id TEXT PRIMARY KEY,
                personality_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS weight_history (
                id TEXT PRIMARY KEY,
                trader_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                old_weights_json TEXT NOT NULL,
                new_weights_json TEXT NOT NULL,
                reason TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_weight_history_trader
             ON weight_history(trader_id, timestamp DESC)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS decision_outcomes (
                id TEXT PRIMARY KEY,
                trader_id TEXT NOT NULL,
                horizon TEXT NOT NULL,
                action TEXT NOT NULL,
                attributions_json TEXT NOT NULL,
                pnl REAL NOT NULL,
                pnl_percent REAL NOT NULL,
                closed_at INTEGER NOT NULL,
                archived INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_outcomes_pending
             ON decision_outcomes(trader_id, archived)",
            [],
        )?;

        Ok(())
    }

    /// Number of weight history entries for a trader.
    pub fn history_count(&self, trader_id: &str) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM weight_history WHERE trader_id = ?1",
            params![trader_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn upsert_personality(
    tx: &Transaction<'_>,
    trader_id: &str,
    personality: &TraderPersonality,
) -> Result<()> {
    let json = serde_json::to_string(personality)?;
    tx.execute(
        "INSERT INTO traders (trader_id, personality_json, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(trader_id) DO UPDATE SET
            personality_json = excluded.personality_json,
            updated_at = excluded.updated_at",
        params![trader_id, json, Utc::now().timestamp_millis()],
    )?;
    Ok(())
}

fn archive_in(tx: &Transaction<'_>, trader_id: &str, ids: &[Uuid]) -> Result<()> {
    let mut stmt =
        tx.prepare("UPDATE decision_outcomes SET archived = 1 WHERE id = ?1 AND trader_id = ?2")?;
    for id in ids {
        stmt.execute(params![id.to_string(), trader_id])?;
    }
    Ok(())
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Internal(format!("Bad id {} in store: {}", s, e)))
}

fn parse_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| AppError::Internal(format!("Bad timestamp {} in store", ms)))
}

impl TraderStore for SqliteStore {
    fn load_personality(&self, trader_id: &str) -> Result<Option<TraderPersonality>> {
        let conn = self.conn();
        let result = conn.query_row(
            "SELECT personality_json FROM traders WHERE trader_id = ?1",
            params![trader_id],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save_personality(&self, trader_id: &str, personality: &TraderPersonality) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        upsert_personality(&tx, trader_id, personality)?;
        tx.commit()?;
        debug!("Saved personality for trader {}", trader_id);
        Ok(())
    }

    fn trader_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT trader_id FROM traders ORDER BY trader_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn weight_history(&self, trader_id: &str, limit: usize) -> Result<Vec<WeightHistoryEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, old_weights_json, new_weights_json, reason
             FROM weight_history
             WHERE trader_id = ?1
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![trader_id, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, timestamp, old_json, new_json, reason)| {
                Ok(WeightHistoryEntry {
                    id: parse_uuid(&id)?,
                    trader_id: trader_id.to_string(),
                    timestamp: parse_millis(timestamp)?,
                    old_weights: serde_json::from_str::<SignalWeights>(&old_json)?,
                    new_weights: serde_json::from_str::<SignalWeights>(&new_json)?,
                    reason: WeightChangeReason::parse(&reason).ok_or_else(|| {
                        AppError::Internal(format!("Unknown weight change reason: {}", reason))
                    })?,
                })
            })
            .collect()
    }

    fn save_outcome(&self, outcome: &DecisionOutcome) -> Result<()> {
        let conn = self.conn();
        let attributions = serde_json::to_string(&outcome.attributions)?;
        conn.execute(
            "INSERT INTO decision_outcomes
                (id, trader_id, horizon, action, attributions_json, pnl, pnl_percent, closed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                outcome.id.to_string(),
                outcome.trader_id,
                outcome.horizon.as_str(),
                outcome.action.as_str(),
                attributions,
                outcome.pnl,
                outcome.pnl_percent,
                outcome.closed_at.timestamp_millis(),
            ],
        )?;
        debug!("Stored outcome {} for trader {}", outcome.id, outcome.trader_id);
        Ok(())
    }

    fn pending_outcomes(&self, trader_id: &str) -> Result<Vec<DecisionOutcome>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, horizon, action, attributions_json, pnl, pnl_percent, closed_at
             FROM decision_outcomes
             WHERE trader_id = ?1 AND archived = 0
             ORDER BY rowid ASC",
        )?;

        let rows = stmt
            .query_map(params![trader_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, horizon, action, attributions, pnl, pnl_percent, closed_at)| {
                    Ok(DecisionOutcome {
                        id: parse_uuid(&id)?,
                        trader_id: trader_id.to_string(),
                        horizon: Horizon::from_str(&horizon).ok_or_else(|| {
                            AppError::Internal(format!("Unknown horizon in store: {}", horizon))
                        })?,
                        action: SignalAction::parse(&action).ok_or_else(|| {
                            AppError::Internal(format!("Unknown action in store: {}", action))
                        })?,
                        attributions: serde_json::from_str::<Vec<SourceAttribution>>(
                            &attributions,
                        )?,
                        pnl,
                        pnl_percent,
                        closed_at: parse_millis(closed_at)?,
                    })
                },
            )
            .collect()
    }

    fn archive_outcomes(&self, trader_id: &str, ids: &[Uuid]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        archive_in(&tx, trader_id, ids)?;
        tx.commit()?;
        Ok(())
    }

    fn commit_weight_update(
        &self,
        trader_id: &str,
        personality: &TraderPersonality,
        entry: &WeightHistoryEntry,
        consumed: &[Uuid],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        upsert_personality(&tx, trader_id, personality)?;
        tx.execute(
            "INSERT INTO weight_history
                (id, trader_id, timestamp, old_weights_json, new_weights_json, reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id.to_string(),
                trader_id,
                entry.timestamp.timestamp_millis(),
                serde_json::to_string(&entry.old_weights)?,
                serde_json::to_string(&entry.new_weights)?,
                entry.reason.as_str(),
            ],
        )?;
        archive_in(&tx, trader_id, consumed)?;

        tx.commit()?;
        info!(
            "Trader {} weights updated ({}): {:?}",
            trader_id,
            entry.reason.as_str(),
            entry.new_weights
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalSource;

    fn outcome(trader_id: &str) -> DecisionOutcome {
        DecisionOutcome {
            id: Uuid::new_v4(),
            trader_id: trader_id.to_string(),
            horizon: Horizon::LongTerm,
            action: SignalAction::Sell,
            attributions: vec![SourceAttribution {
                source: SignalSource::Rl,
                effective_weight: 0.4,
                correct: true,
            }],
            pnl: 12.5,
            pnl_percent: 0.8,
            closed_at: Utc::now(),
        }
    }

    #[test]
    fn test_personality_round_trip() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert!(store.load_personality("t1").unwrap().is_none());

        let personality = TraderPersonality::conservative();
        store.save_personality("t1", &personality).unwrap();
        assert_eq!(store.load_personality("t1").unwrap(), Some(personality));

        let aggressive = TraderPersonality::aggressive();
        store.save_personality("t1", &aggressive).unwrap();
        assert_eq!(store.load_personality("t1").unwrap(), Some(aggressive));
        assert_eq!(store.trader_ids().unwrap(), vec!["t1".to_string()]);
    }

    #[test]
    fn test_outcomes_pending_until_archived() {
        let store = SqliteStore::new_in_memory().unwrap();
        let first = outcome("t1");
        let second = outcome("t1");
        store.save_outcome(&first).unwrap();
        store.save_outcome(&second).unwrap();
        store.save_outcome(&outcome("t2")).unwrap();

        let pending = store.pending_outcomes("t1").unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first.id);
        assert_eq!(pending[0].horizon, Horizon::LongTerm);
        assert_eq!(pending[0].attributions, first.attributions);

        store.archive_outcomes("t1", &[first.id]).unwrap();
        let pending = store.pending_outcomes("t1").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);
    }

    #[test]
    fn test_commit_weight_update_is_recorded() {
        let store = SqliteStore::new_in_memory().unwrap();
        let pending = outcome("t1");
        store.save_outcome(&pending).unwrap();

        let mut personality = TraderPersonality::balanced();
        let old = personality.signals.weights;
        personality.signals.weights = SignalWeights::new(0.2, 0.3, 0.25, 0.25);
        let entry = WeightHistoryEntry::new(
            "t1",
            old,
            personality.signals.weights,
            WeightChangeReason::AdaptiveLearning,
        );

        store
            .commit_weight_update("t1", &personality, &entry, &[pending.id])
            .unwrap();

        assert_eq!(store.load_personality("t1").unwrap(), Some(personality));
        assert!(store.pending_outcomes("t1").unwrap().is_empty());

        let history = store.weight_history("t1", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, entry.id);
        assert_eq!(history[0].reason, WeightChangeReason::AdaptiveLearning);
        assert_eq!(history[0].new_weights, entry.new_weights);
    }

    #[test]
    fn test_weight_history_newest_first_with_limit() {
        let store = SqliteStore::new_in_memory().unwrap();
        let personality = TraderPersonality::balanced();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let entry = WeightHistoryEntry::new(
                "t1",
                SignalWeights::equal(),
                SignalWeights::equal(),
                WeightChangeReason::Manual,
            );
            ids.push(entry.id);
            store
                .commit_weight_update("t1", &personality, &entry, &[])
                .unwrap();
        }

        let history = store.weight_history("t1", 2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, ids[2]);
        assert_eq!(history[1].id, ids[1]);
        assert_eq!(store.history_count("t1").unwrap(), 3);
    }
}
