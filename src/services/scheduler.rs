//! Trader scheduler.
//!
//! Runs one aggregation cycle per trader at the trader's configured check
//! interval: fetch inputs from a `SignalFeed`, analyze, publish the result.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use dashmap::DashMap;

use super::engine::SignalEngine;
use crate::error::Result;
use crate::types::{AggregationInput, CombinedSignalResult};

/// Supplies inputs for a cycle and receives its result.
pub trait SignalFeed: Send + Sync {
    /// Gather the raw source inputs for a trader.
    fn fetch<'a>(
        &'a self,
        trader_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<AggregationInput>> + Send + 'a>>;

    /// Deliver a computed result.
    fn publish<'a>(
        &'a self,
        trader_id: &'a str,
        result: &'a CombinedSignalResult,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Status of a scheduled trader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderStatus {
    pub trader_id: String,
    pub running: bool,
    pub interval_secs: u64,
    /// Completed cycles.
    pub cycles: u64,
    /// Unix timestamp (seconds) of the last completed cycle.
    pub last_run_at: Option<i64>,
    pub last_error: Option<String>,
}

impl TraderStatus {
    fn new(trader_id: &str) -> Self {
        Self {
            trader_id: trader_id.to_string(),
            running: false,
            interval_secs: 0,
            cycles: 0,
            last_run_at: None,
            last_error: None,
        }
    }
}

/// Drives periodic aggregation for registered traders.
pub struct TraderScheduler {
    engine: Arc<SignalEngine>,
    feed: Arc<dyn SignalFeed>,
    statuses: DashMap<String, TraderStatus>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl TraderScheduler {
    pub fn new(engine: Arc<SignalEngine>, feed: Arc<dyn SignalFeed>) -> Arc<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);
        Arc::new(Self {
            engine,
            feed,
            statuses: DashMap::new(),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        })
    }

    /// Add a trader to the schedule. Takes effect on the next `start`.
    pub fn register(&self, trader_id: &str) {
        self.statuses
            .entry(trader_id.to_string())
            .or_insert_with(|| TraderStatus::new(trader_id));
    }

    pub fn trader_count(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self, trader_id: &str) -> Option<TraderStatus> {
        self.statuses.get(trader_id).map(|s| s.clone())
    }

    pub fn statuses(&self) -> Vec<TraderStatus> {
        let mut all: Vec<TraderStatus> = self.statuses.iter().map(|s| s.clone()).collect();
        all.sort_by(|a, b| a.trader_id.cmp(&b.trader_id));
        all
    }

    /// Run one cycle for a trader now.
    ///
    /// A failed fetch or publish is recorded on the trader's status and
    /// returned; the cycle is not counted.
    pub async fn run_cycle(&self, trader_id: &str) -> Result<CombinedSignalResult> {
        match self.cycle(trader_id).await {
            Ok(result) => {
                if let Some(mut status) = self.statuses.get_mut(trader_id) {
                    status.cycles += 1;
                    status.last_run_at = Some(chrono::Utc::now().timestamp());
                    status.last_error = None;
                }
                Ok(result)
            }
            Err(e) => {
                if let Some(mut status) = self.statuses.get_mut(trader_id) {
                    status.last_error = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    async fn cycle(&self, trader_id: &str) -> Result<CombinedSignalResult> {
        let input = self.feed.fetch(trader_id).await?;
        let result = self.engine.analyze(trader_id, &input).await;
        self.feed.publish(trader_id, &result).await?;

        // Picks up a learning pass left behind by a failed write.
        if let Err(e) = self.engine.run_pending_adjustment(trader_id).await {
            warn!("Trader {}: pending weight adjustment failed: {}", trader_id, e);
        }

        Ok(result)
    }

    /// Spawn one task per registered trader.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let trader_ids: Vec<String> = self.statuses.iter().map(|s| s.key().clone()).collect();
        let mut handles = Vec::with_capacity(trader_ids.len());

        for trader_id in trader_ids {
            let interval_secs = self
                .engine
                .personality(&trader_id)
                .await
                .check_interval_seconds
                .max(1);

            if let Some(mut status) = self.statuses.get_mut(&trader_id) {
                status.running = true;
                status.interval_secs = interval_secs;
            }

            let scheduler = Arc::clone(self);
            let mut shutdown_rx = self.shutdown_tx.subscribe();

            handles.push(tokio::spawn(async move {
                let mut ticker = interval(Duration::from_secs(interval_secs));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            match scheduler.run_cycle(&trader_id).await {
                                Ok(_) => debug!("Trader {} cycle complete", trader_id),
                                Err(e) => error!("Trader {} cycle failed: {}", trader_id, e),
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            debug!("Trader {} task received shutdown signal", trader_id);
                            break;
                        }
                    }
                }
            }));
        }

        let count = handles.len();
        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(handles);
        info!("Scheduler started for {} trader(s)", count);
    }

    /// Signal every trader task to stop and wait for them to finish.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let _ = self.shutdown_tx.send(());

        let handles: Vec<JoinHandle<()>> = self
            .handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Trader task ended abnormally: {}", e);
            }
        }

        for mut status in self.statuses.iter_mut() {
            status.running = false;
        }
        info!("Scheduler stopped");
    }
}
