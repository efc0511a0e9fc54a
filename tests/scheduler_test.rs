//! Scheduler tests with an in-memory feed.

use chrono::Utc;
use confluence::error::{AppError, Result};
use confluence::services::{SignalEngine, SignalFeed, SqliteStore, TraderScheduler};
use confluence::{
    AggregationInput, CombinedSignalResult, Config, RlSignal, SignalAction, SignalSource,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MemoryFeed {
    published: Mutex<Vec<(String, CombinedSignalResult)>>,
}

impl SignalFeed for MemoryFeed {
    fn fetch<'a>(
        &'a self,
        trader_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<AggregationInput>> + Send + 'a>> {
        Box::pin(async move {
            if trader_id == "offline" {
                return Err(AppError::NotFound("no market data".to_string()));
            }
            let mut input = AggregationInput::new(Utc::now(), 250.0);
            input.rl_signals.push(RlSignal {
                signal: SignalAction::Sell,
                confidence: 0.9,
                horizon: None,
            });
            Ok(input)
        })
    }

    fn publish<'a>(
        &'a self,
        trader_id: &'a str,
        result: &'a CombinedSignalResult,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.published
                .lock()
                .unwrap()
                .push((trader_id.to_string(), result.clone()));
            Ok(())
        })
    }
}

fn scheduler() -> (Arc<TraderScheduler>, Arc<MemoryFeed>) {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let engine = SignalEngine::new(store, &Config::default());
    let feed = Arc::new(MemoryFeed::default());
    (TraderScheduler::new(engine, feed.clone()), feed)
}

#[tokio::test]
async fn test_run_cycle_publishes_and_counts() {
    let (scheduler, feed) = scheduler();
    scheduler.register("alice");

    let result = scheduler.run_cycle("alice").await.unwrap();
    assert_eq!(result.data_sources_used, vec![SignalSource::Rl]);
    assert_eq!(result.daily.signal, SignalAction::Sell);

    let status = scheduler.status("alice").unwrap();
    assert_eq!(status.cycles, 1);
    assert!(status.last_run_at.is_some());
    assert!(status.last_error.is_none());

    let published = feed.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "alice");
}

#[tokio::test]
async fn test_failed_fetch_records_error() {
    let (scheduler, feed) = scheduler();
    scheduler.register("offline");

    assert!(scheduler.run_cycle("offline").await.is_err());

    let status = scheduler.status("offline").unwrap();
    assert_eq!(status.cycles, 0);
    assert!(status.last_error.unwrap().contains("no market data"));
    assert!(feed.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_start_and_stop() {
    let (scheduler, feed) = scheduler();
    scheduler.register("alice");
    scheduler.register("bob");
    assert_eq!(scheduler.trader_count(), 2);

    scheduler.start().await;
    assert!(scheduler.is_running());

    // The first tick fires immediately.
    tokio::time::sleep(Duration::from_millis(200)).await;
    scheduler.stop().await;
    assert!(!scheduler.is_running());

    for status in scheduler.statuses() {
        assert!(!status.running);
        assert_eq!(status.cycles, 1);
        assert_eq!(status.interval_secs, Config::default().default_check_interval_secs);
    }
    assert_eq!(feed.published.lock().unwrap().len(), 2);
}
