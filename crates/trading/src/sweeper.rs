//! Background expiry sweeper.
//!
//! Periodically expires accepted trades whose lock window lapsed and cleans
//! up orphaned item holds. The sweep uses the same conditional-update
//! primitives as foreground requests, so running it concurrently with
//! in-flight `lock` calls is safe: a trade that completes just in time wins.

use crate::engine::TradingEngine;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Background task that expires lapsed lock windows.
pub struct ExpirySweeper {
    engine: Arc<TradingEngine>,
    interval: Duration,
}

impl ExpirySweeper {
    /// Create a sweeper over the given engine.
    pub fn new(engine: Arc<TradingEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Run the sweeper. Blocks until the shutdown signal flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");

        let mut timer = tokio::time::interval(self.interval);
        // The first tick fires immediately; that initial cycle doubles as
        // startup recovery after a restart.
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Expiry sweeper shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// One sweep pass. Exposed for tests and manual triggering.
    pub async fn run_cycle(&self) {
        let now = Utc::now();

        match self.engine.sweep_expired(now).await {
            Ok(0) => debug!("Sweep cycle: no lapsed trades"),
            Ok(expired) => info!(expired, "Sweep cycle expired trades"),
            Err(err) => error!(%err, "Sweep cycle failed to scan trades"),
        }

        match self.engine.release_stale_holds(now).await {
            Ok(0) => {}
            Ok(released) => info!(released, "Sweep cycle released stale holds"),
            Err(err) => error!(%err, "Sweep cycle failed to scan stale holds"),
        }
    }
}
