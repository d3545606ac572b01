//! # Publish Module
//!
//! Periodically delivers the command record to the vehicle UI.
//!
//! This module handles:
//! - Ticking at a fixed interval (100ms by default)
//! - Taking one consistent snapshot of the [`CommandStore`] per tick
//! - Suppressing all-default records
//! - Fire-and-forget delivery through a [`CommandSink`]
//! - Logging and skipping per-tick failures
//! - Stopping promptly on the shutdown signal

pub mod sink;

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::command::encoder::encode_for_publish;
use crate::command::state::CommandStore;
use crate::error::{BridgeError, Result};
use sink::CommandSink;

/// Default publish interval in milliseconds
pub const DEFAULT_PUBLISH_INTERVAL_MS: u64 = 100;

/// Default number of publishes between status log messages
pub const DEFAULT_LOG_INTERVAL: u64 = 100;

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Publishing has not been enabled yet
    Disabled,
    /// The record was all-default
    Suppressed,
    /// The record was handed to the sink
    Published,
}

/// Counters kept by a [`PublishLoop`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    pub ticks: u64,
    pub published: u64,
    pub suppressed: u64,
    pub failed: u64,
}

/// Periodic publisher of the command record
pub struct PublishLoop<S: CommandSink> {
    store: CommandStore,
    sink: S,
    period: Duration,
    enabled: watch::Receiver<bool>,
    log_interval: u64,
    stats: PublishStats,
}

impl<S: CommandSink> PublishLoop<S> {
    /// Create a publisher
    ///
    /// # Arguments
    ///
    /// * `store` - Command record to publish
    /// * `sink` - Where encoded records go
    /// * `period` - Time between ticks
    /// * `enabled` - Ticks are skipped while this is `false`
    pub fn new(
        store: CommandStore,
        sink: S,
        period: Duration,
        enabled: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            sink,
            period,
            enabled,
            log_interval: DEFAULT_LOG_INTERVAL,
            stats: PublishStats::default(),
        }
    }

    /// Set the number of publishes between status log messages
    #[must_use]
    pub fn with_log_interval(mut self, log_interval: u64) -> Self {
        self.log_interval = log_interval.max(1);
        self
    }

    /// Run one publish tick
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the record cannot be encoded, or whatever
    /// the sink reports.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        if !*self.enabled.borrow() {
            return Ok(TickOutcome::Disabled);
        }

        let snapshot = self.store.snapshot();
        let Some(payload) = encode_for_publish(&snapshot)? else {
            return Ok(TickOutcome::Suppressed);
        };

        self.sink.deliver(&payload).await?;
        debug!("Published {}", payload);
        Ok(TickOutcome::Published)
    }

    /// Tick until `shutdown` turns `true` or the sink's consumer is gone
    ///
    /// The first tick fires one period after start. The command record is
    /// never modified.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PublishStats {
        if *shutdown.borrow() {
            return self.stats;
        }

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Starting publish loop every {:?}", self.period);

        let mut last_log_count: u64 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.stats.ticks += 1;

                    match self.tick().await {
                        Ok(TickOutcome::Published) => self.stats.published += 1,
                        Ok(TickOutcome::Suppressed) => self.stats.suppressed += 1,
                        Ok(TickOutcome::Disabled) => {}
                        Err(BridgeError::ChannelClosed(what)) => {
                            info!("Publish consumer gone ({}), stopping", what);
                            break;
                        }
                        Err(e) => {
                            self.stats.failed += 1;
                            warn!("Publish tick failed: {}", e);
                            continue;
                        }
                    }

                    if self.stats.published - last_log_count >= self.log_interval {
                        info!(
                            "Published {} records ({} suppressed, {} failed)",
                            self.stats.published, self.stats.suppressed, self.stats.failed
                        );
                        last_log_count = self.stats.published;
                    }
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Publish loop stopped after {} ticks", self.stats.ticks);
        self.stats
    }
}
