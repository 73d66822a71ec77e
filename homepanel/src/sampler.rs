/*
 *     Copyright 2025 The Homepanel Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use crate::billing::Reconciler;
use crate::counter::Probe;
use crate::publisher::Publisher;
use crate::rate::{self, CounterSnapshot};
use crate::report::{MetricsRecord, Report};
use homepanel_config::sampler::Cloud;
use homepanel_core::Result;
use homepanel_util::shutdown;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

/// SamplerState is the state carried from one tick to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerState {
    /// initial_snapshot is the origin of the session totals.
    pub initial_snapshot: CounterSnapshot,

    /// previous_snapshot is the origin of the rates, updated every tick.
    pub previous_snapshot: CounterSnapshot,

    /// last_billing_refresh is the last attempt to refresh the billing total,
    /// None until the first attempt.
    pub last_billing_refresh: Option<Instant>,

    /// cached_billing_total is the last billing total fetched successfully.
    pub cached_billing_total: u64,
}

/// SamplerState implements the sampler state.
impl SamplerState {
    /// new creates the state starting at the initial snapshot.
    pub fn new(initial_snapshot: CounterSnapshot) -> Self {
        Self {
            initial_snapshot,
            previous_snapshot: initial_snapshot,
            last_billing_refresh: None,
            cached_billing_total: 0,
        }
    }
}

/// init_reconciler resolves the billing reconciler at startup. When the
/// identity is required and does not resolve, the error record is published
/// for the readers of the report before the error is returned, the sampler
/// must not start.
pub async fn init_reconciler(cloud: &Cloud, publisher: &Publisher) -> Result<Reconciler> {
    match Reconciler::from_config(cloud).await {
        Ok(reconciler) => Ok(reconciler),
        Err(err) => {
            error!("initialize billing reconciler failed: {}", err);
            let report = Report::Error {
                error: err.to_string(),
            };
            if let Err(publish_err) = publisher.publish(&report) {
                error!("publish error report failed: {}", publish_err);
            }

            Err(err)
        }
    }
}

/// Sampler samples the host and publishes the metrics on a fixed cadence.
pub struct Sampler {
    /// interval is the interval between two ticks.
    interval: Duration,

    /// probe reads the host counters.
    probe: Arc<dyn Probe>,

    /// reconciler provides the billing period total.
    reconciler: Reconciler,

    /// publisher writes the report file.
    publisher: Publisher,

    /// shutdown is used to shutdown the sampler.
    shutdown: shutdown::Shutdown,

    /// _shutdown_complete is used to notify the sampler is shutdown.
    _shutdown_complete: mpsc::UnboundedSender<()>,
}

/// Sampler implements the sampler loop.
impl Sampler {
    /// new creates a new Sampler.
    pub fn new(
        interval: Duration,
        probe: Arc<dyn Probe>,
        reconciler: Reconciler,
        publisher: Publisher,
        shutdown: shutdown::Shutdown,
        shutdown_complete_tx: mpsc::UnboundedSender<()>,
    ) -> Self {
        Self {
            interval,
            probe,
            reconciler,
            publisher,
            shutdown,
            _shutdown_complete: shutdown_complete_tx,
        }
    }

    /// run runs the sampler until the shutdown signal is received.
    pub async fn run(&self) {
        // Clone the shutdown channel.
        let mut shutdown = self.shutdown.clone();

        // The first tick fires immediately, every later tick waits the full
        // interval after the previous tick finished.
        let mut interval = tokio::time::interval(self.interval);

        let mut state: Option<SamplerState> = None;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match state {
                        None => state = self.initialize().await,
                        Some(ref mut state) => {
                            self.tick(state).await;
                        }
                    }

                    // Sleep for the interval after the tick.
                    interval.reset();
                }
                _ = shutdown.recv() => {
                    // Shutdown the sampler.
                    info!("sampler shutting down");
                    return
                }
            }
        }
    }

    /// initialize reads the initial snapshot, None if the read failed and has
    /// to be retried on the next tick.
    async fn initialize(&self) -> Option<SamplerState> {
        match self.probe.read().await {
            Ok(sample) => {
                info!(
                    "sampler started with sent: {}, received: {}, billing enabled: {}",
                    sample.snapshot.bytes_sent,
                    sample.snapshot.bytes_received,
                    self.reconciler.is_enabled()
                );
                Some(SamplerState::new(sample.snapshot))
            }
            Err(err) => {
                error!("read initial counters failed: {}", err);
                None
            }
        }
    }

    /// tick samples the host once and publishes the record. A failed read or
    /// a tick without elapsed time is skipped and leaves the published report
    /// untouched. Returns the assembled record.
    #[instrument(skip_all)]
    pub async fn tick(&self, state: &mut SamplerState) -> Option<MetricsRecord> {
        let sample = match self.probe.read().await {
            Ok(sample) => sample,
            Err(err) => {
                error!("read counters failed: {}", err);
                return None;
            }
        };

        let Some(rates) = rate::compute(
            &state.previous_snapshot,
            &sample.snapshot,
            &state.initial_snapshot,
        ) else {
            warn!("no time elapsed since the previous snapshot, skip tick");
            return None;
        };
        state.previous_snapshot = sample.snapshot;

        let billing_period_total = self
            .reconciler
            .maybe_refresh(state, sample.snapshot.timestamp)
            .await;

        let record = MetricsRecord::new(
            sample.cpu_percent,
            sample.memory_percent,
            &rates,
            billing_period_total,
        );

        if let Err(err) = self.publish(Report::Metrics(record.clone())).await {
            error!("publish report failed: {}", err);
        }

        Some(record)
    }

    /// publish writes the report without blocking the runtime.
    async fn publish(&self, report: Report) -> Result<()> {
        let publisher = self.publisher.clone();
        tokio::task::spawn_blocking(move || publisher.publish(&report)).await?
    }
}
