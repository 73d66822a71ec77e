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

use crate::rate::CounterSnapshot;
use async_trait::async_trait;
use homepanel_core::Result;
use homepanel_util::sysinfo::SystemMonitor;
use std::time::Instant;
use tracing::debug;

/// Sample is everything read from the host in a single tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// snapshot is the cumulative network counters.
    pub snapshot: CounterSnapshot,

    /// cpu_percent is the global cpu usage over the refresh interval.
    pub cpu_percent: f64,

    /// memory_percent is the used memory share.
    pub memory_percent: f64,
}

/// Probe reads the host counters.
#[async_trait]
pub trait Probe: Send + Sync {
    /// read takes a new sample. It does not retry, a failure only fails the
    /// current tick.
    async fn read(&self) -> Result<Sample>;
}

/// CounterReader reads the counters of the local host.
pub struct CounterReader {
    /// monitor is the system monitor of the host.
    monitor: SystemMonitor,
}

/// CounterReader implements the counter reader.
impl CounterReader {
    /// new creates a new CounterReader.
    pub fn new(monitor: SystemMonitor) -> Self {
        Self { monitor }
    }
}

/// Probe implements the Probe trait for CounterReader.
#[async_trait]
impl Probe for CounterReader {
    async fn read(&self) -> Result<Sample> {
        // Cpu usage blocks for the refresh interval, so the counters are read
        // afterwards to stay close to the timestamp.
        let cpu_percent = self.monitor.cpu.get_used_percent().await;
        let memory = self.monitor.memory.get_stats();
        let counters = self.monitor.network.get_counters()?;
        let timestamp = Instant::now();

        debug!(
            "read counters sent: {}, received: {}, cpu: {:.2}%, memory: {:.2}%",
            counters.bytes_sent, counters.bytes_received, cpu_percent, memory.used_percent
        );

        Ok(Sample {
            snapshot: CounterSnapshot {
                bytes_sent: counters.bytes_sent,
                bytes_received: counters.bytes_received,
                timestamp,
            },
            cpu_percent,
            memory_percent: memory.used_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homepanel_core::Error;
    use std::time::Duration;

    #[tokio::test]
    async fn read_local_counters() {
        let reader = CounterReader::new(SystemMonitor::new(Duration::from_millis(200), vec![]));
        let sample = reader.read().await.unwrap();

        assert!((0.0..=100.0).contains(&sample.cpu_percent));
        assert!((0.0..=100.0).contains(&sample.memory_percent));
        assert!(sample.snapshot.timestamp <= Instant::now());
    }

    #[tokio::test]
    async fn read_fails_on_missing_interface() {
        let reader = CounterReader::new(SystemMonitor::new(
            Duration::from_millis(200),
            vec!["hp-missing0".to_string()],
        ));

        assert!(matches!(
            reader.read().await,
            Err(Error::InterfaceNotFound(name)) if name == "hp-missing0"
        ));
    }
}
