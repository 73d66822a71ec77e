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

use std::time::Duration;
use sysinfo::{CpuRefreshKind, RefreshKind, System, MINIMUM_CPU_UPDATE_INTERVAL};

/// CPU measures the system-wide cpu usage.
#[derive(Debug, Clone)]
pub struct CPU {
    /// Window between the two usage samples.
    refresh_interval: Duration,
}

/// CPU implements the cpu monitor.
impl CPU {
    /// Creates a new CPU monitor, the refresh interval is raised to the minimum
    /// interval the operating system needs to report a meaningful usage.
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            refresh_interval: refresh_interval.max(MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    /// Returns the measurement window.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Returns the global cpu usage percentage (0.0 - 100.0) over the refresh interval.
    ///
    /// The call sleeps for the whole refresh interval, so it bounds the
    /// shortest possible tick of the sampler.
    pub async fn get_used_percent(&self) -> f64 {
        let mut sys = System::new_with_specifics(
            RefreshKind::new().with_cpu(CpuRefreshKind::new().with_cpu_usage()),
        );

        // Usage is the difference between two refreshes.
        tokio::time::sleep(self.refresh_interval).await;
        sys.refresh_cpu_usage();

        (sys.global_cpu_usage() as f64).clamp(0.0, 100.0)
    }
}

impl Default for CPU {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
