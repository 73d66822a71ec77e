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

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

/// Memory represents a memory interface for monitoring memory statistics.
#[derive(Debug, Clone, Default)]
pub struct Memory {}

/// Represents system-wide memory statistics.
#[derive(Debug, Clone, Default)]
pub struct MemoryStats {
    /// Total physical memory in bytes.
    pub total: u64,

    /// Available memory in bytes (includes reclaimable cache/buffers).
    pub available: u64,

    /// Used memory in bytes.
    pub usage: u64,

    /// Memory usage percentage (0.0 - 100.0).
    pub used_percent: f64,
}

impl MemoryStats {
    /// Builds the statistics from raw byte counts.
    pub fn new(total: u64, available: u64, usage: u64) -> Self {
        let used_percent = if total == 0 {
            0.0
        } else {
            ((usage as f64 / total as f64) * 100.0).clamp(0.0, 100.0)
        };

        MemoryStats {
            total,
            available,
            usage,
            used_percent,
        }
    }
}

impl Memory {
    /// Retrieves system-wide memory statistics.
    pub fn get_stats(&self) -> MemoryStats {
        let sys = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::new().with_ram()),
        );

        MemoryStats::new(
            sys.total_memory(),
            sys.available_memory(),
            sys.used_memory(),
        )
    }
}
