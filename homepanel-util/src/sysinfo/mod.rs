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

pub mod cpu;
pub mod memory;
pub mod network;

/// SystemMonitor aggregates the cpu, memory and network monitors read by
/// the sampler on every tick.
#[derive(Debug, Clone, Default)]
pub struct SystemMonitor {
    /// CPU resource monitor for tracking processor usage.
    pub cpu: cpu::CPU,

    /// Memory resource monitor for tracking RAM usage.
    pub memory: memory::Memory,

    /// Network resource monitor for tracking interface counters.
    pub network: network::Network,
}

impl SystemMonitor {
    /// Constructs a new SystemMonitor.
    ///
    /// # Arguments
    ///
    /// * `cpu_refresh_interval` - The window used to measure cpu usage
    /// * `interfaces` - The counted interfaces, empty means all
    pub fn new(cpu_refresh_interval: Duration, interfaces: Vec<String>) -> Self {
        Self {
            cpu: cpu::CPU::new(cpu_refresh_interval),
            memory: memory::Memory::default(),
            network: network::Network::new(interfaces),
        }
    }
}
