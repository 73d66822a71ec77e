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

use homepanel_core::{Error, Result};
use sysinfo::Networks;
use tracing::debug;

/// NetworkCounters holds the cumulative byte counters reported by the
/// operating system since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    /// Total bytes transmitted.
    pub bytes_sent: u64,

    /// Total bytes received.
    pub bytes_received: u64,
}

/// Network reads the interface counters, either of every interface or of
/// an allow-list of interfaces.
#[derive(Debug, Clone, Default)]
pub struct Network {
    // Counted interfaces, empty means every interface.
    interfaces: Vec<String>,
}

/// Implementation of network monitoring functionality.
impl Network {
    /// Creates a new Network monitor.
    pub fn new(interfaces: Vec<String>) -> Network {
        Network { interfaces }
    }

    /// Retrieves the cumulative counters summed over the counted interfaces.
    ///
    /// A configured interface missing from the host is an error, so a renamed
    /// or removed interface is noticed instead of silently counted as zero.
    pub fn get_counters(&self) -> Result<NetworkCounters> {
        let networks = Networks::new_with_refreshed_list();
        Self::accumulate(
            &self.interfaces,
            networks.iter().map(|(name, data)| {
                (
                    name.as_str(),
                    data.total_transmitted(),
                    data.total_received(),
                )
            }),
        )
    }

    /// Sums (name, transmitted, received) tuples for the counted interfaces.
    pub fn accumulate<'a>(
        interfaces: &[String],
        data: impl Iterator<Item = (&'a str, u64, u64)>,
    ) -> Result<NetworkCounters> {
        let mut counters = NetworkCounters::default();
        let mut found = Vec::with_capacity(interfaces.len());
        for (name, transmitted, received) in data {
            if !interfaces.is_empty()
                && !interfaces.iter().any(|interface| interface.as_str() == name)
            {
                continue;
            }

            debug!(
                "interface {} transmitted {} received {}",
                name, transmitted, received
            );
            counters.bytes_sent = counters.bytes_sent.saturating_add(transmitted);
            counters.bytes_received = counters.bytes_received.saturating_add(received);
            found.push(name);
        }

        if let Some(missing) = interfaces
            .iter()
            .find(|interface| !found.iter().any(|name| *name == interface.as_str()))
        {
            return Err(Error::InterfaceNotFound(missing.clone()));
        }

        Ok(counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interfaces() -> Vec<(&'static str, u64, u64)> {
        vec![("lo", 10, 10), ("eth0", 1_000, 2_000), ("wg0", 300, 400)]
    }

    #[test]
    fn accumulate_all_interfaces() {
        let counters = Network::accumulate(&[], interfaces().into_iter()).unwrap();
        assert_eq!(
            counters,
            NetworkCounters {
                bytes_sent: 1_310,
                bytes_received: 2_410,
            }
        );
    }

    #[test]
    fn accumulate_allow_list() {
        let allowed = vec!["eth0".to_string(), "wg0".to_string()];
        let counters = Network::accumulate(&allowed, interfaces().into_iter()).unwrap();
        assert_eq!(counters.bytes_sent, 1_300);
        assert_eq!(counters.bytes_received, 2_400);
    }

    #[test]
    fn accumulate_missing_interface() {
        let allowed = vec!["eth0".to_string(), "ens5".to_string()];
        let err = Network::accumulate(&allowed, interfaces().into_iter()).unwrap_err();
        assert!(matches!(err, Error::InterfaceNotFound(name) if name == "ens5"));
    }

    #[test]
    fn accumulate_saturates() {
        let data = vec![("eth0", u64::MAX, 1), ("eth1", 1, 1)];
        let counters = Network::accumulate(&[], data.into_iter()).unwrap();
        assert_eq!(counters.bytes_sent, u64::MAX);
        assert_eq!(counters.bytes_received, 2);
    }

    #[test]
    fn get_counters_of_host() {
        assert!(Network::default().get_counters().is_ok());
    }
}
