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

use std::time::Instant;

/// CounterSnapshot is a point-in-time reading of the cumulative byte counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Total bytes transmitted.
    pub bytes_sent: u64,

    /// Total bytes received.
    pub bytes_received: u64,

    /// When the counters were read.
    pub timestamp: Instant,
}

/// RateResult is the throughput between two snapshots and the usage since start.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateResult {
    /// Upload throughput in bytes per second.
    pub upload_bps: f64,

    /// Download throughput in bytes per second.
    pub download_bps: f64,

    /// Bytes uploaded since the initial snapshot.
    pub session_uploaded_bytes: u64,

    /// Bytes downloaded since the initial snapshot.
    pub session_downloaded_bytes: u64,
}

/// compute derives the rates of the interval `prev..curr` and the session
/// totals since `initial`.
///
/// Returns None when no time elapsed between the snapshots, the tick has to be
/// skipped. A counter lower than its origin (interface reset, reboot) counts as
/// zero instead of wrapping around.
pub fn compute(
    prev: &CounterSnapshot,
    curr: &CounterSnapshot,
    initial: &CounterSnapshot,
) -> Option<RateResult> {
    let elapsed = curr.timestamp.checked_duration_since(prev.timestamp)?;
    if elapsed.is_zero() {
        return None;
    }

    let elapsed_seconds = elapsed.as_secs_f64();
    Some(RateResult {
        upload_bps: curr.bytes_sent.saturating_sub(prev.bytes_sent) as f64 / elapsed_seconds,
        download_bps: curr.bytes_received.saturating_sub(prev.bytes_received) as f64
            / elapsed_seconds,
        session_uploaded_bytes: curr.bytes_sent.saturating_sub(initial.bytes_sent),
        session_downloaded_bytes: curr.bytes_received.saturating_sub(initial.bytes_received),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn snapshot(origin: Instant, secs: u64, sent: u64, received: u64) -> CounterSnapshot {
        CounterSnapshot {
            bytes_sent: sent,
            bytes_received: received,
            timestamp: origin + Duration::from_secs(secs),
        }
    }

    #[test]
    fn compute_rates_over_interval() {
        let origin = Instant::now();
        let prev = snapshot(origin, 0, 1000, 2000);
        let curr = snapshot(origin, 2, 1500, 2600);

        let result = compute(&prev, &curr, &prev).unwrap();
        assert_eq!(result.upload_bps, 250.0);
        assert_eq!(result.download_bps, 300.0);
        assert_eq!(result.session_uploaded_bytes, 500);
        assert_eq!(result.session_downloaded_bytes, 600);
    }

    #[test]
    fn compute_floors_counter_reset() {
        let origin = Instant::now();
        let prev = snapshot(origin, 0, 5000, 0);
        let curr = snapshot(origin, 1, 100, 0);

        let result = compute(&prev, &curr, &prev).unwrap();
        assert_eq!(result.upload_bps, 0.0);
        assert_eq!(result.download_bps, 0.0);
        assert_eq!(result.session_uploaded_bytes, 0);
    }

    #[test]
    fn compute_skips_without_elapsed_time() {
        let origin = Instant::now();
        let prev = snapshot(origin, 5, 1000, 1000);

        assert_eq!(compute(&prev, &snapshot(origin, 5, 2000, 2000), &prev), None);
        assert_eq!(compute(&prev, &snapshot(origin, 4, 2000, 2000), &prev), None);
    }

    #[test]
    fn session_totals_follow_initial_snapshot() {
        let origin = Instant::now();
        let initial = snapshot(origin, 0, 100, 100);
        let mut prev = initial;
        let mut last = RateResult::default();

        for (secs, sent, received) in [(1, 100, 150), (2, 400, 150), (3, 400, 900), (5, 1000, 901)]
        {
            let curr = snapshot(origin, secs, sent, received);
            let result = compute(&prev, &curr, &initial).unwrap();

            assert!(result.upload_bps >= 0.0);
            assert!(result.download_bps >= 0.0);
            assert!(result.session_uploaded_bytes >= last.session_uploaded_bytes);
            assert!(result.session_downloaded_bytes >= last.session_downloaded_bytes);

            last = result;
            prev = curr;
        }

        assert_eq!(last.session_uploaded_bytes, 900);
        assert_eq!(last.session_downloaded_bytes, 801);
        assert_eq!(last.upload_bps, 300.0);
    }

    #[test]
    fn rates_are_never_negative() {
        let origin = Instant::now();
        let pairs = [
            ((0, 0), (0, 0)),
            ((u64::MAX, u64::MAX), (0, 0)),
            ((10, 0), (0, 10)),
            ((0, 10), (10, 0)),
        ];

        for ((prev_sent, prev_received), (curr_sent, curr_received)) in pairs {
            let prev = snapshot(origin, 0, prev_sent, prev_received);
            let curr = snapshot(origin, 3, curr_sent, curr_received);
            let result = compute(&prev, &curr, &prev).unwrap();
            assert!(result.upload_bps >= 0.0);
            assert!(result.download_bps >= 0.0);
        }
    }
}
