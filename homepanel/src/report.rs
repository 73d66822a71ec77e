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

use crate::rate::RateResult;
use bytesize::KIB;
use serde::{Deserialize, Serialize};

/// MetricsRecord is the record published on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Global cpu usage (0.0 - 100.0).
    pub cpu_percent: f64,

    /// Memory usage (0.0 - 100.0).
    pub memory_percent: f64,

    /// Current upload throughput, e.g. `12.3 KB/s`.
    pub upload_rate: String,

    /// Current download throughput.
    pub download_rate: String,

    /// Bytes uploaded since the sampler started.
    pub session_uploaded: String,

    /// Bytes downloaded since the sampler started.
    pub session_downloaded: String,

    /// Sum of the session upload and download.
    pub session_total: String,

    /// Inbound plus outbound bytes of the billing period as reported by the
    /// cloud provider, null when billing is disabled.
    pub billing_period_total: Option<String>,
}

/// MetricsRecord implements the metrics record.
impl MetricsRecord {
    /// new creates a new MetricsRecord from the sample and rates of a tick.
    pub fn new(
        cpu_percent: f64,
        memory_percent: f64,
        rates: &RateResult,
        billing_period_total: Option<u64>,
    ) -> Self {
        MetricsRecord {
            cpu_percent: round_percent(cpu_percent),
            memory_percent: round_percent(memory_percent),
            upload_rate: format_rate(rates.upload_bps),
            download_rate: format_rate(rates.download_bps),
            session_uploaded: format_size(rates.session_uploaded_bytes),
            session_downloaded: format_size(rates.session_downloaded_bytes),
            session_total: format_size(
                rates
                    .session_uploaded_bytes
                    .saturating_add(rates.session_downloaded_bytes),
            ),
            billing_period_total: billing_period_total.map(format_size),
        }
    }
}

/// Report is the content of the published file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Report {
    /// Metrics of the latest tick.
    Metrics(MetricsRecord),

    /// Written once when the sampler can not start.
    Error { error: String },
}

/// SIZE_UNITS are the units above bytes, each 1024 times the previous one.
const SIZE_UNITS: [&str; 6] = ["KB", "MB", "GB", "TB", "PB", "EB"];

/// format_size renders a byte count in 1024-based units rounded to two
/// decimals, e.g. `976.56 KB`. Counts below 1 KB are printed as whole bytes.
pub fn format_size(bytes: u64) -> String {
    if bytes < KIB {
        return format!("{} B", bytes);
    }

    let mut exponent = 0;
    let mut unit = 1u64;
    while exponent < SIZE_UNITS.len() {
        match unit.checked_mul(KIB) {
            Some(next) if bytes >= next => {
                unit = next;
                exponent += 1;
            }
            _ => break,
        }
    }

    let value = ((bytes as f64 / unit as f64) * 100.0).round() / 100.0;
    format!("{:?} {}", value, SIZE_UNITS[exponent - 1])
}

/// format_rate renders a throughput in bytes per second.
pub fn format_rate(bytes_per_second: f64) -> String {
    format!("{}/s", format_size(bytes_per_second.max(0.0).round() as u64))
}

/// round_percent keeps two decimals and clamps into the percentage range.
fn round_percent(percent: f64) -> f64 {
    ((percent * 100.0).round() / 100.0).clamp(0.0, 100.0)
}
