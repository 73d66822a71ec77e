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

use crate::sampler::SamplerState;
use async_trait::async_trait;
use aws_config::{timeout::TimeoutConfig, BehaviorVersion, Region};
use aws_sdk_cloudwatch::error::DisplayErrorContext;
use aws_sdk_cloudwatch::types::{Dimension, StandardUnit, Statistic};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use homepanel_config::sampler::{Cloud, CloudMode};
use homepanel_core::{Error, Result};
use homepanel_util::metadata::InstanceMetadata;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// EC2_NAMESPACE is the namespace of the instance metrics.
const EC2_NAMESPACE: &str = "AWS/EC2";

/// NETWORK_IN_METRIC is the metric of the bytes received by the instance.
const NETWORK_IN_METRIC: &str = "NetworkIn";

/// NETWORK_OUT_METRIC is the metric of the bytes sent by the instance.
const NETWORK_OUT_METRIC: &str = "NetworkOut";

/// INSTANCE_ID_DIMENSION is the dimension selecting the instance.
const INSTANCE_ID_DIMENSION: &str = "InstanceId";

/// DATAPOINT_PERIOD_SECONDS aggregates the metrics per day.
const DATAPOINT_PERIOD_SECONDS: i32 = 86400;

/// BillingPeriod is the calendar month, in UTC, the provider bills traffic for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    /// start is the first day of the month at 00:00, inclusive.
    pub start: DateTime<Utc>,

    /// end is the first day of the next month at 00:00, exclusive.
    pub end: DateTime<Utc>,
}

/// BillingPeriod implements the billing period.
impl BillingPeriod {
    /// containing returns the billing period of the given time.
    pub fn containing(now: DateTime<Utc>) -> Result<Self> {
        let (next_year, next_month) = match now.month() {
            12 => (now.year() + 1, 1),
            month => (now.year(), month + 1),
        };

        Ok(Self {
            start: first_day_of_month(now.year(), now.month())?,
            end: first_day_of_month(next_year, next_month)?,
        })
    }
}

/// first_day_of_month returns 00:00 UTC of the first day of the month.
fn first_day_of_month(year: i32, month: u32) -> Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| Error::InvalidParameter(format!("invalid month {}-{}", year, month)))
}

/// BillingApi queries the traffic billed for an instance.
#[async_trait]
pub trait BillingApi: Send + Sync {
    /// get_period_total returns the inbound plus outbound bytes of the
    /// instance within the period.
    async fn get_period_total(&self, instance_id: &str, period: &BillingPeriod) -> Result<u64>;
}

/// CloudWatch is the billing api backed by the AWS CloudWatch metrics.
pub struct CloudWatch {
    /// client is the cloudwatch client.
    client: aws_sdk_cloudwatch::Client,
}

/// CloudWatch implements the cloudwatch billing api.
impl CloudWatch {
    /// new creates a new CloudWatch client in the region, every request is
    /// bounded by the timeout.
    pub async fn new(region: &str, timeout: Duration) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build())
            .load()
            .await;

        Self {
            client: aws_sdk_cloudwatch::Client::new(&config),
        }
    }

    /// sum_metric sums the daily datapoints of the metric within the period.
    async fn sum_metric(
        &self,
        metric_name: &str,
        instance_id: &str,
        period: &BillingPeriod,
    ) -> Result<f64> {
        let dimension = Dimension::builder()
            .name(INSTANCE_ID_DIMENSION)
            .value(instance_id)
            .build();

        let response = self
            .client
            .get_metric_statistics()
            .namespace(EC2_NAMESPACE)
            .metric_name(metric_name)
            .dimensions(dimension)
            .start_time(aws_smithy_types::DateTime::from_secs(
                period.start.timestamp(),
            ))
            .end_time(aws_smithy_types::DateTime::from_secs(period.end.timestamp()))
            .period(DATAPOINT_PERIOD_SECONDS)
            .statistics(Statistic::Sum)
            .unit(StandardUnit::Bytes)
            .send()
            .await
            .map_err(|err| Error::BillingAPI(DisplayErrorContext(&err).to_string()))?;

        Ok(response
            .datapoints()
            .iter()
            .filter_map(|datapoint| datapoint.sum())
            .sum())
    }
}

/// BillingApi implements the BillingApi trait for CloudWatch.
#[async_trait]
impl BillingApi for CloudWatch {
    #[instrument(skip(self, period))]
    async fn get_period_total(&self, instance_id: &str, period: &BillingPeriod) -> Result<u64> {
        let network_in = self
            .sum_metric(NETWORK_IN_METRIC, instance_id, period)
            .await?;
        let network_out = self
            .sum_metric(NETWORK_OUT_METRIC, instance_id, period)
            .await?;

        Ok((network_in + network_out).max(0.0).round() as u64)
    }
}

/// Reconciler decides whether the billing total is fetched from the provider
/// or served from the cache of the sampler state.
pub enum Reconciler {
    /// Disabled never reports a billing total.
    Disabled,

    /// Enabled queries the api at most once per ttl.
    Enabled {
        api: Arc<dyn BillingApi>,
        instance_id: String,
        ttl: Duration,
    },
}

/// Reconciler implements the billing reconciler.
impl Reconciler {
    /// new creates an enabled reconciler.
    pub fn new(api: Arc<dyn BillingApi>, instance_id: String, ttl: Duration) -> Self {
        Reconciler::Enabled {
            api,
            instance_id,
            ttl,
        }
    }

    /// from_config resolves the cloud capability once at startup. In auto mode
    /// a missing instance id disables billing, in required mode it fails with
    /// InstanceIdNotFound.
    pub async fn from_config(cloud: &Cloud) -> Result<Self> {
        if cloud.mode == CloudMode::Disabled {
            info!("cloud billing is disabled");
            return Ok(Reconciler::Disabled);
        }

        let instance_id =
            match InstanceMetadata::new(&cloud.metadata_endpoint, cloud.metadata_timeout) {
                Ok(metadata) => metadata.get_instance_id().await,
                Err(err) => {
                    warn!("create instance metadata client failed: {}", err);
                    None
                }
            };

        let Some(instance_id) = instance_id else {
            if cloud.mode == CloudMode::Required {
                return Err(Error::InstanceIdNotFound);
            }

            warn!("no instance id was found, cloud billing is disabled");
            return Ok(Reconciler::Disabled);
        };

        info!(
            "cloud billing is enabled for {} in {}, cache ttl {:?}",
            instance_id, cloud.region, cloud.cache_ttl
        );
        let api = CloudWatch::new(&cloud.region, cloud.request_timeout).await;
        Ok(Reconciler::new(Arc::new(api), instance_id, cloud.cache_ttl))
    }

    /// is_enabled returns true if the billing total is reported.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Reconciler::Enabled { .. })
    }

    /// maybe_refresh returns the billing total of the current period. The api
    /// is queried when the ttl elapsed since the last attempt, otherwise the
    /// cached total is returned. Failures keep the cached total and still
    /// restart the ttl window.
    pub async fn maybe_refresh(&self, state: &mut SamplerState, now: Instant) -> Option<u64> {
        let (api, instance_id, ttl) = match self {
            Reconciler::Disabled => return None,
            Reconciler::Enabled {
                api,
                instance_id,
                ttl,
            } => (api, instance_id, *ttl),
        };

        let expired = match state.last_billing_refresh {
            Some(last_refresh) => now.saturating_duration_since(last_refresh) >= ttl,
            None => true,
        };
        if !expired {
            return Some(state.cached_billing_total);
        }

        state.last_billing_refresh = Some(now);
        let result = match BillingPeriod::containing(Utc::now()) {
            Ok(period) => api.get_period_total(instance_id, &period).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(total) => {
                info!("refreshed billing period total of {}: {}", instance_id, total);
                state.cached_billing_total = total;
            }
            Err(err) => {
                error!(
                    "refresh billing period total of {} failed: {}, keep cached total {}",
                    instance_id, err, state.cached_billing_total
                );
            }
        }

        Some(state.cached_billing_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::CounterSnapshot;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use wiremock::matchers::any;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeBillingApi {
        calls: AtomicUsize,
        totals: Mutex<Vec<Result<u64>>>,
    }

    impl FakeBillingApi {
        fn new(totals: Vec<Result<u64>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                totals: Mutex::new(totals),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BillingApi for FakeBillingApi {
        async fn get_period_total(&self, instance_id: &str, period: &BillingPeriod) -> Result<u64> {
            assert_eq!(instance_id, "i-0123456789abcdef0");
            assert!(period.start < period.end);

            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut totals = self.totals.lock().unwrap();
            if totals.is_empty() {
                return Ok(0);
            }

            totals.remove(0)
        }
    }

    fn state(now: Instant) -> SamplerState {
        SamplerState::new(CounterSnapshot {
            bytes_sent: 0,
            bytes_received: 0,
            timestamp: now,
        })
    }

    fn reconciler(api: Arc<FakeBillingApi>) -> Reconciler {
        Reconciler::new(
            api,
            "i-0123456789abcdef0".to_string(),
            Duration::from_secs(600),
        )
    }

    #[test]
    fn billing_period_of_month() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 13, 45, 0).unwrap();
        let period = BillingPeriod::containing(now).unwrap();
        assert_eq!(period.start, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(period.end, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn billing_period_rolls_over_december() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let period = BillingPeriod::containing(now).unwrap();
        assert_eq!(period.start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(period.end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let period = BillingPeriod::containing(now).unwrap();
        assert_eq!(period.start, now);
    }

    #[tokio::test]
    async fn disabled_reports_nothing() {
        let now = Instant::now();
        let mut state = state(now);

        assert_eq!(Reconciler::Disabled.maybe_refresh(&mut state, now).await, None);
        assert!(!Reconciler::Disabled.is_enabled());
        assert_eq!(state.last_billing_refresh, None);
    }

    #[tokio::test]
    async fn refresh_respects_ttl() {
        let api = FakeBillingApi::new(vec![Ok(1000), Ok(2000)]);
        let reconciler = reconciler(api.clone());
        let start = Instant::now();
        let mut state = state(start);

        // First tick always refreshes.
        assert_eq!(reconciler.maybe_refresh(&mut state, start).await, Some(1000));
        assert_eq!(api.calls(), 1);

        // 100s later the cached total is served.
        let now = start + Duration::from_secs(100);
        assert_eq!(reconciler.maybe_refresh(&mut state, now).await, Some(1000));
        assert_eq!(api.calls(), 1);

        // 700s after the last refresh the api is invoked.
        let now = start + Duration::from_secs(700);
        assert_eq!(reconciler.maybe_refresh(&mut state, now).await, Some(2000));
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_cached_total() {
        let api = FakeBillingApi::new(vec![
            Err(Error::BillingAPI("throttled".to_string())),
            Ok(4096),
            Err(Error::BillingAPI("timeout".to_string())),
        ]);
        let reconciler = reconciler(api.clone());
        let start = Instant::now();
        let mut state = state(start);

        // Nothing succeeded yet.
        assert_eq!(reconciler.maybe_refresh(&mut state, start).await, Some(0));

        // The failed attempt restarted the window.
        let now = start + Duration::from_secs(300);
        assert_eq!(reconciler.maybe_refresh(&mut state, now).await, Some(0));
        assert_eq!(api.calls(), 1);

        let now = start + Duration::from_secs(600);
        assert_eq!(reconciler.maybe_refresh(&mut state, now).await, Some(4096));

        let now = start + Duration::from_secs(1200);
        assert_eq!(reconciler.maybe_refresh(&mut state, now).await, Some(4096));
        assert_eq!(api.calls(), 3);
        assert_eq!(state.cached_billing_total, 4096);
    }

    async fn cloud_without_instance_id(mode: CloudMode) -> (MockServer, Cloud) {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cloud = Cloud {
            mode,
            metadata_endpoint: server.uri(),
            metadata_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        (server, cloud)
    }

    #[tokio::test]
    async fn from_config_disabled_mode() {
        let cloud = Cloud {
            mode: CloudMode::Disabled,
            metadata_endpoint: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        };

        let reconciler = Reconciler::from_config(&cloud).await.unwrap();
        assert!(!reconciler.is_enabled());
    }

    #[tokio::test]
    async fn from_config_auto_mode_degrades() {
        let (_server, cloud) = cloud_without_instance_id(CloudMode::Auto).await;
        let reconciler = Reconciler::from_config(&cloud).await.unwrap();
        assert!(!reconciler.is_enabled());
    }

    #[tokio::test]
    async fn from_config_required_mode_fails() {
        let (_server, cloud) = cloud_without_instance_id(CloudMode::Required).await;
        assert!(matches!(
            Reconciler::from_config(&cloud).await,
            Err(Error::InstanceIdNotFound)
        ));
    }
}
