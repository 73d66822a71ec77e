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

use homepanel_core::{
    error::{ErrorType, OrErr},
    Result,
};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};
use validator::{Validate, ValidationError};

/// NAME is the name of the sampler daemon.
pub const NAME: &str = "hpsampler";

/// REPORT_FILE_NAME is the file name of the published report.
pub const REPORT_FILE_NAME: &str = "system_network_usage.json";

/// Returns the default config path for the sampler.
#[inline]
pub fn default_sampler_config_path() -> PathBuf {
    crate::default_config_dir().join("hpsampler.yaml")
}

/// Returns the default log directory for the sampler.
#[inline]
pub fn default_sampler_log_dir() -> PathBuf {
    crate::default_log_dir().join(NAME)
}

/// Returns the default path of the published report.
#[inline]
pub fn default_report_path() -> PathBuf {
    crate::default_reports_dir().join(REPORT_FILE_NAME)
}

/// Returns the default interval between two ticks.
#[inline]
fn default_sampler_interval() -> Duration {
    Duration::from_secs(1)
}

/// Returns the default window used to measure cpu usage.
#[inline]
fn default_sampler_cpu_refresh_interval() -> Duration {
    Duration::from_secs(1)
}

/// Returns the default timeout of acquiring the report file lock.
#[inline]
fn default_publisher_lock_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Returns the default region of the billing metrics api.
#[inline]
fn default_cloud_region() -> String {
    "us-east-1".to_string()
}

/// Returns the default ttl of the cached billing total, default is 10 minutes.
#[inline]
fn default_cloud_cache_ttl() -> Duration {
    Duration::from_secs(600)
}

/// Returns the default timeout of a billing api operation.
#[inline]
fn default_cloud_request_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Returns the default endpoint of the instance metadata service.
#[inline]
fn default_cloud_metadata_endpoint() -> String {
    "http://169.254.169.254".to_string()
}

/// Returns the default timeout of an instance metadata request.
#[inline]
fn default_cloud_metadata_timeout() -> Duration {
    Duration::from_secs(2)
}

/// validate_non_zero_duration rejects zero durations.
fn validate_non_zero_duration(duration: &Duration) -> std::result::Result<(), ValidationError> {
    if duration.is_zero() {
        return Err(ValidationError::new("zero_duration"));
    }

    Ok(())
}

/// Sampler is the tick configuration.
#[derive(Debug, Clone, Validate, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Sampler {
    /// Interval is the sleep between two ticks.
    #[serde(default = "default_sampler_interval", with = "humantime_serde")]
    #[validate(custom = "validate_non_zero_duration")]
    pub interval: Duration,

    /// CPU refresh interval is the window used to measure cpu usage, it adds up
    /// to the interval to form the real tick period.
    #[serde(
        default = "default_sampler_cpu_refresh_interval",
        with = "humantime_serde"
    )]
    #[validate(custom = "validate_non_zero_duration")]
    pub cpu_refresh_interval: Duration,

    /// Interfaces limits the counted interfaces, empty means all interfaces.
    pub interfaces: Vec<String>,
}

impl Default for Sampler {
    fn default() -> Self {
        Sampler {
            interval: default_sampler_interval(),
            cpu_refresh_interval: default_sampler_cpu_refresh_interval(),
            interfaces: Vec::new(),
        }
    }
}

/// Publisher is the report file configuration.
#[derive(Debug, Clone, Validate, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Publisher {
    /// Path is the report file shared with the control panel api.
    #[serde(default = "default_report_path")]
    pub path: PathBuf,

    /// Lock timeout bounds the wait for the exclusive lock of the report file.
    #[serde(default = "default_publisher_lock_timeout", with = "humantime_serde")]
    #[validate(custom = "validate_non_zero_duration")]
    pub lock_timeout: Duration,
}

impl Default for Publisher {
    fn default() -> Self {
        Publisher {
            path: default_report_path(),
            lock_timeout: default_publisher_lock_timeout(),
        }
    }
}

/// CloudMode decides whether the billing reconciler runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudMode {
    /// Disabled never looks up the instance identity.
    Disabled,

    /// Auto enables billing when the instance identity resolves.
    #[default]
    Auto,

    /// Required fails the startup when the instance identity does not resolve.
    Required,
}

impl fmt::Display for CloudMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudMode::Disabled => write!(f, "disabled"),
            CloudMode::Auto => write!(f, "auto"),
            CloudMode::Required => write!(f, "required"),
        }
    }
}

impl FromStr for CloudMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" => Ok(CloudMode::Disabled),
            "auto" => Ok(CloudMode::Auto),
            "required" => Ok(CloudMode::Required),
            _ => Err(format!(
                "invalid cloud mode {}, expected one of disabled, auto, required",
                s
            )),
        }
    }
}

/// Cloud is the billing and instance metadata configuration.
#[derive(Debug, Clone, Validate, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Cloud {
    /// Mode decides whether the billing reconciler runs.
    pub mode: CloudMode,

    /// Region is the region of the billing metrics api.
    #[serde(default = "default_cloud_region")]
    #[validate(length(min = 1))]
    pub region: String,

    /// Cache TTL is the minimum interval between two billing api calls.
    #[serde(
        default = "default_cloud_cache_ttl",
        rename = "cacheTTL",
        with = "humantime_serde"
    )]
    #[validate(custom = "validate_non_zero_duration")]
    pub cache_ttl: Duration,

    /// Request timeout bounds a single billing api operation.
    #[serde(default = "default_cloud_request_timeout", with = "humantime_serde")]
    #[validate(custom = "validate_non_zero_duration")]
    pub request_timeout: Duration,

    /// Metadata endpoint is the base url of the instance metadata service.
    #[serde(default = "default_cloud_metadata_endpoint")]
    #[validate(url)]
    pub metadata_endpoint: String,

    /// Metadata timeout bounds a single instance metadata request.
    #[serde(default = "default_cloud_metadata_timeout", with = "humantime_serde")]
    #[validate(custom = "validate_non_zero_duration")]
    pub metadata_timeout: Duration,
}

impl Default for Cloud {
    fn default() -> Self {
        Cloud {
            mode: CloudMode::default(),
            region: default_cloud_region(),
            cache_ttl: default_cloud_cache_ttl(),
            request_timeout: default_cloud_request_timeout(),
            metadata_endpoint: default_cloud_metadata_endpoint(),
            metadata_timeout: default_cloud_metadata_timeout(),
        }
    }
}

/// Config is the configuration for the sampler daemon.
#[derive(Debug, Clone, Default, Validate, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Sampler is the tick configuration.
    #[validate]
    pub sampler: Sampler,

    /// Publisher is the report file configuration.
    #[validate]
    pub publisher: Publisher,

    /// Cloud is the billing and instance metadata configuration.
    #[validate]
    pub cloud: Cloud,
}

impl Config {
    /// Load the configuration from file, a missing file yields the defaults.
    #[instrument(skip_all)]
    pub async fn load(path: &Path) -> Result<Config> {
        let mut config = if fs::try_exists(path).await? {
            let content = fs::read_to_string(path).await?;
            serde_yaml::from_str(&content).or_err(ErrorType::ConfigError)?
        } else {
            info!("config {} not found, use default config", path.display());
            Config::default()
        };

        // Convert configuration.
        config.convert();

        // Validate configuration.
        config.validate().or_err(ErrorType::ValidationError)?;
        Ok(config)
    }

    /// Convert expands the home directory prefix of the report path.
    fn convert(&mut self) {
        if let Ok(rest) = self.publisher.path.strip_prefix("~") {
            if let Some(home) = home::home_dir() {
                self.publisher.path = home.join(rest);
            }
        }
    }
}
