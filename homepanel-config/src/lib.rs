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

use std::path::PathBuf;

pub mod sampler;

/// SERVICE_NAME is the name of the service.
pub const SERVICE_NAME: &str = "homepanel";

/// CARGO_PKG_VERSION is the version of the cargo package.
pub const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// default_root_dir is the default root directory for homepanel.
pub fn default_root_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = home::home_dir() {
            return home.join(".homepanel");
        }
    }

    PathBuf::from("/var/lib/homepanel/")
}

/// default_config_dir is the default config directory for homepanel.
pub fn default_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = home::home_dir() {
            return home.join(".homepanel").join("config");
        }
    }

    PathBuf::from("/etc/homepanel/")
}

/// default_log_dir is the default log directory for homepanel.
pub fn default_log_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = home::home_dir() {
            return home.join(".homepanel").join("logs");
        }
    }

    PathBuf::from("/var/log/homepanel/")
}

/// default_reports_dir is the directory shared with the control panel api, it
/// lives under the home directory of the user running the sampler.
pub fn default_reports_dir() -> PathBuf {
    match home::home_dir() {
        Some(home) => home.join("reports"),
        None => default_root_dir().join("reports"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_dir_ends_with_reports() {
        assert!(default_reports_dir().ends_with("reports"));
    }
}
