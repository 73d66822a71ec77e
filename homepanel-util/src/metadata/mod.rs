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
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// TOKEN_PATH is the path of the IMDSv2 session token.
const TOKEN_PATH: &str = "/latest/api/token";

/// INSTANCE_ID_PATH is the path of the instance id.
const INSTANCE_ID_PATH: &str = "/latest/meta-data/instance-id";

/// TOKEN_TTL_HEADER requests the lifetime of the IMDSv2 session token.
const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";

/// TOKEN_HEADER carries the IMDSv2 session token.
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";

/// TOKEN_TTL is the lifetime of the session token in seconds, only one lookup is
/// done per process.
const TOKEN_TTL: &str = "60";

/// AMAZON_LINUX_TOOL ships with Amazon Linux and prints `instance-id: i-...`.
const AMAZON_LINUX_TOOL: &str = "ec2-metadata";

/// CLOUD_UTILS_TOOL ships with Ubuntu cloud images and prints the bare id.
const CLOUD_UTILS_TOOL: &str = "ec2metadata";

/// InstanceMetadata resolves the identity of the cloud instance the sampler runs on.
pub struct InstanceMetadata {
    /// Base url of the instance metadata service.
    endpoint: String,

    /// Client used to query the metadata service.
    client: reqwest::Client,
}

impl InstanceMetadata {
    /// Creates a new InstanceMetadata, every request is bounded by the timeout.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .no_proxy()
            .build()?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Returns the instance id, or None when the host is not a cloud instance.
    ///
    /// The metadata service is asked first, then the metadata tool of the
    /// distribution.
    #[instrument(skip_all)]
    pub async fn get_instance_id(&self) -> Option<String> {
        match self.get_instance_id_from_service().await {
            Ok(instance_id) => {
                info!("instance id {} resolved from metadata service", instance_id);
                return Some(instance_id);
            }
            Err(err) => warn!("failed to query metadata service: {}", err),
        }

        match get_instance_id_from_tool().await {
            Ok(instance_id) => {
                info!("instance id {} resolved from metadata tool", instance_id);
                Some(instance_id)
            }
            Err(err) => {
                warn!("failed to run metadata tool: {}", err);
                None
            }
        }
    }

    /// Queries the metadata service, with an IMDSv2 token when the service hands
    /// one out and without it otherwise.
    pub async fn get_instance_id_from_service(&self) -> Result<String> {
        let token = match self.get_token().await {
            Ok(token) => Some(token),
            Err(err) => {
                debug!("metadata token unavailable, fall back to IMDSv1: {}", err);
                None
            }
        };

        let mut request = self
            .client
            .get(format!("{}{}", self.endpoint, INSTANCE_ID_PATH));
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }

        let body = request.send().await?.error_for_status()?.text().await?;
        parse_instance_id(&body)
    }

    /// Requests an IMDSv2 session token.
    async fn get_token(&self) -> Result<String> {
        let token = self
            .client
            .put(format!("{}{}", self.endpoint, TOKEN_PATH))
            .header(TOKEN_TTL_HEADER, TOKEN_TTL)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let token = token.trim();
        if token.is_empty() {
            return Err(Error::UnexpectedResponse("empty metadata token".to_string()));
        }

        Ok(token.to_string())
    }
}

/// Runs the metadata tool of the distribution.
async fn get_instance_id_from_tool() -> Result<String> {
    #[cfg(target_os = "linux")]
    {
        use tokio::process::Command;

        let os_release = tokio::fs::read_to_string("/etc/os-release").await?;
        let tool = select_tool(&os_release);
        let output = Command::new(tool).arg("--instance-id").output().await?;
        if !output.status.success() {
            return Err(Error::UnexpectedResponse(format!(
                "{} exited with {}: {}",
                tool,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_tool_output(tool, &String::from_utf8_lossy(&output.stdout))
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(Error::Unsupported(format!(
            "metadata tool on {}",
            std::env::consts::OS
        )))
    }
}

/// Picks the metadata tool by distribution, Amazon Linux ships ec2-metadata and
/// the others are assumed to ship ec2metadata from cloud-utils.
pub fn select_tool(os_release: &str) -> &'static str {
    if os_release.contains("Amazon Linux") {
        AMAZON_LINUX_TOOL
    } else {
        CLOUD_UTILS_TOOL
    }
}

/// Extracts the instance id from the output of the metadata tool.
pub fn parse_tool_output(tool: &str, stdout: &str) -> Result<String> {
    let stdout = stdout.trim();
    if tool == AMAZON_LINUX_TOOL {
        return match stdout.split_once(": ") {
            Some((_, instance_id)) => parse_instance_id(instance_id),
            None => Err(Error::UnexpectedResponse(format!(
                "{} output {}",
                tool, stdout
            ))),
        };
    }

    parse_instance_id(stdout)
}

/// Validates a raw instance id.
fn parse_instance_id(raw: &str) -> Result<String> {
    let instance_id = raw.trim();
    if instance_id.is_empty() || instance_id.contains(char::is_whitespace) {
        return Err(Error::UnexpectedResponse(format!(
            "invalid instance id {:?}",
            instance_id
        )));
    }

    Ok(instance_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn metadata(server: &MockServer) -> InstanceMetadata {
        InstanceMetadata::new(&server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn resolves_instance_id_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(TOKEN_PATH))
            .and(header(TOKEN_TTL_HEADER, TOKEN_TTL))
            .respond_with(ResponseTemplate::new(200).set_body_string("secret-token"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(INSTANCE_ID_PATH))
            .and(header(TOKEN_HEADER, "secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("i-0abc123def4567890"))
            .expect(1)
            .mount(&server)
            .await;

        let instance_id = metadata(&server).get_instance_id().await;
        assert_eq!(instance_id.as_deref(), Some("i-0abc123def4567890"));
    }

    #[tokio::test]
    async fn falls_back_to_imdsv1() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(INSTANCE_ID_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("i-0123456789abcdef0\n"))
            .mount(&server)
            .await;

        let instance_id = metadata(&server)
            .get_instance_id_from_service()
            .await
            .unwrap();
        assert_eq!(instance_id, "i-0123456789abcdef0");
    }

    #[tokio::test]
    async fn service_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(INSTANCE_ID_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(metadata(&server)
            .get_instance_id_from_service()
            .await
            .is_err());

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(INSTANCE_ID_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("  "))
            .mount(&server)
            .await;

        assert!(matches!(
            metadata(&server).get_instance_id_from_service().await,
            Err(Error::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn select_tool_by_distribution() {
        assert_eq!(
            select_tool("NAME=\"Amazon Linux\"\nVERSION=\"2023\""),
            AMAZON_LINUX_TOOL
        );
        assert_eq!(
            select_tool("NAME=\"Ubuntu\"\nVERSION_ID=\"24.04\""),
            CLOUD_UTILS_TOOL
        );
    }

    #[test]
    fn parse_tool_outputs() {
        assert_eq!(
            parse_tool_output(AMAZON_LINUX_TOOL, "instance-id: i-0abc\n").unwrap(),
            "i-0abc"
        );
        assert_eq!(
            parse_tool_output(CLOUD_UTILS_TOOL, "i-0def\n").unwrap(),
            "i-0def"
        );
        assert!(parse_tool_output(AMAZON_LINUX_TOOL, "i-0abc").is_err());
        assert!(parse_tool_output(CLOUD_UTILS_TOOL, "").is_err());
    }
}
