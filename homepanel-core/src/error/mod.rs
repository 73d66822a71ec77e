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

pub mod errors;

pub use errors::ErrorType;
pub use errors::ExternalError;
pub use errors::OrErr;

// PanelError is the error for homepanel.
#[derive(thiserror::Error, Debug)]
pub enum PanelError {
    // IO is the error for IO operation.
    #[error(transparent)]
    IO(#[from] std::io::Error),

    // LockTimeout is the error when the report file lock is not acquired in time.
    #[error("acquire lock of {0} timeout")]
    LockTimeout(String),

    // InterfaceNotFound is the error when a configured network interface is missing.
    #[error("network interface {0} not found")]
    InterfaceNotFound(String),

    // InstanceIdNotFound is the error when the cloud instance identity can not be resolved.
    #[error("no instance id was found")]
    InstanceIdNotFound,

    // BillingAPI is the error for the cloud billing metrics api.
    #[error("billing api: {0}")]
    BillingAPI(String),

    // UnexpectedResponse is the error when the response is unexpected.
    #[error("unexpected response {0}")]
    UnexpectedResponse(String),

    // InvalidParameter is the error when the parameter is invalid.
    #[error("invalid parameter {0}")]
    InvalidParameter(String),

    // Unsupported is the error for unsupported.
    #[error("unsupported {0}")]
    Unsupported(String),

    // ReqwestError is the error for reqwest.
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    // SerdeJSONError is the error for serde_json.
    #[error(transparent)]
    SerdeJSONError(#[from] serde_json::Error),

    // TokioJoinError is the error for tokio join.
    #[error(transparent)]
    TokioJoinError(#[from] tokio::task::JoinError),

    // ExternalError is the error for external error.
    #[error(transparent)]
    ExternalError(#[from] ExternalError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_external_error() {
        fn load() -> Result<(), PanelError> {
            let content: Result<String, std::io::Error> =
                Err(std::io::Error::other("permission denied"));
            content.or_context(ErrorType::ConfigError, "read hpsampler.yaml")?;
            Ok(())
        }

        let err = load().unwrap_err();
        assert!(matches!(err, PanelError::ExternalError(_)));
        assert_eq!(
            err.to_string(),
            "ConfigError context: read hpsampler.yaml cause: permission denied"
        );
    }

    #[test]
    fn should_display_domain_errors() {
        assert_eq!(
            PanelError::LockTimeout("/tmp/report.json".to_string()).to_string(),
            "acquire lock of /tmp/report.json timeout"
        );
        assert_eq!(
            PanelError::InterfaceNotFound("eth9".to_string()).to_string(),
            "network interface eth9 not found"
        );
        assert_eq!(
            PanelError::InstanceIdNotFound.to_string(),
            "no instance id was found"
        );
    }
}
