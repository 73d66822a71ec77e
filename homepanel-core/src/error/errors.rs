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

use std::borrow::Cow;
use std::{error::Error as ErrorTrait, fmt};

/// ErrorType classifies an error raised by a collaborator outside the crate.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorType {
    ConfigError,
    ValidationError,
    SerializeError,
    ParseError,
    MetadataError,
    BillingError,
    LoggingError,
}

impl ErrorType {
    /// Returns the name of the error type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::ConfigError => "ConfigError",
            ErrorType::ValidationError => "ValidationError",
            ErrorType::SerializeError => "SerializeError",
            ErrorType::ParseError => "ParseError",
            ErrorType::MetadataError => "MetadataError",
            ErrorType::BillingError => "BillingError",
            ErrorType::LoggingError => "LoggingError",
        }
    }
}

/// ExternalError wraps a foreign error with a type and an optional context message.
#[derive(Debug)]
pub struct ExternalError {
    pub etype: ErrorType,
    pub cause: Option<Box<dyn ErrorTrait + Send + Sync>>,
    pub context: Option<Cow<'static, str>>,
}

impl ExternalError {
    pub fn new(etype: ErrorType) -> Self {
        ExternalError {
            etype,
            cause: None,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<Cow<'static, str>>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_cause(mut self, cause: Box<dyn ErrorTrait + Send + Sync>) -> Self {
        self.cause = Some(cause);
        self
    }
}

impl fmt::Display for ExternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.etype.as_str())?;
        if let Some(context) = self.context.as_ref() {
            write!(f, " context: {}", context)?;
        }

        if let Some(cause) = self.cause.as_ref() {
            write!(f, " cause: {}", cause)?;
        }

        Ok(())
    }
}

impl ErrorTrait for ExternalError {
    fn source(&self) -> Option<&(dyn ErrorTrait + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn ErrorTrait + 'static))
    }
}

/// OrErr converts any error result into an ExternalError result.
pub trait OrErr<T, E> {
    /// Wraps E with the given type, keeping E as the cause.
    fn or_err(self, etype: ErrorType) -> Result<T, ExternalError>
    where
        E: Into<Box<dyn ErrorTrait + Send + Sync>>;

    /// Same as or_err with an additional context message.
    fn or_context(self, etype: ErrorType, context: &'static str) -> Result<T, ExternalError>
    where
        E: Into<Box<dyn ErrorTrait + Send + Sync>>;
}

impl<T, E> OrErr<T, E> for Result<T, E> {
    fn or_err(self, etype: ErrorType) -> Result<T, ExternalError>
    where
        E: Into<Box<dyn ErrorTrait + Send + Sync>>,
    {
        self.map_err(|err| ExternalError::new(etype).with_cause(err.into()))
    }

    fn or_context(self, etype: ErrorType, context: &'static str) -> Result<T, ExternalError>
    where
        E: Into<Box<dyn ErrorTrait + Send + Sync>>,
    {
        self.map_err(|err| {
            ExternalError::new(etype)
                .with_cause(err.into())
                .with_context(context)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_type_context_and_cause() {
        let error = ExternalError::new(ErrorType::ConfigError);
        assert_eq!(error.to_string(), "ConfigError");

        let error = ExternalError::new(ErrorType::MetadataError)
            .with_context(format!("endpoint {}", "http://169.254.169.254"));
        assert_eq!(
            error.to_string(),
            "MetadataError context: endpoint http://169.254.169.254"
        );

        let error = ExternalError::new(ErrorType::BillingError)
            .with_context("get metric statistics")
            .with_cause(Box::new(std::io::Error::other("throttled")));
        assert_eq!(
            error.to_string(),
            "BillingError context: get metric statistics cause: throttled"
        );
        assert!(error.source().is_some());
    }

    #[test]
    fn should_wrap_result_errors() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::other("disk full"));
        let error = result.or_err(ErrorType::SerializeError).unwrap_err();
        assert_eq!(error.to_string(), "SerializeError cause: disk full");

        let result: Result<u64, std::num::ParseIntError> = "not-a-number".parse::<u64>();
        let error = result
            .or_context(ErrorType::ParseError, "parse interface speed")
            .unwrap_err();
        assert!(error
            .to_string()
            .starts_with("ParseError context: parse interface speed cause:"));
    }
}
