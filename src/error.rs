use std::{fmt, time::Duration};

use thiserror::Error;

/// Every variant except `ConfigurationInvalid` is recoverable at the level of a
/// single post or action: the scheduler logs it, bumps the error counter and moves
/// on to the next post.
#[derive(Debug, Clone, Error)]
pub enum EngageError {
    #[error("no usable post content")]
    ExtractionFailure,

    #[error("classification ambiguous: {0}")]
    ClassificationAmbiguous(String),

    #[error("{control} did not appear within {waited:?}")]
    ElementNotFound {
        control: &'static str,
        waited: Duration,
    },

    #[error("generation provider error: {0}")]
    Provider(String),

    #[error("malformed generation response: {0}")]
    MalformedResponse(String),

    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("ui interaction failed: {0}")]
    Interaction(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ExtractionFailure,
    ClassificationAmbiguous,
    ElementNotFound,
    ProviderError,
    MalformedResponse,
    ConfigurationInvalid,
    Interaction,
}

impl EngageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngageError::ExtractionFailure => ErrorKind::ExtractionFailure,
            EngageError::ClassificationAmbiguous(_) => ErrorKind::ClassificationAmbiguous,
            EngageError::ElementNotFound { .. } => ErrorKind::ElementNotFound,
            EngageError::Provider(_) => ErrorKind::ProviderError,
            EngageError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            EngageError::ConfigurationInvalid(_) => ErrorKind::ConfigurationInvalid,
            EngageError::Interaction(_) => ErrorKind::Interaction,
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        EngageError::ConfigurationInvalid(message.into())
    }
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::ExtractionFailure => "ExtractionFailure",
            ErrorKind::ClassificationAmbiguous => "ClassificationAmbiguous",
            ErrorKind::ElementNotFound => "ElementNotFound",
            ErrorKind::ProviderError => "ProviderError",
            ErrorKind::MalformedResponse => "MalformedResponse",
            ErrorKind::ConfigurationInvalid => "ConfigurationInvalid",
            ErrorKind::Interaction => "Interaction",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_and_malformed_are_distinct_kinds() {
        let provider = EngageError::Provider("HTTP 500".into());
        let malformed = EngageError::MalformedResponse("missing comment".into());
        assert_eq!(provider.kind(), ErrorKind::ProviderError);
        assert_eq!(malformed.kind(), ErrorKind::MalformedResponse);
        assert_ne!(provider.kind(), malformed.kind());
    }

    #[test]
    fn element_not_found_mentions_control_and_bound() {
        let err = EngageError::ElementNotFound {
            control: "comment composer",
            waited: Duration::from_millis(3000),
        };
        let text = err.to_string();
        assert!(text.contains("comment composer"));
        assert!(text.contains("3s"));
        assert_eq!(err.kind().label(), "ElementNotFound");
    }
}
