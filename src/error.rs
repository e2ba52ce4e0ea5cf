use std::fmt;

/// Step-local failures. Every variant is recoverable: the control loop logs it
/// and moves on to the next step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    Capture(String),
    Encode(String),
    Decision(String),
    Injection { requested: usize, accepted: usize },
    SurfaceCreation(String),
}

impl AgentError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Capture(_) => "CaptureFailure",
            Self::Encode(_) => "EncodeFailure",
            Self::Decision(_) => "DecisionFailure",
            Self::Injection { .. } => "InjectionFailure",
            Self::SurfaceCreation(_) => "SurfaceCreationFailure",
        }
    }

    pub fn decision(message: impl Into<String>) -> Self {
        Self::Decision(message.into())
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capture(msg) => write!(f, "screen capture failed: {msg}"),
            Self::Encode(msg) => write!(f, "image encode failed: {msg}"),
            Self::Decision(msg) => write!(f, "decision failed: {msg}"),
            Self::Injection {
                requested,
                accepted,
            } => write!(
                f,
                "input injection delivered {accepted} of {requested} events"
            ),
            Self::SurfaceCreation(msg) => write!(f, "overlay surface creation failed: {msg}"),
        }
    }
}

impl std::error::Error for AgentError {}

/// Pull the taxonomy entry back out of an `anyhow` chain.
pub fn classify(err: &anyhow::Error) -> Option<&AgentError> {
    err.chain().find_map(|cause| cause.downcast_ref::<AgentError>())
}

#[cfg(test)]
mod tests {
    use super::{classify, AgentError};
    use anyhow::Context;

    #[test]
    fn classify_finds_error_behind_context() {
        let result: Result<(), AgentError> = Err(AgentError::Capture("denied".into()));
        let err = result.context("step 3").unwrap_err();
        assert_eq!(
            classify(&err).map(AgentError::kind),
            Some("CaptureFailure")
        );
    }

    #[test]
    fn injection_message_reports_counts() {
        let err = AgentError::Injection {
            requested: 3,
            accepted: 1,
        };
        assert_eq!(err.to_string(), "input injection delivered 1 of 3 events");
    }
}
