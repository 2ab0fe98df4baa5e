//! Error types for the dashboard client.

use thiserror::Error;

/// Broad class of a failure, used to pick the notification wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input caught before any request was sent.
    Validation,
    /// The backend answered with an `error` field.
    Backend,
    /// Unreachable backend, non-2xx status, an undecodable body, or a
    /// downloaded document that could not be stored.
    Transport,
}

/// Errors produced while talking to the forecast API or driving the workflow.
#[derive(Error, Debug)]
pub enum DashboardError {
    /// Rejected form input. Never reaches the network.
    #[error("{0}")]
    Validation(String),

    /// Export was requested while no predictions are held.
    #[error("No predictions to export. Run a prediction first.")]
    NoPredictions,

    /// Error message reported by the backend.
    #[error("{0}")]
    Backend(String),

    /// The backend answered but did not flag the request as successful.
    #[error("The server did not report success")]
    Unsuccessful,

    /// Request could not be sent or no response arrived.
    #[error("Request failed: {0}")]
    Transport(String),

    /// Non-2xx status without a usable error payload.
    #[error("Server returned {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body was not the expected shape.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// The exported document arrived but could not be written locally.
    #[error("Failed to save {filename}: {reason}")]
    Save { filename: String, reason: String },
}

impl DashboardError {
    /// Maps the error onto the three-way taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DashboardError::Validation(_) | DashboardError::NoPredictions => ErrorKind::Validation,
            DashboardError::Backend(_) | DashboardError::Unsuccessful => ErrorKind::Backend,
            DashboardError::Transport(_)
            | DashboardError::Http { .. }
            | DashboardError::Decode(_)
            | DashboardError::Save { .. } => ErrorKind::Transport,
        }
    }

    /// Text shown to the user in an error notification.
    ///
    /// Transport failures keep their detail when one is available and fall
    /// back to `generic` otherwise.
    pub fn user_message(&self, generic: &str) -> String {
        match self {
            DashboardError::Http { body, .. } if body.trim().is_empty() => generic.to_string(),
            DashboardError::Transport(detail) if detail.trim().is_empty() => generic.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(error: serde_json::Error) -> Self {
        DashboardError::Decode(error.to_string())
    }
}

/// Year-over-year growth could not be computed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GrowthError {
    /// The previous year's population is zero.
    #[error("Population in {year} is zero; growth into {next_year} is undefined")]
    ZeroBase { year: i32, next_year: i32 },
}

pub type Result<T> = std::result::Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            DashboardError::Validation("bad".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(DashboardError::NoPredictions.kind(), ErrorKind::Validation);
        assert_eq!(DashboardError::Backend("x".into()).kind(), ErrorKind::Backend);
        assert_eq!(
            DashboardError::Http {
                status: 500,
                body: String::new()
            }
            .kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            DashboardError::Save {
                filename: "p.xlsx".into(),
                reason: "read-only".into()
            }
            .kind(),
            ErrorKind::Transport
        );
    }

    #[test]
    fn test_user_message_falls_back_to_generic() {
        let err = DashboardError::Http {
            status: 502,
            body: "  ".into(),
        };
        assert_eq!(err.user_message("Prediction failed"), "Prediction failed");

        let err = DashboardError::Backend("Job type \"X\" not found".into());
        assert_eq!(err.user_message("Prediction failed"), "Job type \"X\" not found");
    }

    #[test]
    fn test_zero_base_message() {
        let err = GrowthError::ZeroBase {
            year: 2020,
            next_year: 2021,
        };
        assert!(err.to_string().contains("2020"));
    }
}
