use crate::domain::models::Action;

/// Failures while decoding a payload into operation records.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("malformed {format} payload: {reason}")]
    Malformed { format: &'static str, reason: String },

    #[error("operation #{index} is missing a path")]
    MissingPath { index: usize },

    #[error("operation #{index} has invalid action \"{action}\" for path \"{path}\"")]
    InvalidAction {
        index: usize,
        action: String,
        path: String,
    },
}

impl PayloadError {
    pub fn malformed(format: &'static str, reason: impl Into<String>) -> Self {
        PayloadError::Malformed {
            format,
            reason: reason.into(),
        }
    }
}

/// Failures while applying a batch to disk.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("failed to {action} \"{path}\": {source}")]
    OperationFailed {
        action: Action,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to {action} \"{path}\": path escapes the workspace root")]
    PathEscape { action: Action, path: String },

    #[error(transparent)]
    Payload(#[from] PayloadError),
}
