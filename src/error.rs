use thiserror::Error;

/// Content rejected before any browser interaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} exceeds the limit of {limit} characters")]
    TooLong { field: &'static str, limit: usize },
    #[error("{field} exceeds the limit of {limit} entries")]
    TooMany { field: &'static str, limit: usize },
    #[error("no usable media file remains after existence checks")]
    NoMedia,
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Empty { field } | Self::TooLong { field, .. } | Self::TooMany { field, .. } => {
                field
            }
            Self::NoMedia => "media",
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no interactable element found for role `{role}`")]
    NotFound { role: String },
    #[error("step `{step}` failed: {source:#}")]
    Step {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl PublishError {
    pub fn not_found(role: impl Into<String>) -> Self {
        Self::NotFound { role: role.into() }
    }

    pub fn step(step: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::Step {
            step,
            source: source.into(),
        }
    }
}

pub type PublishOutcome<T> = Result<T, PublishError>;
