use thiserror::Error;

#[derive(Debug, Error)]
pub enum OnboardError {
    #[error("not initialized: run 'onboard init'")]
    NotInitialized,

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("already exists: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("invalid state: {0}")]
    State(String),

    #[error("prerequisite missing: {0}")]
    Prerequisite(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl OnboardError {
    /// Stable snake_case name of the rule family that was violated.
    pub fn kind(&self) -> &'static str {
        match self {
            OnboardError::NotInitialized => "not_initialized",
            OnboardError::Validation(_) => "validation",
            OnboardError::Conflict(_) => "conflict",
            OnboardError::NotFound(_) => "not_found",
            OnboardError::Permission(_) => "permission",
            OnboardError::State(_) => "state",
            OnboardError::Prerequisite(_) => "prerequisite",
            OnboardError::Store(_) => "store",
            OnboardError::Io(_) => "io",
            OnboardError::Yaml(_) => "yaml",
            OnboardError::Json(_) => "json",
        }
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        OnboardError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OnboardError>;
