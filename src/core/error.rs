pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{message}")]
    InsufficientCandidates { message: String },
    #[error("{message}")]
    PredictionFailure { message: String },
    #[error("No median available for feature column {column}.")]
    Feature { column: String },
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },
    #[error("No return model loaded for the {horizon}-year horizon.")]
    ModelUnavailable { horizon: u32 },
    #[error("Prediction error: {message}")]
    Prediction { message: String },
    #[error("Not found: {message}")]
    NotFound { message: String },
    #[error("Invalid fund universe: {message}")]
    InvalidUniverse { message: String },
    #[error("Invalid model artifact: {message}")]
    InvalidArtifact { message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable label used in structured failure results.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientCandidates { .. } => "insufficient_candidates",
            Self::PredictionFailure { .. } => "prediction_failure",
            Self::Feature { .. } => "feature_error",
            Self::Configuration { .. } => "configuration_error",
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::Prediction { .. } => "prediction_error",
            Self::NotFound { .. } => "not_found",
            Self::InvalidUniverse { .. } => "invalid_universe",
            Self::InvalidArtifact { .. } => "invalid_artifact",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}
