pub type VisageResult<T> = Result<T, VisageError>;

#[derive(thiserror::Error, Debug)]
pub enum VisageError {
    #[error("validation error: {0}")]
    Validation(String),

    /// No mask source is available for the requested region (no landmarks and
    /// no manual polygon).
    #[error("missing geometry: {0}")]
    MissingGeometry(String),

    /// Degenerate or empty stroke sample sequence.
    #[error("invalid stroke: {0}")]
    InvalidStroke(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    /// The persistence collaborator rejected a save. Surfaced to the caller,
    /// never retried by the engine.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VisageError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_geometry(msg: impl Into<String>) -> Self {
        Self::MissingGeometry(msg.into())
    }

    pub fn invalid_stroke(msg: impl Into<String>) -> Self {
        Self::InvalidStroke(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn quota_exceeded(msg: impl Into<String>) -> Self {
        Self::QuotaExceeded(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            VisageError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            VisageError::missing_geometry("x")
                .to_string()
                .contains("missing geometry:")
        );
        assert!(
            VisageError::invalid_stroke("x")
                .to_string()
                .contains("invalid stroke:")
        );
        assert!(
            VisageError::encoding("x")
                .to_string()
                .contains("encoding error:")
        );
        assert!(
            VisageError::quota_exceeded("x")
                .to_string()
                .contains("quota exceeded:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = VisageError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
