/// Crate-wide result alias.
pub type ReelResult<T> = Result<T, ReelError>;

/// Failure of a reel generation attempt.
///
/// Every stage reports through this type and the whole invocation fails as a unit: there is no
/// partial-success mode.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Empty text, zero words, or a missing or malformed required input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The font resource could not be read or parsed.
    #[error("font load error: {0}")]
    FontLoad(String),

    /// A background image could not be decoded or resized.
    #[error("image load error: {0}")]
    ImageLoad(String),

    /// Speech synthesis or narration measurement failed.
    #[error("narration error: {0}")]
    Narration(String),

    /// Muxing or writing the output container failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Context-carrying failure from lower layers (I/O and the like).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    /// Build an [`ReelError::InvalidInput`].
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Build a [`ReelError::FontLoad`].
    pub fn font_load(msg: impl Into<String>) -> Self {
        Self::FontLoad(msg.into())
    }

    /// Build a [`ReelError::ImageLoad`].
    pub fn image_load(msg: impl Into<String>) -> Self {
        Self::ImageLoad(msg.into())
    }

    /// Build a [`ReelError::Narration`].
    pub fn narration(msg: impl Into<String>) -> Self {
        Self::Narration(msg.into())
    }

    /// Build a [`ReelError::Encoding`].
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            ReelError::invalid_input("x")
                .to_string()
                .contains("invalid input:")
        );
        assert!(
            ReelError::font_load("x")
                .to_string()
                .contains("font load error:")
        );
        assert!(
            ReelError::image_load("x")
                .to_string()
                .contains("image load error:")
        );
        assert!(
            ReelError::narration("x")
                .to_string()
                .contains("narration error:")
        );
        assert!(
            ReelError::encoding("x")
                .to_string()
                .contains("encoding error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ReelError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
