pub type SlidecastResult<T> = Result<T, SlidecastError>;

#[derive(thiserror::Error, Debug)]
pub enum SlidecastError {
    /// A phase transition was requested before its inputs existed. Recoverable:
    /// the caller stays where it was and may retry once the input is supplied.
    #[error("input not ready: {0}")]
    InputNotReady(String),

    /// Media duration probing failed. Soft within a composition run: the run
    /// continues without a duration ceiling.
    #[error("probe error: {0}")]
    Probe(String),

    #[error("rasterization error: {0}")]
    Rasterization(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("composition error: {0}")]
    Composition(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SlidecastError {
    pub fn input_not_ready(msg: impl Into<String>) -> Self {
        Self::InputNotReady(msg.into())
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    pub fn rasterization(msg: impl Into<String>) -> Self {
        Self::Rasterization(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
