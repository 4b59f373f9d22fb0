use crate::{
    connector::ConnectError,
    expr::{EvalError, ParseError},
    mapping::BindError,
};

/// Result alias that carries the custom [`StageError`] type.
pub type Result<T> = std::result::Result<T, StageError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Free-form failure with a readable message.
    #[error("{0}")]
    Message(String),
    /// No tracker is registered under the given id.
    #[error("unknown tracker `{0}`")]
    UnknownTracker(String),
    /// No scene object is registered under the given id.
    #[error("unknown object `{0}`")]
    UnknownObject(String),
    /// The object exists but does not expose the named connector function.
    #[error("object `{object}` has no connector `{connector}`")]
    UnknownConnector { object: String, connector: String },
    #[error("unknown animation `{0}`")]
    UnknownAnimation(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Bind(#[from] BindError),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl StageError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for StageError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for StageError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
