use crate::cursor::CursorState;
use crate::types::WireType;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not allocate an append iterator for the message")]
    Allocation,
    #[error("message cannot take arguments: {0}")]
    InvalidMessageState(String),
    #[error("cursor is {0:?}, no further arguments can be appended")]
    InvalidState(CursorState),
    #[error("argument list is already finished")]
    AlreadyFinished,
    #[error("failed to encode {wire_type} argument")]
    Encode { wire_type: WireType },
    #[error("invalid {wire_type} value: {reason}")]
    InvalidValue { wire_type: WireType, reason: String },
    #[error(transparent)]
    Signature(#[from] dbus_signature::Error),
    #[error("type mismatch: expected '{expected}', got '{found}'")]
    SignatureMismatch { expected: String, found: String },
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
    #[error("malformed message body: {0}")]
    Decode(String),
}

impl Error {
    /// Whether the message the error came from must be thrown away.
    ///
    /// Contract violations are caught before anything is written; write
    /// failures may leave partial data behind.
    pub fn is_fatal_for_message(&self) -> bool {
        matches!(self, Error::Encode { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
