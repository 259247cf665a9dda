use thiserror::Error;

/// Crate-wide error type. Transient, per-message conditions (incomplete
/// frame, CRC mismatch, buffer too small) are *not* represented here — the
/// framer reports those through [`crate::FramerStatus`] instead, never as an
/// `Err`. This enum is for failures that abort a single decode/encode
/// operation outright.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("missing definition for message id {id:?} / name {name:?}")]
    MissingDefinition {
        id: Option<u16>,
        name: Option<String>,
    },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("missing reference: {0}")]
    MissingReference(String),

    #[error("byte source exhausted")]
    StreamEmpty,

    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("json error")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn missing_id(id: u16) -> Self {
        Error::MissingDefinition {
            id: Some(id),
            name: None,
        }
    }

    pub fn missing_name(name: impl Into<String>) -> Self {
        Error::MissingDefinition {
            id: None,
            name: Some(name.into()),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedInput(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    pub fn missing_reference(msg: impl Into<String>) -> Self {
        Error::MissingReference(msg.into())
    }
}
