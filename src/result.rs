use thiserror::Error;

pub type Result<A, E = Error> = std::result::Result<A, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("creation error: {0}")]
    Creation(String),
    #[error("interpret error: {0}")]
    Interpret(String),
    #[error("read error: {0}")]
    Read(String),
    #[error("value error: {0}")]
    Value(String),
    #[error("index error: {0}")]
    Index(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn creation(msg: impl Into<String>) -> Self {
        Error::Creation(msg.into())
    }

    pub(crate) fn interpret(msg: impl Into<String>) -> Self {
        Error::Interpret(msg.into())
    }

    pub(crate) fn read(msg: impl Into<String>) -> Self {
        Error::Read(msg.into())
    }

    pub(crate) fn value(msg: impl Into<String>) -> Self {
        Error::Value(msg.into())
    }

    pub(crate) fn index(msg: impl Into<String>) -> Self {
        Error::Index(msg.into())
    }
}
