use std::{fmt, io};

use thiserror::Error;

/// Convenient wrapper around `std::Result`.
pub type Result<T> = std::result::Result<T, Error>;

/// The Error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("not enough memory in the buffer: {needed} bytes needed, {available} available")]
    NotEnoughMemory { needed: usize, available: usize },
    #[error("the external is locked and cannot be reassigned")]
    LockedExternalAccess,
    #[error("bad parameter: {0}")]
    BadParam(String),
    #[error("member {0:#x} must be understood but was not recognized")]
    MustUnderstandMember(u32),
    #[error("does not support the serde::Deserializer::deserialize_any method")]
    DeserializeAnyNotSupported,
    #[error("expected 0 or 1, found {0}")]
    InvalidBoolEncoding(u8),
    #[error("char {0:?} cannot be represented in the wire format")]
    InvalidChar(char),
    #[error("encapsulation is not valid")]
    InvalidEncapsulation,
    #[error("string is not valid UTF-8")]
    InvalidUtf8Encoding,
    #[error("wide string is not valid UTF-16")]
    InvalidUtf16Encoding,
    #[error("sequence is too long")]
    NumberOutOfRange,
    #[error("sequences must have a knowable size ahead of time")]
    SequenceMustHaveLength,
    #[error("the size limit has been reached")]
    SizeLimit,
    #[error("unsupported type")]
    TypeNotSupported,
}

impl Error {
    pub(crate) fn bad_param(msg: impl Into<String>) -> Self {
        Error::BadParam(msg.into())
    }
}

impl serde::de::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Error::Message(msg.to_string())
    }
}

impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Error::Message(msg.to_string())
    }
}
