
//! Error type and result aliases used across the whole crate.

pub type Result<T> = std::result::Result<T, Error>;
pub type PassiveResult = Result<()>;

pub use std::io::Error as IoError;
pub use std::io::Result as IoResult;


/// All the ways a stream node or a codec can fail.
///
/// End of stream is deliberately *not* an error: a short read followed by
/// `end_reached() == true` is the regular way a source drains.
#[derive(Debug)]
pub enum Error {

    /// An inner stream returned short, failed, or ended while bytes were
    /// still required.
    Io(IoError),

    /// The input of a block operation was not a positive multiple of the
    /// block size, or mismatched key/iv lengths were supplied.
    BadLength,

    /// A text codec met a character outside its alphabet.
    BadChar,

    /// A cipher operation was attempted before `set_key` succeeded.
    NotKeyed,

    /// More bytes were requested from a buffer than it holds.
    OutOfRange,

    /// The output buffer of a second-pass codec call is too small.
    BufferTooSmall,

    /// The deflate engine reported a data, stream or memory error.
    Codec(String),
}


impl Error {
    pub fn codec(message: impl Into<String>) -> Self {
        Error::Codec(message.into())
    }

    /// Shorthand for the "inner stream failed" case when there is no
    /// underlying `std::io::Error` to wrap.
    pub fn io(message: impl Into<String>) -> Self {
        Error::Io(IoError::new(std::io::ErrorKind::Other, message.into()))
    }
}


/// Enable using the `?` operator on io::Result
impl From<IoError> for Error {
    fn from(error: IoError) -> Self {
        Error::Io(error)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(error) => write!(formatter, "i/o error: {}", error),
            Error::BadLength => write!(formatter, "length is not a multiple of the block size"),
            Error::BadChar => write!(formatter, "character outside of the codec alphabet"),
            Error::NotKeyed => write!(formatter, "cipher used before a key was set"),
            Error::OutOfRange => write!(formatter, "requested more bytes than available"),
            Error::BufferTooSmall => write!(formatter, "output buffer too small"),
            Error::Codec(message) => write!(formatter, "codec error: {}", message),
        }
    }
}

impl std::error::Error for Error {}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        use Error::*;
        match (self, other) {
            (Io(_), Io(_)) => true,
            (BadLength, BadLength) | (BadChar, BadChar) | (NotKeyed, NotKeyed)
                | (OutOfRange, OutOfRange) | (BufferTooSmall, BufferTooSmall) => true,
            (Codec(a), Codec(b)) => a == b,
            _ => false,
        }
    }
}
