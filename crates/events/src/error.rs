use std::fmt;
use std::error;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// A registration named no events.
    InvalidArgument,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}

impl error::Error for Error {}
