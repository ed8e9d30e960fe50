use {
    super::bytesio_errors::BytesIOError,
    failure::{Backtrace, Fail},
    std::{fmt, io},
};

/// Failures of the in-memory reader. A short buffer is the common case,
/// callers usually wait for more data on `NotEnoughBytes`.
#[derive(Debug, Fail)]
pub enum BytesReadErrorValue {
    #[fail(display = "not enough bytes to read")]
    NotEnoughBytes,
    #[fail(display = "io error: {}", _0)]
    IO(#[cause] io::Error),
    #[fail(display = "index {} out of range", _0)]
    IndexOutofRange(usize),
}

#[derive(Debug)]
pub struct BytesReadError {
    pub value: BytesReadErrorValue,
}

impl From<BytesReadErrorValue> for BytesReadError {
    fn from(val: BytesReadErrorValue) -> Self {
        BytesReadError { value: val }
    }
}

impl From<io::Error> for BytesReadError {
    fn from(error: io::Error) -> Self {
        BytesReadError {
            value: BytesReadErrorValue::IO(error),
        }
    }
}

#[derive(Debug)]
pub struct BytesWriteError {
    pub value: BytesWriteErrorValue,
}

/// Failures of the staging writer and of flushing it to a connection.
#[derive(Debug, Fail)]
pub enum BytesWriteErrorValue {
    #[fail(display = "io error: {}", _0)]
    IO(#[cause] io::Error),
    #[fail(display = "connection error: {}", _0)]
    BytesIOError(BytesIOError),
    #[fail(display = "write timed out")]
    Timeout,
    #[fail(display = "patch at {} runs past the end", _0)]
    OutofIndex(usize),
}

impl From<io::Error> for BytesWriteError {
    fn from(error: io::Error) -> Self {
        BytesWriteError {
            value: BytesWriteErrorValue::IO(error),
        }
    }
}

impl From<BytesIOError> for BytesWriteError {
    fn from(error: BytesIOError) -> Self {
        BytesWriteError {
            value: BytesWriteErrorValue::BytesIOError(error),
        }
    }
}

impl fmt::Display for BytesReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl Fail for BytesReadError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.value.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.value.backtrace()
    }
}

impl fmt::Display for BytesWriteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl Fail for BytesWriteError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.value.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.value.backtrace()
    }
}
