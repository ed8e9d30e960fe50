use {
    bytesio::bytes_errors::{BytesReadError, BytesWriteError},
    failure::{Backtrace, Fail},
    std::fmt,
    std::io::Error,
};

#[derive(Debug, Fail)]
pub enum MpegTsErrorValue {
    #[fail(display = "bytes read error: {}", _0)]
    BytesReadError(BytesReadError),

    #[fail(display = "bytes write error: {}", _0)]
    BytesWriteError(BytesWriteError),

    #[fail(display = "io error: {}", _0)]
    IOError(Error),

    #[fail(display = "bad sync byte: 0x{:02x}", _0)]
    BadSyncByte(u8),

    #[fail(display = "ts packet too short: {}", _0)]
    PacketTooShort(usize),

    #[fail(display = "stream count exceeded, capacity: {}", _0)]
    StreamCountExceeded(usize),

    #[fail(display = "stream already registered: {}", _0)]
    StreamExists(u16),

    #[fail(display = "invalid stream descriptor: {}", _0)]
    InvalidStreamDescriptor(String),
}
#[derive(Debug)]
pub struct MpegTsError {
    pub value: MpegTsErrorValue,
}

impl From<MpegTsErrorValue> for MpegTsError {
    fn from(val: MpegTsErrorValue) -> Self {
        MpegTsError { value: val }
    }
}

impl From<BytesReadError> for MpegTsError {
    fn from(error: BytesReadError) -> Self {
        MpegTsError {
            value: MpegTsErrorValue::BytesReadError(error),
        }
    }
}

impl From<BytesWriteError> for MpegTsError {
    fn from(error: BytesWriteError) -> Self {
        MpegTsError {
            value: MpegTsErrorValue::BytesWriteError(error),
        }
    }
}

impl From<Error> for MpegTsError {
    fn from(error: Error) -> Self {
        MpegTsError {
            value: MpegTsErrorValue::IOError(error),
        }
    }
}

impl fmt::Display for MpegTsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl Fail for MpegTsError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.value.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.value.backtrace()
    }
}
