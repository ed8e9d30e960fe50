use {
    bytesio::{
        bytes_errors::{BytesReadError, BytesWriteError},
        bytesio_errors::BytesIOError,
    },
    failure::{Backtrace, Fail},
    std::{fmt, str::Utf8Error},
};

#[derive(Debug, Fail)]
pub enum MmsErrorValue {
    #[fail(display = "net io error: {}", _0)]
    BytesIOError(#[cause] BytesIOError),
    #[fail(display = "bytes read error: {}", _0)]
    BytesReadError(#[cause] BytesReadError),
    #[fail(display = "bytes write error: {}", _0)]
    BytesWriteError(#[cause] BytesWriteError),
    #[fail(display = "invalid url: {}", _0)]
    UrlParseError(#[cause] url::ParseError),
    #[fail(display = "utf8 error: {}", _0)]
    Utf8Error(#[cause] Utf8Error),
    #[fail(display = "unsupported protocol: {}", _0)]
    UnsupportedProtocol(String),
    #[fail(display = "url has no host")]
    MissingHost,
    #[fail(display = "url path is too long")]
    UrlTooLong,
    #[fail(display = "unexpected answer {:#04x} to command {:#04x}", answer, command)]
    UnexpectedAnswer { command: u32, answer: u32 },
    #[fail(display = "unexpected packet while waiting for a command answer")]
    UnexpectedPacket,
    #[fail(display = "invalid command packet")]
    InvalidCommand,
    #[fail(display = "server refused the protocol")]
    ProtocolFailed,
    #[fail(display = "authentication is not supported")]
    AuthenticationRequired,
    #[fail(display = "too many keepalive requests")]
    KeepaliveLimit,
    #[fail(display = "packet too large: {}", _0)]
    PacketTooLarge(usize),
    #[fail(display = "asf header too large: {}", _0)]
    AsfHeaderTooLarge(usize),
    #[fail(display = "malformed asf header")]
    MalformedAsfHeader,
    #[fail(display = "asf header has no usable stream")]
    NoStreams,
    #[fail(display = "http status error: {}", _0)]
    HttpStatus(u16),
    #[fail(display = "malformed http response")]
    MalformedHttpResponse,
    #[fail(display = "unknown chunk type: {:#06x}", _0)]
    UnknownChunkType(u16),
}

#[derive(Debug)]
pub struct MmsError {
    pub value: MmsErrorValue,
}

impl From<MmsErrorValue> for MmsError {
    fn from(val: MmsErrorValue) -> Self {
        MmsError { value: val }
    }
}

impl From<BytesIOError> for MmsError {
    fn from(error: BytesIOError) -> Self {
        MmsError {
            value: MmsErrorValue::BytesIOError(error),
        }
    }
}

impl From<BytesReadError> for MmsError {
    fn from(error: BytesReadError) -> Self {
        MmsError {
            value: MmsErrorValue::BytesReadError(error),
        }
    }
}

impl From<BytesWriteError> for MmsError {
    fn from(error: BytesWriteError) -> Self {
        MmsError {
            value: MmsErrorValue::BytesWriteError(error),
        }
    }
}

impl From<url::ParseError> for MmsError {
    fn from(error: url::ParseError) -> Self {
        MmsError {
            value: MmsErrorValue::UrlParseError(error),
        }
    }
}

impl From<Utf8Error> for MmsError {
    fn from(error: Utf8Error) -> Self {
        MmsError {
            value: MmsErrorValue::Utf8Error(error),
        }
    }
}

impl fmt::Display for MmsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl Fail for MmsError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.value.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.value.backtrace()
    }
}
