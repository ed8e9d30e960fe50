use {
    bytesio::bytes_errors::BytesWriteError,
    failure::{Backtrace, Fail},
    std::{fmt, io::Error},
    xmpegts::errors::MpegTsError,
};

#[derive(Debug, Fail)]
pub enum StreamHubErrorValue {
    #[fail(display = "io error: {}", _0)]
    IOError(Error),
    #[fail(display = "bytes write error: {}", _0)]
    BytesWriteError(BytesWriteError),
    #[fail(display = "mpegts error: {}", _0)]
    MpegTsError(MpegTsError),
    #[fail(display = "payload too large: {}", _0)]
    PayloadTooLarge(usize),
    #[fail(display = "layout event channel closed")]
    ChannelClosed,
}

#[derive(Debug)]
pub struct StreamHubError {
    pub value: StreamHubErrorValue,
}

impl From<StreamHubErrorValue> for StreamHubError {
    fn from(val: StreamHubErrorValue) -> Self {
        StreamHubError { value: val }
    }
}

impl From<Error> for StreamHubError {
    fn from(error: Error) -> Self {
        StreamHubError {
            value: StreamHubErrorValue::IOError(error),
        }
    }
}

impl From<BytesWriteError> for StreamHubError {
    fn from(error: BytesWriteError) -> Self {
        StreamHubError {
            value: StreamHubErrorValue::BytesWriteError(error),
        }
    }
}

impl From<MpegTsError> for StreamHubError {
    fn from(error: MpegTsError) -> Self {
        StreamHubError {
            value: StreamHubErrorValue::MpegTsError(error),
        }
    }
}

impl fmt::Display for StreamHubError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl Fail for StreamHubError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.value.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.value.backtrace()
    }
}
