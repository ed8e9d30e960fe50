use bytesio::bits_errors::BitError;
use failure::{Backtrace, Fail};
use std::fmt;

#[derive(Debug, Fail)]
pub enum H264ErrorValue {
    #[fail(display = "bit error: {}", _0)]
    BitError(BitError),
    #[fail(display = "bitstream ended before the syntax element")]
    NotEnoughData,
    #[fail(display = "{} out of range: {}", _0, _1)]
    OutOfRange(&'static str, u32),
    #[fail(display = "unknown parameter set id: {}", _0)]
    UnknownParameterSet(u32),
}
#[derive(Debug)]
pub struct H264Error {
    pub value: H264ErrorValue,
}

impl H264Error {
    pub fn out_of_range(field: &'static str, value: u32) -> Self {
        H264Error {
            value: H264ErrorValue::OutOfRange(field, value),
        }
    }
}

impl From<H264ErrorValue> for H264Error {
    fn from(val: H264ErrorValue) -> Self {
        H264Error { value: val }
    }
}

impl From<BitError> for H264Error {
    fn from(error: BitError) -> Self {
        H264Error {
            value: H264ErrorValue::BitError(error),
        }
    }
}

impl fmt::Display for H264Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl Fail for H264Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.value.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.value.backtrace()
    }
}
