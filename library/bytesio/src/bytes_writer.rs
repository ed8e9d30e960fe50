use {
    super::{
        bytes_errors::{BytesWriteError, BytesWriteErrorValue},
        bytesio::TNetIO,
    },
    byteorder::{ByteOrder, WriteBytesExt},
    bytes::BytesMut,
    std::{io::Write, sync::Arc, time::Duration},
    tokio::{sync::Mutex, time::timeout},
};

pub struct BytesWriter {
    pub bytes: Vec<u8>,
}

impl Default for BytesWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BytesWriter {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    fn check_range(&self, position: usize, size: usize) -> Result<(), BytesWriteError> {
        if position + size > self.bytes.len() {
            return Err(BytesWriteError {
                value: BytesWriteErrorValue::OutofIndex(position),
            });
        }
        Ok(())
    }

    pub fn write_u8(&mut self, byte: u8) -> Result<(), BytesWriteError> {
        self.bytes.write_u8(byte)?;
        Ok(())
    }

    pub fn write_u16_at<T: ByteOrder>(
        &mut self,
        position: usize,
        val: u16,
    ) -> Result<(), BytesWriteError> {
        self.check_range(position, 2)?;
        T::write_u16(&mut self.bytes[position..position + 2], val);
        Ok(())
    }

    pub fn write_u32_at<T: ByteOrder>(
        &mut self,
        position: usize,
        val: u32,
    ) -> Result<(), BytesWriteError> {
        self.check_range(position, 4)?;
        T::write_u32(&mut self.bytes[position..position + 4], val);
        Ok(())
    }

    pub fn get(&self, position: usize) -> Option<&u8> {
        self.bytes.get(position)
    }

    pub fn write_u16<T: ByteOrder>(&mut self, bytes: u16) -> Result<(), BytesWriteError> {
        self.bytes.write_u16::<T>(bytes)?;
        Ok(())
    }

    pub fn write_u24<T: ByteOrder>(&mut self, bytes: u32) -> Result<(), BytesWriteError> {
        self.bytes.write_u24::<T>(bytes)?;

        Ok(())
    }

    pub fn write_u32<T: ByteOrder>(&mut self, bytes: u32) -> Result<(), BytesWriteError> {
        self.bytes.write_u32::<T>(bytes)?;
        Ok(())
    }

    pub fn write_i64<T: ByteOrder>(&mut self, bytes: i64) -> Result<(), BytesWriteError> {
        self.bytes.write_i64::<T>(bytes)?;
        Ok(())
    }

    pub fn write_f64<T: ByteOrder>(&mut self, bytes: f64) -> Result<(), BytesWriteError> {
        self.bytes.write_f64::<T>(bytes)?;
        Ok(())
    }

    pub fn write_u64<T: ByteOrder>(&mut self, bytes: u64) -> Result<(), BytesWriteError> {
        self.bytes.write_u64::<T>(bytes)?;
        Ok(())
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<(), BytesWriteError> {
        self.bytes.write_all(buf)?;
        Ok(())
    }

    /// Writes `text` as UTF-16LE code units without a terminator.
    pub fn write_utf16le(&mut self, text: &str) -> Result<(), BytesWriteError> {
        for unit in text.encode_utf16() {
            self.bytes.write_u16::<byteorder::LittleEndian>(unit)?;
        }
        Ok(())
    }

    pub fn write_zeros(&mut self, count: usize) {
        self.bytes.resize(self.bytes.len() + count, 0);
    }

    /// Zero-pads the buffer up to the next multiple of `alignment`.
    pub fn pad_to_multiple(&mut self, alignment: usize) {
        if alignment == 0 {
            return;
        }
        let rem = self.bytes.len() % alignment;
        if rem != 0 {
            self.write_zeros(alignment - rem);
        }
    }

    pub fn prepend(&mut self, buf: &[u8]) -> Result<(), BytesWriteError> {
        let tmp_bytes = self.bytes.clone();
        self.bytes.clear();
        self.bytes.write_all(buf)?;
        self.bytes.write_all(tmp_bytes.as_slice())?;
        Ok(())
    }

    pub fn append(&mut self, writer: &mut BytesWriter) {
        self.bytes.append(&mut writer.bytes);
    }

    pub fn extract_current_bytes(&mut self) -> BytesMut {
        let rv_data = BytesMut::from(&self.bytes[..]);
        self.bytes.clear();
        rv_data
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn get_current_bytes(&self) -> BytesMut {
        BytesMut::from(&self.bytes[..])
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A `BytesWriter` bound to a shared connection. Values are staged locally
/// and go out in one write on `flush`.
pub struct AsyncBytesWriter {
    pub bytes_writer: BytesWriter,
    pub io: Arc<Mutex<Box<dyn TNetIO + Send + Sync>>>,
}

impl AsyncBytesWriter {
    pub fn new(io: Arc<Mutex<Box<dyn TNetIO + Send + Sync>>>) -> Self {
        Self {
            bytes_writer: BytesWriter::new(),
            io,
        }
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<(), BytesWriteError> {
        self.bytes_writer.write(buf)
    }

    pub fn len(&self) -> usize {
        self.bytes_writer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes_writer.is_empty()
    }

    pub async fn flush(&mut self) -> Result<(), BytesWriteError> {
        let data = self.bytes_writer.extract_current_bytes();
        self.io.lock().await.write(data.freeze()).await?;
        Ok(())
    }

    pub async fn flush_timeout(&mut self, duration: Duration) -> Result<(), BytesWriteError> {
        let data = self.bytes_writer.extract_current_bytes();
        let mut io = self.io.lock().await;

        match timeout(duration, io.write(data.freeze())).await {
            Ok(rv) => rv?,
            Err(_) => {
                return Err(BytesWriteError {
                    value: BytesWriteErrorValue::Timeout,
                })
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::BytesWriter;
    use crate::bytes_errors::BytesWriteErrorValue;
    use byteorder::{BigEndian, LittleEndian};

    #[test]
    fn test_patch_in_place() {
        let mut writer = BytesWriter::new();
        writer.write_u32::<LittleEndian>(0).unwrap();
        writer.write_u16::<BigEndian>(0x0102).unwrap();

        writer.write_u32_at::<LittleEndian>(0, 0xB00BFACE).unwrap();
        writer.write_u16_at::<LittleEndian>(4, 0xFFFF).unwrap();

        assert_eq!(&writer.bytes[..], &[0xCE, 0xFA, 0x0B, 0xB0, 0xFF, 0xFF]);
        assert!(writer.write_u32_at::<LittleEndian>(4, 1).is_err());
    }

    #[test]
    fn test_patch_out_of_range() {
        let mut writer = BytesWriter::with_capacity(8);
        writer.write_zeros(3);

        let err = writer.write_u16_at::<BigEndian>(2, 0x0102).unwrap_err();
        assert!(matches!(err.value, BytesWriteErrorValue::OutofIndex(2)));
        assert_eq!(err.to_string(), "patch at 2 runs past the end");
        assert_eq!(&writer.bytes[..], &[0, 0, 0]);
    }

    #[test]
    fn test_utf16le_and_padding() {
        let mut writer = BytesWriter::new();
        writer.write_utf16le("MS").unwrap();
        assert_eq!(&writer.bytes[..], &[b'M', 0, b'S', 0]);

        writer.write_u8(1).unwrap();
        writer.pad_to_multiple(8);
        assert_eq!(writer.len(), 8);
        writer.pad_to_multiple(8);
        assert_eq!(writer.len(), 8);
    }

    #[test]
    fn test_prepend() {
        let mut writer = BytesWriter::new();
        writer.write(&[3, 4]).unwrap();
        writer.prepend(&[1, 2]).unwrap();
        assert_eq!(&writer.extract_current_bytes()[..], &[1, 2, 3, 4]);
        assert!(writer.is_empty());
    }
}
