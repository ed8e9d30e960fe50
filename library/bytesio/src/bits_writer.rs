use {
    super::{
        bits_errors::{BitError, BitErrorValue},
        bytes_writer::BytesWriter,
    },
    bytes::BytesMut,
};

/// MSB-first bit packer, used to synthesize ADTS headers and in tests to
/// build elementary stream fixtures.
pub struct BitsWriter {
    writer: BytesWriter,
    cur_byte: u8,
    cur_bit_num: u8,
}

impl BitsWriter {
    pub fn new(writer: BytesWriter) -> Self {
        Self {
            writer,
            cur_byte: 0,
            cur_bit_num: 0,
        }
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), BitError> {
        if self.cur_bit_num != 0 {
            for byte in data {
                self.write_n_bits(*byte as u64, 8)?;
            }
            return Ok(());
        }
        self.writer.write(data)?;
        Ok(())
    }

    pub fn write_bit(&mut self, b: u8) -> Result<(), BitError> {
        self.cur_byte |= (b & 0x01) << (7 - self.cur_bit_num);
        self.cur_bit_num += 1;

        if self.cur_bit_num == 8 {
            self.writer.write_u8(self.cur_byte)?;
            self.cur_bit_num = 0;
            self.cur_byte = 0;
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<(), BitError> {
        if self.cur_bit_num == 8 {
            self.writer.write_u8(self.cur_byte)?;
            self.cur_bit_num = 0;
            self.cur_byte = 0;
        } else {
            log::trace!("cannot flush: {}", self.cur_bit_num);
        }

        Ok(())
    }

    pub fn write_n_bits(&mut self, data: u64, bit_num: usize) -> Result<(), BitError> {
        if bit_num > 64 {
            return Err(BitError {
                value: BitErrorValue::TooBig,
            });
        }
        if bit_num == 0 {
            return Ok(());
        }
        let mut bit_num_mut = bit_num;
        let mut data_mut = data;

        //fill the left bits of the current byte
        data_mut <<= 64 - bit_num;
        self.cur_byte |= (data_mut >> (56 + self.cur_bit_num)) as u8;

        let cur_byte_left_bit_num = 8 - self.cur_bit_num as usize;
        if bit_num_mut >= cur_byte_left_bit_num {
            data_mut = data_mut.checked_shl(cur_byte_left_bit_num as u32).unwrap_or(0);
            bit_num_mut -= cur_byte_left_bit_num;
            self.cur_bit_num = 8;
            self.flush()?;
        } else {
            self.cur_bit_num += bit_num_mut as u8;
            return Ok(());
        }

        while bit_num_mut > 0 {
            self.cur_byte = (data_mut >> 56) as u8;

            if bit_num_mut >= 8 {
                self.cur_bit_num = 8;
                self.flush()?;
                data_mut = data_mut.checked_shl(8).unwrap_or(0);
                bit_num_mut -= 8;
            } else {
                self.cur_bit_num = bit_num_mut as u8;
                break;
            }
        }

        Ok(())
    }

    pub fn write_uev(&mut self, value: u32) -> Result<(), BitError> {
        let code = value as u64 + 1;
        let bit_len = 64 - code.leading_zeros() as usize;
        self.write_n_bits(0, bit_len - 1)?;
        self.write_n_bits(code, bit_len)
    }

    pub fn write_sev(&mut self, value: i32) -> Result<(), BitError> {
        let code_num = if value > 0 {
            (value as u32) * 2 - 1
        } else {
            (value.unsigned_abs()) * 2
        };
        self.write_uev(code_num)
    }

    pub fn bits_aligment_8(&mut self) -> Result<(), BitError> {
        if self.cur_bit_num != 0 {
            self.cur_bit_num = 8;
            self.flush()?;
        }
        Ok(())
    }

    pub fn get_current_bytes(&self) -> BytesMut {
        self.writer.get_current_bytes()
    }

    pub fn len(&self) -> usize {
        self.writer.len() * 8 + self.cur_bit_num as usize
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {

    use super::BitsWriter;
    use super::BytesWriter;

    #[test]
    fn test_write_bit() {
        let bytes_writer = BytesWriter::new();
        let mut bit_writer = BitsWriter::new(bytes_writer);

        for _ in 0..6 {
            bit_writer.write_bit(0).unwrap();
        }
        bit_writer.write_bit(1).unwrap();
        bit_writer.write_bit(0).unwrap();

        let byte = bit_writer.get_current_bytes();
        assert_eq!(byte.to_vec()[0], 0x2);

        bit_writer.write_bit(1).unwrap();
        bit_writer.write_bit(1).unwrap();

        assert_eq!(bit_writer.cur_bit_num, 2);
        assert_eq!(bit_writer.cur_byte, 0xC0);
    }

    #[test]
    fn test_write_n_bits() {
        let bytes_writer = BytesWriter::new();
        let mut bit_writer = BitsWriter::new(bytes_writer);

        bit_writer.write_bit(1).unwrap();
        bit_writer.write_bit(1).unwrap();
        bit_writer.write_bit(0).unwrap();

        bit_writer.write_n_bits(0x03, 7).unwrap();

        let byte = bit_writer.get_current_bytes();
        assert_eq!(byte.to_vec()[0], 0xC0);

        assert_eq!(bit_writer.cur_bit_num, 2);
        assert_eq!(bit_writer.cur_byte, 0xC0);
    }

    #[test]
    fn test_write_adts_sync_word() {
        let mut bit_writer = BitsWriter::new(BytesWriter::new());

        bit_writer.write_n_bits(0xFFF, 12).unwrap();
        bit_writer.write_n_bits(0, 1).unwrap();
        bit_writer.write_n_bits(0, 2).unwrap();
        bit_writer.write_n_bits(1, 1).unwrap();

        assert_eq!(&bit_writer.get_current_bytes()[..], &[0xFF, 0xF1]);
    }

    #[test]
    fn test_write_uev() {
        let mut bit_writer = BitsWriter::new(BytesWriter::new());
        // 1 010 011 00100
        bit_writer.write_uev(0).unwrap();
        bit_writer.write_uev(1).unwrap();
        bit_writer.write_uev(2).unwrap();
        bit_writer.write_uev(3).unwrap();
        bit_writer.bits_aligment_8().unwrap();

        assert_eq!(&bit_writer.get_current_bytes()[..], &[0b1010_0110, 0b0100_0000]);
    }

    #[test]
    fn test_bits_aligment_8() {
        let bytes_writer = BytesWriter::new();
        let mut bit_writer = BitsWriter::new(bytes_writer);

        bit_writer.write_bit(1).unwrap();
        bit_writer.write_bit(1).unwrap();
        bit_writer.write_bit(0).unwrap();

        bit_writer.bits_aligment_8().unwrap();

        let byte = bit_writer.get_current_bytes();
        assert_eq!(byte.to_vec()[0], 0xC0);

        bit_writer.write_bit(1).unwrap();
        bit_writer.write_bit(1).unwrap();
        bit_writer.write_bit(0).unwrap();

        assert_eq!(bit_writer.cur_bit_num, 3);
        assert_eq!(bit_writer.cur_byte, 0xC0);
    }
}
