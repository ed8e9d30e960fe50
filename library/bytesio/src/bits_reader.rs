/// MSB-first bit cursor over a borrowed byte slice.
///
/// Reads that run past the end return 0, leave the cursor where it was and
/// latch the overrun flag. Elementary stream syntax routinely ends in
/// truncated or padded data, so callers that care check `remaining_bits()`
/// up front or `is_overrun()` after a batch of reads.
pub struct BitsReader<'a> {
    data: &'a [u8],
    bit_len: usize,
    bit_pos: usize,
    overrun: bool,
}

impl<'a> BitsReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_bit_len(data, data.len() * 8)
    }

    pub fn with_bit_len(data: &'a [u8], bit_len: usize) -> Self {
        Self {
            data,
            bit_len: bit_len.min(data.len() * 8),
            bit_pos: 0,
            overrun: false,
        }
    }

    pub fn remaining_bits(&self) -> usize {
        self.bit_len - self.bit_pos
    }

    pub fn position(&self) -> usize {
        self.bit_pos
    }

    pub fn is_overrun(&self) -> bool {
        self.overrun
    }

    pub fn is_byte_aligned(&self) -> bool {
        self.bit_pos % 8 == 0
    }

    fn bit_at(&self, pos: usize) -> u64 {
        ((self.data[pos >> 3] >> (7 - (pos & 0x07))) & 0x01) as u64
    }

    pub fn read_bit(&mut self) -> u8 {
        self.read_n_bits(1) as u8
    }

    pub fn read_flag(&mut self) -> bool {
        self.read_n_bits(1) == 1
    }

    pub fn read_n_bits(&mut self, n: usize) -> u64 {
        let value = self.peek_n_bits(n);
        if n > 64 || n > self.remaining_bits() {
            self.overrun = true;
            return 0;
        }
        self.bit_pos += n;
        value
    }

    pub fn peek_n_bits(&self, n: usize) -> u64 {
        if n > 64 || n > self.remaining_bits() {
            return 0;
        }

        let mut result: u64 = 0;
        let mut pos = self.bit_pos;
        let end = self.bit_pos + n;

        while pos < end {
            //take a whole byte when we are aligned and it fits
            if pos & 0x07 == 0 && end - pos >= 8 {
                result = (result << 8) | self.data[pos >> 3] as u64;
                pos += 8;
            } else {
                result = (result << 1) | self.bit_at(pos);
                pos += 1;
            }
        }
        result
    }

    pub fn skip_n_bits(&mut self, n: usize) {
        if n > self.remaining_bits() {
            self.bit_pos = self.bit_len;
            self.overrun = true;
        } else {
            self.bit_pos += n;
        }
    }

    pub fn read_byte(&mut self) -> u8 {
        self.read_n_bits(8) as u8
    }

    pub fn bits_aligment_8(&mut self) {
        let rem = self.bit_pos % 8;
        if rem != 0 {
            self.skip_n_bits(8 - rem);
        }
    }

    // ue(v) in 9.1 Parsing process for Exp-Golomb codes
    // ISO_IEC_14496-10-AVC-2012.pdf, page 227.
    //      leadingZeroBits = -1;
    //      for( b = 0; !b; leadingZeroBits++ )
    //          b = read_bits( 1 )
    //      codeNum = (1<<leadingZeroBits) - 1 + read_bits( leadingZeroBits )
    pub fn read_uev(&mut self) -> u32 {
        let mut leading_zero_bits: usize = 0;

        loop {
            if self.remaining_bits() == 0 {
                self.overrun = true;
                return 0;
            }
            if self.read_bit() != 0 {
                break;
            }
            leading_zero_bits += 1;
            if leading_zero_bits > 31 {
                self.overrun = true;
                return 0;
            }
        }

        if leading_zero_bits > self.remaining_bits() {
            self.overrun = true;
            return 0;
        }

        let code_num = ((1u64 << leading_zero_bits) - 1) + self.read_n_bits(leading_zero_bits);
        code_num as u32
    }

    // ISO_IEC_14496-10-AVC-2012.pdf, page 229.
    pub fn read_sev(&mut self) -> i32 {
        let code_num = self.read_uev() as i64;
        let value = (code_num + 1) >> 1;
        if code_num & 0x01 == 1 {
            value as i32
        } else {
            -value as i32
        }
    }
}

#[cfg(test)]
mod tests {

    use super::BitsReader;
    use crate::bits_writer::BitsWriter;
    use crate::bytes_writer::BytesWriter;

    #[test]
    fn test_read_bit() {
        let data = [2u8, 7u8];
        let mut bit_reader = BitsReader::new(&data);

        for _ in 0..6 {
            assert_eq!(bit_reader.read_bit(), 0);
        }
        assert_eq!(bit_reader.read_bit(), 1);
        assert_eq!(bit_reader.read_bit(), 0);

        for _ in 0..5 {
            assert_eq!(bit_reader.read_bit(), 0);
        }
        assert_eq!(bit_reader.read_bit(), 1);
        assert_eq!(bit_reader.read_bit(), 1);
        assert_eq!(bit_reader.read_bit(), 1);
        assert_eq!(bit_reader.remaining_bits(), 0);
    }

    #[test]
    fn test_read_n_bits() {
        let data = [2u8, 7u8, 0b00000010];
        let mut bit_reader = BitsReader::new(&data);

        assert_eq!(bit_reader.read_n_bits(16), 0x207);
        assert_eq!(bit_reader.read_n_bits(5), 0);
        assert_eq!(bit_reader.read_n_bits(3), 2);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let data = [0xAB, 0xCD];
        let mut bit_reader = BitsReader::new(&data);

        assert_eq!(bit_reader.peek_n_bits(4), 0x0A);
        assert_eq!(bit_reader.peek_n_bits(12), 0xABC);
        assert_eq!(bit_reader.read_n_bits(4), 0x0A);
        assert_eq!(bit_reader.read_n_bits(12), 0xBCD);
    }

    #[test]
    fn test_read_past_end_is_silent_zero() {
        let data = [0xFF];
        let mut bit_reader = BitsReader::new(&data);

        bit_reader.skip_n_bits(3);
        assert_eq!(bit_reader.read_n_bits(6), 0);
        assert!(bit_reader.is_overrun());
        //cursor is left untouched
        assert_eq!(bit_reader.position(), 3);
        assert_eq!(bit_reader.read_n_bits(5), 0x1F);
    }

    #[test]
    fn test_with_bit_len_limits_reads() {
        let data = [0xFF, 0xFF];
        let mut bit_reader = BitsReader::with_bit_len(&data, 10);

        assert_eq!(bit_reader.read_n_bits(10), 0x3FF);
        assert_eq!(bit_reader.read_bit(), 0);
        assert!(bit_reader.is_overrun());
    }

    #[test]
    fn test_bits_aligment_8() {
        let data = [2u8, 7u8];
        let mut bit_reader = BitsReader::new(&data);

        bit_reader.read_n_bits(4);
        bit_reader.bits_aligment_8();
        assert_eq!(bit_reader.read_byte(), 7);
    }

    #[test]
    fn test_read_uev() {
        // 0 => 1 => 1
        // 1 => 10 => 010
        // 2 => 11 => 011
        // 3 => 100 => 00100
        // 8 => 1001 => 0001001
        let data = [0b1010_0110, 0b0100_0001, 0b0010_0000];
        let mut bit_reader = BitsReader::new(&data);

        assert_eq!(bit_reader.read_uev(), 0);
        assert_eq!(bit_reader.read_uev(), 1);
        assert_eq!(bit_reader.read_uev(), 2);
        assert_eq!(bit_reader.read_uev(), 3);
        assert_eq!(bit_reader.read_uev(), 8);
        assert!(!bit_reader.is_overrun());
    }

    #[test]
    fn test_read_uev_all_zero_is_overrun() {
        let data = [0u8; 8];
        let mut bit_reader = BitsReader::new(&data);
        assert_eq!(bit_reader.read_uev(), 0);
        assert!(bit_reader.is_overrun());
    }

    #[test]
    fn test_exp_golomb_round_trip() {
        let mut values: Vec<u32> = (0..2048).collect();
        let mut v: u32 = 2048;
        while v < (1 << 20) {
            values.push(v);
            values.push(v + 1);
            v = v * 3 + 7;
        }
        values.push((1 << 20) - 1);

        let mut writer = BitsWriter::new(BytesWriter::new());
        for value in &values {
            writer.write_uev(*value).unwrap();
        }
        writer.bits_aligment_8().unwrap();
        let bytes = writer.get_current_bytes();

        let mut reader = BitsReader::new(&bytes[..]);
        for value in &values {
            assert_eq!(reader.read_uev(), *value);
        }
        assert!(!reader.is_overrun());
    }

    #[test]
    fn test_signed_exp_golomb_round_trip() {
        let values: Vec<i32> = (-70000..70000).step_by(37).chain(-16..16).collect();

        let mut writer = BitsWriter::new(BytesWriter::new());
        for value in &values {
            writer.write_sev(*value).unwrap();
        }
        writer.bits_aligment_8().unwrap();
        let bytes = writer.get_current_bytes();

        let mut reader = BitsReader::new(&bytes[..]);
        for value in &values {
            assert_eq!(reader.read_sev(), *value);
        }
    }
}
