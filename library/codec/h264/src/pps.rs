use {
    super::{define, errors::H264Error},
    bytesio::bits_reader::BitsReader,
};

#[derive(Default, Debug, Clone)]
pub struct Pps {
    pub pic_parameter_set_id: u32, // ue(v)
    pub seq_parameter_set_id: u32, // ue(v)
    pub entropy_coding_mode_flag: bool,
    pub bottom_field_pic_order_in_frame_present_flag: bool,
}

// 7.3.2.2 Picture parameter set RBSP syntax, only the leading fields the
// slice header depends on.
pub fn parse_pps(rbsp: &[u8]) -> Result<Pps, H264Error> {
    let mut reader = BitsReader::new(rbsp);

    let pic_parameter_set_id = reader.read_uev();
    if pic_parameter_set_id as usize >= define::MAX_PPS_COUNT {
        return Err(H264Error::out_of_range(
            "pic_parameter_set_id",
            pic_parameter_set_id,
        ));
    }
    let seq_parameter_set_id = reader.read_uev();
    if seq_parameter_set_id as usize >= define::MAX_SPS_COUNT {
        return Err(H264Error::out_of_range(
            "seq_parameter_set_id",
            seq_parameter_set_id,
        ));
    }

    let pps = Pps {
        pic_parameter_set_id,
        seq_parameter_set_id,
        entropy_coding_mode_flag: reader.read_flag(),
        bottom_field_pic_order_in_frame_present_flag: reader.read_flag(),
    };
    if reader.is_overrun() {
        return Err(H264Error::out_of_range("pps length", rbsp.len() as u32));
    }

    Ok(pps)
}

#[cfg(test)]
mod tests {
    use super::parse_pps;
    use bytesio::bits_writer::BitsWriter;
    use bytesio::bytes_writer::BytesWriter;

    #[test]
    fn test_parse_pps() {
        let mut writer = BitsWriter::new(BytesWriter::new());
        writer.write_uev(3).unwrap();
        writer.write_uev(1).unwrap();
        writer.write_bit(1).unwrap();
        writer.write_bit(0).unwrap();
        writer.bits_aligment_8().unwrap();
        let data = writer.get_current_bytes();

        let pps = parse_pps(&data[..]).unwrap();
        assert_eq!(pps.pic_parameter_set_id, 3);
        assert_eq!(pps.seq_parameter_set_id, 1);
        assert!(pps.entropy_coding_mode_flag);
        assert!(!pps.bottom_field_pic_order_in_frame_present_flag);
    }

    #[test]
    fn test_pps_id_out_of_range() {
        let mut writer = BitsWriter::new(BytesWriter::new());
        writer.write_uev(300).unwrap();
        writer.write_uev(0).unwrap();
        writer.bits_aligment_8().unwrap();
        let data = writer.get_current_bytes();

        assert!(parse_pps(&data[..]).is_err());
    }
}
