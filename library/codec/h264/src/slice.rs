use {
    super::{
        define::nal_unit_type,
        errors::{H264Error, H264ErrorValue},
        pps::Pps,
        sps::Sps,
    },
    bytesio::bits_reader::BitsReader,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceType {
    P,
    B,
    I,
    SP,
    SI,
}

impl SliceType {
    // Table 7-6, values 5..9 repeat 0..4
    pub fn from_u32(slice_type: u32) -> Option<SliceType> {
        match slice_type % 5 {
            0 => Some(SliceType::P),
            1 => Some(SliceType::B),
            2 => Some(SliceType::I),
            3 => Some(SliceType::SP),
            4 => Some(SliceType::SI),
            _ => None,
        }
    }

    pub fn is_intra(&self) -> bool {
        matches!(self, SliceType::I | SliceType::SI)
    }
}

#[derive(Debug, Clone)]
pub struct SliceHeader {
    pub first_mb_in_slice: u32,
    pub slice_type: SliceType,
    pub pic_parameter_set_id: u32,
    pub frame_num: u32,
    pub field_pic_flag: bool,
    pub bottom_field_flag: bool,
    pub idr_pic_id: Option<u32>,
    pub pic_order_cnt_lsb: u32,
}

/// Reads `pic_parameter_set_id` so the caller can find the parameter sets
/// needed by `parse_slice_header`.
pub fn peek_pps_id(rbsp: &[u8]) -> u32 {
    let mut reader = BitsReader::new(rbsp);
    reader.read_uev();
    reader.read_uev();
    reader.read_uev()
}

// 7.3.3 Slice header syntax
pub fn parse_slice_header(
    rbsp: &[u8],
    nal_type: u8,
    sps: &Sps,
    pps: &Pps,
) -> Result<SliceHeader, H264Error> {
    let mut reader = BitsReader::new(rbsp);

    let first_mb_in_slice = reader.read_uev();
    let raw_slice_type = reader.read_uev();
    let slice_type = match SliceType::from_u32(raw_slice_type) {
        Some(slice_type) if raw_slice_type <= 9 => slice_type,
        _ => return Err(H264Error::out_of_range("slice_type", raw_slice_type)),
    };

    let pic_parameter_set_id = reader.read_uev();
    if pic_parameter_set_id != pps.pic_parameter_set_id {
        return Err(H264ErrorValue::UnknownParameterSet(pic_parameter_set_id).into());
    }

    if sps.separate_colour_plane_flag {
        //colour_plane_id
        reader.skip_n_bits(2);
    }

    let frame_num = reader.read_n_bits(sps.max_frame_num_bits()) as u32;

    let mut field_pic_flag = false;
    let mut bottom_field_flag = false;
    if !sps.frame_mbs_only_flag {
        field_pic_flag = reader.read_flag();
        if field_pic_flag {
            bottom_field_flag = reader.read_flag();
        }
    }

    let idr_pic_id = if nal_type == nal_unit_type::IDR {
        Some(reader.read_uev())
    } else {
        None
    };

    let mut pic_order_cnt_lsb = 0;
    if sps.pic_order_cnt_type == 0 {
        pic_order_cnt_lsb = reader.read_n_bits(sps.max_pic_order_cnt_lsb_bits()) as u32;
    }

    if reader.is_overrun() {
        return Err(H264ErrorValue::NotEnoughData.into());
    }

    Ok(SliceHeader {
        first_mb_in_slice,
        slice_type,
        pic_parameter_set_id,
        frame_num,
        field_pic_flag,
        bottom_field_flag,
        idr_pic_id,
        pic_order_cnt_lsb,
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_slice_header, peek_pps_id, SliceType};
    use crate::define::nal_unit_type;
    use crate::pps::Pps;
    use crate::sps::tests::baseline_sps;
    use crate::sps::SpsParser;
    use bytesio::bits_writer::BitsWriter;
    use bytesio::bytes_writer::BytesWriter;

    #[test]
    fn test_slice_type_mapping() {
        assert_eq!(SliceType::from_u32(7), Some(SliceType::I));
        assert_eq!(SliceType::from_u32(5), Some(SliceType::P));
        assert!(SliceType::from_u32(4).unwrap().is_intra());
        assert!(!SliceType::from_u32(1).unwrap().is_intra());
    }

    #[test]
    fn test_parse_idr_slice_header() {
        let sps_data = baseline_sps(10, 10, false);
        let sps = SpsParser::new(&sps_data[..]).parse().unwrap();
        let pps = Pps::default();

        let mut writer = BitsWriter::new(BytesWriter::new());
        writer.write_uev(0).unwrap(); //first_mb_in_slice
        writer.write_uev(7).unwrap(); //slice_type I
        writer.write_uev(0).unwrap(); //pps id
        writer.write_n_bits(5, 4).unwrap(); //frame_num
        writer.write_uev(2).unwrap(); //idr_pic_id
        writer.write_n_bits(9, 4).unwrap(); //pic_order_cnt_lsb
        writer.write_bit(1).unwrap();
        writer.bits_aligment_8().unwrap();
        let data = writer.get_current_bytes();

        assert_eq!(peek_pps_id(&data[..]), 0);
        let header = parse_slice_header(&data[..], nal_unit_type::IDR, &sps, &pps).unwrap();
        assert_eq!(header.slice_type, SliceType::I);
        assert_eq!(header.frame_num, 5);
        assert_eq!(header.idr_pic_id, Some(2));
        assert_eq!(header.pic_order_cnt_lsb, 9);
    }
}
