use super::{
    define::{epes_stream_id, PES_HEADER_LEN, PES_OPTIONAL_HEADER_LEN, PTS_NO_VALUE},
    timestamp,
};

#[derive(Debug, Clone)]
pub struct PesHeader {
    pub stream_id: u8,
    pub pes_packet_length: u16,
    pub data_alignment_indicator: bool,
    pub pts: i64,
    pub dts: i64,
    /// Bytes from the start code to the first payload byte.
    pub header_len: usize,
}

impl PesHeader {
    pub fn has_pts(&self) -> bool {
        self.pts != PTS_NO_VALUE
    }

    /// Payload length announced by the header, `None` for unbounded video PES.
    pub fn payload_len(&self) -> Option<usize> {
        if self.pes_packet_length == 0 {
            return None;
        }
        (self.pes_packet_length as usize + PES_HEADER_LEN).checked_sub(self.header_len)
    }
}

pub fn has_start_code(data: &[u8]) -> bool {
    data.len() >= 3 && data[0] == 0x00 && data[1] == 0x00 && data[2] == 0x01
}

fn has_optional_header(stream_id: u8) -> bool {
    !matches!(
        stream_id,
        epes_stream_id::PES_SID_PSM
            | epes_stream_id::PES_SID_PADDING
            | epes_stream_id::PES_SID_PRIVATE_2
            | epes_stream_id::PES_SID_ECM
            | epes_stream_id::PES_SID_EMM
            | epes_stream_id::PES_SID_DSMCC
            | epes_stream_id::PES_SID_H222_E
            | epes_stream_id::PES_SID_PSD
    )
}

// PTS [32..30] 3 bslbf, marker_bit, PTS [29..15] 15 bslbf, marker_bit,
// PTS [14..0] 15 bslbf, marker_bit
fn read_timestamp(data: &[u8]) -> i64 {
    let value = (((data[0] as i64) >> 1) & 0x07) << 30
        | (data[1] as i64) << 22
        | ((data[2] as i64) >> 1) << 15
        | (data[3] as i64) << 7
        | (data[4] as i64) >> 1;
    timestamp::pts_mask(value)
}

//  T-REC-H.222.0-201703-S!!PDF-E.pdf Table 2-21 P37
// PES_packet() {
//     packet_start_code_prefix 24 bslbf
//     stream_id 8 uimsbf
//     PES_packet_length 16 uimsbf
//     if (stream_id has the optional header) {
//         '10' 2 bslbf
//         PES_scrambling_control 2 bslbf
//         PES_priority 1 bslbf
//         data_alignment_indicator 1 bslbf
//         copyright 1 bslbf
//         original_or_copy 1 bslbf
//         PTS_DTS_flags 2 bslbf
//         ESCR_flag .. PES_extension_flag 6 bslbf
//         PES_header_data_length 8 uimsbf
//         if (PTS_DTS_flags == '10') { '0010' PTS }
//         if (PTS_DTS_flags == '11') { '0011' PTS '0001' DTS }
//         ...
//         stuffing_byte
//     }
// }
/// Parses the PES header at the start of `data`. Returns `None` when the
/// start code or the '10' marker bits are wrong, or when the header is not
/// complete inside `data`.
pub fn parse_pes_header(data: &[u8]) -> Option<PesHeader> {
    if data.len() < PES_HEADER_LEN || !has_start_code(data) {
        return None;
    }

    let stream_id = data[3];
    let pes_packet_length = ((data[4] as u16) << 8) | data[5] as u16;

    let mut header = PesHeader {
        stream_id,
        pes_packet_length,
        data_alignment_indicator: false,
        pts: PTS_NO_VALUE,
        dts: PTS_NO_VALUE,
        header_len: PES_HEADER_LEN,
    };

    if !has_optional_header(stream_id) {
        return Some(header);
    }

    if data.len() < PES_OPTIONAL_HEADER_LEN || data[6] >> 6 != 0b10 {
        return None;
    }

    header.data_alignment_indicator = (data[6] >> 2) & 0x01 == 1;
    let pts_dts_flags = data[7] >> 6;
    let pes_header_data_length = data[8] as usize;
    header.header_len = PES_OPTIONAL_HEADER_LEN + pes_header_data_length;

    if data.len() < header.header_len {
        return None;
    }

    match pts_dts_flags {
        0x02 if pes_header_data_length >= 5 => {
            header.pts = read_timestamp(&data[9..14]);
            header.dts = header.pts;
        }
        0x03 if pes_header_data_length >= 10 => {
            header.pts = read_timestamp(&data[9..14]);
            header.dts = read_timestamp(&data[14..19]);
        }
        0x00 => {}
        _ => {
            log::trace!(
                "pes header: bad pts_dts_flags {} with data length {}",
                pts_dts_flags,
                pes_header_data_length
            );
        }
    }

    Some(header)
}

/// True when `data` is a correct PES header start that stops before the
/// header is complete, so the rest can follow in the next TS packet.
pub fn is_truncated_header(data: &[u8]) -> bool {
    let prefix = data.len().min(3);
    if data[..prefix] != [0x00, 0x00, 0x01][..prefix] {
        return false;
    }
    if data.len() < PES_HEADER_LEN {
        return true;
    }
    if !has_optional_header(data[3]) {
        return false;
    }
    if data.len() > 6 && data[6] >> 6 != 0b10 {
        return false;
    }
    if data.len() < PES_OPTIONAL_HEADER_LEN {
        return true;
    }
    data.len() < PES_OPTIONAL_HEADER_LEN + data[8] as usize
}
