use super::{
    define::ts,
    errors::{MpegTsError, MpegTsErrorValue},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TsPacketHeader {
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
    /// Offset of the first payload byte, `None` when the packet carries no
    /// payload.
    pub payload_offset: Option<usize>,
}

impl TsPacketHeader {
    pub fn has_payload(&self) -> bool {
        self.payload_offset.is_some()
    }

    // sync_byte                    8
    // transport_error_indicator    1
    // payload_unit_start_indicator 1
    // transport_priority           1
    // PID                          13
    // transport_scrambling_control 2
    // adaptation_field_control     2
    // continuity_counter           4
    pub fn parse(buf: &[u8]) -> Result<Self, MpegTsError> {
        if buf.len() < ts::TS_PACKET_SIZE {
            return Err(MpegTsError {
                value: MpegTsErrorValue::PacketTooShort(buf.len()),
            });
        }
        if buf[0] != ts::TS_SYNC_BYTE {
            return Err(MpegTsError {
                value: MpegTsErrorValue::BadSyncByte(buf[0]),
            });
        }

        let mut header = TsPacketHeader {
            transport_error: buf[1] & ts::TS_TRANSPORT_ERROR_INDICATOR != 0,
            payload_unit_start: buf[1] & ts::TS_PAYLOAD_UNIT_START_INDICATOR != 0,
            pid: (((buf[1] & 0x1F) as u16) << 8) | buf[2] as u16,
            scrambling_control: buf[3] >> 6,
            adaptation_field_control: (buf[3] >> 4) & 0x03,
            continuity_counter: buf[3] & 0x0F,
            payload_offset: None,
        };

        let mut offset = ts::TS_HEADER_LEN;
        if header.adaptation_field_control & 0x02 != 0 {
            offset += 1 + buf[4] as usize;
        }

        if header.adaptation_field_control & 0x01 != 0 {
            if offset < ts::TS_PACKET_SIZE {
                header.payload_offset = Some(offset);
            } else {
                log::trace!(
                    "pid {}: adaptation field leaves no room for payload",
                    header.pid
                );
            }
        }

        Ok(header)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::TsPacketHeader;
    use crate::define::ts::TS_PACKET_SIZE;

    /// Builds a ts packet carrying `payload`, padded with an adaptation
    /// field when it is shorter than the packet.
    pub fn build_ts_packet(pid: u16, pusi: bool, cc: u8, payload: &[u8]) -> Vec<u8> {
        assert!(payload.len() <= TS_PACKET_SIZE - 4);
        let mut packet = vec![
            0x47,
            ((pusi as u8) << 6) | ((pid >> 8) as u8 & 0x1F),
            pid as u8,
            0x10 | (cc & 0x0F),
        ];

        let stuffing = TS_PACKET_SIZE - 4 - payload.len();
        if stuffing > 0 {
            packet[3] |= 0x20;
            packet.push((stuffing - 1) as u8);
            if stuffing > 1 {
                packet.push(0x00);
                packet.extend(std::iter::repeat(0xFF).take(stuffing - 2));
            }
        }
        packet.extend_from_slice(payload);
        packet
    }

    #[test]
    fn test_parse_header() {
        let packet = build_ts_packet(0x100, true, 7, &[0xAA; 10]);
        let header = TsPacketHeader::parse(&packet).unwrap();

        assert_eq!(header.pid, 0x100);
        assert!(header.payload_unit_start);
        assert!(!header.transport_error);
        assert_eq!(header.continuity_counter, 7);
        assert_eq!(header.payload_offset, Some(TS_PACKET_SIZE - 10));
    }

    #[test]
    fn test_bad_sync_byte() {
        let mut packet = build_ts_packet(0x100, true, 0, &[0xAA; 184]);
        packet[0] = 0x46;
        assert!(TsPacketHeader::parse(&packet).is_err());
        assert!(TsPacketHeader::parse(&packet[..100]).is_err());
    }

    #[test]
    fn test_adaptation_only() {
        let mut packet = build_ts_packet(0x101, false, 0, &[]);
        packet[3] = (packet[3] & 0xCF) | 0x20;
        let header = TsPacketHeader::parse(&packet).unwrap();
        assert!(!header.has_payload());
    }
}
