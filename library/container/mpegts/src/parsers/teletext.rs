use {
    super::{EsAssembler, EsParser},
    crate::{
        define::{PRIVATE_BUFFER_LIMIT, PTS_NO_VALUE},
        packet::{StreamInfo, StreamPacket, StreamType},
    },
};

// EBU data_identifier range for teletext in ETSI EN 300 472
const DATA_IDENTIFIER_MIN: u8 = 0x10;
const DATA_IDENTIFIER_MAX: u8 = 0x1F;

/// Teletext has no end marker, so a unit is complete when the next one
/// starts and every packet leaves one PES unit late.
pub struct TeletextParser {
    pid: u16,
    assembler: EsAssembler,
    info: StreamInfo,
}

impl TeletextParser {
    pub fn new(pid: u16) -> Self {
        Self {
            pid,
            assembler: EsAssembler::new(PRIVATE_BUFFER_LIMIT),
            info: StreamInfo::Teletext,
        }
    }

    fn emit_unit(&mut self, out: &mut Vec<StreamPacket>) {
        if self.assembler.is_empty() {
            return;
        }
        let (pts, dts) = self
            .assembler
            .take_timestamp(0)
            .unwrap_or((PTS_NO_VALUE, PTS_NO_VALUE));
        let payload = self.assembler.split_frame(self.assembler.len());

        if !(DATA_IDENTIFIER_MIN..=DATA_IDENTIFIER_MAX).contains(&payload[0]) {
            log::debug!(
                "pid {}: dropping teletext unit with data identifier {:#04x}",
                self.pid,
                payload[0]
            );
            return;
        }

        let mut packet = StreamPacket::new(self.pid, StreamType::Teletext, payload);
        packet.pts = pts;
        packet.dts = dts;
        out.push(packet);
    }
}

impl EsParser for TeletextParser {
    fn parse(&mut self, data: &[u8], payload_unit_start: bool, out: &mut Vec<StreamPacket>) {
        if payload_unit_start {
            self.emit_unit(out);
        }
        self.assembler.push(data, payload_unit_start);
    }

    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn reset(&mut self) {
        self.assembler.reset();
    }

    fn flush(&mut self, out: &mut Vec<StreamPacket>) {
        self.emit_unit(out);
        self.assembler.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::TeletextParser;
    use crate::define::PTS_NO_VALUE;
    use crate::parsers::EsParser;
    use crate::pes::tests::build_pes_header;

    fn unit(pts: i64, fill: u8) -> (Vec<u8>, Vec<u8>) {
        let mut body = vec![0x10];
        body.extend_from_slice(&[0x02, 0x2C]);
        body.resize(46, fill);

        let mut data = build_pes_header(0xBD, 0, pts, PTS_NO_VALUE);
        data.extend_from_slice(&body);
        (data, body)
    }

    #[test]
    fn test_one_unit_lag() {
        let mut parser = TeletextParser::new(0x107);
        let mut out = Vec::new();

        let (first, first_body) = unit(3600, 0xA1);
        parser.parse(&first[..30], true, &mut out);
        parser.parse(&first[30..], false, &mut out);
        assert!(out.is_empty());

        let (second, _) = unit(7200, 0xB2);
        parser.parse(&second, true, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(&out[0].payload[..], &first_body[..]);
        assert_eq!(out[0].pts, 3600);
        assert_eq!(out[0].duration, 0);
    }

    #[test]
    fn test_flush_emits_last_unit() {
        let mut parser = TeletextParser::new(0x107);
        let mut out = Vec::new();

        let (first, first_body) = unit(3600, 0xA1);
        parser.parse(&first, true, &mut out);
        assert!(out.is_empty());

        parser.flush(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(&out[0].payload[..], &first_body[..]);
        assert_eq!(out[0].pts, 3600);
    }

    #[test]
    fn test_bad_data_identifier() {
        let mut parser = TeletextParser::new(0x107);
        let mut out = Vec::new();

        let mut data = build_pes_header(0xBD, 0, 0, PTS_NO_VALUE);
        data.extend_from_slice(&[0x99, 0x00, 0x00]);
        parser.parse(&data, true, &mut out);

        let (second, _) = unit(3600, 0x00);
        parser.parse(&second, true, &mut out);
        assert!(out.is_empty());
    }
}
