use {
    super::{EsAssembler, EsParser},
    crate::{
        define::{PRIVATE_BUFFER_LIMIT, PTS_NO_VALUE},
        packet::{StreamInfo, StreamPacket, StreamType, SubtitleInfo},
        timestamp,
    },
};

const DATA_IDENTIFIER: u8 = 0x20;
const SUBTITLE_STREAM_ID: u8 = 0x00;
const SEGMENT_SYNC_BYTE: u8 = 0x0F;
const END_OF_PES_DATA_MARKER: u8 = 0xFF;
const SEGMENT_HEADER_LEN: usize = 6;

enum UnitState {
    Incomplete,
    Complete(usize),
    Broken,
}

// PES_data_field: data_identifier 8, subtitle_stream_id 8,
// { sync_byte 8, segment_type 8, page_id 16, segment_length 16, data }*,
// end_of_PES_data_field_marker 8
fn check_unit(data: &[u8]) -> UnitState {
    if data.len() < 2 {
        return UnitState::Incomplete;
    }
    if data[0] != DATA_IDENTIFIER || data[1] != SUBTITLE_STREAM_ID {
        return UnitState::Broken;
    }

    let mut pos = 2;
    while pos < data.len() {
        match data[pos] {
            SEGMENT_SYNC_BYTE => {
                if pos + SEGMENT_HEADER_LEN > data.len() {
                    return UnitState::Incomplete;
                }
                let segment_length = ((data[pos + 4] as usize) << 8) | data[pos + 5] as usize;
                pos += SEGMENT_HEADER_LEN + segment_length;
            }
            END_OF_PES_DATA_MARKER => return UnitState::Complete(pos + 1),
            _ => return UnitState::Broken,
        }
    }
    UnitState::Incomplete
}

/// DVB subtitles: one PES data field becomes one packet.
pub struct SubtitleParser {
    pid: u16,
    assembler: EsAssembler,
    info: StreamInfo,
    prev_dts: i64,
}

impl SubtitleParser {
    pub fn new(pid: u16, subtitle: SubtitleInfo) -> Self {
        Self {
            pid,
            assembler: EsAssembler::new(PRIVATE_BUFFER_LIMIT),
            info: StreamInfo::Subtitle(subtitle),
            prev_dts: PTS_NO_VALUE,
        }
    }

    fn emit(&mut self, size: usize, out: &mut Vec<StreamPacket>) {
        let (pts, dts) = self
            .assembler
            .take_timestamp(0)
            .unwrap_or((PTS_NO_VALUE, PTS_NO_VALUE));
        let payload = self.assembler.split_frame(size);
        //anything after the end marker is stuffing
        self.assembler.consume(self.assembler.len());

        if pts == PTS_NO_VALUE {
            log::debug!("pid {}: dropping subtitle without timestamp", self.pid);
            return;
        }

        let mut duration = 0;
        if self.prev_dts != PTS_NO_VALUE {
            let delta = timestamp::pts_diff(dts, self.prev_dts);
            if delta > 0 {
                duration = delta as u64;
            }
        }
        self.prev_dts = dts;

        let mut packet = StreamPacket::new(self.pid, StreamType::DvbSubtitle, payload);
        packet.pts = pts;
        packet.dts = dts;
        packet.duration = duration;
        out.push(packet);
    }
}

impl EsParser for SubtitleParser {
    fn parse(&mut self, data: &[u8], payload_unit_start: bool, out: &mut Vec<StreamPacket>) {
        if payload_unit_start && !self.assembler.is_empty() {
            log::debug!(
                "pid {}: discarding {} bytes of an unfinished subtitle",
                self.pid,
                self.assembler.len()
            );
            self.assembler.reset();
        }
        if !self.assembler.push(data, payload_unit_start) {
            return;
        }

        match check_unit(&self.assembler.buffer) {
            UnitState::Incomplete => {}
            UnitState::Complete(size) => self.emit(size, out),
            UnitState::Broken => {
                log::debug!("pid {}: broken subtitle data field", self.pid);
                self.assembler.reset();
            }
        }
    }

    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn reset(&mut self) {
        self.assembler.reset();
        self.prev_dts = PTS_NO_VALUE;
    }
}
