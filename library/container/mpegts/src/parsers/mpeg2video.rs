use {
    super::{EsAssembler, EsParser},
    crate::{
        define::{PTS_NO_VALUE, VIDEO_BUFFER_LIMIT},
        packet::{FrameType, StreamInfo, StreamPacket, StreamType, VideoInfo},
        pes, timestamp,
    },
    h264_decoder::utils::find_start_code,
    std::collections::VecDeque,
};

const PICTURE_START_CODE: u8 = 0x00;
const SLICE_START_CODE_MIN: u8 = 0x01;
const SLICE_START_CODE_MAX: u8 = 0xAF;
const SEQUENCE_HEADER_CODE: u8 = 0xB3;
const GROUP_START_CODE: u8 = 0xB8;

// frame_rate_code => duration of one frame in 90 kHz ticks
const FRAME_DURATIONS: [u64; 9] = [0, 3754, 3750, 3600, 3003, 3000, 1800, 1502, 1500];
const FRAME_RATES: [(u32, u32); 9] = [
    (0, 0),
    (24000, 1001),
    (24, 1),
    (25, 1),
    (30000, 1001),
    (30, 1),
    (50, 1),
    (60000, 1001),
    (60, 1),
];
// aspect_ratio_information => display aspect ratio, 1 means square pixels
const ASPECT_RATIOS: [f64; 5] = [0.0, 1.0, 4.0 / 3.0, 16.0 / 9.0, 2.21];

/// Anchor frames wait here until the next anchor supplies their
/// presentation time. Anything beyond this is flushed with pts = dts.
const MAX_REORDER_DEPTH: usize = 16;

enum ScanStep {
    Continue(usize),
    NeedMore,
}

pub struct Mpeg2VideoParser {
    pid: u16,
    assembler: EsAssembler,
    info: StreamInfo,

    scan_pos: usize,
    frame_start: Option<usize>,
    found_picture: bool,
    found_slice: bool,
    picture_type: FrameType,
    frame_pts: i64,
    frame_dts: i64,

    frame_duration: u64,
    prev_dts: i64,

    reorder: VecDeque<StreamPacket>,
}

impl Mpeg2VideoParser {
    pub fn new(pid: u16) -> Self {
        Self {
            pid,
            assembler: EsAssembler::new(VIDEO_BUFFER_LIMIT),
            info: StreamInfo::Video(VideoInfo::default()),
            scan_pos: 0,
            frame_start: None,
            found_picture: false,
            found_slice: false,
            picture_type: FrameType::None,
            frame_pts: PTS_NO_VALUE,
            frame_dts: PTS_NO_VALUE,
            frame_duration: 0,
            prev_dts: PTS_NO_VALUE,
            reorder: VecDeque::new(),
        }
    }

    fn clear_frame_state(&mut self) {
        self.frame_start = None;
        self.found_picture = false;
        self.found_slice = false;
        self.picture_type = FrameType::None;
        self.frame_pts = PTS_NO_VALUE;
        self.frame_dts = PTS_NO_VALUE;
    }

    fn video_info_mut(&mut self) -> &mut VideoInfo {
        if !matches!(self.info, StreamInfo::Video(_)) {
            self.info = StreamInfo::Video(VideoInfo::default());
        }
        match &mut self.info {
            StreamInfo::Video(video) => video,
            _ => unreachable!(),
        }
    }

    fn scan(&mut self, out: &mut Vec<StreamPacket>) {
        loop {
            let buffer = &self.assembler.buffer;
            let idx = match find_start_code(buffer, self.scan_pos) {
                Some(idx) => idx,
                None => {
                    self.scan_pos = buffer.len().saturating_sub(3);
                    if self.frame_start.is_none() {
                        //nothing of value before the next start code
                        self.assembler.consume(self.scan_pos);
                        self.scan_pos = 0;
                    }
                    return;
                }
            };
            if idx + 4 > buffer.len() {
                self.scan_pos = idx;
                return;
            }
            let code = buffer[idx + 3];

            match self.on_start_code(idx, code, out) {
                ScanStep::Continue(next) => self.scan_pos = next,
                ScanStep::NeedMore => return,
            }
        }
    }

    fn on_start_code(&mut self, mut idx: usize, code: u8, out: &mut Vec<StreamPacket>) -> ScanStep {
        let is_slice = (SLICE_START_CODE_MIN..=SLICE_START_CODE_MAX).contains(&code);

        if self.found_slice && !is_slice {
            self.finalize_frame(idx, out);
            idx = 0;
        }

        match code {
            SEQUENCE_HEADER_CODE => {
                if idx + 12 > self.assembler.len() {
                    self.scan_pos = idx;
                    return ScanStep::NeedMore;
                }
                self.parse_sequence_header(idx + 4);
                self.frame_start.get_or_insert(idx);
                ScanStep::Continue(idx + 12)
            }
            GROUP_START_CODE => {
                self.frame_start.get_or_insert(idx);
                ScanStep::Continue(idx + 4)
            }
            PICTURE_START_CODE => {
                if idx + 8 > self.assembler.len() {
                    self.scan_pos = idx;
                    return ScanStep::NeedMore;
                }
                self.on_picture_header(idx)
            }
            SLICE_START_CODE_MIN..=SLICE_START_CODE_MAX => {
                if self.found_picture {
                    self.found_slice = true;
                }
                ScanStep::Continue(idx + 4)
            }
            0xE0..=0xEF => self.on_embedded_pes_header(idx),
            _ => ScanStep::Continue(idx + 4),
        }
    }

    // sequence_header() ISO/IEC 13818-2 6.2.2.1
    fn parse_sequence_header(&mut self, offset: usize) {
        let b = &self.assembler.buffer[offset..offset + 8];
        let width = ((b[0] as u32) << 4) | (b[1] as u32 >> 4);
        let height = (((b[1] & 0x0F) as u32) << 8) | b[2] as u32;
        let aspect_code = (b[3] >> 4) as usize;
        let frame_rate_code = (b[3] & 0x0F) as usize;

        if width == 0 || height == 0 {
            log::debug!("pid {}: sequence header with zero dimension", self.pid);
            return;
        }

        self.frame_duration = FRAME_DURATIONS.get(frame_rate_code).copied().unwrap_or(0);
        let (fps_rate, fps_scale) = FRAME_RATES.get(frame_rate_code).copied().unwrap_or((0, 0));

        let aspect = match ASPECT_RATIOS.get(aspect_code).copied() {
            Some(ratio) if ratio == 1.0 => width as f64 / height as f64,
            Some(ratio) => ratio,
            None => 0.0,
        };

        let video = self.video_info_mut();
        if video.width != width || video.height != height {
            log::info!("mpeg2 video {}x{} aspect {:.3}", width, height, aspect);
        }
        video.width = width;
        video.height = height;
        video.aspect = aspect;
        video.fps_rate = fps_rate;
        video.fps_scale = fps_scale;
    }

    // picture_header(): temporal_reference 10, picture_coding_type 3
    fn on_picture_header(&mut self, idx: usize) -> ScanStep {
        let b = &self.assembler.buffer[idx + 4..idx + 6];
        let coding_type = (b[1] >> 3) & 0x07;

        let frame_type = match coding_type {
            1 => FrameType::I,
            2 => FrameType::P,
            3 => FrameType::B,
            _ => {
                log::debug!("pid {}: bad picture coding type {}", self.pid, coding_type);
                self.assembler.consume(idx + 4);
                self.clear_frame_state();
                return ScanStep::Continue(0);
            }
        };

        let frame_start = *self.frame_start.get_or_insert(idx);
        self.found_picture = true;
        self.picture_type = frame_type;
        if let Some((pts, dts)) = self.assembler.take_timestamp(frame_start) {
            self.frame_pts = pts;
            self.frame_dts = dts;
        }

        ScanStep::Continue(idx + 8)
    }

    // program stream sources repeat pes headers inside the video data
    fn on_embedded_pes_header(&mut self, idx: usize) -> ScanStep {
        let available = self.assembler.len() - idx;
        if available < 9 || available < 9 + self.assembler.buffer[idx + 8] as usize {
            self.scan_pos = idx;
            return ScanStep::NeedMore;
        }

        match pes::parse_pes_header(&self.assembler.buffer[idx..]) {
            Some(header) => {
                if header.has_pts() {
                    self.assembler.push_timestamp(idx, header.pts, header.dts);
                }
                self.assembler.remove(idx, header.header_len);
                ScanStep::Continue(idx)
            }
            None => ScanStep::Continue(idx + 4),
        }
    }

    fn finalize_frame(&mut self, end: usize, out: &mut Vec<StreamPacket>) {
        let start = match self.frame_start {
            Some(start) if start < end => start,
            _ => {
                self.assembler.consume(end);
                self.clear_frame_state();
                return;
            }
        };

        self.assembler.consume(start);
        let payload = self.assembler.split_frame(end - start);

        let width = match &self.info {
            StreamInfo::Video(video) => video.width,
            _ => 0,
        };
        if width == 0 {
            log::debug!("pid {}: dropping picture before sequence header", self.pid);
            self.clear_frame_state();
            return;
        }

        let mut dts = self.frame_dts;
        if dts == PTS_NO_VALUE && self.prev_dts != PTS_NO_VALUE && self.frame_duration > 0 {
            dts = timestamp::pts_add(self.prev_dts, self.frame_duration as i64);
        }

        let mut duration = self.frame_duration;
        if duration == 0 && dts != PTS_NO_VALUE && self.prev_dts != PTS_NO_VALUE {
            let delta = timestamp::pts_diff(dts, self.prev_dts);
            if delta > 0 {
                duration = delta as u64;
            }
        }
        self.prev_dts = dts;

        let mut packet = StreamPacket::new(self.pid, StreamType::Mpeg2Video, payload);
        packet.frame_type = self.picture_type;
        packet.dts = dts;
        packet.duration = duration;
        //a pes header carrying both timestamps settles the presentation time
        if self.frame_pts != PTS_NO_VALUE && self.frame_pts != self.frame_dts {
            packet.pts = self.frame_pts;
        }

        self.clear_frame_state();
        self.reorder_and_emit(packet, out);
    }

    fn flush_reorder(&mut self, next_anchor_dts: i64, out: &mut Vec<StreamPacket>) {
        if let Some(anchor) = self.reorder.front_mut() {
            if anchor.pts == PTS_NO_VALUE {
                anchor.pts = if next_anchor_dts != PTS_NO_VALUE {
                    next_anchor_dts
                } else {
                    anchor.dts
                };
            }
        }
        out.extend(self.reorder.drain(..));
    }

    // Frames leave in decode order. A B picture is presented at its dts, an
    // I or P picture at the dts of the next I or P picture.
    fn reorder_and_emit(&mut self, mut packet: StreamPacket, out: &mut Vec<StreamPacket>) {
        if packet.frame_type.is_anchor() {
            self.flush_reorder(packet.dts, out);
            if packet.pts != PTS_NO_VALUE {
                out.push(packet);
            } else {
                self.reorder.push_back(packet);
            }
            return;
        }

        if packet.pts == PTS_NO_VALUE {
            packet.pts = packet.dts;
        }
        if self.reorder.is_empty() {
            out.push(packet);
        } else {
            self.reorder.push_back(packet);
            if self.reorder.len() > MAX_REORDER_DEPTH {
                log::debug!("pid {}: reorder queue overflow", self.pid);
                self.flush_reorder(PTS_NO_VALUE, out);
            }
        }
    }
}

impl EsParser for Mpeg2VideoParser {
    fn parse(&mut self, data: &[u8], payload_unit_start: bool, out: &mut Vec<StreamPacket>) {
        if !self.assembler.push(data, payload_unit_start) {
            self.scan_pos = 0;
            self.clear_frame_state();
            return;
        }
        self.scan(out);
    }

    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn reset(&mut self) {
        self.assembler.reset();
        self.scan_pos = 0;
        self.clear_frame_state();
        self.prev_dts = PTS_NO_VALUE;
        self.reorder.clear();
    }

    fn flush(&mut self, out: &mut Vec<StreamPacket>) {
        if self.found_slice {
            let end = self.assembler.len();
            self.finalize_frame(end, out);
        }
        //the held anchor is presented one frame after the last decoded picture
        let next_anchor_dts = if self.prev_dts != PTS_NO_VALUE && self.frame_duration > 0 {
            timestamp::pts_add(self.prev_dts, self.frame_duration as i64)
        } else {
            PTS_NO_VALUE
        };
        self.flush_reorder(next_anchor_dts, out);
        self.reset();
    }
}
