use {
    super::{EsAssembler, EsParser},
    crate::{
        define::{PTS_NO_VALUE, VIDEO_BUFFER_LIMIT},
        packet::{FrameType, StreamInfo, StreamPacket, StreamType, VideoInfo},
        timestamp,
    },
    bytesio::bits_reader::BitsReader,
    h264_decoder::{
        define::{nal_unit_type, MAX_SPS_COUNT},
        pps::{self, Pps},
        slice::{self, SliceType},
        sps::{Sps, SpsParser},
        utils::{find_start_code, nal_to_rbsp},
    },
    std::collections::HashMap,
};

/// Enough of a slice NAL to cover every slice header field we read.
const SLICE_HEADER_PEEK: usize = 64;

pub struct H264Parser {
    pid: u16,
    assembler: EsAssembler,
    info: StreamInfo,

    scan_pos: usize,
    //boundary of the nal being scanned, including a leading zero byte
    nal_start: Option<usize>,
    //first byte after the start code
    nal_header: usize,

    au_start: Option<usize>,
    au_has_slice: bool,
    au_frame_type: FrameType,

    sps: HashMap<u32, Sps>,
    pps: HashMap<u32, Pps>,
    active_sps: Option<u32>,

    seen_keyframe: bool,
    prev_dts: i64,
    prev_duration: u64,
}

impl H264Parser {
    pub fn new(pid: u16) -> Self {
        Self {
            pid,
            assembler: EsAssembler::new(VIDEO_BUFFER_LIMIT),
            info: StreamInfo::Video(VideoInfo::default()),
            scan_pos: 0,
            nal_start: None,
            nal_header: 0,
            au_start: None,
            au_has_slice: false,
            au_frame_type: FrameType::None,
            sps: HashMap::new(),
            pps: HashMap::new(),
            active_sps: None,
            seen_keyframe: false,
            prev_dts: PTS_NO_VALUE,
            prev_duration: 0,
        }
    }

    fn clear_access_unit(&mut self) {
        self.au_start = None;
        self.au_has_slice = false;
        self.au_frame_type = FrameType::None;
    }

    fn scan(&mut self, out: &mut Vec<StreamPacket>) {
        loop {
            let buffer = &self.assembler.buffer;
            let idx = match find_start_code(buffer, self.scan_pos) {
                Some(idx) => idx,
                None => {
                    self.scan_pos = buffer.len().saturating_sub(3);
                    if self.nal_start.is_none() {
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
            let boundary = if idx > 0 && buffer[idx - 1] == 0 {
                idx - 1
            } else {
                idx
            };

            let mut shift = 0;
            if let Some(start) = self.nal_start {
                shift = self.process_nal(start, self.nal_header, boundary, out);
            }

            self.nal_start = Some(boundary - shift);
            self.nal_header = idx + 3 - shift;
            self.scan_pos = idx + 3 - shift;
        }
    }

    /// Handles the nal in `[start, end)`. Returns how many bytes were split
    /// off the front of the buffer.
    fn process_nal(
        &mut self,
        start: usize,
        header: usize,
        end: usize,
        out: &mut Vec<StreamPacket>,
    ) -> usize {
        if header >= end {
            return 0;
        }
        let nal_type = self.assembler.buffer[header] & 0x1F;
        let body = header + 1;

        let mut shift = 0;
        match nal_type {
            nal_unit_type::SLICE | nal_unit_type::IDR => {
                let peek_end = end.min(body + SLICE_HEADER_PEEK);
                let rbsp = nal_to_rbsp(&self.assembler.buffer[body..peek_end]);

                let first_mb_in_slice = BitsReader::new(&rbsp[..]).read_uev();
                if first_mb_in_slice == 0 && self.au_has_slice {
                    shift = self.finalize_access_unit(start, out);
                }
                self.on_slice(&rbsp[..], nal_type);
            }
            nal_unit_type::SEI
            | nal_unit_type::SPS
            | nal_unit_type::PPS
            | nal_unit_type::AUD
            | 14..=18 => {
                if self.au_has_slice {
                    shift = self.finalize_access_unit(start, out);
                }
                match nal_type {
                    nal_unit_type::SPS => {
                        let rbsp = nal_to_rbsp(&self.assembler.buffer[body..end]);
                        self.on_sps(&rbsp[..]);
                    }
                    nal_unit_type::PPS => {
                        let rbsp = nal_to_rbsp(&self.assembler.buffer[body..end]);
                        self.on_pps(&rbsp[..]);
                    }
                    _ => {}
                }
            }
            _ => {}
        }

        if self.au_start.is_none() {
            self.au_start = Some(start - shift);
        }
        if matches!(nal_type, nal_unit_type::SLICE | nal_unit_type::IDR) {
            self.au_has_slice = true;
        }
        shift
    }

    fn on_sps(&mut self, rbsp: &[u8]) {
        let sps = match SpsParser::new(rbsp).parse() {
            Ok(sps) => sps,
            Err(err) => {
                log::debug!("pid {}: dropping sps: {}", self.pid, err);
                return;
            }
        };
        if sps.seq_parameter_set_id as usize >= MAX_SPS_COUNT {
            return;
        }

        let (fps_rate, fps_scale) = if sps.vui.timing_info_present_flag {
            (sps.vui.time_scale, sps.vui.num_units_in_tick * 2)
        } else {
            (0, 0)
        };
        let video = VideoInfo {
            width: sps.width,
            height: sps.height,
            aspect: sps.display_aspect(),
            fps_rate,
            fps_scale,
        };
        if let StreamInfo::Video(current) = &self.info {
            if current.width != video.width || current.height != video.height {
                log::info!(
                    "h264 profile {} level {}: {}x{} aspect {:.3}",
                    sps.profile_idc,
                    sps.level_idc,
                    video.width,
                    video.height,
                    video.aspect
                );
            }
        }
        self.info = StreamInfo::Video(video);
        self.active_sps = Some(sps.seq_parameter_set_id);
        self.sps.insert(sps.seq_parameter_set_id, sps);
    }

    fn on_pps(&mut self, rbsp: &[u8]) {
        match pps::parse_pps(rbsp) {
            Ok(pps) => {
                self.pps.insert(pps.pic_parameter_set_id, pps);
            }
            Err(err) => log::debug!("pid {}: dropping pps: {}", self.pid, err),
        }
    }

    fn on_slice(&mut self, rbsp: &[u8], nal_type: u8) {
        if self.au_has_slice {
            return;
        }

        let pps_id = slice::peek_pps_id(rbsp);
        let pps = match self.pps.get(&pps_id) {
            Some(pps) => pps,
            None => {
                log::trace!("pid {}: slice refers to unknown pps {}", self.pid, pps_id);
                return;
            }
        };
        let sps = match self.sps.get(&pps.seq_parameter_set_id) {
            Some(sps) => sps,
            None => {
                log::trace!("pid {}: pps {} without sps", self.pid, pps_id);
                return;
            }
        };

        match slice::parse_slice_header(rbsp, nal_type, sps, pps) {
            Ok(header) => {
                self.active_sps = Some(sps.seq_parameter_set_id);
                self.au_frame_type = if nal_type == nal_unit_type::IDR {
                    FrameType::I
                } else {
                    match header.slice_type {
                        SliceType::I | SliceType::SI => FrameType::I,
                        SliceType::P | SliceType::SP => FrameType::P,
                        SliceType::B => FrameType::B,
                    }
                };
            }
            Err(err) => log::debug!("pid {}: bad slice header: {}", self.pid, err),
        }
    }

    fn frame_duration(&self) -> Option<u64> {
        self.active_sps
            .and_then(|id| self.sps.get(&id))
            .and_then(|sps| sps.frame_duration_90k())
    }

    /// Splits the access unit ending at `end` off the buffer. Returns `end`,
    /// the number of bytes the remaining buffer moved by.
    fn finalize_access_unit(&mut self, end: usize, out: &mut Vec<StreamPacket>) -> usize {
        let start = self.au_start.unwrap_or(end).min(end);
        let frame_type = self.au_frame_type;
        self.clear_access_unit();

        self.assembler.consume(start);
        let timestamps = self.assembler.take_timestamp(0);
        let payload = self.assembler.split_frame(end - start);

        if frame_type == FrameType::I {
            self.seen_keyframe = true;
        }
        let width = match &self.info {
            StreamInfo::Video(video) => video.width,
            _ => 0,
        };
        if frame_type == FrameType::None || !self.seen_keyframe || width == 0 {
            log::trace!(
                "pid {}: dropping {:?} access unit of {} bytes",
                self.pid,
                frame_type,
                payload.len()
            );
            return end;
        }

        let (mut pts, mut dts) = timestamps.unwrap_or((PTS_NO_VALUE, PTS_NO_VALUE));
        if dts == PTS_NO_VALUE && self.prev_dts != PTS_NO_VALUE {
            let step = self.frame_duration().unwrap_or(self.prev_duration);
            if step > 0 {
                dts = timestamp::pts_add(self.prev_dts, step as i64);
            }
        }
        if pts == PTS_NO_VALUE {
            pts = dts;
        }

        let duration = match self.frame_duration() {
            Some(duration) => duration,
            None if dts != PTS_NO_VALUE && self.prev_dts != PTS_NO_VALUE => {
                timestamp::pts_diff(dts, self.prev_dts).max(0) as u64
            }
            None => 0,
        };
        if dts != PTS_NO_VALUE {
            self.prev_dts = dts;
        }
        self.prev_duration = duration;

        let mut packet = StreamPacket::new(self.pid, StreamType::H264, payload);
        packet.frame_type = frame_type;
        packet.pts = pts;
        packet.dts = dts;
        packet.duration = duration;
        out.push(packet);

        end
    }
}

impl EsParser for H264Parser {
    fn parse(&mut self, data: &[u8], payload_unit_start: bool, out: &mut Vec<StreamPacket>) {
        if !self.assembler.push(data, payload_unit_start) {
            self.scan_pos = 0;
            self.nal_start = None;
            self.clear_access_unit();
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
        self.nal_start = None;
        self.clear_access_unit();
        self.prev_dts = PTS_NO_VALUE;
        self.prev_duration = 0;
    }

    //the last nal has no following start code to end it
    fn flush(&mut self, out: &mut Vec<StreamPacket>) {
        if let Some(start) = self.nal_start.take() {
            let end = self.assembler.len();
            self.process_nal(start, self.nal_header, end, out);
        }
        if self.au_has_slice {
            let end = self.assembler.len();
            self.finalize_access_unit(end, out);
        }
        self.reset();
    }
}
