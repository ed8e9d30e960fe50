pub mod aac;
pub mod ac3;
pub mod dts;
pub mod h264;
pub mod mpeg2video;
pub mod mpegaudio;
pub mod subtitle;
pub mod teletext;

use {
    super::{
        define::{AUDIO_BUFFER_LIMIT, MAX_PENDING_TIMESTAMPS, PTS_NO_VALUE},
        packet::{AudioInfo, StreamDescriptor, StreamInfo, StreamPacket, StreamType},
        pes::{self, PesHeader},
    },
    bytes::{Buf, BytesMut},
    std::collections::VecDeque,
};

/// Consumes PES payload fragments of one elementary stream and emits the
/// complete access units found in them.
pub trait EsParser: Send + Sync {
    /// `data` starts with a PES header when `payload_unit_start` is set.
    fn parse(&mut self, data: &[u8], payload_unit_start: bool, out: &mut Vec<StreamPacket>);
    fn info(&self) -> &StreamInfo;
    /// Drops the in-flight access unit and any pending timestamps.
    fn reset(&mut self);
    /// Emits the access units still held back at the end of the input.
    /// Parsers that only emit complete units keep nothing back.
    fn flush(&mut self, _out: &mut Vec<StreamPacket>) {}
}

pub fn new_parser(descriptor: &StreamDescriptor) -> Box<dyn EsParser> {
    let pid = descriptor.pid;
    match descriptor.stream_type {
        StreamType::Mpeg2Video => Box::new(mpeg2video::Mpeg2VideoParser::new(pid)),
        StreamType::H264 => Box::new(h264::H264Parser::new(pid)),
        StreamType::MpegAudio => Box::new(mpegaudio::MpegAudioParser::new(pid)),
        StreamType::Ac3 | StreamType::Eac3 => {
            Box::new(ac3::Ac3Parser::new(pid, descriptor.stream_type))
        }
        StreamType::AacAdts => Box::new(aac::AdtsParser::new(pid)),
        StreamType::AacLatm => Box::new(aac::LatmParser::new(pid)),
        StreamType::Dts => Box::new(dts::DtsParser::new(pid)),
        StreamType::DvbSubtitle => Box::new(subtitle::SubtitleParser::new(
            pid,
            descriptor.subtitle.unwrap_or_default(),
        )),
        StreamType::Teletext => Box::new(teletext::TeletextParser::new(pid)),
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingTimestamp {
    offset: u64,
    pts: i64,
    dts: i64,
}

/// Reassembly buffer shared by the stream parsers. It strips PES headers,
/// keeps the elementary stream bytes and remembers at which byte offset
/// each PES timestamp started, so a parser can ask for the timestamp of
/// the access unit beginning at a given position.
pub struct EsAssembler {
    pub buffer: BytesMut,
    consumed: u64,
    timestamps: VecDeque<PendingTimestamp>,
    synced: bool,
    limit: usize,
    pub last_header: Option<PesHeader>,
    /// Start of a PES header cut off by the end of a TS packet.
    partial_header: Option<BytesMut>,
}

impl EsAssembler {
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            consumed: 0,
            timestamps: VecDeque::new(),
            synced: false,
            limit,
            last_header: None,
            partial_header: None,
        }
    }

    pub fn reset(&mut self) {
        self.consumed += self.buffer.len() as u64;
        self.buffer.clear();
        self.timestamps.clear();
        self.synced = false;
        self.last_header = None;
        self.partial_header = None;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Appends one PES fragment. Returns false when the data was dropped:
    /// before the first unit start, on a broken PES header or when the
    /// buffer would grow past its limit. The buffer is empty whenever this
    /// returns false. A PES header cut short by the end of the TS payload
    /// is kept and completed from the next fragment.
    pub fn push(&mut self, data: &[u8], payload_unit_start: bool) -> bool {
        if payload_unit_start {
            self.partial_header = None;
            return self.push_unit(data);
        }
        if let Some(mut joined) = self.partial_header.take() {
            joined.extend_from_slice(data);
            return self.push_unit(&joined);
        }
        self.push_payload(data)
    }

    fn push_unit(&mut self, data: &[u8]) -> bool {
        let header = match pes::parse_pes_header(data) {
            Some(header) => header,
            None if pes::is_truncated_header(data) => {
                log::trace!("pes header continues in the next packet");
                self.partial_header = Some(BytesMut::from(data));
                return true;
            }
            None => {
                log::debug!("dropping unit with a broken pes header");
                self.reset();
                return false;
            }
        };

        if header.has_pts() {
            self.push_timestamp(self.buffer.len(), header.pts, header.dts);
        }
        let header_len = header.header_len;
        self.last_header = Some(header);
        self.synced = true;
        self.push_payload(&data[header_len..])
    }

    fn push_payload(&mut self, payload: &[u8]) -> bool {
        if !self.synced {
            return false;
        }
        if self.buffer.len() + payload.len() > self.limit {
            log::debug!(
                "es buffer exceeds {} bytes, discarding {} bytes",
                self.limit,
                self.buffer.len()
            );
            self.reset();
            return false;
        }

        self.buffer.extend_from_slice(payload);
        true
    }

    /// Records a timestamp for the byte at `position` in the buffer.
    pub fn push_timestamp(&mut self, position: usize, pts: i64, dts: i64) {
        if self.timestamps.len() == MAX_PENDING_TIMESTAMPS {
            self.timestamps.pop_front();
        }
        self.timestamps.push_back(PendingTimestamp {
            offset: self.consumed + position as u64,
            pts,
            dts,
        });
    }

    /// Takes the most recent timestamp that started at or before `position`.
    /// Older entries are dropped with it.
    pub fn take_timestamp(&mut self, position: usize) -> Option<(i64, i64)> {
        let absolute = self.consumed + position as u64;
        let mut found = None;
        while let Some(front) = self.timestamps.front() {
            if front.offset > absolute {
                break;
            }
            found = Some((front.pts, front.dts));
            self.timestamps.pop_front();
        }
        found
    }

    /// Drops `count` bytes from the front of the buffer.
    pub fn consume(&mut self, count: usize) {
        let count = count.min(self.buffer.len());
        self.buffer.advance(count);
        self.consumed += count as u64;
    }

    /// Removes `count` bytes at `position`, used to strip a PES header found
    /// inside the elementary stream. Later timestamps shift accordingly.
    pub fn remove(&mut self, position: usize, count: usize) {
        if position + count > self.buffer.len() {
            return;
        }
        let mut tail = self.buffer.split_off(position);
        tail.advance(count);
        self.buffer.unsplit(tail);

        let boundary = self.consumed + position as u64;
        for timestamp in self.timestamps.iter_mut() {
            if timestamp.offset > boundary {
                timestamp.offset -= (count as u64).min(timestamp.offset - boundary);
            }
        }
    }

    /// Splits `count` bytes off the front as the payload of a new packet.
    pub fn split_frame(&mut self, count: usize) -> BytesMut {
        let count = count.min(self.buffer.len());
        self.consumed += count as u64;
        self.buffer.split_to(count)
    }
}

/// Timestamps the next audio frame: a fresh PES timestamp wins, otherwise
/// the previous frame is extrapolated by its duration.
pub(crate) fn next_audio_timestamp(
    assembler: &mut EsAssembler,
    position: usize,
    next_pts: &mut i64,
    duration: u64,
) -> (i64, i64) {
    let pts = match assembler.take_timestamp(position) {
        Some((pts, _)) => pts,
        None => *next_pts,
    };
    *next_pts = if pts == PTS_NO_VALUE {
        PTS_NO_VALUE
    } else {
        super::timestamp::pts_add(pts, duration as i64)
    };
    (pts, pts)
}

/// What an audio parser found at the current buffer position.
pub(crate) enum FrameProbe {
    /// No frame header here, try the next byte.
    Skip,
    /// Looks like a header but more bytes are needed to be sure.
    NeedMore,
    /// A complete frame that cannot be used, discard its bytes.
    Drop(usize),
    Frame(AudioFrame),
}

pub(crate) struct AudioFrame {
    pub size: usize,
    /// Frame length in 90 kHz ticks.
    pub duration: u64,
    pub info: AudioInfo,
    /// Emitted instead of the `size` source bytes when set.
    pub payload: Option<BytesMut>,
    /// Belongs to the access unit of the previous frame, which gives it
    /// its timestamp.
    pub dependent: bool,
}

impl AudioFrame {
    pub fn new(size: usize, duration: u64, info: AudioInfo) -> Self {
        Self {
            size,
            duration,
            info,
            payload: None,
            dependent: false,
        }
    }
}

/// Sync-word framing shared by the audio parsers. Frame boundaries come
/// from the codec headers alone, PES boundaries only carry timestamps.
pub(crate) struct AudioFramer {
    pid: u16,
    stream_type: StreamType,
    pub assembler: EsAssembler,
    pub info: StreamInfo,
    next_pts: i64,
    last_pts: i64,
    last_dts: i64,
}

impl AudioFramer {
    pub fn new(pid: u16, stream_type: StreamType) -> Self {
        Self {
            pid,
            stream_type,
            assembler: EsAssembler::new(AUDIO_BUFFER_LIMIT),
            info: StreamInfo::Audio(AudioInfo::default()),
            next_pts: PTS_NO_VALUE,
            last_pts: PTS_NO_VALUE,
            last_dts: PTS_NO_VALUE,
        }
    }

    pub fn push(&mut self, data: &[u8], payload_unit_start: bool) -> bool {
        self.assembler.push(data, payload_unit_start)
    }

    pub fn reset(&mut self) {
        self.assembler.reset();
        self.next_pts = PTS_NO_VALUE;
        self.last_pts = PTS_NO_VALUE;
        self.last_dts = PTS_NO_VALUE;
    }

    /// Emits every complete frame the probe recognizes in the buffer.
    pub fn split_frames<F>(&mut self, out: &mut Vec<StreamPacket>, mut probe: F)
    where
        F: FnMut(&[u8]) -> FrameProbe,
    {
        let mut pos = 0;
        let mut skipped = 0;

        while pos < self.assembler.len() {
            let frame = match probe(&self.assembler.buffer[pos..]) {
                FrameProbe::Skip => {
                    pos += 1;
                    skipped += 1;
                    continue;
                }
                FrameProbe::NeedMore => break,
                FrameProbe::Drop(size) => {
                    if pos + size > self.assembler.len() {
                        break;
                    }
                    log::trace!("pid {}: dropping {} byte frame", self.pid, size);
                    pos += size.max(1);
                    continue;
                }
                FrameProbe::Frame(frame) => frame,
            };
            if frame.size == 0 || pos + frame.size > self.assembler.len() {
                break;
            }

            if skipped > 0 {
                log::trace!("pid {}: skipped {} bytes to resync", self.pid, skipped);
                skipped = 0;
            }
            self.assembler.consume(pos);
            pos = 0;

            let (pts, dts, duration) = if frame.dependent {
                (self.last_pts, self.last_dts, 0)
            } else {
                let (pts, dts) = next_audio_timestamp(
                    &mut self.assembler,
                    0,
                    &mut self.next_pts,
                    frame.duration,
                );
                (pts, dts, frame.duration)
            };
            self.last_pts = pts;
            self.last_dts = dts;

            let source = self.assembler.split_frame(frame.size);
            let mut packet =
                StreamPacket::new(self.pid, self.stream_type, frame.payload.unwrap_or(source));
            packet.pts = pts;
            packet.dts = dts;
            packet.duration = duration;
            out.push(packet);

            if frame.dependent {
                continue;
            }

            if let StreamInfo::Audio(current) = &self.info {
                if *current != frame.info {
                    log::info!(
                        "pid {} {}: {} channels {} Hz {} bit/s",
                        self.pid,
                        self.stream_type,
                        frame.info.channels,
                        frame.info.sample_rate,
                        frame.info.bit_rate
                    );
                }
            }
            self.info = StreamInfo::Audio(frame.info);
        }

        self.assembler.consume(pos);
    }
}

/// Samples in 90 kHz ticks.
pub(crate) fn samples_to_90k(samples: u64, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    samples * 90000 / sample_rate as u64
}
