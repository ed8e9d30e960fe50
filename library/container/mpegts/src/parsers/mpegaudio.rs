use {
    super::{samples_to_90k, AudioFrame, AudioFramer, EsParser, FrameProbe},
    crate::packet::{AudioInfo, StreamInfo, StreamPacket, StreamType},
};

const HEADER_LEN: usize = 4;

// kbit/s, indexed by bitrate_index; index 0 is free format
const BITRATES_V1: [[u32; 15]; 3] = [
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
];
const BITRATES_V2: [[u32; 15]; 3] = [
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
];
const SAMPLE_RATES: [u32; 3] = [44100, 48000, 32000];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Version {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MpegAudioHeader {
    version: Version,
    /// 1, 2 or 3
    layer: u8,
    bitrate_index: usize,
    sample_rate: u32,
    padding: bool,
    channels: u32,
}

impl MpegAudioHeader {
    // header: syncword 11, version 2, layer 2, protection 1, bitrate 4,
    // sampling_frequency 2, padding 1, private 1, mode 2, ...
    fn parse(data: &[u8]) -> Option<MpegAudioHeader> {
        if data.len() < HEADER_LEN || data[0] != 0xFF || data[1] & 0xE0 != 0xE0 {
            return None;
        }
        let version = match (data[1] >> 3) & 0x03 {
            0 => Version::Mpeg25,
            2 => Version::Mpeg2,
            3 => Version::Mpeg1,
            _ => return None,
        };
        let layer = match (data[1] >> 1) & 0x03 {
            1 => 3,
            2 => 2,
            3 => 1,
            _ => return None,
        };
        let bitrate_index = (data[2] >> 4) as usize;
        if bitrate_index == 0x0F {
            return None;
        }
        let rate_index = ((data[2] >> 2) & 0x03) as usize;
        if rate_index == 3 {
            return None;
        }
        let sample_rate = match version {
            Version::Mpeg1 => SAMPLE_RATES[rate_index],
            Version::Mpeg2 => SAMPLE_RATES[rate_index] / 2,
            Version::Mpeg25 => SAMPLE_RATES[rate_index] / 4,
        };

        Some(MpegAudioHeader {
            version,
            layer,
            bitrate_index,
            sample_rate,
            padding: (data[2] >> 1) & 0x01 == 1,
            channels: if data[3] >> 6 == 3 { 1 } else { 2 },
        })
    }

    fn is_free_format(&self) -> bool {
        self.bitrate_index == 0
    }

    fn bit_rate(&self) -> u32 {
        let table = if self.version == Version::Mpeg1 {
            &BITRATES_V1
        } else {
            &BITRATES_V2
        };
        table[self.layer as usize - 1][self.bitrate_index] * 1000
    }

    fn samples(&self) -> u64 {
        match (self.layer, self.version) {
            (1, _) => 384,
            (3, Version::Mpeg2) | (3, Version::Mpeg25) => 576,
            _ => 1152,
        }
    }

    fn slot_size(&self) -> usize {
        if self.layer == 1 {
            4
        } else {
            1
        }
    }

    fn padding_len(&self) -> usize {
        if self.padding {
            self.slot_size()
        } else {
            0
        }
    }

    /// Frame length in bytes for a known bitrate.
    fn frame_size(&self) -> usize {
        let bits_per_slot = self.samples() / 8 / self.slot_size() as u64;
        let slots = bits_per_slot * self.bit_rate() as u64 / self.sample_rate as u64;
        slots as usize * self.slot_size() + self.padding_len()
    }

    /// Another frame of the same stream, used to measure free-format frames.
    fn is_compatible(&self, other: &MpegAudioHeader) -> bool {
        self.version == other.version
            && self.layer == other.layer
            && self.sample_rate == other.sample_rate
            && other.is_free_format()
    }

    fn audio_info(&self, bit_rate: u32) -> AudioInfo {
        AudioInfo {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bit_rate,
            bits_per_sample: 16,
            block_align: 0,
        }
    }
}

/// Free-format frames carry no bitrate. Their length is measured once as
/// the distance to the next header and remembered without padding.
fn probe(data: &[u8], free_format_size: &mut Option<usize>) -> FrameProbe {
    if data.len() < HEADER_LEN {
        let partial_sync = data[0] == 0xFF && (data.len() < 2 || data[1] & 0xE0 == 0xE0);
        return if partial_sync {
            FrameProbe::NeedMore
        } else {
            FrameProbe::Skip
        };
    }

    let header = match MpegAudioHeader::parse(data) {
        Some(header) => header,
        None => return FrameProbe::Skip,
    };
    let duration = samples_to_90k(header.samples(), header.sample_rate);

    if !header.is_free_format() {
        return FrameProbe::Frame(AudioFrame::new(
            header.frame_size(),
            duration,
            header.audio_info(header.bit_rate()),
        ));
    }

    let size = match *free_format_size {
        Some(size) => size + header.padding_len(),
        None => {
            let next = (HEADER_LEN..data.len()).find(|pos| {
                MpegAudioHeader::parse(&data[*pos..])
                    .map(|next| header.is_compatible(&next))
                    .unwrap_or(false)
            });
            match next {
                Some(size) => {
                    log::debug!("mpeg audio free format frame of {} bytes", size);
                    *free_format_size = Some(size - header.padding_len());
                    size
                }
                None => return FrameProbe::NeedMore,
            }
        }
    };

    let bit_rate = (size as u64 * 8 * header.sample_rate as u64 / header.samples()) as u32;
    FrameProbe::Frame(AudioFrame::new(size, duration, header.audio_info(bit_rate)))
}

pub struct MpegAudioParser {
    framer: AudioFramer,
    free_format_size: Option<usize>,
}

impl MpegAudioParser {
    pub fn new(pid: u16) -> Self {
        Self {
            framer: AudioFramer::new(pid, StreamType::MpegAudio),
            free_format_size: None,
        }
    }
}

impl EsParser for MpegAudioParser {
    fn parse(&mut self, data: &[u8], payload_unit_start: bool, out: &mut Vec<StreamPacket>) {
        if !self.framer.push(data, payload_unit_start) {
            return;
        }
        let free_format_size = &mut self.free_format_size;
        self.framer.split_frames(out, |data| probe(data, free_format_size));
    }

    fn info(&self) -> &StreamInfo {
        &self.framer.info
    }

    fn reset(&mut self) {
        self.framer.reset();
        self.free_format_size = None;
    }
}
