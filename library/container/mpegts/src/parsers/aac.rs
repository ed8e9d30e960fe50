use {
    super::{samples_to_90k, AudioFrame, AudioFramer, EsParser, FrameProbe},
    crate::packet::{AudioInfo, StreamInfo, StreamPacket, StreamType},
    bytes::BytesMut,
    bytesio::{bits_reader::BitsReader, bits_writer::BitsWriter, bytes_writer::BytesWriter},
};

const ADTS_HEADER_LEN: usize = 7;
/// aac_frame_length is a 13 bit field.
const ADTS_MAX_FRAME_LEN: usize = 0x1FFF;
const AAC_SAMPLES: u64 = 1024;

const LOAS_SYNC_WORD: u64 = 0x2B7;
const LOAS_HEADER_LEN: usize = 3;

pub const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

pub fn sample_rate_index(sample_rate: u32) -> Option<u8> {
    SAMPLE_RATES
        .iter()
        .position(|rate| *rate == sample_rate)
        .map(|index| index as u8)
}

fn channels_of(channel_configuration: u8) -> u32 {
    match channel_configuration {
        7 => 8,
        config => config as u32,
    }
}

// adts_fixed_header: syncword 12, ID 1, layer 2, protection_absent 1,
// profile 2, sampling_frequency_index 4, private_bit 1,
// channel_configuration 3, original_copy 1, home 1
// adts_variable_header: copyright_identification_bit 1,
// copyright_identification_start 1, aac_frame_length 13,
// adts_buffer_fullness 11, number_of_raw_data_blocks_in_frame 2
fn probe_adts(data: &[u8]) -> FrameProbe {
    if data.len() < ADTS_HEADER_LEN {
        return if data[0] == 0xFF && (data.len() < 2 || data[1] & 0xF6 == 0xF0) {
            FrameProbe::NeedMore
        } else {
            FrameProbe::Skip
        };
    }
    if data[0] != 0xFF || data[1] & 0xF6 != 0xF0 {
        return FrameProbe::Skip;
    }

    let sample_rate = match SAMPLE_RATES.get(((data[2] >> 2) & 0x0F) as usize) {
        Some(rate) => *rate,
        None => return FrameProbe::Skip,
    };
    let channel_configuration = ((data[2] & 0x01) << 2) | (data[3] >> 6);
    let size = (((data[3] & 0x03) as usize) << 11)
        | ((data[4] as usize) << 3)
        | (data[5] as usize >> 5);
    if size < ADTS_HEADER_LEN {
        return FrameProbe::Skip;
    }
    let samples = ((data[6] & 0x03) as u64 + 1) * AAC_SAMPLES;

    FrameProbe::Frame(AudioFrame::new(
        size,
        samples_to_90k(samples, sample_rate),
        AudioInfo {
            channels: channels_of(channel_configuration),
            sample_rate,
            bit_rate: (size as u64 * 8 * sample_rate as u64 / samples) as u32,
            bits_per_sample: 16,
            block_align: 0,
        },
    ))
}

/// AAC in ADTS framing passes through unchanged.
pub struct AdtsParser {
    framer: AudioFramer,
}

impl AdtsParser {
    pub fn new(pid: u16) -> Self {
        Self {
            framer: AudioFramer::new(pid, StreamType::AacAdts),
        }
    }
}

impl EsParser for AdtsParser {
    fn parse(&mut self, data: &[u8], payload_unit_start: bool, out: &mut Vec<StreamPacket>) {
        if self.framer.push(data, payload_unit_start) {
            self.framer.split_frames(out, probe_adts);
        }
    }

    fn info(&self) -> &StreamInfo {
        &self.framer.info
    }

    fn reset(&mut self) {
        self.framer.reset();
    }
}

/// The part of StreamMuxConfig an ADTS header can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxConfig {
    pub audio_mux_version: u8,
    pub audio_object_type: u8,
    pub sample_rate_index: u8,
    pub channel_configuration: u8,
    pub frame_length_type: u8,
}

impl MuxConfig {
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATES[self.sample_rate_index as usize]
    }
}

// LatmGetValue()
fn latm_get_value(reader: &mut BitsReader) -> u64 {
    let bytes_for_value = reader.read_n_bits(2) as usize;
    let mut value = 0;
    for _ in 0..=bytes_for_value {
        value = (value << 8) | reader.read_n_bits(8);
    }
    value
}

fn read_audio_object_type(reader: &mut BitsReader) -> u8 {
    let object_type = reader.read_n_bits(5) as u8;
    if object_type == 31 {
        32 + reader.read_n_bits(6) as u8
    } else {
        object_type
    }
}

fn read_sample_rate_index(reader: &mut BitsReader) -> Option<u8> {
    let index = reader.read_n_bits(4) as u8;
    if index == 0x0F {
        let explicit = reader.read_n_bits(24) as u32;
        return sample_rate_index(explicit);
    }
    if (index as usize) < SAMPLE_RATES.len() {
        Some(index)
    } else {
        None
    }
}

// AudioSpecificConfig() in ISO/IEC 14496-3 1.6.2.1, up to GASpecificConfig
fn parse_audio_specific_config(reader: &mut BitsReader) -> Option<(u8, u8, u8)> {
    let mut audio_object_type = read_audio_object_type(reader);
    let sample_rate_index = read_sample_rate_index(reader)?;
    let channel_configuration = reader.read_n_bits(4) as u8;

    //explicit SBR/PS signalling: the core object type follows
    if audio_object_type == 5 || audio_object_type == 29 {
        read_sample_rate_index(reader)?;
        audio_object_type = read_audio_object_type(reader);
    }

    match audio_object_type {
        1..=4 | 6 | 7 | 17 | 19..=23 => {
            reader.skip_n_bits(1); //frameLengthFlag
            if reader.read_flag() {
                reader.skip_n_bits(14); //coreCoderDelay
            }
            let extension_flag = reader.read_flag();
            if channel_configuration == 0 {
                //program_config_element is not supported
                return None;
            }
            if audio_object_type == 6 || audio_object_type == 20 {
                reader.skip_n_bits(3);
            }
            if extension_flag {
                if audio_object_type == 22 {
                    reader.skip_n_bits(16);
                }
                if matches!(audio_object_type, 17 | 19 | 20 | 23) {
                    reader.skip_n_bits(3);
                }
                reader.skip_n_bits(1);
            }
        }
        _ => return None,
    }

    if reader.is_overrun() {
        return None;
    }
    Some((audio_object_type, sample_rate_index, channel_configuration))
}

// StreamMuxConfig() in ISO/IEC 14496-3 1.7.3, single program and layer only
fn parse_stream_mux_config(reader: &mut BitsReader) -> Option<MuxConfig> {
    let audio_mux_version = reader.read_bit();
    let audio_mux_version_a = if audio_mux_version == 1 {
        reader.read_bit()
    } else {
        0
    };
    if audio_mux_version_a != 0 {
        return None;
    }
    if audio_mux_version == 1 {
        latm_get_value(reader); //taraBufferFullness
    }

    reader.skip_n_bits(1); //allStreamsSameTimeFraming
    let num_sub_frames = reader.read_n_bits(6);
    let num_program = reader.read_n_bits(4);
    let num_layer = reader.read_n_bits(3);
    if num_sub_frames != 0 || num_program != 0 || num_layer != 0 {
        log::debug!(
            "latm: unsupported mux layout, subframes {} programs {} layers {}",
            num_sub_frames + 1,
            num_program + 1,
            num_layer + 1
        );
        return None;
    }

    let (audio_object_type, sample_rate_index, channel_configuration) = if audio_mux_version == 0
    {
        parse_audio_specific_config(reader)?
    } else {
        let asc_len = latm_get_value(reader) as usize;
        let start = reader.position();
        let config = parse_audio_specific_config(reader)?;
        let used = reader.position() - start;
        if used > asc_len {
            return None;
        }
        reader.skip_n_bits(asc_len - used); //fill bits
        config
    };

    let frame_length_type = reader.read_n_bits(3) as u8;
    match frame_length_type {
        0 => reader.skip_n_bits(8), //latmBufferFullness
        _ => {
            log::debug!("latm: unsupported frame length type {}", frame_length_type);
            return None;
        }
    }

    if reader.read_flag() {
        //otherDataPresent
        if audio_mux_version == 1 {
            latm_get_value(reader);
        } else {
            loop {
                let escape = reader.read_flag();
                reader.skip_n_bits(8);
                if !escape {
                    break;
                }
            }
        }
    }
    if reader.read_flag() {
        reader.skip_n_bits(8); //crcCheckSum
    }

    if reader.is_overrun() {
        return None;
    }
    Some(MuxConfig {
        audio_mux_version,
        audio_object_type,
        sample_rate_index,
        channel_configuration,
        frame_length_type,
    })
}

/// Builds the 7 byte ADTS header placed in front of every raw AAC frame
/// taken out of LATM. Returns `None` when the frame does not fit the
/// header's length field.
pub fn adts_header(config: &MuxConfig, payload_len: usize) -> Option<BytesMut> {
    let frame_length = payload_len + ADTS_HEADER_LEN;
    if frame_length > ADTS_MAX_FRAME_LEN {
        return None;
    }
    let frame_length = frame_length as u64;
    let mut writer = BitsWriter::new(BytesWriter::new());
    let profile = config.audio_object_type.saturating_sub(1).min(3) as u64;

    let fields: [(u64, usize); 15] = [
        (0xFFF, 12),
        (0, 1), //ID: MPEG-4
        (0, 2), //layer
        (1, 1), //protection_absent
        (profile, 2),
        (config.sample_rate_index as u64, 4),
        (0, 1),
        (config.channel_configuration as u64, 3),
        (0, 1),
        (0, 1),
        (0, 1),
        (0, 1),
        (frame_length, 13),
        (0x7FF, 11), //variable bitrate
        (0, 2),
    ];
    for (value, bits) in fields {
        if let Err(err) = writer.write_n_bits(value, bits) {
            log::error!("adts header: {}", err);
        }
    }
    Some(writer.get_current_bytes())
}

// AudioMuxElement(1): the stream mux config is cached across elements
// that set useSameStreamMux.
fn convert_mux_element(
    element: &[u8],
    cached: &mut Option<MuxConfig>,
) -> Option<(BytesMut, MuxConfig)> {
    let mut reader = BitsReader::new(element);

    let use_same_stream_mux = reader.read_flag();
    if !use_same_stream_mux {
        let config = parse_stream_mux_config(&mut reader);
        if config.is_some() && *cached != config {
            log::info!("latm stream mux config {:?}", config);
        }
        *cached = config;
    }
    let config = (*cached)?;

    // PayloadLengthInfo() for frameLengthType 0
    let mut payload_len = 0;
    loop {
        let tmp = reader.read_n_bits(8) as usize;
        payload_len += tmp;
        if tmp != 255 {
            break;
        }
    }
    if reader.is_overrun() || payload_len * 8 > reader.remaining_bits() {
        return None;
    }

    let mut frame = match adts_header(&config, payload_len) {
        Some(header) => header,
        None => {
            log::debug!("latm payload of {} bytes is too long for adts", payload_len);
            return None;
        }
    };
    frame.reserve(payload_len);
    //the payload is not byte aligned inside the mux element
    for _ in 0..payload_len {
        frame.extend_from_slice(&[reader.read_byte()]);
    }
    Some((frame, config))
}

// AudioSyncStream(): syncword 11, audioMuxLengthBytes 13, AudioMuxElement(1)
fn probe_loas(data: &[u8], config: &mut Option<MuxConfig>) -> FrameProbe {
    if data.len() < LOAS_HEADER_LEN {
        return if data[0] == 0x56 && (data.len() < 2 || data[1] & 0xE0 == 0xE0) {
            FrameProbe::NeedMore
        } else {
            FrameProbe::Skip
        };
    }
    let mut reader = BitsReader::new(&data[..LOAS_HEADER_LEN]);
    if reader.read_n_bits(11) != LOAS_SYNC_WORD {
        return FrameProbe::Skip;
    }
    let size = LOAS_HEADER_LEN + reader.read_n_bits(13) as usize;
    if data.len() < size {
        return FrameProbe::NeedMore;
    }

    let (frame, config) = match convert_mux_element(&data[LOAS_HEADER_LEN..size], config) {
        Some(converted) => converted,
        None => return FrameProbe::Drop(size),
    };
    let sample_rate = config.sample_rate();
    let info = AudioInfo {
        channels: channels_of(config.channel_configuration),
        sample_rate,
        bit_rate: (frame.len() as u64 * 8 * sample_rate as u64 / AAC_SAMPLES) as u32,
        bits_per_sample: 16,
        block_align: 0,
    };

    let mut audio_frame = AudioFrame::new(size, samples_to_90k(AAC_SAMPLES, sample_rate), info);
    audio_frame.payload = Some(frame);
    FrameProbe::Frame(audio_frame)
}

/// AAC carried in LOAS/LATM, re-emitted as ADTS frames.
pub struct LatmParser {
    framer: AudioFramer,
    config: Option<MuxConfig>,
}

impl LatmParser {
    pub fn new(pid: u16) -> Self {
        Self {
            framer: AudioFramer::new(pid, StreamType::AacLatm),
            config: None,
        }
    }
}

impl EsParser for LatmParser {
    fn parse(&mut self, data: &[u8], payload_unit_start: bool, out: &mut Vec<StreamPacket>) {
        if !self.framer.push(data, payload_unit_start) {
            return;
        }
        let config = &mut self.config;
        self.framer.split_frames(out, |data| probe_loas(data, config));
    }

    fn info(&self) -> &StreamInfo {
        &self.framer.info
    }

    fn reset(&mut self) {
        self.framer.reset();
        self.config = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{adts_header, AdtsParser, LatmParser, MuxConfig};
    use crate::define::PTS_NO_VALUE;
    use crate::packet::StreamInfo;
    use crate::parsers::EsParser;
    use crate::pes::tests::build_pes_header;
    use bytesio::bits_writer::BitsWriter;
    use bytesio::bytes_writer::BytesWriter;

    const ADTS_STEREO_48K: [u8; 7] = [0xFF, 0xF1, 0x4C, 0x80, 0x01, 0x9F, 0xFC];

    fn config() -> MuxConfig {
        MuxConfig {
            audio_mux_version: 0,
            audio_object_type: 2,
            sample_rate_index: 3,
            channel_configuration: 2,
            frame_length_type: 0,
        }
    }

    // AAC LC, 48 kHz, stereo
    fn loas_frame(with_config: bool, payload: &[u8]) -> Vec<u8> {
        let mut writer = BitsWriter::new(BytesWriter::new());
        writer.write_bit(!with_config as u8).unwrap();
        if with_config {
            writer.write_n_bits(0, 1).unwrap(); //audioMuxVersion
            writer.write_n_bits(1, 1).unwrap(); //allStreamsSameTimeFraming
            writer.write_n_bits(0, 6).unwrap();
            writer.write_n_bits(0, 4).unwrap();
            writer.write_n_bits(0, 3).unwrap();
            writer.write_n_bits(2, 5).unwrap(); //AAC LC
            writer.write_n_bits(3, 4).unwrap(); //48000
            writer.write_n_bits(2, 4).unwrap(); //stereo
            writer.write_n_bits(0, 3).unwrap(); //GASpecificConfig
            writer.write_n_bits(0, 3).unwrap(); //frameLengthType
            writer.write_n_bits(0xFF, 8).unwrap();
            writer.write_n_bits(0, 1).unwrap(); //otherDataPresent
            writer.write_n_bits(0, 1).unwrap(); //crcCheckPresent
        }
        writer.write_n_bits(payload.len() as u64, 8).unwrap();
        for byte in payload {
            writer.write_n_bits(*byte as u64, 8).unwrap();
        }
        writer.bits_aligment_8().unwrap();
        let element = writer.get_current_bytes();

        let mut frame = BitsWriter::new(BytesWriter::new());
        frame.write_n_bits(0x2B7, 11).unwrap();
        frame.write_n_bits(element.len() as u64, 13).unwrap();
        frame.write_bytes(&element[..]).unwrap();
        frame.get_current_bytes().to_vec()
    }

    #[test]
    fn test_adts_header() {
        let header = adts_header(&config(), 5).unwrap();
        assert_eq!(&header[..], &ADTS_STEREO_48K);
    }

    #[test]
    fn test_adts_length_field_limit() {
        let header = adts_header(&config(), 0x1FFF - 7).unwrap();
        // aac_frame_length spans bytes 3..6
        let frame_length = ((header[3] as usize & 0x03) << 11)
            | (header[4] as usize) << 3
            | (header[5] as usize) >> 5;
        assert_eq!(frame_length, 0x1FFF);

        assert!(adts_header(&config(), 0x1FFF - 6).is_none());
        assert!(adts_header(&config(), 9000).is_none());
    }

    #[test]
    fn test_latm_to_adts() {
        let mut parser = LatmParser::new(0x103);
        let mut out = Vec::new();

        let mut unit = build_pes_header(0xC0, 0, 90000, PTS_NO_VALUE);
        unit.extend(loas_frame(true, &[1, 2, 3, 4, 5]));
        unit.extend(loas_frame(false, &[7, 8, 9]));
        parser.parse(&unit, true, &mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(&out[0].payload[..7], &ADTS_STEREO_48K);
        assert_eq!(&out[0].payload[7..], &[1, 2, 3, 4, 5]);
        assert_eq!(out[1].payload.len(), 10);
        assert_eq!(&out[1].payload[7..], &[7, 8, 9]);

        assert_eq!(out[0].pts, 90000);
        assert_eq!(out[0].duration, 1920);
        assert_eq!(out[1].pts, 91920);

        match parser.info() {
            StreamInfo::Audio(audio) => {
                assert_eq!(audio.channels, 2);
                assert_eq!(audio.sample_rate, 48000);
            }
            _ => panic!("not audio"),
        }
    }

    #[test]
    fn test_latm_waits_for_config() {
        let mut parser = LatmParser::new(0x103);
        let mut out = Vec::new();

        let mut unit = build_pes_header(0xC0, 0, 0, PTS_NO_VALUE);
        unit.extend(loas_frame(false, &[7, 8, 9]));
        unit.extend(loas_frame(true, &[1, 2]));
        parser.parse(&unit, true, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(&out[0].payload[7..], &[1, 2]);
    }

    #[test]
    fn test_adts_passthrough() {
        let mut parser = AdtsParser::new(0x104);
        let mut out = Vec::new();

        let mut frame = ADTS_STEREO_48K.to_vec();
        frame.extend_from_slice(&[1, 2, 3, 4, 5]);

        let mut unit = build_pes_header(0xC0, 0, 0, PTS_NO_VALUE);
        unit.extend_from_slice(&frame);
        unit.extend_from_slice(&frame);
        parser.parse(&unit, true, &mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(&out[1].payload[..], &frame[..]);
        assert_eq!(out[1].pts, 1920);
        assert!(parser.info().is_ready());
    }
}
