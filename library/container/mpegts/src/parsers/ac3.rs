use {
    super::{samples_to_90k, AudioFrame, AudioFramer, EsParser, FrameProbe},
    crate::packet::{AudioInfo, StreamInfo, StreamPacket, StreamType},
    bytesio::bits_reader::BitsReader,
};

const SYNC_WORD: [u8; 2] = [0x0B, 0x77];
const HEADER_LEN: usize = 8;
const AC3_SAMPLES: u64 = 1536;
const SAMPLES_PER_BLOCK: u64 = 256;

const SAMPLE_RATES: [u32; 3] = [48000, 44100, 32000];
const REDUCED_SAMPLE_RATES: [u32; 3] = [24000, 22050, 16000];
const EAC3_BLOCKS: [u64; 4] = [1, 2, 3, 6];

// kbit/s, indexed by frmsizecod / 2
const BITRATES: [u32; 19] = [
    32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 576, 640,
];

// full bandwidth channels per acmod
const CHANNELS: [u32; 8] = [2, 1, 2, 3, 3, 4, 4, 5];

/// Length of an AC-3 syncframe in bytes. ATSC A/52 Table 5.18 lists it in
/// 16-bit words per fscod and frmsizecod.
pub fn ac3_frame_size(fscod: u8, frmsizecod: u8) -> Option<usize> {
    let kbps = *BITRATES.get((frmsizecod >> 1) as usize)? as usize;
    let words = match fscod {
        0 => kbps * 2,
        1 => kbps * 320 / 147 + (frmsizecod & 0x01) as usize,
        2 => kbps * 3,
        _ => return None,
    };
    Some(words * 2)
}

// syncinfo: syncword 16, crc1 16, fscod 2, frmsizecod 6
// bsi: bsid 5, bsmod 3, acmod 3, [cmixlev 2], [surmixlev 2], [dsurmod 2], lfeon 1
fn probe_ac3(data: &[u8]) -> FrameProbe {
    let fscod = data[4] >> 6;
    let frmsizecod = data[4] & 0x3F;
    let size = match ac3_frame_size(fscod, frmsizecod) {
        Some(size) => size,
        None => return FrameProbe::Skip,
    };
    let sample_rate = SAMPLE_RATES[fscod as usize];

    let mut reader = BitsReader::new(&data[6..HEADER_LEN]);
    let acmod = reader.read_n_bits(3) as usize;
    if acmod & 0x01 != 0 && acmod != 1 {
        reader.skip_n_bits(2);
    }
    if acmod & 0x04 != 0 {
        reader.skip_n_bits(2);
    }
    if acmod == 2 {
        reader.skip_n_bits(2);
    }
    let lfe = reader.read_bit() as u32;

    FrameProbe::Frame(AudioFrame::new(
        size,
        samples_to_90k(AC3_SAMPLES, sample_rate),
        AudioInfo {
            channels: CHANNELS[acmod] + lfe,
            sample_rate,
            bit_rate: BITRATES[(frmsizecod >> 1) as usize] * 1000,
            bits_per_sample: 16,
            block_align: 0,
        },
    ))
}

const EAC3_DEPENDENT: u32 = 1;
const EAC3_RESERVED: u32 = 3;

// syncinfo: syncword 16
// bsi: strmtyp 2, substreamid 3, frmsiz 11, fscod 2, fscod2/numblkscod 2,
//      acmod 3, lfeon 1, bsid 5
fn probe_eac3(data: &[u8]) -> FrameProbe {
    let mut reader = BitsReader::new(&data[2..HEADER_LEN]);
    let strmtyp = reader.read_n_bits(2) as u32;
    if strmtyp == EAC3_RESERVED {
        return FrameProbe::Skip;
    }
    reader.skip_n_bits(3);
    let size = (reader.read_n_bits(11) as usize + 1) * 2;
    let fscod = reader.read_n_bits(2) as usize;
    let fscod2_or_blocks = reader.read_n_bits(2) as usize;

    let (sample_rate, blocks) = if fscod == 3 {
        match REDUCED_SAMPLE_RATES.get(fscod2_or_blocks) {
            Some(rate) => (*rate, 6),
            None => return FrameProbe::Skip,
        }
    } else {
        (SAMPLE_RATES[fscod], EAC3_BLOCKS[fscod2_or_blocks])
    };
    let acmod = reader.read_n_bits(3) as usize;
    let lfe = reader.read_bit() as u32;

    if size < HEADER_LEN {
        return FrameProbe::Skip;
    }
    let samples = blocks * SAMPLES_PER_BLOCK;

    let mut frame = AudioFrame::new(
        size,
        samples_to_90k(samples, sample_rate),
        AudioInfo {
            channels: CHANNELS[acmod] + lfe,
            sample_rate,
            bit_rate: (size as u64 * 8 * sample_rate as u64 / samples) as u32,
            bits_per_sample: 16,
            block_align: 0,
        },
    );
    frame.dependent = strmtyp == EAC3_DEPENDENT;
    FrameProbe::Frame(frame)
}

fn probe(data: &[u8]) -> FrameProbe {
    if data.len() < HEADER_LEN {
        return if data[0] == SYNC_WORD[0] && (data.len() < 2 || data[1] == SYNC_WORD[1]) {
            FrameProbe::NeedMore
        } else {
            FrameProbe::Skip
        };
    }
    if data[..2] != SYNC_WORD {
        return FrameProbe::Skip;
    }

    match data[5] >> 3 {
        0..=10 => probe_ac3(data),
        11..=16 => probe_eac3(data),
        _ => FrameProbe::Skip,
    }
}

/// Handles both AC-3 and E-AC-3, the bsid of each syncframe decides.
pub struct Ac3Parser {
    framer: AudioFramer,
}

impl Ac3Parser {
    pub fn new(pid: u16, stream_type: StreamType) -> Self {
        Self {
            framer: AudioFramer::new(pid, stream_type),
        }
    }
}

impl EsParser for Ac3Parser {
    fn parse(&mut self, data: &[u8], payload_unit_start: bool, out: &mut Vec<StreamPacket>) {
        if self.framer.push(data, payload_unit_start) {
            self.framer.split_frames(out, probe);
        }
    }

    fn info(&self) -> &StreamInfo {
        &self.framer.info
    }

    fn reset(&mut self) {
        self.framer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::{ac3_frame_size, Ac3Parser};
    use crate::define::PTS_NO_VALUE;
    use crate::packet::{StreamInfo, StreamType};
    use crate::parsers::EsParser;
    use crate::pes::tests::build_pes_header;

    #[test]
    fn test_frame_size_table() {
        assert_eq!(ac3_frame_size(0, 0), Some(128));
        assert_eq!(ac3_frame_size(1, 0), Some(138));
        assert_eq!(ac3_frame_size(1, 1), Some(140));
        assert_eq!(ac3_frame_size(2, 0), Some(192));
        // 448 kbit/s
        assert_eq!(ac3_frame_size(0, 30), Some(1792));
        assert_eq!(ac3_frame_size(1, 37), Some(2788));
        assert_eq!(ac3_frame_size(2, 37), Some(3840));
        assert_eq!(ac3_frame_size(0, 38), None);
        assert_eq!(ac3_frame_size(3, 0), None);
    }

    #[test]
    fn test_ac3_frames() {
        let mut parser = Ac3Parser::new(0x102, StreamType::Ac3);
        let mut out = Vec::new();

        // 48 kHz, 448 kbit/s, bsid 8, acmod 7 (3/2) with cmixlev and
        // surmixlev before lfeon
        let mut frame = vec![0x0B, 0x77, 0x00, 0x00, 0x1E, 0x40, 0b1110_0001, 0x00];
        frame.resize(1792, 0x00);

        let mut unit = build_pes_header(0xBD, 0, 180000, PTS_NO_VALUE);
        unit.extend_from_slice(&frame);
        unit.extend_from_slice(&frame);
        unit.extend_from_slice(&frame[..100]);
        parser.parse(&unit, true, &mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].pts, 180000);
        assert_eq!(out[1].pts, 180000 + 2880);
        assert_eq!(out[0].duration, 2880);

        match parser.info() {
            StreamInfo::Audio(audio) => {
                assert_eq!(audio.channels, 6);
                assert_eq!(audio.sample_rate, 48000);
                assert_eq!(audio.bit_rate, 448000);
            }
            _ => panic!("not audio"),
        }
    }

    #[test]
    fn test_eac3_frame() {
        let mut parser = Ac3Parser::new(0x102, StreamType::Eac3);
        let mut out = Vec::new();

        // independent stream, frmsiz 767 => 1536 bytes, 48 kHz, 6 blocks,
        // acmod 2, lfe off, bsid 16
        let mut frame = vec![0x0B, 0x77, 0x02, 0xFF, 0x34, 0x80, 0x00, 0x00];
        frame.resize(1536, 0x00);

        let mut unit = build_pes_header(0xBD, 0, 0, PTS_NO_VALUE);
        unit.extend_from_slice(&frame);
        parser.parse(&unit, true, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].payload.len(), 1536);
        assert_eq!(out[0].duration, 2880);
        match parser.info() {
            StreamInfo::Audio(audio) => {
                assert_eq!(audio.channels, 2);
                assert_eq!(audio.sample_rate, 48000);
                assert_eq!(audio.bit_rate, 384000);
            }
            _ => panic!("not audio"),
        }
    }

    #[test]
    fn test_eac3_dependent_substream() {
        let mut parser = Ac3Parser::new(0x102, StreamType::Eac3);
        let mut out = Vec::new();

        let mut independent = vec![0x0B, 0x77, 0x02, 0xFF, 0x34, 0x80, 0x00, 0x00];
        independent.resize(1536, 0x00);
        // strmtyp 1, acmod 7 with lfe, same size and rate
        let mut dependent = vec![0x0B, 0x77, 0x42, 0xFF, 0x3F, 0x80, 0x00, 0x00];
        dependent.resize(1536, 0x00);

        let mut unit = build_pes_header(0xBD, 0, 90000, PTS_NO_VALUE);
        unit.extend_from_slice(&independent);
        unit.extend_from_slice(&dependent);
        unit.extend_from_slice(&independent);
        parser.parse(&unit, true, &mut out);

        let pts: Vec<i64> = out.iter().map(|packet| packet.pts).collect();
        assert_eq!(pts, vec![90000, 90000, 92880]);
        assert_eq!(out[0].duration, 2880);
        assert_eq!(out[1].duration, 0);
        assert_eq!(out[1].dts, out[0].dts);
        assert_eq!(out[2].duration, 2880);

        match parser.info() {
            StreamInfo::Audio(audio) => assert_eq!(audio.channels, 2),
            _ => panic!("not audio"),
        }
    }
}
