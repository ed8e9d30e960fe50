use {
    super::{samples_to_90k, AudioFrame, AudioFramer, EsParser, FrameProbe},
    crate::packet::{AudioInfo, StreamInfo, StreamPacket, StreamType},
    bytesio::bits_reader::BitsReader,
};

const SYNC_WORD: [u8; 4] = [0x7F, 0xFE, 0x80, 0x01];
const HEADER_LEN: usize = 11;
const MIN_FRAME_SIZE: usize = 96;

const SAMPLE_RATES: [u32; 16] = [
    0, 8000, 16000, 32000, 0, 0, 11025, 22050, 44100, 0, 0, 12000, 24000, 48000, 0, 0,
];

// kbit/s by RATE, 0 for open and variable rates
const BITRATES: [u32; 32] = [
    32, 56, 64, 96, 112, 128, 192, 224, 256, 320, 384, 448, 512, 576, 640, 768, 960, 1024, 1152,
    1280, 1344, 1408, 1411, 1472, 1536, 1920, 2048, 3072, 3840, 0, 0, 0,
];

// channels by AMODE
const CHANNELS: [u32; 16] = [1, 2, 2, 2, 2, 3, 3, 4, 4, 5, 6, 6, 6, 7, 8, 8];

// core frame header after the sync word: FTYPE 1, SHORT 5, CPF 1, NBLKS 7,
// FSIZE 14, AMODE 6, SFREQ 4, RATE 5, MIX 1, DYNF 1, TIMEF 1, AUXF 1,
// HDCD 1, EXT_AUDIO_ID 3, EXT_AUDIO 1, ASPF 1, LFF 2
fn probe(data: &[u8]) -> FrameProbe {
    if data.len() < HEADER_LEN {
        let matched = data.len().min(SYNC_WORD.len());
        return if data[..matched] == SYNC_WORD[..matched] {
            FrameProbe::NeedMore
        } else {
            FrameProbe::Skip
        };
    }
    if data[..4] != SYNC_WORD {
        return FrameProbe::Skip;
    }

    let mut reader = BitsReader::new(&data[4..HEADER_LEN]);
    reader.skip_n_bits(1 + 5 + 1);
    let blocks = reader.read_n_bits(7) + 1;
    let size = reader.read_n_bits(14) as usize + 1;
    let amode = reader.read_n_bits(6) as usize;
    let sample_rate = SAMPLE_RATES[reader.read_n_bits(4) as usize];
    let rate = reader.read_n_bits(5) as usize;
    reader.skip_n_bits(10);
    let lfe = reader.read_n_bits(2) != 0;

    if sample_rate == 0 || size < MIN_FRAME_SIZE || blocks < 6 {
        return FrameProbe::Skip;
    }
    let channels = CHANNELS.get(amode).copied().unwrap_or(2) + lfe as u32;

    FrameProbe::Frame(AudioFrame::new(
        size,
        samples_to_90k(blocks * 32, sample_rate),
        AudioInfo {
            channels,
            sample_rate,
            bit_rate: BITRATES[rate] * 1000,
            bits_per_sample: 16,
            block_align: 0,
        },
    ))
}

/// DTS core frames, extension substreams stay inside the frame they follow.
pub struct DtsParser {
    framer: AudioFramer,
}

impl DtsParser {
    pub fn new(pid: u16) -> Self {
        Self {
            framer: AudioFramer::new(pid, StreamType::Dts),
        }
    }
}

impl EsParser for DtsParser {
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
    use super::DtsParser;
    use crate::define::PTS_NO_VALUE;
    use crate::packet::StreamInfo;
    use crate::parsers::EsParser;
    use crate::pes::tests::build_pes_header;
    use bytesio::bits_writer::BitsWriter;
    use bytesio::bytes_writer::BytesWriter;

    // 512 samples, 2012 byte frames, 3/2 + lfe at 48 kHz, 768 kbit/s
    fn dts_frame() -> Vec<u8> {
        let mut writer = BitsWriter::new(BytesWriter::new());
        writer.write_bytes(&[0x7F, 0xFE, 0x80, 0x01]).unwrap();
        writer.write_n_bits(1, 1).unwrap(); //FTYPE
        writer.write_n_bits(31, 5).unwrap(); //SHORT
        writer.write_n_bits(0, 1).unwrap(); //CPF
        writer.write_n_bits(15, 7).unwrap(); //NBLKS
        writer.write_n_bits(2011, 14).unwrap(); //FSIZE
        writer.write_n_bits(9, 6).unwrap(); //AMODE
        writer.write_n_bits(13, 4).unwrap(); //SFREQ
        writer.write_n_bits(15, 5).unwrap(); //RATE
        writer.write_n_bits(0, 10).unwrap();
        writer.write_n_bits(2, 2).unwrap(); //LFF
        writer.bits_aligment_8().unwrap();

        let mut frame = writer.get_current_bytes().to_vec();
        frame.resize(2012, 0x00);
        frame
    }

    #[test]
    fn test_dts_frames() {
        let mut parser = DtsParser::new(0x105);
        let mut out = Vec::new();

        let mut unit = build_pes_header(0xBD, 0, 4500, PTS_NO_VALUE);
        unit.extend(dts_frame());
        unit.extend(dts_frame());
        parser.parse(&unit, true, &mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].payload.len(), 2012);
        assert_eq!(out[0].duration, 960);
        assert_eq!(out[1].pts, 4500 + 960);

        match parser.info() {
            StreamInfo::Audio(audio) => {
                assert_eq!(audio.channels, 6);
                assert_eq!(audio.sample_rate, 48000);
                assert_eq!(audio.bit_rate, 768000);
            }
            _ => panic!("not audio"),
        }
    }
}
