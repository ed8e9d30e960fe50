pub mod ts {
    pub const TS_PACKET_SIZE: usize = 188;
    pub const TS_SYNC_BYTE: u8 = 0x47;
    pub const TS_HEADER_LEN: usize = 4; // 1-byte sync byte + 2-bytes PID + 1-byte CC
    pub const TS_PAYLOAD_UNIT_START_INDICATOR: u8 = 0x40;
    pub const TS_TRANSPORT_ERROR_INDICATOR: u8 = 0x80;
    pub const NULL_PID: u16 = 0x1FFF;
}

pub mod epsi_stream_type {
    pub const PSI_STREAM_MPEG1: u8 = 0x01; // ISO/IEC 11172-2 Video
    pub const PSI_STREAM_MPEG2: u8 = 0x02; // ISO/IEC 13818-2 Video
    pub const PSI_STREAM_AUDIO_MPEG1: u8 = 0x03; // ISO/IEC 11172-3 Audio
    pub const PSI_STREAM_MP3: u8 = 0x04; // ISO/IEC 13818-3 Audio
    pub const PSI_STREAM_PRIVATE_DATA: u8 = 0x06;
    pub const PSI_STREAM_AAC: u8 = 0x0f; // ISO/IEC 13818-7 Audio with ADTS transport syntax
    pub const PSI_STREAM_MPEG4_AAC_LATM: u8 = 0x11; // ISO/IEC 14496-3 Audio with the LATM transport syntax
    pub const PSI_STREAM_H264: u8 = 0x1b; // H.264
    pub const PSI_STREAM_AUDIO_AC3: u8 = 0x81; // ATSC A/52
    pub const PSI_STREAM_AUDIO_DTS: u8 = 0x82;
    pub const PSI_STREAM_AUDIO_EAC3: u8 = 0x87; // ATSC A/52B
    pub const PSI_STREAM_AUDIO_DTS_HD: u8 = 0x8a;
}

pub mod epes_stream_id {
    pub const PES_SID_PSM: u8 = 0xBC; // program_stream_map
    pub const PES_SID_PRIVATE_1: u8 = 0xBD; // private_stream_1
    pub const PES_SID_PADDING: u8 = 0xBE; // padding_stream
    pub const PES_SID_PRIVATE_2: u8 = 0xBF; // private_stream_2
    pub const PES_SID_AUDIO: u8 = 0xC0; // ISO/IEC 13818-3/11172-3/13818-7/14496-3 audio stream '110x xxxx'
    pub const PES_SID_VIDEO: u8 = 0xE0; // H.262 | H.264 | H.265 | ISO/IEC 13818-2/11172-2/14496-2/14496-10 video stream '1110 xxxx'
    pub const PES_SID_ECM: u8 = 0xF0; // ECM_stream
    pub const PES_SID_EMM: u8 = 0xF1; // EMM_stream
    pub const PES_SID_DSMCC: u8 = 0xF2; // H.222.0 | ISO/IEC 13818-1/13818-6_DSMCC_stream
    pub const PES_SID_H222_E: u8 = 0xF8; // Rec. ITU-T H.222.1 type E
    pub const PES_SID_PSD: u8 = 0xFF; // program_stream_directory
}

pub mod clock {
    /// PES timestamps tick at 90 kHz.
    pub const MPEG_CLOCK: i64 = 90_000;
    /// Delivered timestamps tick at 1 MHz.
    pub const NORMALIZED_CLOCK: i64 = 1_000_000;
    pub const PTS_BITS: u32 = 33;
    pub const PTS_MASK: i64 = (1 << PTS_BITS) - 1;
    pub const PTS_WRAP: i64 = 1 << PTS_BITS;
}

pub const PTS_NO_VALUE: i64 = i64::MIN; //(int64_t)0x8000000000000000L

pub const PES_HEADER_LEN: usize = 6; // 3-bytes packet_start_code_prefix + 1-byte stream_id + 2-bytes PES_packet_length
pub const PES_OPTIONAL_HEADER_LEN: usize = 9;

/// Number of PES timestamps remembered while waiting for the access unit
/// they belong to.
pub const MAX_PENDING_TIMESTAMPS: usize = 4;

pub const VIDEO_BUFFER_LIMIT: usize = 8 * 1024 * 1024;
pub const AUDIO_BUFFER_LIMIT: usize = 64 * 1024;
pub const PRIVATE_BUFFER_LIMIT: usize = 64 * 1024;

pub const DEFAULT_MAX_STREAMS: usize = 32;
