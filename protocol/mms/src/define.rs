use std::time::Duration;

pub const MMST_PORT: u16 = 1755;
pub const MMSH_PORT: u16 = 80;

/// Upper bound for a single packet, also the sanity bound for the packet
/// length announced in the asf header.
pub const BUF_SIZE: usize = 102400;
/// Cap for the accumulated asf header.
pub const ASF_HEADER_LEN: usize = 8192 * 2;
pub const CMD_HEADER_LEN: usize = 40;
pub const CMD_PREFIX_LEN: usize = 8;
pub const CMD_BODY_LEN: usize = 1024 * 16;

pub const MMS_MAGIC: u32 = 0xB00B_FACE;
// "MMS " read as a little endian u32
pub const MMS_PROTOCOL_TAG: u32 = 0x2053_4d4d;

pub const ASF_HEADER_PACKET_ID_TYPE: u32 = 2;
pub const ASF_MEDIA_PACKET_ID_TYPE: u32 = 4;

pub const MAX_KEEPALIVE_ANSWERS: usize = 16;

pub const PLAYER_VERSION: &str = "NSPlayer/7.0.0.1956";
pub const TRANSPORT_REQUEST: &str = "\u{2}\u{0}\\\\192.168.0.129\\TCP\\1037\u{0}0";

pub mod command {
    pub const CONNECT: u32 = 0x01;
    pub const PROTOCOL_SELECT: u32 = 0x02;
    pub const PROTOCOL_FAILED: u32 = 0x03;
    pub const OPEN_FILE: u32 = 0x05;
    pub const FILE_OPENED: u32 = 0x06;
    pub const START_STREAM: u32 = 0x07;
    pub const HEADER_RESPONSE: u32 = 0x11;
    pub const HEADER_REQUEST: u32 = 0x15;
    pub const AUTH_REQUIRED: u32 = 0x1A;
    pub const KEEPALIVE: u32 = 0x1B;
    pub const END_OF_STREAM: u32 = 0x1E;
    pub const NEW_STREAM: u32 = 0x20;
    pub const STREAM_SELECTED: u32 = 0x21;
    pub const STREAM_SELECT: u32 = 0x33;
}

pub mod chunk {
    pub const CHUNK_HEADER_LEN: usize = 4;
    pub const RESET: u16 = 0x4324;
    pub const DATA: u16 = 0x4424;
    pub const END: u16 = 0x4524;
    pub const ASF_HEADER: u16 = 0x4824;
}

pub const MMSH_USER_AGENT: &str = "NSPlayer/7.10.0.3059";
pub const MMSH_CLIENT_GUID: &str = "{c77e7400-738a-11d2-9add-0020af0a3278}";

pub const DEFAULT_BANDWIDTH: u32 = 1_544_000;

#[derive(Debug, Clone, Copy)]
pub struct MmsTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for MmsTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            read: Duration::from_secs(10),
        }
    }
}
