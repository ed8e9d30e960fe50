use std::fmt;

/// A GUID as laid out in asf objects: three little endian fields followed
/// by eight bytes in stream order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 16 {
            return None;
        }
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&bytes[8..16]);
        Some(Self {
            data1: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            data2: u16::from_le_bytes([bytes[4], bytes[5]]),
            data3: u16::from_le_bytes([bytes[6], bytes[7]]),
            data4,
        })
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&self.data1.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.data2.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.data3.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.data4);
        bytes
    }

    pub fn random() -> Self {
        let data4: [u8; 8] = rand::random();
        Self {
            data1: rand::random(),
            data2: rand::random(),
            data3: rand::random(),
            data4,
        }
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7]
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsfGuid {
    Header,
    Data,
    SimpleIndex,
    FileProperties,
    StreamProperties,
    StreamBitrateProperties,
    ContentDescription,
    ExtendedContentDescription,
    HeaderExtension,
    CodecList,
    ScriptCommand,
    Marker,
    BitrateMutualExclusion,
    ErrorCorrection,
    Padding,
    ExtendedStreamProperties,
    LanguageList,
    Metadata,
    AudioMedia,
    VideoMedia,
    CommandMedia,
    JfifMedia,
    DegradableJpegMedia,
    FileTransferMedia,
    BinaryMedia,
    NoErrorCorrection,
    AudioSpread,
    Unknown,
}

const GUIDS: [(AsfGuid, Guid); 27] = [
    (
        AsfGuid::Header,
        Guid::new(0x75B22630, 0x668E, 0x11CF, [0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C]),
    ),
    (
        AsfGuid::Data,
        Guid::new(0x75B22636, 0x668E, 0x11CF, [0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C]),
    ),
    (
        AsfGuid::SimpleIndex,
        Guid::new(0x33000890, 0xE5B1, 0x11CF, [0x89, 0xF4, 0x00, 0xA0, 0xC9, 0x03, 0x49, 0xCB]),
    ),
    (
        AsfGuid::FileProperties,
        Guid::new(0x8CABDCA1, 0xA947, 0x11CF, [0x8E, 0xE4, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65]),
    ),
    (
        AsfGuid::StreamProperties,
        Guid::new(0xB7DC0791, 0xA9B7, 0x11CF, [0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65]),
    ),
    (
        AsfGuid::StreamBitrateProperties,
        Guid::new(0x7BF875CE, 0x468D, 0x11D1, [0x8D, 0x82, 0x00, 0x60, 0x97, 0xC9, 0xA2, 0xB2]),
    ),
    (
        AsfGuid::ContentDescription,
        Guid::new(0x75B22633, 0x668E, 0x11CF, [0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C]),
    ),
    (
        AsfGuid::ExtendedContentDescription,
        Guid::new(0xD2D0A440, 0xE307, 0x11D2, [0x97, 0xF0, 0x00, 0xA0, 0xC9, 0x5E, 0xA8, 0x50]),
    ),
    (
        AsfGuid::HeaderExtension,
        Guid::new(0x5FBF03B5, 0xA92E, 0x11CF, [0x8E, 0xE3, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65]),
    ),
    (
        AsfGuid::CodecList,
        Guid::new(0x86D15240, 0x311D, 0x11D0, [0xA3, 0xA4, 0x00, 0xA0, 0xC9, 0x03, 0x48, 0xF6]),
    ),
    (
        AsfGuid::ScriptCommand,
        Guid::new(0x1EFB1A30, 0x0B62, 0x11D0, [0xA3, 0x9B, 0x00, 0xA0, 0xC9, 0x03, 0x48, 0xF6]),
    ),
    (
        AsfGuid::Marker,
        Guid::new(0xF487CD01, 0xA951, 0x11CF, [0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65]),
    ),
    (
        AsfGuid::BitrateMutualExclusion,
        Guid::new(0xD6E229DC, 0x35DA, 0x11D1, [0x90, 0x34, 0x00, 0xA0, 0xC9, 0x03, 0x49, 0xBE]),
    ),
    (
        AsfGuid::ErrorCorrection,
        Guid::new(0x75B22635, 0x668E, 0x11CF, [0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C]),
    ),
    (
        AsfGuid::Padding,
        Guid::new(0x1806D474, 0xCADF, 0x4509, [0xA4, 0xBA, 0x9A, 0xAB, 0xCB, 0x96, 0xAA, 0xE8]),
    ),
    (
        AsfGuid::ExtendedStreamProperties,
        Guid::new(0x14E6A5CB, 0xC672, 0x4332, [0x83, 0x99, 0xA9, 0x69, 0x52, 0x06, 0x5B, 0x5A]),
    ),
    (
        AsfGuid::LanguageList,
        Guid::new(0x7C4346A9, 0xEFE0, 0x4BFC, [0xB2, 0x29, 0x39, 0x3E, 0xDE, 0x41, 0x5C, 0x85]),
    ),
    (
        AsfGuid::Metadata,
        Guid::new(0xC5F8CBEA, 0x5BAF, 0x4877, [0x84, 0x67, 0xAA, 0x8C, 0x44, 0xFA, 0x4C, 0xCA]),
    ),
    (
        AsfGuid::AudioMedia,
        Guid::new(0xF8699E40, 0x5B4D, 0x11CF, [0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B]),
    ),
    (
        AsfGuid::VideoMedia,
        Guid::new(0xBC19EFC0, 0x5B4D, 0x11CF, [0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B]),
    ),
    (
        AsfGuid::CommandMedia,
        Guid::new(0x59DACFC0, 0x59E6, 0x11D0, [0xA3, 0xAC, 0x00, 0xA0, 0xC9, 0x03, 0x48, 0xF6]),
    ),
    (
        AsfGuid::JfifMedia,
        Guid::new(0xB61BE100, 0x5B4E, 0x11CF, [0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B]),
    ),
    (
        AsfGuid::DegradableJpegMedia,
        Guid::new(0x35907DE0, 0xE415, 0x11CF, [0xA9, 0x17, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B]),
    ),
    (
        AsfGuid::FileTransferMedia,
        Guid::new(0x91BD222C, 0xF21C, 0x497A, [0x8B, 0x6D, 0x5A, 0xA8, 0x6B, 0xFC, 0x01, 0x85]),
    ),
    (
        AsfGuid::BinaryMedia,
        Guid::new(0x3AFB65E2, 0x47EF, 0x40F2, [0xAC, 0x2C, 0x70, 0xA9, 0x0D, 0x71, 0xD3, 0x43]),
    ),
    (
        AsfGuid::NoErrorCorrection,
        Guid::new(0x20FB5700, 0x5B55, 0x11CF, [0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B]),
    ),
    (
        AsfGuid::AudioSpread,
        Guid::new(0xBFC3CD50, 0x618F, 0x11CF, [0x8B, 0xB2, 0x00, 0xAA, 0x00, 0xB4, 0xE2, 0x20]),
    ),
];

impl AsfGuid {
    pub fn identify(bytes: &[u8]) -> AsfGuid {
        match Guid::from_bytes(bytes) {
            Some(guid) => GUIDS
                .iter()
                .find(|(_, known)| *known == guid)
                .map(|(kind, _)| *kind)
                .unwrap_or(AsfGuid::Unknown),
            None => AsfGuid::Unknown,
        }
    }

    pub fn guid(&self) -> Option<Guid> {
        GUIDS
            .iter()
            .find(|(kind, _)| kind == self)
            .map(|(_, guid)| *guid)
    }
}

#[cfg(test)]
mod tests {
    use super::{AsfGuid, Guid};

    #[test]
    fn test_wire_layout() {
        let bytes = [
            0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62,
            0xCE, 0x6C,
        ];
        assert_eq!(AsfGuid::identify(&bytes), AsfGuid::Header);

        let guid = Guid::from_bytes(&bytes).unwrap();
        assert_eq!(guid.to_string(), "75B22630-668E-11CF-A6D9-00AA0062CE6C");
        assert_eq!(guid.to_bytes(), bytes);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(AsfGuid::identify(&[0u8; 16]), AsfGuid::Unknown);
        assert_eq!(AsfGuid::identify(&[0u8; 4]), AsfGuid::Unknown);

        let video = AsfGuid::VideoMedia.guid().unwrap();
        assert_eq!(AsfGuid::identify(&video.to_bytes()), AsfGuid::VideoMedia);
    }
}
