use {
    super::{
        define::{epsi_stream_type, PTS_NO_VALUE},
        errors::{MpegTsError, MpegTsErrorValue},
    },
    bytes::BytesMut,
    std::{fmt, str::FromStr},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    Mpeg2Video,
    H264,
    MpegAudio,
    Ac3,
    Eac3,
    AacAdts,
    AacLatm,
    Dts,
    DvbSubtitle,
    Teletext,
}

impl StreamType {
    pub fn name(&self) -> &'static str {
        match self {
            StreamType::Mpeg2Video => "mpeg2video",
            StreamType::H264 => "h264",
            StreamType::MpegAudio => "mpegaudio",
            StreamType::Ac3 => "ac3",
            StreamType::Eac3 => "eac3",
            StreamType::AacAdts => "aac",
            StreamType::AacLatm => "latm",
            StreamType::Dts => "dts",
            StreamType::DvbSubtitle => "dvbsub",
            StreamType::Teletext => "teletext",
        }
    }

    pub fn from_name(name: &str) -> Option<StreamType> {
        let stream_type = match name.to_ascii_lowercase().as_str() {
            "mpeg2video" | "mpeg2" => StreamType::Mpeg2Video,
            "h264" => StreamType::H264,
            "mpegaudio" | "mp2" | "mp3" => StreamType::MpegAudio,
            "ac3" => StreamType::Ac3,
            "eac3" => StreamType::Eac3,
            "aac" => StreamType::AacAdts,
            "latm" => StreamType::AacLatm,
            "dts" => StreamType::Dts,
            "dvbsub" => StreamType::DvbSubtitle,
            "teletext" => StreamType::Teletext,
            _ => return None,
        };
        Some(stream_type)
    }

    /// Maps a PMT stream_type. Subtitles and teletext travel as private data
    /// and are only identified by their descriptors.
    pub fn from_psi_stream_type(stream_type: u8) -> Option<StreamType> {
        match stream_type {
            epsi_stream_type::PSI_STREAM_MPEG1 | epsi_stream_type::PSI_STREAM_MPEG2 => {
                Some(StreamType::Mpeg2Video)
            }
            epsi_stream_type::PSI_STREAM_H264 => Some(StreamType::H264),
            epsi_stream_type::PSI_STREAM_AUDIO_MPEG1 | epsi_stream_type::PSI_STREAM_MP3 => {
                Some(StreamType::MpegAudio)
            }
            epsi_stream_type::PSI_STREAM_AAC => Some(StreamType::AacAdts),
            epsi_stream_type::PSI_STREAM_MPEG4_AAC_LATM => Some(StreamType::AacLatm),
            epsi_stream_type::PSI_STREAM_AUDIO_AC3 => Some(StreamType::Ac3),
            epsi_stream_type::PSI_STREAM_AUDIO_EAC3 => Some(StreamType::Eac3),
            epsi_stream_type::PSI_STREAM_AUDIO_DTS | epsi_stream_type::PSI_STREAM_AUDIO_DTS_HD => {
                Some(StreamType::Dts)
            }
            _ => None,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, StreamType::Mpeg2Video | StreamType::H264)
    }

    pub fn is_audio(&self) -> bool {
        matches!(
            self,
            StreamType::MpegAudio
                | StreamType::Ac3
                | StreamType::Eac3
                | StreamType::AacAdts
                | StreamType::AacLatm
                | StreamType::Dts
        )
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    None = 0,
    I = 1,
    P = 2,
    B = 3,
}

impl FrameType {
    pub fn is_anchor(&self) -> bool {
        matches!(self, FrameType::I | FrameType::P)
    }
}

/// One complete access unit. `pts`/`dts` are `PTS_NO_VALUE` when unknown and
/// `duration` is 0 when not yet known.
#[derive(Debug, Clone)]
pub struct StreamPacket {
    pub pid: u16,
    pub stream_type: StreamType,
    pub pts: i64,
    pub dts: i64,
    pub duration: u64,
    pub frame_type: FrameType,
    pub payload: BytesMut,
}

impl StreamPacket {
    pub fn new(pid: u16, stream_type: StreamType, payload: BytesMut) -> Self {
        Self {
            pid,
            stream_type,
            pts: PTS_NO_VALUE,
            dts: PTS_NO_VALUE,
            duration: 0,
            frame_type: FrameType::None,
            payload,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Display aspect ratio, 0 when unknown.
    pub aspect: f64,
    pub fps_rate: u32,
    pub fps_scale: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioInfo {
    pub channels: u32,
    pub sample_rate: u32,
    pub bit_rate: u32,
    pub bits_per_sample: u32,
    pub block_align: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubtitleInfo {
    pub subtitling_type: u8,
    pub composition_page_id: u16,
    pub ancillary_page_id: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamInfo {
    Video(VideoInfo),
    Audio(AudioInfo),
    Subtitle(SubtitleInfo),
    Teletext,
}

impl StreamInfo {
    pub fn is_ready(&self) -> bool {
        match self {
            StreamInfo::Video(video) => video.width > 0 && video.height > 0,
            StreamInfo::Audio(audio) => audio.sample_rate > 0 && audio.channels > 0,
            StreamInfo::Subtitle(_) | StreamInfo::Teletext => true,
        }
    }
}

/// What the PAT/PMT side knows about one elementary stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub pid: u16,
    pub stream_type: StreamType,
    pub language: String,
    pub subtitle: Option<SubtitleInfo>,
}

impl StreamDescriptor {
    pub fn new(pid: u16, stream_type: StreamType) -> Self {
        Self {
            pid,
            stream_type,
            language: String::new(),
            subtitle: None,
        }
    }
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.pid, self.stream_type, self.language)
    }
}

/// `pid:type[:language]`, pid in decimal or 0x-prefixed hex.
impl FromStr for StreamDescriptor {
    type Err = MpegTsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MpegTsError {
            value: MpegTsErrorValue::InvalidStreamDescriptor(s.to_string()),
        };

        let mut fields = s.splitn(3, ':');
        let pid_str = fields.next().ok_or_else(invalid)?.trim();
        let pid = if let Some(hex) = pid_str
            .strip_prefix("0x")
            .or_else(|| pid_str.strip_prefix("0X"))
        {
            u16::from_str_radix(hex, 16).map_err(|_| invalid())?
        } else {
            pid_str.parse::<u16>().map_err(|_| invalid())?
        };
        if pid > 0x1FFF {
            return Err(invalid());
        }

        let stream_type = fields
            .next()
            .and_then(|name| StreamType::from_name(name.trim()))
            .ok_or_else(invalid)?;
        let language = fields.next().unwrap_or("").trim().to_string();

        let mut descriptor = StreamDescriptor::new(pid, stream_type);
        descriptor.language = language;
        if stream_type == StreamType::DvbSubtitle {
            descriptor.subtitle = Some(SubtitleInfo::default());
        }
        Ok(descriptor)
    }
}

/// A registered stream together with what its parser found out so far.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamProperties {
    pub descriptor: StreamDescriptor,
    pub info: StreamInfo,
}

#[cfg(test)]
mod tests {
    use super::{StreamDescriptor, StreamInfo, StreamType, VideoInfo};

    #[test]
    fn test_parse_descriptor() {
        let descriptor: StreamDescriptor = "0x100:h264".parse().unwrap();
        assert_eq!(descriptor.pid, 0x100);
        assert_eq!(descriptor.stream_type, StreamType::H264);
        assert_eq!(descriptor.language, "");

        let descriptor: StreamDescriptor = "257:ac3:deu".parse().unwrap();
        assert_eq!(descriptor.pid, 257);
        assert_eq!(descriptor.language, "deu");
        assert_eq!(descriptor.to_string(), "257:ac3:deu");

        assert!("9000:h264".parse::<StreamDescriptor>().is_err());
        assert!("100:vp9".parse::<StreamDescriptor>().is_err());
        assert!("abc".parse::<StreamDescriptor>().is_err());
    }

    #[test]
    fn test_readiness() {
        assert!(!StreamInfo::Video(VideoInfo::default()).is_ready());
        assert!(StreamInfo::Video(VideoInfo {
            width: 720,
            height: 576,
            ..Default::default()
        })
        .is_ready());
        assert!(StreamInfo::Teletext.is_ready());
    }
}
