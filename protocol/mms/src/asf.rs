use {
    super::{
        define::{ASF_HEADER_LEN, BUF_SIZE},
        errors::{MmsError, MmsErrorValue},
        guid::AsfGuid,
    },
    byteorder::{ByteOrder, LittleEndian},
};

/// Offset of the first header object: header guid, object size, object
/// count and two reserved bytes.
const FIRST_OBJECT_OFFSET: usize = 30;
const OBJECT_HEADER_LEN: usize = 24;
const MAX_STREAMS: usize = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsfStreamType {
    Audio,
    Video,
    Control,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct AsfStream {
    pub id: u16,
    pub stream_type: AsfStreamType,
    pub bitrate: u32,
    /// Where the bitrate of this stream sits in the raw header bytes.
    pub bitrate_pos: Option<usize>,
    pub encrypted: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSelection {
    pub audio: Option<u16>,
    pub video: Option<u16>,
}

impl StreamSelection {
    pub fn contains(&self, id: u16) -> bool {
        self.audio == Some(id) || self.video == Some(id)
    }
}

/// The structured view of a downloaded asf header. The raw bytes are kept
/// untouched; `to_bytes` re-derives the copy handed to readers, with the
/// bitrate of every disabled stream zeroed so that a generic asf demuxer
/// skips those streams too.
#[derive(Debug, Clone, Default)]
pub struct AsfHeader {
    data: Vec<u8>,
    pub packet_len: u32,
    pub file_len: u64,
    /// Play duration in 100ns units.
    pub time_len: u64,
    /// Milliseconds.
    pub preroll: u64,
    pub num_packets: u64,
    pub streams: Vec<AsfStream>,
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, MmsError> {
    match data.get(offset..offset + 2) {
        Some(bytes) => Ok(LittleEndian::read_u16(bytes)),
        None => Err(MmsError {
            value: MmsErrorValue::MalformedAsfHeader,
        }),
    }
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, MmsError> {
    match data.get(offset..offset + 4) {
        Some(bytes) => Ok(LittleEndian::read_u32(bytes)),
        None => Err(MmsError {
            value: MmsErrorValue::MalformedAsfHeader,
        }),
    }
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64, MmsError> {
    match data.get(offset..offset + 8) {
        Some(bytes) => Ok(LittleEndian::read_u64(bytes)),
        None => Err(MmsError {
            value: MmsErrorValue::MalformedAsfHeader,
        }),
    }
}

impl AsfHeader {
    pub fn parse(data: Vec<u8>) -> Result<Self, MmsError> {
        if data.len() > ASF_HEADER_LEN {
            return Err(MmsError {
                value: MmsErrorValue::AsfHeaderTooLarge(data.len()),
            });
        }

        let mut header = AsfHeader {
            data,
            ..Default::default()
        };
        header.interpret()?;
        Ok(header)
    }

    fn interpret(&mut self) -> Result<(), MmsError> {
        let data = &self.data;
        let mut offset = FIRST_OBJECT_OFFSET;

        while offset + OBJECT_HEADER_LEN <= data.len() {
            let guid = AsfGuid::identify(&data[offset..offset + 16]);
            let length = read_u64(data, offset + 16)?;
            if length < OBJECT_HEADER_LEN as u64 {
                log::warn!("asf object at {} has invalid length {}", offset, length);
                return Err(MmsError {
                    value: MmsErrorValue::MalformedAsfHeader,
                });
            }
            let body = offset + OBJECT_HEADER_LEN;

            match guid {
                AsfGuid::FileProperties => {
                    let packet_len = read_u32(data, body + 68)?;
                    if packet_len as usize > BUF_SIZE {
                        log::warn!("asf packet length {} is too large", packet_len);
                        self.packet_len = 0;
                    } else {
                        self.packet_len = packet_len;
                        self.file_len = read_u64(data, body + 16)?;
                        self.time_len = read_u64(data, body + 40)?;
                        self.preroll = read_u64(data, body + 56)?;
                    }
                    log::debug!(
                        "file properties: packet length {}, file length {}",
                        self.packet_len,
                        self.file_len
                    );
                }
                AsfGuid::StreamProperties => {
                    let stream_type = match AsfGuid::identify(data.get(body..).unwrap_or(&[])) {
                        AsfGuid::AudioMedia => AsfStreamType::Audio,
                        AsfGuid::VideoMedia
                        | AsfGuid::JfifMedia
                        | AsfGuid::DegradableJpegMedia => AsfStreamType::Video,
                        AsfGuid::CommandMedia => AsfStreamType::Control,
                        _ => AsfStreamType::Unknown,
                    };
                    let flags = read_u16(data, body + 48)?;
                    let stream = AsfStream {
                        id: flags & 0x7F,
                        stream_type,
                        bitrate: 0,
                        bitrate_pos: None,
                        encrypted: flags >> 15 != 0,
                        enabled: true,
                    };
                    log::debug!(
                        "stream properties: id {}, type {:?}, encrypted {}",
                        stream.id,
                        stream.stream_type,
                        stream.encrypted
                    );
                    if self.streams.len() < MAX_STREAMS {
                        self.streams.push(stream);
                    } else {
                        log::warn!("too many asf streams, skipping stream {}", stream.id);
                    }
                }
                AsfGuid::StreamBitrateProperties => {
                    let count = read_u16(data, body)? as usize;
                    for idx in 0..count {
                        let entry = body + 2 + idx * 6;
                        let id = read_u16(data, entry)? & 0x7F;
                        let bitrate = read_u32(data, entry + 2)?;
                        if let Some(stream) = self.streams.iter_mut().find(|s| s.id == id) {
                            stream.bitrate = bitrate;
                            stream.bitrate_pos = Some(entry + 2);
                            log::debug!("stream {} bitrate {}", id, bitrate);
                        }
                    }
                }
                AsfGuid::Data => {
                    self.num_packets = read_u64(data, body + 16)?;
                }
                _ => {
                    log::trace!("skipping asf object {:?} of {} bytes", guid, length);
                }
            }

            offset = match offset.checked_add(length as usize) {
                Some(next) => next,
                None => break,
            };
        }

        Ok(())
    }

    /// A header is only usable with a packet length and at least one stream.
    pub fn validate(&self) -> Result<(), MmsError> {
        if self.packet_len == 0 {
            return Err(MmsError {
                value: MmsErrorValue::MalformedAsfHeader,
            });
        }
        if self.streams.is_empty() {
            return Err(MmsError {
                value: MmsErrorValue::NoStreams,
            });
        }
        Ok(())
    }

    pub fn raw(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn has_audio(&self) -> bool {
        self.streams
            .iter()
            .any(|s| s.stream_type == AsfStreamType::Audio)
    }

    pub fn has_video(&self) -> bool {
        self.streams
            .iter()
            .any(|s| s.stream_type == AsfStreamType::Video)
    }

    /// Seconds.
    pub fn time_length(&self) -> f64 {
        self.time_len as f64 / 1e7
    }

    pub fn raw_time_length(&self) -> u64 {
        self.time_len
    }

    /// Picks the best audio stream and the video stream that fits the
    /// remaining bandwidth most tightly, then disables everything else.
    pub fn choose_best_streams(&mut self, bandwidth: u32) -> StreamSelection {
        let mut selection = StreamSelection::default();

        let mut max_audio_rate = 0;
        for stream in &self.streams {
            if stream.stream_type == AsfStreamType::Audio && stream.bitrate > max_audio_rate {
                selection.audio = Some(stream.id);
                max_audio_rate = stream.bitrate;
            }
        }

        let bandwidth_left = (bandwidth as i64 - max_audio_rate as i64).max(0);
        let mut min_left = bandwidth_left;
        for stream in &self.streams {
            let bitrate = stream.bitrate as i64;
            if stream.stream_type == AsfStreamType::Video
                && bandwidth_left - bitrate < min_left
                && bandwidth_left >= bitrate
            {
                selection.video = Some(stream.id);
                min_left = bandwidth_left - bitrate;
            }
        }

        if selection.video.is_none() {
            let mut min_video_rate = 0;
            for stream in &self.streams {
                if stream.stream_type == AsfStreamType::Video
                    && (selection.video.is_none() || stream.bitrate < min_video_rate)
                {
                    selection.video = Some(stream.id);
                    min_video_rate = stream.bitrate;
                }
            }
        }

        // the first stream travels in the selection command prefix and is
        // never switched off
        for (idx, stream) in self.streams.iter_mut().enumerate() {
            stream.enabled = idx == 0 || selection.contains(stream.id);
            if !stream.enabled {
                log::debug!("disabling stream {}", stream.id);
            }
        }
        log::info!(
            "selected streams: audio {:?}, video {:?}",
            selection.audio,
            selection.video
        );

        selection
    }

    /// Body of the stream selection command: one six byte entry per stream
    /// after the first.
    pub fn selection_body(&self) -> Vec<u8> {
        let mut body = vec![0u8; self.streams.len() * 6 + 2];
        for (idx, stream) in self.streams.iter().enumerate().skip(1) {
            let entry = (idx - 1) * 6 + 2;
            body[entry] = 0xFF;
            body[entry + 1] = 0xFF;
            LittleEndian::write_u16(&mut body[entry + 2..entry + 4], stream.id);
            body[entry + 4] = if stream.enabled { 0x00 } else { 0x02 };
        }
        body
    }

    /// `ffff:<id>:<0|2>` entries used by the http variant.
    pub fn switch_entries(&self) -> String {
        let mut entries = String::new();
        for stream in &self.streams {
            entries += &format!("ffff:{}:{} ", stream.id, if stream.enabled { 0 } else { 2 });
        }
        entries
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        for stream in self.streams.iter().filter(|s| !s.enabled) {
            if let Some(pos) = stream.bitrate_pos {
                match data.get_mut(pos..pos + 4) {
                    Some(field) => field.copy_from_slice(&[0; 4]),
                    None => log::warn!("bitrate of stream {} is outside the header", stream.id),
                }
            }
        }
        data
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{AsfHeader, AsfStreamType};
    use crate::guid::{AsfGuid, Guid};
    use byteorder::{ByteOrder, LittleEndian};

    fn object(guid: AsfGuid, body: &[u8]) -> Vec<u8> {
        let mut data = guid.guid().unwrap().to_bytes().to_vec();
        let mut length = [0u8; 8];
        LittleEndian::write_u64(&mut length, (body.len() + 24) as u64);
        data.extend_from_slice(&length);
        data.extend_from_slice(body);
        data
    }

    fn stream_properties(media: AsfGuid, id: u16) -> Vec<u8> {
        let mut body = media.guid().unwrap().to_bytes().to_vec();
        body.resize(48, 0);
        let mut flags = [0u8; 2];
        LittleEndian::write_u16(&mut flags, id);
        body.extend_from_slice(&flags);
        body.resize(54, 0);
        object(AsfGuid::StreamProperties, &body)
    }

    /// A header with the given (id, type, bitrate) streams, `packet_len`
    /// sized packets and 100 data packets.
    pub fn build_header(packet_len: u32, streams: &[(u16, AsfStreamType, u32)]) -> Vec<u8> {
        let mut objects = Vec::new();

        let mut file = vec![0u8; 80];
        LittleEndian::write_u64(&mut file[16..24], 1_000_000);
        LittleEndian::write_u64(&mut file[40..48], 600_000_000);
        LittleEndian::write_u64(&mut file[56..64], 3100);
        LittleEndian::write_u32(&mut file[68..72], packet_len);
        LittleEndian::write_u32(&mut file[72..76], packet_len);
        objects.extend(object(AsfGuid::FileProperties, &file));

        for (id, stream_type, _) in streams {
            let media = match stream_type {
                AsfStreamType::Audio => AsfGuid::AudioMedia,
                AsfStreamType::Video => AsfGuid::VideoMedia,
                AsfStreamType::Control => AsfGuid::CommandMedia,
                AsfStreamType::Unknown => AsfGuid::BinaryMedia,
            };
            objects.extend(stream_properties(media, *id));
        }

        let mut bitrates = vec![0u8; 2 + streams.len() * 6];
        LittleEndian::write_u16(&mut bitrates[0..2], streams.len() as u16);
        for (idx, (id, _, bitrate)) in streams.iter().enumerate() {
            LittleEndian::write_u16(&mut bitrates[2 + idx * 6..], *id);
            LittleEndian::write_u32(&mut bitrates[4 + idx * 6..], *bitrate);
        }
        objects.extend(object(AsfGuid::StreamBitrateProperties, &bitrates));

        // a vendor object the walk does not know
        let unknown = Guid::new(0x12345678, 0x9ABC, 0xDEF0, [1, 2, 3, 4, 5, 6, 7, 8]);
        let mut vendor = unknown.to_bytes().to_vec();
        vendor.extend_from_slice(&[40, 0, 0, 0, 0, 0, 0, 0]);
        vendor.extend_from_slice(&[0xEE; 16]);
        objects.extend(vendor);

        let mut header = AsfGuid::Header.guid().unwrap().to_bytes().to_vec();
        let mut size = [0u8; 8];
        LittleEndian::write_u64(&mut size, (30 + objects.len() + 50) as u64);
        header.extend_from_slice(&size);
        header.extend_from_slice(&[4, 0, 0, 0, 1, 2]);
        header.extend(objects);

        // the data object header closes the header blob
        let mut data = AsfGuid::Data.guid().unwrap().to_bytes().to_vec();
        let mut length = [0u8; 8];
        LittleEndian::write_u64(&mut length, 50 + 100 * packet_len as u64);
        data.extend_from_slice(&length);
        data.extend_from_slice(&[0u8; 16]);
        let mut packets = [0u8; 8];
        LittleEndian::write_u64(&mut packets, 100);
        data.extend_from_slice(&packets);
        data.extend_from_slice(&[1, 1]);
        header.extend(data);

        header
    }

    #[test]
    fn test_object_walk() {
        let data = build_header(
            3000,
            &[
                (1, AsfStreamType::Audio, 64000),
                (2, AsfStreamType::Video, 500000),
            ],
        );
        let header = AsfHeader::parse(data).unwrap();

        assert_eq!(header.packet_len, 3000);
        assert_eq!(header.file_len, 1_000_000);
        assert_eq!(header.preroll, 3100);
        assert_eq!(header.num_packets, 100);
        assert_eq!(header.time_length(), 60.0);
        assert_eq!(header.streams.len(), 2);
        assert_eq!(header.streams[0].stream_type, AsfStreamType::Audio);
        assert_eq!(header.streams[1].stream_type, AsfStreamType::Video);
        assert_eq!(header.streams[1].bitrate, 500000);
        assert!(header.has_audio() && header.has_video());
    }

    #[test]
    fn test_oversized_packet_length() {
        let data = build_header(200_000, &[(1, AsfStreamType::Audio, 64000)]);
        let header = AsfHeader::parse(data).unwrap();
        assert_eq!(header.packet_len, 0);
        assert_eq!(header.streams.len(), 1);
    }

    #[test]
    fn test_truncated_object() {
        let mut data = build_header(3000, &[(1, AsfStreamType::Audio, 64000)]);
        // file properties body cut short
        data.truncate(30 + 24 + 40);
        assert!(AsfHeader::parse(data).is_err());
    }

    #[test]
    fn test_selection_determinism() {
        let streams = [
            (1, AsfStreamType::Audio, 32000),
            (2, AsfStreamType::Audio, 64000),
            (3, AsfStreamType::Video, 300000),
            (4, AsfStreamType::Video, 900000),
            (5, AsfStreamType::Video, 450000),
        ];
        let data = build_header(3000, &streams);

        for _ in 0..3 {
            let mut header = AsfHeader::parse(data.clone()).unwrap();
            let selection = header.choose_best_streams(564000);
            assert_eq!(selection.audio, Some(2));
            // 500000 left, 450000 leaves the smallest remainder
            assert_eq!(selection.video, Some(5));

            let enabled: Vec<bool> = header.streams.iter().map(|s| s.enabled).collect();
            assert_eq!(enabled, vec![true, true, false, false, true]);
        }
    }

    #[test]
    fn test_selection_fallback_and_patch() {
        let streams = [
            (1, AsfStreamType::Audio, 64000),
            (2, AsfStreamType::Video, 900000),
            (3, AsfStreamType::Video, 700000),
        ];
        let mut header = AsfHeader::parse(build_header(3000, &streams)).unwrap();
        let selection = header.choose_best_streams(100000);
        assert_eq!(selection.audio, Some(1));
        assert_eq!(selection.video, Some(3));

        let body = header.selection_body();
        assert_eq!(body.len(), 20);
        assert_eq!(&body[2..8], &[0xFF, 0xFF, 2, 0, 2, 0]);
        assert_eq!(&body[8..14], &[0xFF, 0xFF, 3, 0, 0, 0]);
        assert_eq!(header.switch_entries(), "ffff:1:0 ffff:2:2 ffff:3:0 ");

        let pos = header.streams[1].bitrate_pos.unwrap();
        let patched = header.to_bytes();
        assert_eq!(&patched[pos..pos + 4], &[0, 0, 0, 0]);
        assert_ne!(&header.raw()[pos..pos + 4], &[0, 0, 0, 0]);

        let kept = header.streams[2].bitrate_pos.unwrap();
        assert_eq!(LittleEndian::read_u32(&patched[kept..]), 700000);
    }
}
