use {
    super::{
        define::{opcode, SignalInfo, TStreamSink, FRAME_HEADER_LEN},
        errors::{StreamHubError, StreamHubErrorValue},
    },
    async_trait::async_trait,
    byteorder::BigEndian,
    bytesio::bytes_writer::BytesWriter,
    std::sync::Arc,
    tokio::{
        io::{AsyncWrite, AsyncWriteExt},
        sync::Mutex,
    },
    xmpegts::{
        define::PTS_NO_VALUE,
        packet::{FrameType, StreamPacket, StreamProperties},
    },
};

struct FrameHeader {
    opcode: u32,
    stream_id: u32,
    duration: u32,
    frame_type: u32,
    pts: i64,
    dts: i64,
    length: u32,
}

impl FrameHeader {
    fn control(opcode: u32, length: u32) -> Self {
        Self {
            opcode,
            stream_id: 0,
            duration: 0,
            frame_type: FrameType::None as u32,
            pts: PTS_NO_VALUE,
            dts: PTS_NO_VALUE,
            length,
        }
    }

    fn marshal(&self) -> Result<BytesWriter, StreamHubError> {
        let mut writer = BytesWriter::with_capacity(FRAME_HEADER_LEN);
        writer.write_u32::<BigEndian>(self.opcode)?;
        writer.write_u32::<BigEndian>(self.stream_id)?;
        writer.write_u32::<BigEndian>(self.duration)?;
        writer.write_u32::<BigEndian>(self.frame_type)?;
        writer.write_i64::<BigEndian>(self.pts)?;
        writer.write_i64::<BigEndian>(self.dts)?;
        writer.write_u32::<BigEndian>(self.length)?;
        Ok(writer)
    }
}

fn payload_len(len: usize) -> Result<u32, StreamHubError> {
    if len > u32::MAX as usize {
        return Err(StreamHubError {
            value: StreamHubErrorValue::PayloadTooLarge(len),
        });
    }
    Ok(len as u32)
}

/// Frames stream packets onto a byte sink. A header and its payload go out
/// under one lock so clones of the writer never interleave inside a frame.
pub struct PacketWriter<W> {
    io: Arc<Mutex<W>>,
}

impl<W> Clone for PacketWriter<W> {
    fn clone(&self) -> Self {
        Self {
            io: self.io.clone(),
        }
    }
}

impl<W> PacketWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(io: W) -> Self {
        Self {
            io: Arc::new(Mutex::new(io)),
        }
    }

    pub fn io(&self) -> Arc<Mutex<W>> {
        self.io.clone()
    }

    async fn write_frame(&self, header: FrameHeader, payload: &[u8]) -> Result<(), StreamHubError> {
        let header = header.marshal()?;

        let mut io = self.io.lock().await;
        io.write_all(&header.bytes).await?;
        if !payload.is_empty() {
            io.write_all(payload).await?;
        }
        io.flush().await?;
        Ok(())
    }

    pub async fn write_packet(&self, packet: &StreamPacket) -> Result<(), StreamHubError> {
        let header = FrameHeader {
            opcode: opcode::STREAM_PACKET,
            stream_id: packet.pid as u32,
            duration: packet.duration.min(u32::MAX as u64) as u32,
            frame_type: packet.frame_type as u32,
            pts: packet.pts,
            dts: packet.dts,
            length: payload_len(packet.payload.len())?,
        };
        self.write_frame(header, &packet.payload[..]).await
    }

    pub async fn write_keepalive(&self) -> Result<(), StreamHubError> {
        self.write_frame(FrameHeader::control(opcode::KEEPALIVE, 0), &[])
            .await
    }

    /// One `pid:type:language` line per stream.
    pub async fn write_stream_change(
        &self,
        streams: &[StreamProperties],
    ) -> Result<(), StreamHubError> {
        let mut text = String::new();
        for stream in streams {
            text.push_str(&stream.descriptor.to_string());
            text.push('\n');
        }
        let header = FrameHeader::control(opcode::STREAM_CHANGE, payload_len(text.len())?);
        self.write_frame(header, text.as_bytes()).await
    }

    /// `adapter:status:strength:snr:ber:unc`
    pub async fn write_signal_info(&self, info: &SignalInfo) -> Result<(), StreamHubError> {
        let text = format!(
            "{}:{}:{}:{}:{}:{}",
            info.adapter_name, info.status, info.strength, info.snr, info.ber, info.unc
        );
        let header = FrameHeader::control(opcode::SIGNAL_INFO, payload_len(text.len())?);
        self.write_frame(header, text.as_bytes()).await
    }
}

#[async_trait]
impl<W> TStreamSink for PacketWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn on_stream_packet(&mut self, packet: &StreamPacket) -> Result<(), StreamHubError> {
        self.write_packet(packet).await
    }

    async fn on_streams_ready(
        &mut self,
        streams: &[StreamProperties],
    ) -> Result<(), StreamHubError> {
        self.write_stream_change(streams).await
    }

    async fn on_keepalive(&mut self) -> Result<(), StreamHubError> {
        self.write_keepalive().await
    }

    async fn on_signal_info(&mut self, info: &SignalInfo) -> Result<(), StreamHubError> {
        self.write_signal_info(info).await
    }
}

#[cfg(test)]
mod tests {
    use super::PacketWriter;
    use crate::define::{opcode, SignalInfo, FRAME_HEADER_LEN};
    use byteorder::{BigEndian, ByteOrder};
    use bytes::BytesMut;
    use xmpegts::define::PTS_NO_VALUE;
    use xmpegts::packet::{
        FrameType, StreamDescriptor, StreamInfo, StreamPacket, StreamProperties, StreamType,
    };

    #[tokio::test]
    async fn test_packet_frame() {
        let writer = PacketWriter::new(Vec::new());

        let mut packet = StreamPacket::new(
            0x100,
            StreamType::H264,
            BytesMut::from(&[0u8, 0, 0, 1, 0x65][..]),
        );
        packet.pts = 1_040_000;
        packet.dts = 1_000_000;
        packet.duration = 40_000;
        packet.frame_type = FrameType::I;
        writer.write_packet(&packet).await.unwrap();
        writer.write_keepalive().await.unwrap();

        let io = writer.io();
        let data = io.lock().await;
        assert_eq!(data.len(), FRAME_HEADER_LEN * 2 + 5);

        assert_eq!(BigEndian::read_u32(&data[0..]), opcode::STREAM_PACKET);
        assert_eq!(BigEndian::read_u32(&data[4..]), 0x100);
        assert_eq!(BigEndian::read_u32(&data[8..]), 40_000);
        assert_eq!(BigEndian::read_u32(&data[12..]), FrameType::I as u32);
        assert_eq!(BigEndian::read_i64(&data[16..]), 1_040_000);
        assert_eq!(BigEndian::read_i64(&data[24..]), 1_000_000);
        assert_eq!(BigEndian::read_u32(&data[32..]), 5);
        assert_eq!(&data[36..41], &[0, 0, 0, 1, 0x65]);

        let keepalive = &data[41..];
        assert_eq!(BigEndian::read_u32(keepalive), opcode::KEEPALIVE);
        assert_eq!(BigEndian::read_i64(&keepalive[16..]), PTS_NO_VALUE);
        assert_eq!(BigEndian::read_u32(&keepalive[32..]), 0);
    }

    #[tokio::test]
    async fn test_stream_change_and_signal() {
        let writer = PacketWriter::new(Vec::new());

        let mut audio = StreamDescriptor::new(0x101, StreamType::Ac3);
        audio.language = String::from("deu");
        let streams = vec![
            StreamProperties {
                descriptor: StreamDescriptor::new(0x100, StreamType::H264),
                info: StreamInfo::Teletext,
            },
            StreamProperties {
                descriptor: audio,
                info: StreamInfo::Teletext,
            },
        ];
        writer.write_stream_change(&streams).await.unwrap();
        writer
            .write_signal_info(&SignalInfo {
                adapter_name: String::from("dvb0"),
                status: 0x1F,
                strength: 80,
                snr: 60,
                ber: 0,
                unc: 0,
            })
            .await
            .unwrap();

        let io = writer.io();
        let data = io.lock().await;
        assert_eq!(BigEndian::read_u32(&data[0..]), opcode::STREAM_CHANGE);
        let len = BigEndian::read_u32(&data[32..]) as usize;
        let text = std::str::from_utf8(&data[36..36 + len]).unwrap();
        assert_eq!(text, "256:h264:\n257:ac3:deu\n");

        let signal = &data[36 + len..];
        assert_eq!(BigEndian::read_u32(signal), opcode::SIGNAL_INFO);
        let len = BigEndian::read_u32(&signal[32..]) as usize;
        assert_eq!(&signal[36..36 + len], b"dvb0:31:80:60:0:0");
    }
}
