use {
    super::{
        asf::AsfHeader,
        define::{chunk, MmsTimeouts, ASF_HEADER_LEN},
        errors::{MmsError, MmsErrorValue},
        http::{HttpResponse, MmshRequest},
        session::{StreamState, TMmsSession},
        transport::MmsTransport,
        uri::{MmsUrl, Transport},
    },
    async_trait::async_trait,
    byteorder::{ByteOrder, LittleEndian},
    bytes::{Bytes, BytesMut},
    bytesio::{bytesio::TNetConnector, bytesio_errors::BytesIOErrorValue},
    std::sync::Arc,
};

#[derive(Debug, Clone, Copy)]
struct ChunkHeader {
    chunk_type: u16,
    /// Payload length after the extended header.
    len: usize,
    /// Sequence number, or the continue flag of an end chunk.
    seq: u32,
}

fn is_closed(err: &MmsError) -> bool {
    match &err.value {
        MmsErrorValue::BytesIOError(io_err) => {
            matches!(io_err.value, BytesIOErrorValue::NoneReturn)
        }
        _ => false,
    }
}

/// MMS over HTTP: every request runs on its own connection, seeks are new
/// requests.
pub struct MmshSession {
    connector: Arc<dyn TNetConnector>,
    transport: Option<MmsTransport>,
    url: MmsUrl,
    timeouts: MmsTimeouts,
    bandwidth: u32,
    request_number: u32,
    /// First data chunk read together with the header.
    pending: Option<(u32, BytesMut)>,
    /// Chunk numbers after a packet seek restart at the requested packet.
    seq_base: Option<u32>,
    seq_shift: u32,
    state: StreamState,
}

impl MmshSession {
    pub async fn connect(
        connector: Arc<dyn TNetConnector>,
        url: &MmsUrl,
        bandwidth: u32,
        timeouts: MmsTimeouts,
    ) -> Result<Self, MmsError> {
        url.check_transport(Transport::Http)?;

        let mut session = Self {
            connector,
            transport: None,
            url: url.clone(),
            timeouts,
            bandwidth,
            request_number: 1,
            pending: None,
            seq_base: None,
            seq_shift: 0,
            state: StreamState::new(),
        };

        if let Err(err) = session.negotiate().await {
            log::error!("mmsh negotiation with {} failed: {}", url.host, err);
            session.close_transport().await;
            return Err(err);
        }
        Ok(session)
    }

    /// Describes the media, selects streams and starts playback on a
    /// second connection.
    async fn negotiate(&mut self) -> Result<(), MmsError> {
        let seekable = self.open(MmshRequest::Describe, "", 0).await?;
        let (data, _) = self.read_header().await?;
        let mut header = AsfHeader::parse(data)?;
        header.validate()?;
        header.choose_best_streams(self.bandwidth);
        self.close_transport().await;

        let request = if seekable {
            MmshRequest::Seekable {
                stream_time_ms: 0,
                stream_offset: 0,
                max_duration: 0,
            }
        } else {
            MmshRequest::Live
        };
        let entries = header.switch_entries();
        self.open(request, &entries, header.streams.len()).await?;

        let (data, pending) = self.read_header().await?;
        let mut header = AsfHeader::parse(data)?;
        header.validate()?;
        header.choose_best_streams(self.bandwidth);

        self.state.set_header(header);
        self.state.seekable = seekable;
        self.pending = pending;
        Ok(())
    }

    /// Sends one request on a new connection and returns whether the
    /// server announced a seekable stream.
    async fn open(
        &mut self,
        request: MmshRequest,
        switch_entries: &str,
        switch_count: usize,
    ) -> Result<bool, MmsError> {
        self.close_transport().await;

        let port = self.url.port_for(Transport::Http);
        let io = self
            .connector
            .connect(&self.url.host, port, self.timeouts.connect)
            .await?;
        let mut transport = MmsTransport::new(io, self.timeouts.read);

        let data = request.marshal(
            &self.url.http_path(),
            &self.url.host,
            port,
            self.request_number,
            switch_count,
            switch_entries,
        );
        self.request_number += 1;
        log::debug!("mmsh request: {:?}", request);
        transport.write(Bytes::from(data)).await?;

        let head = transport.read_http_head().await?;
        let response = match HttpResponse::unmarshal(std::str::from_utf8(&head[..])?) {
            Some(response) => response,
            None => {
                return Err(MmsError {
                    value: MmsErrorValue::MalformedHttpResponse,
                })
            }
        };
        if !response.is_success() {
            log::warn!(
                "mmsh server answered {} {}",
                response.status_code,
                response.reason_phrase
            );
            return Err(MmsError {
                value: MmsErrorValue::HttpStatus(response.status_code),
            });
        }

        let features = response.features().unwrap_or_default();
        let seekable = features.contains("seekable") && !features.contains("broadcast");
        log::info!("mmsh features: {:?}", features);

        self.transport = Some(transport);
        Ok(seekable)
    }

    async fn close_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.shutdown().await;
        }
    }

    fn transport(&mut self) -> Result<&mut MmsTransport, MmsError> {
        match self.transport.as_mut() {
            Some(transport) => Ok(transport),
            None => Err(MmsError {
                value: MmsErrorValue::UnexpectedPacket,
            }),
        }
    }

    async fn read_chunk_header(&mut self) -> Result<ChunkHeader, MmsError> {
        let transport = self.transport()?;
        let data = transport.read_exact(chunk::CHUNK_HEADER_LEN).await?;
        let chunk_type = LittleEndian::read_u16(&data[0..2]);
        let chunk_len = LittleEndian::read_u16(&data[2..4]) as usize;

        let ext_len = match chunk_type {
            chunk::DATA | chunk::ASF_HEADER => 8,
            chunk::END | chunk::RESET => 4,
            other => {
                return Err(MmsError {
                    value: MmsErrorValue::UnknownChunkType(other),
                })
            }
        };
        if chunk_len < ext_len {
            return Err(MmsError {
                value: MmsErrorValue::PacketTooLarge(chunk_len),
            });
        }
        let ext = transport.read_exact(ext_len).await?;

        Ok(ChunkHeader {
            chunk_type,
            len: chunk_len - ext_len,
            seq: LittleEndian::read_u32(&ext[0..4]),
        })
    }

    /// Reads header chunks up to the first data chunk, which is returned
    /// with its sequence number.
    async fn read_header(&mut self) -> Result<(Vec<u8>, Option<(u32, BytesMut)>), MmsError> {
        let mut data = Vec::new();

        loop {
            let header = match self.read_chunk_header().await {
                Ok(header) => header,
                Err(err) if is_closed(&err) && !data.is_empty() => return Ok((data, None)),
                Err(err) => return Err(err),
            };
            let payload = self.transport()?.read_exact(header.len).await?;

            match header.chunk_type {
                chunk::ASF_HEADER => {
                    if data.len() + payload.len() > ASF_HEADER_LEN {
                        return Err(MmsError {
                            value: MmsErrorValue::AsfHeaderTooLarge(data.len() + payload.len()),
                        });
                    }
                    data.extend_from_slice(&payload);
                }
                chunk::DATA => return Ok((data, Some((header.seq, payload)))),
                chunk::END => return Ok((data, None)),
                _ => log::debug!("ignoring chunk {:#06x} before data", header.chunk_type),
            }
        }
    }

    fn store_data(&mut self, seq: u32, payload: &[u8]) -> Result<(), MmsError> {
        if let Some(base) = self.seq_base.take() {
            self.seq_shift = base.wrapping_sub(seq);
        }
        let seq = seq.wrapping_add(self.seq_shift);
        self.state.store_packet(seq, payload, true, true)
    }

    /// Reopens playback at a byte offset of the data or at a time.
    async fn restart(&mut self, stream_offset: u64, stream_time_ms: u32) -> Result<(), MmsError> {
        let header = self.state.header();
        let entries = header.switch_entries();
        let count = header.streams.len();

        let request = MmshRequest::Seekable {
            stream_time_ms,
            stream_offset,
            max_duration: 0,
        };
        self.open(request, &entries, count).await?;
        // the header is sent again and matches the one already installed
        let (_, pending) = self.read_header().await?;
        self.pending = pending;
        Ok(())
    }
}

#[async_trait]
impl TMmsSession for MmshSession {
    fn state(&self) -> &StreamState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StreamState {
        &mut self.state
    }

    async fn next_media_packet(&mut self) -> Result<bool, MmsError> {
        self.state.begin_packet();

        if let Some((seq, payload)) = self.pending.take() {
            self.store_data(seq, &payload)?;
            return Ok(true);
        }

        let header = self.read_chunk_header().await?;
        let payload = self.transport()?.read_exact(header.len).await?;

        match header.chunk_type {
            chunk::DATA => self.store_data(header.seq, &payload)?,
            chunk::END => {
                log::info!("end of the current stream, continue: {}", header.seq);
                if header.seq == 0 {
                    self.state.eos = true;
                    return Ok(false);
                }
                self.request_number = 1;
                self.negotiate().await?;
                self.state.current_pos = 0;
                self.state.seekable = false;
            }
            chunk::RESET => {
                log::info!("stream reset, reading the new header");
                let (data, pending) = self.read_header().await?;
                let mut asf_header = AsfHeader::parse(data)?;
                asf_header.validate()?;
                asf_header.choose_best_streams(self.bandwidth);
                self.state.set_header(asf_header);
                self.state.seekable = false;
                self.pending = pending;
                self.state.discard_packet();
            }
            _ => {
                log::warn!("unexpected asf header chunk");
                self.state.discard_packet();
            }
        }

        Ok(true)
    }

    async fn request_packet_seek(&mut self, packet_seq: u32) -> Result<(), MmsError> {
        let (offset, base) = if packet_seq == 0xFFFF_FFFF {
            (0, self.state.start_packet_seq())
        } else {
            let index = packet_seq.wrapping_sub(self.state.start_packet_seq()) as u64;
            (index * self.state.packet_len() as u64, packet_seq)
        };
        self.seq_base = Some(base);
        self.restart(offset, 0).await
    }

    async fn request_time_seek(&mut self, time_sec: f64) -> Result<(), MmsError> {
        let time_ms = (time_sec * 1000.0) as u64 + self.state.header().preroll;
        self.seq_base = None;
        self.seq_shift = 0;
        self.restart(0, time_ms.min(u32::MAX as u64) as u32).await
    }

    async fn shutdown(&mut self) {
        self.close_transport().await;
    }
}

#[cfg(test)]
mod tests {
    use {
        super::MmshSession,
        crate::{
            asf::{tests::build_header, AsfStreamType},
            define::MmsTimeouts,
            session::TMmsSession,
            transport::tests::{ScriptedConnector, ScriptedIO},
            uri::MmsUrl,
        },
        std::{io::SeekFrom, sync::Arc},
    };

    fn chunk(chunk_type: u16, seq: u32, payload: &[u8]) -> Vec<u8> {
        let ext_len = if chunk_type == 0x4424 || chunk_type == 0x4824 {
            8
        } else {
            4
        };
        let mut data = Vec::new();
        data.extend_from_slice(&chunk_type.to_le_bytes());
        data.extend_from_slice(&((payload.len() + ext_len) as u16).to_le_bytes());
        data.extend_from_slice(&seq.to_le_bytes());
        if ext_len == 8 {
            data.extend_from_slice(&[0, 0, 0, 0]);
        }
        data.extend_from_slice(payload);
        data
    }

    fn header_chunks(features: &str, media: &[u32]) -> Vec<Vec<u8>> {
        let header = build_header(
            2000,
            &[
                (1, AsfStreamType::Audio, 64000),
                (2, AsfStreamType::Video, 300000),
            ],
        );
        let mut answers = vec![format!(
            "HTTP/1.0 200 OK\r\nServer: Cougar/9.01.01.3814\r\nPragma: features=\"{}\"\r\n\r\n",
            features
        )
        .into_bytes()];
        let (first, second) = header.split_at(200);
        answers.push(chunk(0x4824, 0, first));
        answers.push(chunk(0x4824, 1, second));
        for seq in media {
            answers.push(chunk(0x4424, *seq, &[*seq as u8; 50]));
        }
        answers.push(chunk(0x4524, 0, &[]));
        answers
    }

    fn server(features: &str, media: Vec<u32>) -> ScriptedIO {
        let features = features.to_string();
        ScriptedIO::new(
            Vec::new(),
            Box::new(move |_| header_chunks(&features, &media)),
        )
    }

    #[tokio::test]
    async fn test_seekable_session() {
        let describe = server("seekable", Vec::new());
        let play = server("seekable", vec![7, 8]);
        let requests = play.written.clone();
        let connector = Arc::new(ScriptedConnector::new(vec![describe, play]));
        let targets = connector.targets.clone();

        let url = MmsUrl::parse("mmsh://10.1.1.1/clip.asf").unwrap();
        let mut session = MmshSession::connect(connector, &url, 1_000_000, MmsTimeouts::default())
            .await
            .unwrap();

        assert!(session.seekable());
        assert_eq!(session.asf_packet_len(), 2000);
        assert_eq!(
            targets.lock().unwrap().clone(),
            vec![("10.1.1.1".to_string(), 80), ("10.1.1.1".to_string(), 80)]
        );

        let request = String::from_utf8(requests.lock().unwrap()[0].clone()).unwrap();
        assert!(request.contains("request-context=2"));
        assert!(request.contains("Pragma: stream-switch-count=2\r\n"));
        assert!(request.contains("Pragma: stream-switch-entry=ffff:1:0 ffff:2:0 \r\n"));

        let header_len = session.asf_header_len();
        let mut buf = vec![0u8; header_len + 4000];
        let mut total = 0;
        while total < buf.len() {
            let n = session.read(&mut buf[total..]).await.unwrap();
            if n == 0 {
                break;
            }
            total += n;
        }
        assert_eq!(total, header_len + 4000);
        assert_eq!(buf[header_len], 7);
        assert_eq!(buf[header_len + 50], 0);
        assert_eq!(buf[header_len + 2000], 8);
    }

    #[tokio::test]
    async fn test_broadcast_session() {
        let describe = server("broadcast", Vec::new());
        let play = server("broadcast", vec![1]);
        let requests = play.written.clone();
        let connector = Arc::new(ScriptedConnector::new(vec![describe, play]));

        let url = MmsUrl::parse("mms://10.1.1.1:8080/live").unwrap();
        let mut session = MmshSession::connect(connector, &url, 1_000_000, MmsTimeouts::default())
            .await
            .unwrap();
        assert!(!session.seekable());

        let request = String::from_utf8(requests.lock().unwrap()[0].clone()).unwrap();
        assert!(request.contains("Pragma: no-cache,rate=1.000000,request-context=2\r\n"));
        assert!(request.contains("Host: 10.1.1.1:8080\r\n"));

        assert_eq!(session.seek(SeekFrom::Start(10_000)).await.unwrap(), 0);
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_http_error() {
        let io = ScriptedIO::new(
            Vec::new(),
            Box::new(|_| vec![b"HTTP/1.0 404 Not Found\r\n\r\n".to_vec()]),
        );
        let connector = Arc::new(ScriptedConnector::new(vec![io]));
        let url = MmsUrl::parse("mmsh://10.1.1.1/missing.asf").unwrap();
        assert!(
            MmshSession::connect(connector, &url, 1_000_000, MmsTimeouts::default())
                .await
                .is_err()
        );
    }
}
