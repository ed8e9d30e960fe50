use {
    super::{
        asf::AsfHeader,
        command::{command_packet_len, marshal_command, CommandPacket, PacketHeader},
        define::{
            command, MmsTimeouts, ASF_HEADER_LEN, ASF_HEADER_PACKET_ID_TYPE,
            ASF_MEDIA_PACKET_ID_TYPE, BUF_SIZE, CMD_HEADER_LEN, MAX_KEEPALIVE_ANSWERS,
            PLAYER_VERSION, TRANSPORT_REQUEST,
        },
        errors::{MmsError, MmsErrorValue},
        guid::Guid,
        session::{StreamState, TMmsSession},
        transport::MmsTransport,
        uri::{MmsUrl, Transport},
    },
    async_trait::async_trait,
    byteorder::LittleEndian,
    bytes::BytesMut,
    bytesio::{bytes_writer::BytesWriter, bytesio::TNetConnector},
};

// header flags closing the asf header sequence
const HEADER_END_FLAGS: [u8; 2] = [0x08, 0x0C];

enum Incoming {
    Command(CommandPacket),
    Data(PacketHeader),
}

/// MMS over TCP.
pub struct MmstSession {
    transport: MmsTransport,
    url: MmsUrl,
    seq_num: u32,
    packet_id_type: u32,
    bandwidth: u32,
    state: StreamState,
}

impl MmstSession {
    pub async fn connect(
        connector: &dyn TNetConnector,
        url: &MmsUrl,
        bandwidth: u32,
        timeouts: MmsTimeouts,
    ) -> Result<Self, MmsError> {
        url.check_transport(Transport::Tcp)?;

        let port = url.port_for(Transport::Tcp);
        let io = connector.connect(&url.host, port, timeouts.connect).await?;

        let mut session = Self {
            transport: MmsTransport::new(io, timeouts.read),
            url: url.clone(),
            seq_num: 0,
            packet_id_type: ASF_MEDIA_PACKET_ID_TYPE,
            bandwidth,
            state: StreamState::new(),
        };

        if let Err(err) = session.handshake().await {
            log::error!("mmst negotiation with {}:{} failed: {}", url.host, port, err);
            session.transport.shutdown().await;
            return Err(err);
        }
        Ok(session)
    }

    async fn handshake(&mut self) -> Result<(), MmsError> {
        let mut body = BytesWriter::new();

        log::info!("send command 0x01");
        let hello = format!(
            "\u{1c}\u{3}{}; {{{}}}; Host: {}",
            PLAYER_VERSION,
            Guid::random(),
            self.url.host
        );
        body.write_utf16le(&hello)?;
        body.write_zeros(8);
        self.send_command(command::CONNECT, 0, 0x0004_000b, &body.extract_current_bytes())
            .await?;
        self.expect_answer(command::CONNECT, command::CONNECT).await?;

        log::info!("send command 0x02");
        body.write_zeros(8);
        body.write_utf16le(TRANSPORT_REQUEST)?;
        self.send_command(command::PROTOCOL_SELECT, 0, 0, &body.extract_current_bytes())
            .await?;
        match self.get_answer().await?.command {
            command::PROTOCOL_SELECT => {}
            command::PROTOCOL_FAILED => {
                return Err(MmsError {
                    value: MmsErrorValue::ProtocolFailed,
                })
            }
            answer => {
                return Err(MmsError {
                    value: MmsErrorValue::UnexpectedAnswer {
                        command: command::PROTOCOL_SELECT,
                        answer,
                    },
                })
            }
        }

        log::info!("send command 0x05");
        body.write_zeros(8);
        body.write_utf16le(&self.url.media_path)?;
        body.write_zeros(4);
        self.send_command(command::OPEN_FILE, 1, 0xFFFF_FFFF, &body.extract_current_bytes())
            .await?;
        let answer = self.get_answer().await?;
        match answer.command {
            command::FILE_OPENED => {
                let live = answer.byte_at(62) == Some(0)
                    && answer.byte_at(63).map(|flags| flags & 0x0F) == Some(2);
                self.state.seekable = !live;
                log::info!("media opened, live: {}", live);
            }
            command::AUTH_REQUIRED => {
                return Err(MmsError {
                    value: MmsErrorValue::AuthenticationRequired,
                })
            }
            other => {
                return Err(MmsError {
                    value: MmsErrorValue::UnexpectedAnswer {
                        command: command::OPEN_FILE,
                        answer: other,
                    },
                })
            }
        }

        log::info!("send command 0x15");
        for word in &[
            0x0000_0000,
            0x0080_0000,
            0xFFFF_FFFF,
            0x0000_0000,
            0x0000_0000,
            0x0000_0000,
            0x0000_0000,
            0x40AC_2000,
            ASF_HEADER_PACKET_ID_TYPE,
            0x0000_0000,
        ] {
            body.write_u32::<LittleEndian>(*word)?;
        }
        self.send_command(command::HEADER_REQUEST, 1, 0, &body.extract_current_bytes())
            .await?;
        self.expect_answer(command::HEADER_REQUEST, command::HEADER_RESPONSE)
            .await?;

        self.fetch_header().await?;

        self.packet_id_type = ASF_MEDIA_PACKET_ID_TYPE;
        self.start_stream().await
    }

    async fn send_command(
        &mut self,
        command: u32,
        prefix1: u32,
        prefix2: u32,
        body: &[u8],
    ) -> Result<(), MmsError> {
        let data = marshal_command(self.seq_num, command, prefix1, prefix2, body)?;
        self.seq_num = self.seq_num.wrapping_add(1);
        log::trace!("command {:#04x}, {} bytes", command, data.len());
        self.transport.write(data.freeze()).await
    }

    async fn next_incoming(&mut self) -> Result<Incoming, MmsError> {
        let prefix = self.transport.read_exact(8).await?;
        if !PacketHeader::is_command(&prefix) {
            return Ok(Incoming::Data(PacketHeader::data(&prefix)));
        }

        let mut data = BytesMut::with_capacity(CMD_HEADER_LEN + 64);
        data.extend_from_slice(&prefix);
        data.extend_from_slice(&self.transport.read_exact(4).await?);

        let packet_len = command_packet_len(&data);
        if packet_len > BUF_SIZE - 12 {
            return Err(MmsError {
                value: MmsErrorValue::PacketTooLarge(packet_len),
            });
        }
        data.extend_from_slice(&self.transport.read_exact(packet_len).await?);

        let packet = CommandPacket::parse(data)?;
        log::trace!("received command {:#04x}", packet.command);
        Ok(Incoming::Command(packet))
    }

    /// Waits for the answer to the last command, answering keepalive
    /// requests on the way.
    async fn get_answer(&mut self) -> Result<CommandPacket, MmsError> {
        for _ in 0..MAX_KEEPALIVE_ANSWERS {
            match self.next_incoming().await? {
                Incoming::Command(packet) if packet.command == command::KEEPALIVE => {
                    self.send_command(command::KEEPALIVE, 0, 0, &[]).await?;
                }
                Incoming::Command(packet) => return Ok(packet),
                Incoming::Data(header) => {
                    log::warn!("unexpected asf packet {:?}", header);
                    return Err(MmsError {
                        value: MmsErrorValue::UnexpectedPacket,
                    });
                }
            }
        }
        Err(MmsError {
            value: MmsErrorValue::KeepaliveLimit,
        })
    }

    async fn expect_answer(&mut self, command: u32, expected: u32) -> Result<(), MmsError> {
        let answer = self.get_answer().await?.command;
        if answer != expected {
            log::warn!("unexpected response {:#04x} to {:#04x}", answer, command);
            return Err(MmsError {
                value: MmsErrorValue::UnexpectedAnswer { command, answer },
            });
        }
        Ok(())
    }

    /// Collects the header packets, interprets them and selects streams.
    async fn fetch_header(&mut self) -> Result<(), MmsError> {
        let mut data = Vec::new();

        loop {
            match self.next_incoming().await? {
                Incoming::Command(packet) if packet.command == command::KEEPALIVE => {
                    self.send_command(command::KEEPALIVE, 0, 0, &[]).await?;
                }
                Incoming::Command(packet) => {
                    log::warn!("unexpected command {:#04x} in asf header", packet.command);
                }
                Incoming::Data(header) => {
                    let packet_len = header.packet_len();
                    if data.len() + packet_len > ASF_HEADER_LEN {
                        return Err(MmsError {
                            value: MmsErrorValue::AsfHeaderTooLarge(data.len() + packet_len),
                        });
                    }
                    data.extend_from_slice(&self.transport.read_exact(packet_len).await?);
                    if HEADER_END_FLAGS.contains(&header.flags()) {
                        break;
                    }
                }
            }
        }
        log::debug!("asf header of {} bytes", data.len());

        let mut header = AsfHeader::parse(data)?;
        header.validate()?;
        header.choose_best_streams(self.bandwidth);
        self.select_streams(&header).await?;
        self.state.set_header(header);
        Ok(())
    }

    async fn select_streams(&mut self, header: &AsfHeader) -> Result<(), MmsError> {
        let first = header.streams[0].id as u32;
        self.send_command(
            command::STREAM_SELECT,
            header.streams.len() as u32,
            0xFFFF | first << 16,
            &header.selection_body(),
        )
        .await?;

        let answer = self.get_answer().await?.command;
        if answer != command::STREAM_SELECTED {
            log::warn!("unexpected response {:#04x} to stream selection", answer);
        }
        Ok(())
    }

    async fn start_stream(&mut self) -> Result<(), MmsError> {
        let mut body = BytesWriter::new();
        body.write_u32::<LittleEndian>(0)?;
        body.write_u32::<LittleEndian>(0)?;
        body.write_u32::<LittleEndian>(0xFFFF_FFFF)?;
        body.write_u32::<LittleEndian>(0xFFFF_FFFF)?;
        body.write(&[0xFF, 0xFF, 0xFF, 0x00])?;
        body.write_u32::<LittleEndian>(self.packet_id_type)?;
        self.send_command(
            command::START_STREAM,
            1,
            0x0001_FFFF,
            &body.extract_current_bytes(),
        )
        .await
    }

    async fn request_data_packet(
        &mut self,
        time_sec: f64,
        first_packet: u32,
        time_msec_limit: u32,
    ) -> Result<(), MmsError> {
        let mut body = BytesWriter::new();
        body.write_f64::<LittleEndian>(time_sec)?;
        body.write_u32::<LittleEndian>(0xFFFF_FFFF)?;
        body.write_u32::<LittleEndian>(first_packet)?;
        body.write_u32::<LittleEndian>(time_msec_limit & 0x00FF_FFFF)?;
        body.write_u32::<LittleEndian>(self.packet_id_type)?;
        self.send_command(
            command::START_STREAM,
            1,
            0x0001_FFFF,
            &body.extract_current_bytes(),
        )
        .await
    }

    // packets of earlier requests keep the old id type and are skipped
    fn next_packet_id_type(&mut self) {
        self.packet_id_type += 1;
        if self.packet_id_type <= ASF_MEDIA_PACKET_ID_TYPE || self.packet_id_type > 0xFF {
            self.packet_id_type = ASF_MEDIA_PACKET_ID_TYPE + 1;
        }
    }
}

#[async_trait]
impl TMmsSession for MmstSession {
    fn state(&self) -> &StreamState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StreamState {
        &mut self.state
    }

    async fn next_media_packet(&mut self) -> Result<bool, MmsError> {
        self.state.begin_packet();

        match self.next_incoming().await? {
            Incoming::Command(packet) => {
                match packet.command {
                    command::END_OF_STREAM => {
                        let code = packet.u32_at(CMD_HEADER_LEN).unwrap_or(0);
                        log::info!("end of the current stream, continue: {}", code);
                        if code == 0 {
                            self.state.eos = true;
                            return Ok(false);
                        }
                    }
                    command::NEW_STREAM => {
                        log::info!("new stream");
                        self.fetch_header().await?;
                        self.packet_id_type = ASF_MEDIA_PACKET_ID_TYPE;
                        self.start_stream().await?;
                        self.state.current_pos = 0;
                        // packet numbering restarts, positions are meaningless now
                        self.state.seekable = false;
                    }
                    command::KEEPALIVE => {
                        self.send_command(command::KEEPALIVE, 0, 0, &[]).await?;
                    }
                    command::OPEN_FILE => {}
                    other => log::warn!("unexpected mms command {:#04x}", other),
                }
                self.state.discard_packet();
            }
            Incoming::Data(PacketHeader::AsfHeader { packet_len, .. }) => {
                log::warn!("unexpected asf header packet");
                self.transport.read_exact(packet_len).await?;
                self.state.discard_packet();
            }
            Incoming::Data(PacketHeader::AsfMedia {
                packet_seq,
                packet_id_type,
                packet_len,
                ..
            }) => {
                if packet_len > self.state.packet_len() {
                    log::warn!("invalid asf packet length: {} bytes", packet_len);
                    return Err(MmsError {
                        value: MmsErrorValue::PacketTooLarge(packet_len),
                    });
                }
                let payload = self.transport.read_exact(packet_len).await?;
                self.state.store_packet(
                    packet_seq,
                    &payload,
                    packet_id_type as u32 == ASF_MEDIA_PACKET_ID_TYPE,
                    packet_id_type as u32 == self.packet_id_type,
                )?;
            }
        }

        Ok(true)
    }

    async fn request_packet_seek(&mut self, packet_seq: u32) -> Result<(), MmsError> {
        self.next_packet_id_type();
        self.request_data_packet(0.0, packet_seq, 0x00FF_FFFF).await
    }

    async fn request_time_seek(&mut self, time_sec: f64) -> Result<(), MmsError> {
        self.next_packet_id_type();
        let preroll = self.state.header().preroll as f64 / 1000.0;
        self.request_data_packet(time_sec + preroll, 0xFFFF_FFFF, 0x00FF_FFFF)
            .await
    }

    async fn shutdown(&mut self) {
        self.transport.shutdown().await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use {
        super::MmstSession,
        crate::{
            asf::{tests::build_header, AsfStreamType},
            command::tests::server_command,
            define::MmsTimeouts,
            session::TMmsSession,
            transport::tests::{ScriptedConnector, ScriptedIO},
            uri::MmsUrl,
        },
        byteorder::{ByteOrder, LittleEndian},
        std::{
            io::SeekFrom,
            sync::{Arc, Mutex},
        },
    };

    pub const PACKET_LEN: u32 = 3000;

    fn written_command(data: &[u8]) -> u32 {
        LittleEndian::read_u32(&data[36..40]) & 0xFFFF
    }

    fn data_packet(seq: u32, id_type: u8, flags: u8, payload: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&seq.to_le_bytes());
        data.push(id_type);
        data.push(flags);
        data.extend_from_slice(&((payload.len() + 8) as u16).to_le_bytes());
        data.extend_from_slice(payload);
        data
    }

    fn opened_answer(live: bool) -> Vec<u8> {
        let mut extra = vec![0u8; 24];
        extra[23] = if live { 0x02 } else { 0x01 };
        server_command(0x06, &extra)
    }

    /// A server that walks the whole negotiation and then sends `media`
    /// packets of 100 bytes followed by an end of stream.
    pub fn mmst_server(live: bool, media: u32) -> ScriptedIO {
        let header = build_header(
            PACKET_LEN,
            &[
                (1, AsfStreamType::Audio, 64000),
                (2, AsfStreamType::Video, 400000),
            ],
        );

        ScriptedIO::new(
            Vec::new(),
            Box::new(move |written| {
                let mut answers = Vec::new();
                match written_command(written) {
                    0x01 => answers.push(server_command(0x01, &[0u8; 8])),
                    0x02 => answers.push(server_command(0x02, &[0u8; 8])),
                    0x05 => answers.push(opened_answer(live)),
                    0x15 => {
                        answers.push(server_command(0x11, &[0u8; 8]));
                        let (first, second) = header.split_at(100);
                        answers.push(data_packet(0, 2, 0x04, first));
                        answers.push(data_packet(0, 2, 0x08, second));
                    }
                    0x33 => answers.push(server_command(0x21, &[0u8; 8])),
                    0x07 => {
                        for seq in 0..media {
                            answers.push(data_packet(10 + seq, 4, 0, &[seq as u8 + 1; 100]));
                        }
                        answers.push(server_command(0x1e, &[0u8; 8]));
                    }
                    _ => {}
                }
                answers
            }),
        )
    }

    async fn connect(io: ScriptedIO) -> (MmstSession, Arc<Mutex<Vec<Vec<u8>>>>) {
        let written = io.written.clone();
        let connector = ScriptedConnector::new(vec![io]);
        let url = MmsUrl::parse("mmst://127.0.0.1/live/tv.wmv").unwrap();
        let session = MmstSession::connect(&connector, &url, 1_000_000, MmsTimeouts::default())
            .await
            .unwrap();
        (session, written)
    }

    #[tokio::test]
    async fn test_handshake() {
        let (session, written) = connect(mmst_server(false, 0)).await;

        assert_eq!(session.asf_packet_len(), 3000);
        assert_eq!(session.state().header().streams.len(), 2);
        assert!(session.seekable());

        let commands: Vec<u32> = written
            .lock()
            .unwrap()
            .iter()
            .map(|data| written_command(data))
            .collect();
        assert_eq!(commands, vec![0x01, 0x02, 0x05, 0x15, 0x33, 0x07]);

        let written = written.lock().unwrap();
        // sequence numbers increase per command
        assert_eq!(LittleEndian::read_u32(&written[5][20..24]), 5);
        // the stream selection names the second stream and keeps it
        assert_eq!(&written[4][48..56], &[0, 0, 0xFF, 0xFF, 2, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_read_stream() {
        let (mut session, _) = connect(mmst_server(false, 2)).await;
        let header_len = session.asf_header_len();

        let mut buf = vec![0u8; header_len + 2 * 3000 + 10];
        let mut total = 0;
        loop {
            let n = session.read(&mut buf[total..]).await.unwrap();
            if n == 0 {
                break;
            }
            total += n;
        }

        assert_eq!(total, header_len + 2 * 3000);
        assert_eq!(&buf[header_len..header_len + 100], &[1u8; 100][..]);
        assert_eq!(buf[header_len + 100], 0);
        assert_eq!(buf[header_len + 3000], 2);
        assert_eq!(session.current_pos(), total as u64);
        assert_eq!(session.length(), header_len as u64 + 100 * 3000);
    }

    #[tokio::test]
    async fn test_live_seek_rejected() {
        let (mut session, written) = connect(mmst_server(true, 0)).await;
        assert!(!session.seekable());

        let before = written.lock().unwrap().len();
        let pos = session.seek(SeekFrom::Start(50_000)).await.unwrap();
        assert_eq!(pos, 0);
        assert!(!session.time_seek(10.0).await.unwrap());
        assert_eq!(written.lock().unwrap().len(), before);
    }

    #[tokio::test]
    async fn test_seek_inside_header() {
        let (mut session, written) = connect(mmst_server(false, 0)).await;
        let before = written.lock().unwrap().len();

        assert_eq!(session.seek(SeekFrom::Start(16)).await.unwrap(), 16);
        let mut buf = [0u8; 8];
        assert_eq!(session.read(&mut buf).await.unwrap(), 8);
        assert_eq!(&buf[..], &session.state().header_bytes()[16..24]);
        assert_eq!(written.lock().unwrap().len(), before);
    }

    #[tokio::test]
    async fn test_keepalive_bound() {
        let io = ScriptedIO::new(
            Vec::new(),
            Box::new(|written| {
                if written_command(written) == 0x01 {
                    (0..20).map(|_| server_command(0x1b, &[0u8; 8])).collect()
                } else {
                    Vec::new()
                }
            }),
        );
        let written = io.written.clone();
        let connector = ScriptedConnector::new(vec![io]);
        let url = MmsUrl::parse("mms://127.0.0.1/a.wmv").unwrap();

        let result = MmstSession::connect(&connector, &url, 1_000_000, MmsTimeouts::default()).await;
        assert!(result.is_err());
        // the hello plus one answer per keepalive
        assert_eq!(written.lock().unwrap().len(), 1 + 16);
    }
}
