use {
    super::{
        asf::AsfHeader,
        errors::{MmsError, MmsErrorValue},
    },
    async_trait::async_trait,
    std::io::SeekFrom,
};

/// Reader side bookkeeping shared by both transports: the header served
/// first, then fixed size packets, with `current_pos` counting bytes
/// handed out.
#[derive(Debug, Default)]
pub struct StreamState {
    header: AsfHeader,
    header_bytes: Vec<u8>,
    header_read: usize,

    packet: Vec<u8>,
    buf_size: usize,
    buf_read: usize,
    /// Index of the packet sitting in `packet`, -1 when none.
    buf_packet_seq_offset: i64,

    start_packet_seq: u32,
    need_discont: bool,

    pub current_pos: u64,
    pub seekable: bool,
    pub eos: bool,
}

impl StreamState {
    pub fn new() -> Self {
        Self {
            buf_packet_seq_offset: -1,
            need_discont: true,
            ..Default::default()
        }
    }

    /// Installs a freshly downloaded header; readers get it from the start.
    pub fn set_header(&mut self, header: AsfHeader) {
        self.header_bytes = header.to_bytes();
        self.header_read = 0;
        self.packet = vec![0; header.packet_len as usize];
        self.buf_size = 0;
        self.buf_read = 0;
        self.header = header;
    }

    pub fn header(&self) -> &AsfHeader {
        &self.header
    }

    pub fn header_bytes(&self) -> &[u8] {
        &self.header_bytes
    }

    pub fn header_len(&self) -> usize {
        self.header_bytes.len()
    }

    pub fn packet_len(&self) -> usize {
        self.header.packet_len as usize
    }

    pub fn start_packet_seq(&self) -> u32 {
        self.start_packet_seq
    }

    pub fn buf_packet_seq_offset(&self) -> i64 {
        self.buf_packet_seq_offset
    }

    pub fn begin_packet(&mut self) {
        self.buf_packet_seq_offset = -1;
    }

    pub fn discard_packet(&mut self) {
        self.buf_size = 0;
    }

    /// Stores one data packet zero-padded to the packet length. Packets of
    /// a stale request (`current == false`) only move `current_pos`.
    pub fn store_packet(
        &mut self,
        packet_seq: u32,
        payload: &[u8],
        first_candidate: bool,
        current: bool,
    ) -> Result<(), MmsError> {
        if self.need_discont && first_candidate {
            self.need_discont = false;
            self.start_packet_seq = packet_seq;
        }

        let packet_len = self.packet_len();
        if payload.len() > packet_len {
            log::warn!("invalid asf packet length: {} bytes", payload.len());
            return Err(MmsError {
                value: MmsErrorValue::PacketTooLarge(payload.len()),
            });
        }

        let seq_offset = packet_seq as i64 - self.start_packet_seq as i64;
        let pos = self.header_len() as i64 + seq_offset * packet_len as i64;
        self.current_pos = pos.max(0) as u64;

        self.packet[..payload.len()].copy_from_slice(payload);
        for byte in &mut self.packet[payload.len()..] {
            *byte = 0;
        }

        if current {
            self.buf_size = packet_len;
            self.buf_packet_seq_offset = seq_offset;
        } else {
            self.buf_size = 0;
        }
        Ok(())
    }

    pub fn length(&self) -> u64 {
        if self.header.num_packets != 0 {
            self.header_len() as u64 + self.header.num_packets * self.packet_len() as u64
        } else {
            self.header.file_len
        }
    }
}

/// Operations every mms transport provides. The byte stream logic lives in
/// the provided methods, the transports only fetch packets and issue
/// seek requests.
#[async_trait]
pub trait TMmsSession: Send {
    fn state(&self) -> &StreamState;
    fn state_mut(&mut self) -> &mut StreamState;

    /// Fetches the next packet into the state. Returns false at the end of
    /// the stream. A call may consume a control message and leave the
    /// packet buffer empty.
    async fn next_media_packet(&mut self) -> Result<bool, MmsError>;
    async fn request_packet_seek(&mut self, packet_seq: u32) -> Result<(), MmsError>;
    async fn request_time_seek(&mut self, time_sec: f64) -> Result<(), MmsError>;
    async fn shutdown(&mut self);

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, MmsError> {
        let mut total = 0;

        while total < buf.len() && !self.state().eos {
            let state = self.state_mut();

            if state.header_read < state.header_len() {
                let n = (buf.len() - total).min(state.header_len() - state.header_read);
                buf[total..total + n]
                    .copy_from_slice(&state.header_bytes[state.header_read..state.header_read + n]);
                state.header_read += n;
                state.current_pos += n as u64;
                total += n;
                continue;
            }

            if state.buf_read >= state.buf_size {
                state.buf_size = 0;
                state.buf_read = 0;
                match self.next_media_packet().await {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(err) => {
                        if total > 0 {
                            log::warn!("read stopped after {} bytes: {}", total, err);
                            return Ok(total);
                        }
                        return Err(err);
                    }
                }
            }

            let n = (buf.len() - total).min(state.buf_size - state.buf_read);
            buf[total..total + n].copy_from_slice(&state.packet[state.buf_read..state.buf_read + n]);
            state.buf_read += n;
            state.current_pos += n as u64;
            total += n;
        }

        Ok(total)
    }

    /// Reads until a data packet arrives and positions the reader at its
    /// first byte. The previous packet is restored if that fails.
    async fn peek_and_set_pos(&mut self) -> Result<(), MmsError> {
        let state = self.state_mut();
        let saved_packet = state.packet.clone();
        let saved_size = state.buf_size;
        let saved_offset = state.buf_packet_seq_offset;
        state.buf_size = 0;

        while !self.state().eos {
            if let Err(err) = self.next_media_packet().await {
                let state = self.state_mut();
                state.packet = saved_packet;
                state.buf_size = saved_size;
                state.buf_packet_seq_offset = saved_offset;
                return Err(err);
            }
            if self.state().buf_size > 0 {
                break;
            }
        }

        let state = self.state_mut();
        state.header_read = state.header_len();
        state.buf_read = 0;
        Ok(())
    }

    async fn time_seek(&mut self, time_sec: f64) -> Result<bool, MmsError> {
        if !self.state().seekable {
            return Ok(false);
        }
        self.request_time_seek(time_sec).await?;
        self.peek_and_set_pos().await?;
        Ok(true)
    }

    /// Returns the new position. Unseekable streams, targets past the last
    /// packet and servers ignoring the request leave the position as is.
    async fn seek(&mut self, pos: SeekFrom) -> Result<u64, MmsError> {
        let state = self.state();
        let current_pos = state.current_pos;
        if !state.seekable {
            return Ok(current_pos);
        }

        let dest = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(offset) => current_pos as i64 + offset,
            SeekFrom::End(offset) => state.length() as i64 + offset,
        };
        let header_len = state.header_len() as i64;
        let packet_len = state.packet_len() as i64;
        if dest < 0 || packet_len == 0 {
            return Ok(current_pos);
        }

        let mut dest_packet_seq = if dest >= header_len {
            (dest - header_len) / packet_len
        } else {
            -1
        };

        if dest_packet_seq < 0 {
            if state.buf_packet_seq_offset > 0 {
                self.request_packet_seek(0xFFFF_FFFF).await?;
                let state = self.state_mut();
                state.buf_read = 0;
                state.buf_size = 0;
                state.buf_packet_seq_offset = -1;
            } else {
                self.state_mut().buf_read = 0;
            }
            let state = self.state_mut();
            state.header_read = dest as usize;
            state.current_pos = dest as u64;
            return Ok(state.current_pos);
        }

        let num_packets = state.header.num_packets as i64;
        // servers stall when asked for the packet after the last one
        if num_packets != 0 && dest == header_len + num_packets * packet_len {
            dest_packet_seq -= 1;
        }

        if dest_packet_seq != state.buf_packet_seq_offset {
            if num_packets != 0 && dest_packet_seq >= num_packets {
                return Ok(current_pos);
            }
            let packet_seq = state.start_packet_seq.wrapping_add(dest_packet_seq as u32);
            self.request_packet_seek(packet_seq).await?;
            self.peek_and_set_pos().await?;
            if dest_packet_seq != self.state().buf_packet_seq_offset {
                log::debug!("server ignored the seek to packet {}", dest_packet_seq);
                return Ok(self.state().current_pos);
            }
        }

        let state = self.state_mut();
        state.buf_read = (dest - (header_len + dest_packet_seq * packet_len)) as usize;
        state.current_pos = dest as u64;
        Ok(state.current_pos)
    }

    fn peek_header(&self, buf: &mut [u8]) -> usize {
        let header = self.state().header_bytes();
        let len = header.len().min(buf.len());
        buf[..len].copy_from_slice(&header[..len]);
        len
    }

    fn length(&self) -> u64 {
        self.state().length()
    }

    fn current_pos(&self) -> u64 {
        self.state().current_pos
    }

    fn time_length(&self) -> f64 {
        self.state().header().time_length()
    }

    fn raw_time_length(&self) -> u64 {
        self.state().header().raw_time_length()
    }

    fn asf_header_len(&self) -> usize {
        self.state().header_len()
    }

    fn asf_packet_len(&self) -> usize {
        self.state().packet_len()
    }

    fn seekable(&self) -> bool {
        self.state().seekable
    }
}
