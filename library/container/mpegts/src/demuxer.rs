use {
    super::{
        define::{
            clock::{MPEG_CLOCK, NORMALIZED_CLOCK},
            ts::TS_PACKET_SIZE,
        },
        errors::{MpegTsError, MpegTsErrorValue},
        packet::{StreamDescriptor, StreamInfo, StreamPacket, StreamProperties},
        parsers::{self, EsParser},
        pes,
        timestamp::{self, PtsWrap},
        ts::TsPacketHeader,
    },
    std::collections::BTreeMap,
};

/// Demultiplexes one PID into its elementary stream parser. The PID and
/// stream type are fixed for the lifetime of the instance.
pub struct TsDemuxer {
    descriptor: StreamDescriptor,
    parser: Box<dyn EsParser>,
    pes_error: bool,
    continuity_counter: Option<u8>,
}

impl TsDemuxer {
    pub fn new(descriptor: StreamDescriptor) -> Self {
        let parser = parsers::new_parser(&descriptor);
        Self {
            descriptor,
            parser,
            pes_error: false,
            continuity_counter: None,
        }
    }

    pub fn pid(&self) -> u16 {
        self.descriptor.pid
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub fn info(&self) -> &StreamInfo {
        self.parser.info()
    }

    pub fn is_ready(&self) -> bool {
        self.parser.info().is_ready()
    }

    pub fn properties(&self) -> StreamProperties {
        StreamProperties {
            descriptor: self.descriptor.clone(),
            info: self.parser.info().clone(),
        }
    }

    pub fn reset(&mut self) {
        self.parser.reset();
        self.pes_error = false;
        self.continuity_counter = None;
    }

    /// Returns false when a continuity counter repeats, the packet is a
    /// duplicate and must be dropped.
    fn check_continuity(&mut self, header: &TsPacketHeader) -> bool {
        //the counter only advances on packets with payload
        if !header.has_payload() {
            return true;
        }

        let counter = header.continuity_counter;
        if let Some(previous) = self.continuity_counter {
            if counter == previous {
                log::trace!("pid {}: duplicate packet {}", header.pid, counter);
                return false;
            }
            let expected = (previous + 1) & 0x0F;
            if counter != expected {
                log::debug!(
                    "pid {}: continuity error, expected {} got {}",
                    header.pid,
                    expected,
                    counter
                );
                if !header.payload_unit_start {
                    self.pes_error = true;
                }
            }
        }
        self.continuity_counter = Some(counter);
        true
    }

    /// Feeds one 188 byte packet whose header was already parsed.
    pub fn process_packet(
        &mut self,
        header: &TsPacketHeader,
        buf: &[u8],
        out: &mut Vec<StreamPacket>,
    ) {
        if header.transport_error {
            log::trace!("pid {}: transport error indicator set", header.pid);
            return;
        }
        if header.scrambling_control != 0 {
            log::trace!("pid {}: scrambled packet", header.pid);
            return;
        }
        if !self.check_continuity(header) {
            return;
        }

        let offset = match header.payload_offset {
            Some(offset) => offset,
            None => return,
        };
        let payload = &buf[offset..TS_PACKET_SIZE];

        if header.payload_unit_start {
            if !pes::has_start_code(payload) {
                log::debug!("pid {}: unit start without pes start code", header.pid);
                self.pes_error = true;
                return;
            }
            self.pes_error = false;
        } else if self.pes_error {
            return;
        }

        self.parser.parse(payload, header.payload_unit_start, out);
    }

    /// Emits what the parser still holds at the end of the input.
    pub fn flush(&mut self, out: &mut Vec<StreamPacket>) {
        self.parser.flush(out);
        self.pes_error = false;
        self.continuity_counter = None;
    }
}

/// The PID keyed stream table. Timestamps leave it unwrapped and in
/// microseconds.
pub struct DemuxerBundle {
    streams: BTreeMap<u16, TsDemuxer>,
    max_streams: usize,
    pts_wrap: PtsWrap,
}

impl DemuxerBundle {
    pub fn new(max_streams: usize) -> Self {
        Self {
            streams: BTreeMap::new(),
            max_streams,
            pts_wrap: PtsWrap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn max_streams(&self) -> usize {
        self.max_streams
    }

    pub fn get(&self, pid: u16) -> Option<&TsDemuxer> {
        self.streams.get(&pid)
    }

    /// Registers a stream. Fails without touching the table when the PID is
    /// taken or the table is full.
    pub fn add_stream(&mut self, descriptor: StreamDescriptor) -> Result<(), MpegTsError> {
        if self.streams.contains_key(&descriptor.pid) {
            return Err(MpegTsError {
                value: MpegTsErrorValue::StreamExists(descriptor.pid),
            });
        }
        if self.streams.len() >= self.max_streams {
            log::warn!(
                "stream table full ({}), not adding {}",
                self.max_streams,
                descriptor
            );
            return Err(MpegTsError {
                value: MpegTsErrorValue::StreamCountExceeded(self.max_streams),
            });
        }

        log::info!("add stream {}", descriptor);
        self.streams
            .insert(descriptor.pid, TsDemuxer::new(descriptor));
        Ok(())
    }

    pub fn remove_stream(&mut self, pid: u16) -> bool {
        self.streams.remove(&pid).is_some()
    }

    pub fn clear(&mut self) {
        self.streams.clear();
        self.pts_wrap.reset();
    }

    /// True when the table holds exactly the streams of `layout`.
    pub fn has_layout(&self, layout: &[StreamDescriptor]) -> bool {
        layout.len() == self.streams.len()
            && layout.iter().all(|descriptor| {
                self.streams
                    .get(&descriptor.pid)
                    .map_or(false, |demuxer| demuxer.descriptor() == descriptor)
            })
    }

    /// Replaces the stream table with `layout`. An unchanged layout keeps the
    /// running parsers. When the layout holds more streams than the table
    /// can, the first ones are kept and `StreamCountExceeded` is returned
    /// after the rebuild.
    pub fn update_streams(&mut self, layout: &[StreamDescriptor]) -> Result<(), MpegTsError> {
        if self.has_layout(layout) {
            log::debug!("stream layout unchanged");
            return Ok(());
        }

        self.clear();
        let mut overflow = 0;
        for descriptor in layout {
            match self.add_stream(descriptor.clone()) {
                Ok(()) => {}
                Err(MpegTsError {
                    value: MpegTsErrorValue::StreamCountExceeded(_),
                }) => overflow += 1,
                Err(err) => log::warn!("skip stream {}: {}", descriptor, err),
            }
        }

        if overflow > 0 {
            log::warn!(
                "{} streams exceed the table capacity of {}",
                overflow,
                self.max_streams
            );
            return Err(MpegTsError {
                value: MpegTsErrorValue::StreamCountExceeded(self.max_streams),
            });
        }
        Ok(())
    }

    fn normalize(&mut self, packet: &mut StreamPacket) {
        packet.dts = timestamp::to_normalized(self.pts_wrap.unwrap(packet.dts));
        packet.pts = timestamp::to_normalized(self.pts_wrap.unwrap(packet.pts));
        packet.duration =
            timestamp::rescale(packet.duration as i64, NORMALIZED_CLOCK, MPEG_CLOCK) as u64;
    }

    /// Feeds one 188 byte transport packet. A bad sync byte is an error and
    /// leaves every stream untouched; packets of unknown PIDs are ignored.
    pub fn process_ts_packet(&mut self, buf: &[u8]) -> Result<Vec<StreamPacket>, MpegTsError> {
        let header = TsPacketHeader::parse(buf)?;

        let mut packets = Vec::new();
        match self.streams.get_mut(&header.pid) {
            Some(demuxer) => demuxer.process_packet(&header, buf, &mut packets),
            None => return Ok(packets),
        }

        for packet in packets.iter_mut() {
            self.normalize(packet);
        }
        Ok(packets)
    }

    /// True once every registered stream knows its format.
    pub fn is_ready(&self) -> bool {
        !self.streams.is_empty() && self.streams.values().all(|demuxer| demuxer.is_ready())
    }

    /// Drains every stream at the end of the input, in PID order.
    pub fn flush(&mut self) -> Vec<StreamPacket> {
        let mut packets = Vec::new();
        for demuxer in self.streams.values_mut() {
            demuxer.flush(&mut packets);
        }
        for packet in packets.iter_mut() {
            self.normalize(packet);
        }
        packets
    }

    pub fn stream_descriptors(&self) -> Vec<StreamProperties> {
        self.streams
            .values()
            .map(|demuxer| demuxer.properties())
            .collect()
    }
}
