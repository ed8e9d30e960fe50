use {
    super::{
        define::{SignalInfo, TStreamSink, MAX_PENDING_PACKETS},
        errors::StreamHubError,
    },
    std::{collections::VecDeque, time::Duration},
    tokio::time::Instant,
    xmpegts::{
        demuxer::DemuxerBundle,
        packet::{StreamPacket, StreamProperties},
    },
};

/// Holds packets back until every stream knows its format, then announces
/// the streams and releases the backlog in arrival order.
pub struct LiveStreamer<S> {
    sink: S,
    ready: bool,
    pending: VecDeque<StreamPacket>,
    dropped: u64,
    last_activity: Instant,
}

impl<S> LiveStreamer<S>
where
    S: TStreamSink,
{
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            ready: false,
            pending: VecDeque::new(),
            dropped: 0,
            last_activity: Instant::now(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Forgets the announced layout and any backlog, the next ready layout
    /// is announced again.
    pub fn reset(&mut self) {
        if !self.pending.is_empty() {
            log::debug!("discarding {} buffered packets", self.pending.len());
        }
        self.ready = false;
        self.pending.clear();
        self.dropped = 0;
    }

    fn queue(&mut self, packets: Vec<StreamPacket>) {
        self.pending.extend(packets);
        while self.pending.len() > MAX_PENDING_PACKETS {
            self.pending.pop_front();
            self.dropped += 1;
        }
    }

    /// The stream table to announce, once every stream of `bundle` knows its
    /// format and the layout was not announced yet.
    pub fn pending_layout(&self, bundle: &DemuxerBundle) -> Option<Vec<StreamProperties>> {
        if self.ready || !bundle.is_ready() {
            return None;
        }
        Some(bundle.stream_descriptors())
    }

    /// Sends `packets`, or queues them until a `layout` from
    /// `pending_layout` arrives.
    pub async fn deliver(
        &mut self,
        layout: Option<Vec<StreamProperties>>,
        packets: Vec<StreamPacket>,
    ) -> Result<(), StreamHubError> {
        if !self.ready {
            self.queue(packets);
            let streams = match layout {
                Some(streams) => streams,
                None => return Ok(()),
            };

            log::info!(
                "{} streams ready, flushing {} buffered packets",
                streams.len(),
                self.pending.len()
            );
            if self.dropped > 0 {
                log::warn!("{} packets dropped while waiting for streams", self.dropped);
            }
            self.sink.on_streams_ready(&streams).await?;
            self.ready = true;

            while let Some(packet) = self.pending.pop_front() {
                self.sink.on_stream_packet(&packet).await?;
            }
            self.last_activity = Instant::now();
            return Ok(());
        }

        if packets.is_empty() {
            return Ok(());
        }
        for packet in &packets {
            self.sink.on_stream_packet(packet).await?;
        }
        self.last_activity = Instant::now();
        Ok(())
    }

    /// Sends a keep-alive when nothing went out for `idle`. Returns whether
    /// one was sent.
    pub async fn keepalive_if_idle(
        &mut self,
        now: Instant,
        idle: Duration,
    ) -> Result<bool, StreamHubError> {
        if now.saturating_duration_since(self.last_activity) < idle {
            return Ok(false);
        }
        log::trace!("no data for {:?}, sending keepalive", idle);
        self.sink.on_keepalive().await?;
        self.last_activity = now;
        Ok(true)
    }

    pub async fn signal_info(&mut self, info: &SignalInfo) -> Result<(), StreamHubError> {
        self.sink.on_signal_info(info).await
    }
}
