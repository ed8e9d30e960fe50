use {
    super::{
        define::{
            LayoutEvent, LayoutEventReceiver, TSignalSource, TStreamSink, WorkerConfig,
            RING_POLL_INTERVAL,
        },
        errors::StreamHubError,
        ring::TsRingBuffer,
        streamer::LiveStreamer,
    },
    tokio::{
        sync::mpsc::error::TryRecvError,
        time::{sleep, Instant},
    },
    tokio_util::sync::CancellationToken,
    xmpegts::{
        define::ts::TS_PACKET_SIZE, demuxer::DemuxerBundle, packet::StreamDescriptor,
    },
};

/// Packets taken from the ring buffer per iteration.
const READ_BATCH_PACKETS: usize = 256;

/// Drains the live ring buffer through the demuxer into the sink. The
/// stream table is only touched from this task, layout changes are applied
/// between two batches.
pub struct TsWorker<S> {
    bundle: DemuxerBundle,
    ring: TsRingBuffer,
    layout_receiver: Option<LayoutEventReceiver>,
    signal_source: Option<Box<dyn TSignalSource>>,
    streamer: LiveStreamer<S>,
    config: WorkerConfig,
}

impl<S> TsWorker<S>
where
    S: TStreamSink,
{
    pub fn new(
        ring: TsRingBuffer,
        layout_receiver: LayoutEventReceiver,
        sink: S,
        config: WorkerConfig,
    ) -> Self {
        Self {
            bundle: DemuxerBundle::new(config.max_streams),
            ring,
            layout_receiver: Some(layout_receiver),
            signal_source: None,
            streamer: LiveStreamer::new(sink),
            config,
        }
    }

    pub fn set_signal_source(&mut self, source: Box<dyn TSignalSource>) {
        self.signal_source = Some(source);
    }

    pub fn bundle(&self) -> &DemuxerBundle {
        &self.bundle
    }

    fn change_layout(&mut self, streams: Vec<StreamDescriptor>) {
        if self.bundle.has_layout(&streams) {
            return;
        }
        log::info!("stream layout changed, {} streams", streams.len());
        if let Err(err) = self.bundle.update_streams(&streams) {
            log::warn!("stream layout applied partially: {}", err);
        }
        self.streamer.reset();
    }

    fn apply_layout_events(&mut self) {
        let mut latest = None;
        let mut closed = false;
        if let Some(receiver) = &mut self.layout_receiver {
            loop {
                match receiver.try_recv() {
                    Ok(LayoutEvent::StreamsChanged { streams }) => latest = Some(streams),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }
        }
        if closed {
            log::debug!("layout channel closed, keeping the current streams");
            self.layout_receiver = None;
        }

        if let Some(streams) = latest {
            self.change_layout(streams);
        }
    }

    /// Returns false when the ring buffer had nothing to offer.
    async fn process_ring(&mut self) -> Result<bool, StreamHubError> {
        let data = match self.ring.get(READ_BATCH_PACKETS) {
            Some(data) => data,
            None => return Ok(false),
        };

        let mut packets = Vec::new();
        for chunk in data.chunks(TS_PACKET_SIZE) {
            match self.bundle.process_ts_packet(chunk) {
                Ok(mut out) => packets.append(&mut out),
                Err(err) => log::debug!("dropping ts packet: {}", err),
            }
        }

        let layout = self.streamer.pending_layout(&self.bundle);
        self.streamer.deliver(layout, packets).await?;
        Ok(true)
    }

    /// Flushes the parsers and delivers what they still held.
    pub async fn finish(&mut self) -> Result<(), StreamHubError> {
        self.apply_layout_events();
        let packets = self.bundle.flush();
        log::debug!("{} packets left at end of input", packets.len());

        let layout = self.streamer.pending_layout(&self.bundle);
        self.streamer.deliver(layout, packets).await
    }

    async fn send_signal_info(&mut self) -> Result<(), StreamHubError> {
        let info = match &self.signal_source {
            Some(source) => source.signal_info(),
            None => None,
        };
        if let Some(info) = info {
            self.streamer.signal_info(&info).await?;
        }
        Ok(())
    }

    /// Runs until `cancel` fires or the sink fails. Parser state still in
    /// flight is discarded on exit.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), StreamHubError> {
        self.run_loop(&cancel).await?;
        log::info!("ts worker stopped");
        Ok(())
    }

    /// Runs a finite input. `end_of_input` fires once the producer put
    /// everything into the ring, which is then drained and the parsers
    /// flushed before returning.
    pub async fn run_to_end(
        &mut self,
        end_of_input: CancellationToken,
    ) -> Result<(), StreamHubError> {
        self.run_loop(&end_of_input).await?;
        self.apply_layout_events();
        while self.process_ring().await? {}
        self.finish().await?;
        log::info!("ts worker reached the end of input");
        Ok(())
    }

    async fn run_loop(&mut self, cancel: &CancellationToken) -> Result<(), StreamHubError> {
        let mut last_signal = Instant::now();

        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.apply_layout_events();
            let got_data = self.process_ring().await?;

            let now = Instant::now();
            self.streamer
                .keepalive_if_idle(now, self.config.keepalive)
                .await?;
            if now.saturating_duration_since(last_signal) >= self.config.signal_interval {
                self.send_signal_info().await?;
                last_signal = now;
            }

            if !got_data {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(RING_POLL_INTERVAL) => {}
                }
            }
        }
        Ok(())
    }
}
