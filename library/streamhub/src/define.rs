use {
    super::errors::StreamHubError,
    async_trait::async_trait,
    std::time::Duration,
    tokio::sync::mpsc,
    xmpegts::{
        define::DEFAULT_MAX_STREAMS,
        packet::{StreamDescriptor, StreamPacket, StreamProperties},
    },
};

pub mod opcode {
    pub const STREAM_PACKET: u32 = 1;
    pub const KEEPALIVE: u32 = 2;
    pub const STREAM_CHANGE: u32 = 3;
    pub const SIGNAL_INFO: u32 = 4;
}

// opcode 4, stream id 4, duration 4, frame type 4, pts 8, dts 8, length 4
pub const FRAME_HEADER_LEN: usize = 36;

/// Packets kept while waiting for every stream to become ready. The oldest
/// ones are dropped beyond this.
pub const MAX_PENDING_PACKETS: usize = 4096;

pub const DEFAULT_KEEPALIVE: Duration = Duration::from_millis(1000);
pub const DEFAULT_SIGNAL_INTERVAL: Duration = Duration::from_millis(10000);
pub const DEFAULT_RING_BUFFER_SIZE: usize = 4 * 1024 * 1024;
/// Sleep between polls of an empty ring buffer.
pub const RING_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalInfo {
    pub adapter_name: String,
    pub status: u32,
    /// Percent, 0 to 100.
    pub strength: u32,
    /// Percent, 0 to 100.
    pub snr: u32,
    pub ber: u32,
    pub unc: u32,
}

/// Where demultiplexed data ends up.
#[async_trait]
pub trait TStreamSink: Send {
    async fn on_stream_packet(&mut self, packet: &StreamPacket) -> Result<(), StreamHubError>;
    async fn on_streams_ready(&mut self, streams: &[StreamProperties])
        -> Result<(), StreamHubError>;
    async fn on_keepalive(&mut self) -> Result<(), StreamHubError>;
    async fn on_signal_info(&mut self, info: &SignalInfo) -> Result<(), StreamHubError>;
}

/// Reports the receiving frontend's signal quality.
pub trait TSignalSource: Send {
    fn signal_info(&self) -> Option<SignalInfo>;
}

pub enum LayoutEvent {
    /// The PAT/PMT side found a new set of elementary streams.
    StreamsChanged { streams: Vec<StreamDescriptor> },
}

pub type LayoutEventSender = mpsc::UnboundedSender<LayoutEvent>;
pub type LayoutEventReceiver = mpsc::UnboundedReceiver<LayoutEvent>;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub max_streams: usize,
    pub keepalive: Duration,
    pub signal_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_streams: DEFAULT_MAX_STREAMS,
            keepalive: DEFAULT_KEEPALIVE,
            signal_interval: DEFAULT_SIGNAL_INTERVAL,
        }
    }
}
