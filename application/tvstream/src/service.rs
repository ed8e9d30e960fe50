use {
    super::config::Config,
    anyhow::{anyhow, Result},
    bytesio::bytesio::{TNetConnector, TcpConnector},
    mms::connection::MmsConnection,
    std::{sync::Arc, time::Duration},
    streamhub::{
        define::{LayoutEvent, TStreamSink},
        ring::TsRingBuffer,
        worker::TsWorker,
        writer::PacketWriter,
    },
    tokio::{
        fs::File,
        io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter},
        sync::mpsc,
        time::sleep,
    },
    tokio_util::sync::CancellationToken,
    xmpegts::packet::StreamDescriptor,
};

const READ_CHUNK_SIZE: usize = 64 * 1024;
/// Wait before retrying a put into a full ring buffer.
const RING_FULL_BACKOFF: Duration = Duration::from_millis(5);
const PULL_PROGRESS_INTERVAL: u64 = 16 * 1024 * 1024;

pub struct Service {
    cfg: Config,
}

impl Service {
    pub fn new(cfg: Config) -> Self {
        Service { cfg }
    }

    /// Saves the asf stream behind `url` into `output`. Returns the number
    /// of bytes written.
    pub async fn pull(&self, url: &str, output: &str) -> Result<u64> {
        let file = File::create(output).await?;
        let mut writer = BufWriter::new(file);
        let connector: Arc<dyn TNetConnector> = Arc::new(TcpConnector::default());

        let total = self.pull_to(connector, url, &mut writer).await?;
        writer.flush().await?;
        log::info!("saved {} bytes to {}", total, output);
        Ok(total)
    }

    pub async fn pull_to<W>(
        &self,
        connector: Arc<dyn TNetConnector>,
        url: &str,
        writer: &mut W,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mms_cfg = self.cfg.mms();
        let mut connection =
            MmsConnection::connect(connector, url, mms_cfg.bandwidth, mms_cfg.timeouts())
                .await
                .map_err(|err| anyhow!("open {} failed: {}", url, err))?;

        log::info!(
            "{} opened over {}, length: {} bytes, duration: {:.3}s, seekable: {}",
            url,
            connection.transport_name(),
            connection.length(),
            connection.time_length(),
            connection.seekable()
        );

        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        let mut total: u64 = 0;
        let mut next_report = PULL_PROGRESS_INTERVAL;

        let result = loop {
            let n = match connection.read(&mut buf).await {
                Ok(0) => break Ok(total),
                Ok(n) => n,
                Err(err) => break Err(anyhow!("read {} failed: {}", url, err)),
            };
            if let Err(err) = writer.write_all(&buf[..n]).await {
                break Err(err.into());
            }
            total += n as u64;
            if total >= next_report {
                log::info!("pulled {} bytes, position {}", total, connection.current_pos());
                next_report += PULL_PROGRESS_INTERVAL;
            }
        };

        connection.close().await;
        result
    }

    /// Demultiplexes the ts capture `input` into framed stream packets in
    /// `output`.
    pub async fn demux(
        &self,
        input: &str,
        output: &str,
        streams: Vec<StreamDescriptor>,
    ) -> Result<()> {
        let reader = File::open(input).await?;
        let writer = File::create(output).await?;
        self.demux_to(reader, writer, streams).await
    }

    pub async fn demux_to<R, W>(
        &self,
        mut reader: R,
        writer: W,
        streams: Vec<StreamDescriptor>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let demux_cfg = self.cfg.demux();
        let ring = TsRingBuffer::new(demux_cfg.ring_buffer_size);
        let (layout_sender, layout_receiver) = mpsc::unbounded_channel();

        let names: Vec<String> = streams.iter().map(|stream| stream.to_string()).collect();
        log::info!("demuxing streams: {}", names.join(" "));
        layout_sender
            .send(LayoutEvent::StreamsChanged { streams })
            .map_err(|_| anyhow!("layout channel closed"))?;

        let sink = PacketWriter::new(writer);
        let end_of_input = CancellationToken::new();
        let handle = spawn_worker(
            TsWorker::new(
                ring.clone(),
                layout_receiver,
                sink,
                demux_cfg.worker_config(),
            ),
            end_of_input.clone(),
        );

        let fed = feed_ring(&mut reader, &ring, &handle).await;

        // the worker drains the ring and flushes the parsers on its way out
        end_of_input.cancel();
        let worker_result = handle.await?;

        let total = fed?;
        log::info!("fed {} bytes into the demuxer", total);
        worker_result.map_err(|err| anyhow!("ts worker failed: {}", err))
    }
}

type WorkerHandle = tokio::task::JoinHandle<Result<(), streamhub::errors::StreamHubError>>;

fn spawn_worker<S>(mut worker: TsWorker<S>, end_of_input: CancellationToken) -> WorkerHandle
where
    S: TStreamSink + 'static,
{
    tokio::spawn(async move { worker.run_to_end(end_of_input).await })
}

/// Copies `reader` into the ring buffer, waiting for room instead of
/// dropping data. Stops early when the worker is gone.
async fn feed_ring<R>(reader: &mut R, ring: &TsRingBuffer, worker: &WorkerHandle) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }

        let mut offset = 0;
        while offset < n {
            if worker.is_finished() {
                return Ok(total);
            }
            let taken = ring.put(&buf[offset..n]);
            offset += taken;
            total += taken as u64;
            if offset < n {
                sleep(RING_FULL_BACKOFF).await;
            }
        }
    }
}
