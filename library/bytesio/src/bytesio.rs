use {
    super::bytesio_errors::{BytesIOError, BytesIOErrorValue},
    async_trait::async_trait,
    bytes::{Bytes, BytesMut},
    futures::SinkExt,
    std::time::Duration,
    tokio::{net::TcpStream, time::timeout},
    tokio_stream::StreamExt,
    tokio_util::codec::{BytesCodec, Framed},
};

/// A connected, bidirectional byte stream. Reads hand back whatever chunk the
/// transport produced; framing is the caller's business.
#[async_trait]
pub trait TNetIO: Send + Sync {
    async fn write(&mut self, bytes: Bytes) -> Result<(), BytesIOError>;
    async fn read(&mut self) -> Result<BytesMut, BytesIOError>;
    async fn read_timeout(&mut self, duration: Duration) -> Result<BytesMut, BytesIOError> {
        match timeout(duration, self.read()).await {
            Ok(data) => data,
            Err(_) => Err(BytesIOError {
                value: BytesIOErrorValue::TimeoutError,
            }),
        }
    }
    async fn shutdown(&mut self) -> Result<(), BytesIOError> {
        Ok(())
    }
}

/// Opens `TNetIO` connections. Protocol clients take one of these so that
/// tests can script the peer.
#[async_trait]
pub trait TNetConnector: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        duration: Duration,
    ) -> Result<Box<dyn TNetIO + Send + Sync>, BytesIOError>;
}

pub struct TcpIO {
    stream: Framed<TcpStream, BytesCodec>,
}

impl TcpIO {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: Framed::new(stream, BytesCodec::new()),
        }
    }
}

#[async_trait]
impl TNetIO for TcpIO {
    async fn write(&mut self, bytes: Bytes) -> Result<(), BytesIOError> {
        self.stream.send(bytes).await?;
        Ok(())
    }

    async fn read(&mut self) -> Result<BytesMut, BytesIOError> {
        match self.stream.next().await {
            Some(data) => match data {
                Ok(bytes) => Ok(bytes),
                Err(err) => Err(BytesIOError {
                    value: BytesIOErrorValue::IOError(err),
                }),
            },
            None => Err(BytesIOError {
                value: BytesIOErrorValue::NoneReturn,
            }),
        }
    }

    async fn shutdown(&mut self) -> Result<(), BytesIOError> {
        //the codec encodes both Bytes and BytesMut
        SinkExt::<Bytes>::close(&mut self.stream).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct TcpConnector {}

#[async_trait]
impl TNetConnector for TcpConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        duration: Duration,
    ) -> Result<Box<dyn TNetIO + Send + Sync>, BytesIOError> {
        let address = format!("{host}:{port}");
        log::info!("connecting to {}", address);

        let stream = match timeout(duration, TcpStream::connect(address.clone())).await {
            Ok(rv) => rv?,
            Err(_) => {
                log::warn!("connect to {} timed out", address);
                return Err(BytesIOError {
                    value: BytesIOErrorValue::TimeoutError,
                });
            }
        };
        stream.set_nodelay(true)?;

        Ok(Box::new(TcpIO::new(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::{TNetConnector, TNetIO, TcpConnector};
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    #[tokio::test]
    async fn test_tcp_io_echo() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&buf).await.unwrap();
        });

        let connector = TcpConnector::default();
        let mut io = connector
            .connect("127.0.0.1", port, Duration::from_secs(2))
            .await
            .unwrap();
        io.write(Bytes::from_static(b"hello")).await.unwrap();

        let mut received = Vec::new();
        while received.len() < 5 {
            let data = io.read_timeout(Duration::from_secs(2)).await.unwrap();
            received.extend_from_slice(&data[..]);
        }
        assert_eq!(&received[..], b"hello");
    }

    #[tokio::test]
    async fn test_shutdown_ends_the_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let connector = TcpConnector::default();
        let mut io = connector
            .connect("127.0.0.1", port, Duration::from_secs(2))
            .await
            .unwrap();
        io.write(Bytes::from_static(b"bye")).await.unwrap();
        io.shutdown().await.unwrap();

        assert_eq!(server.await.unwrap(), b"bye".to_vec());
    }
}
