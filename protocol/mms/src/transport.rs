use {
    super::errors::{MmsError, MmsErrorValue},
    bytes::{Bytes, BytesMut},
    bytesio::{bytes_reader::BytesReader, bytesio::TNetIO},
    std::time::Duration,
};

const MAX_HTTP_HEAD_LEN: usize = 64 * 1024;

/// A connection plus the bytes received but not consumed yet. Every read
/// waits at most `read_timeout` for the peer.
pub struct MmsTransport {
    io: Box<dyn TNetIO + Send + Sync>,
    reader: BytesReader,
    read_timeout: Duration,
}

impl MmsTransport {
    pub fn new(io: Box<dyn TNetIO + Send + Sync>, read_timeout: Duration) -> Self {
        Self {
            io,
            reader: BytesReader::new(BytesMut::new()),
            read_timeout,
        }
    }

    async fn fill(&mut self) -> Result<(), MmsError> {
        let data = self.io.read_timeout(self.read_timeout).await?;
        self.reader.extend_from_slice(&data[..]);
        Ok(())
    }

    pub async fn read_exact(&mut self, len: usize) -> Result<BytesMut, MmsError> {
        while self.reader.len() < len {
            self.fill().await?;
        }
        Ok(self.reader.read_bytes(len)?)
    }

    /// Reads an http status line and headers up to the empty line.
    pub async fn read_http_head(&mut self) -> Result<BytesMut, MmsError> {
        let mut searched = 0;
        loop {
            let buffered = self.reader.advance_bytes(self.reader.len())?;
            if let Some(pos) = buffered[searched..]
                .windows(4)
                .position(|window| window == b"\r\n\r\n")
            {
                return Ok(self.reader.read_bytes(searched + pos + 4)?);
            }
            if buffered.len() > MAX_HTTP_HEAD_LEN {
                return Err(MmsError {
                    value: MmsErrorValue::MalformedHttpResponse,
                });
            }
            searched = buffered.len().saturating_sub(3);
            self.fill().await?;
        }
    }

    pub async fn write(&mut self, data: Bytes) -> Result<(), MmsError> {
        self.io.write(data).await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        if let Err(err) = self.io.shutdown().await {
            log::debug!("shutdown error: {}", err);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use {
        super::MmsTransport,
        async_trait::async_trait,
        bytes::{Bytes, BytesMut},
        bytesio::{
            bytesio::{TNetConnector, TNetIO},
            bytesio_errors::{BytesIOError, BytesIOErrorValue},
        },
        std::{
            collections::VecDeque,
            sync::{Arc, Mutex},
            time::Duration,
        },
    };

    pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send + Sync>;

    /// A peer that answers every write through `responder` and records the
    /// written bytes.
    pub struct ScriptedIO {
        pending: VecDeque<Vec<u8>>,
        responder: Responder,
        pub written: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl ScriptedIO {
        pub fn new(initial: Vec<Vec<u8>>, responder: Responder) -> Self {
            Self {
                pending: initial.into_iter().collect(),
                responder,
                written: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl TNetIO for ScriptedIO {
        async fn write(&mut self, bytes: Bytes) -> Result<(), BytesIOError> {
            self.written.lock().unwrap().push(bytes.to_vec());
            let answers = (self.responder)(&bytes[..]);
            self.pending.extend(answers);
            Ok(())
        }

        async fn read(&mut self) -> Result<BytesMut, BytesIOError> {
            match self.pending.pop_front() {
                Some(data) => Ok(BytesMut::from(&data[..])),
                None => Err(BytesIOError {
                    value: BytesIOErrorValue::NoneReturn,
                }),
            }
        }
    }

    /// Hands out prepared connections in order.
    pub struct ScriptedConnector {
        pub connections: Mutex<VecDeque<ScriptedIO>>,
        pub targets: Arc<Mutex<Vec<(String, u16)>>>,
    }

    impl ScriptedConnector {
        pub fn new(connections: Vec<ScriptedIO>) -> Self {
            Self {
                connections: Mutex::new(connections.into_iter().collect()),
                targets: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl TNetConnector for ScriptedConnector {
        async fn connect(
            &self,
            host: &str,
            port: u16,
            _duration: Duration,
        ) -> Result<Box<dyn TNetIO + Send + Sync>, BytesIOError> {
            self.targets.lock().unwrap().push((host.to_string(), port));
            match self.connections.lock().unwrap().pop_front() {
                Some(io) => Ok(Box::new(io)),
                None => Err(BytesIOError {
                    value: BytesIOErrorValue::NoneReturn,
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_reads_across_chunks() {
        let io = ScriptedIO::new(
            vec![
                b"HTTP/1.0 200 OK\r\nPragma: a".to_vec(),
                b"\r\n\r\nbody".to_vec(),
            ],
            Box::new(|_| Vec::new()),
        );
        let mut transport = MmsTransport::new(Box::new(io), Duration::from_secs(1));

        let head = transport.read_http_head().await.unwrap();
        assert_eq!(&head[..], b"HTTP/1.0 200 OK\r\nPragma: a\r\n\r\n");
        let body = transport.read_exact(4).await.unwrap();
        assert_eq!(&body[..], b"body");
        assert!(transport.read_exact(1).await.is_err());
    }
}
