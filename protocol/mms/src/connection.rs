use {
    super::{
        define::MmsTimeouts,
        errors::{MmsError, MmsErrorValue},
        mmsh::MmshSession,
        mmst::MmstSession,
        session::TMmsSession,
        uri::MmsUrl,
    },
    bytesio::bytesio::TNetConnector,
    std::{io::SeekFrom, sync::Arc},
};

/// An open mms stream on either transport.
pub enum MmsConnection {
    Mmst(MmstSession),
    Mmsh(MmshSession),
}

impl MmsConnection {
    /// Opens `url`. `mmst://` and `mmsh://` pick the transport, plain
    /// `mms://` tries tcp first and falls back to http.
    pub async fn connect(
        connector: Arc<dyn TNetConnector>,
        url: &str,
        bandwidth: u32,
        timeouts: MmsTimeouts,
    ) -> Result<Self, MmsError> {
        let url = MmsUrl::parse(url)?;

        match url.scheme.as_str() {
            "mmst" => Ok(MmsConnection::Mmst(
                MmstSession::connect(connector.as_ref(), &url, bandwidth, timeouts).await?,
            )),
            "mmsh" => Ok(MmsConnection::Mmsh(
                MmshSession::connect(connector, &url, bandwidth, timeouts).await?,
            )),
            "mms" => {
                match MmstSession::connect(connector.as_ref(), &url, bandwidth, timeouts).await {
                    Ok(session) => return Ok(MmsConnection::Mmst(session)),
                    Err(err) => log::warn!("mmst failed ({}), trying mmsh", err),
                }
                Ok(MmsConnection::Mmsh(
                    MmshSession::connect(connector, &url, bandwidth, timeouts).await?,
                ))
            }
            other => Err(MmsError {
                value: MmsErrorValue::UnsupportedProtocol(other.to_string()),
            }),
        }
    }

    fn session(&self) -> &dyn TMmsSession {
        match self {
            MmsConnection::Mmst(session) => session,
            MmsConnection::Mmsh(session) => session,
        }
    }

    fn session_mut(&mut self) -> &mut dyn TMmsSession {
        match self {
            MmsConnection::Mmst(session) => session,
            MmsConnection::Mmsh(session) => session,
        }
    }

    pub fn transport_name(&self) -> &'static str {
        match self {
            MmsConnection::Mmst(_) => "mmst",
            MmsConnection::Mmsh(_) => "mmsh",
        }
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, MmsError> {
        self.session_mut().read(buf).await
    }

    pub async fn seek(&mut self, pos: SeekFrom) -> Result<u64, MmsError> {
        self.session_mut().seek(pos).await
    }

    pub async fn time_seek(&mut self, time_sec: f64) -> Result<bool, MmsError> {
        self.session_mut().time_seek(time_sec).await
    }

    pub fn peek_header(&self, buf: &mut [u8]) -> usize {
        self.session().peek_header(buf)
    }

    pub fn length(&self) -> u64 {
        self.session().length()
    }

    pub fn current_pos(&self) -> u64 {
        self.session().current_pos()
    }

    pub fn time_length(&self) -> f64 {
        self.session().time_length()
    }

    pub fn raw_time_length(&self) -> u64 {
        self.session().raw_time_length()
    }

    pub fn asf_header_len(&self) -> usize {
        self.session().asf_header_len()
    }

    pub fn asf_packet_len(&self) -> usize {
        self.session().asf_packet_len()
    }

    pub fn seekable(&self) -> bool {
        self.session().seekable()
    }

    pub async fn close(mut self) {
        self.session_mut().shutdown().await;
    }
}
