use {
    super::{
        define::{CMD_BODY_LEN, MMSH_PORT, MMST_PORT},
        errors::{MmsError, MmsErrorValue},
    },
    url::Url,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Http,
}

impl Transport {
    pub fn accepts(&self, scheme: &str) -> bool {
        let scheme = scheme.to_ascii_lowercase();
        match self {
            Transport::Tcp => scheme == "mms" || scheme == "mmst",
            Transport::Http => scheme == "mms" || scheme == "mmsh",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Transport::Tcp => MMST_PORT,
            Transport::Http => MMSH_PORT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MmsUrl {
    pub raw: String,
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    /// Path without the leading slash, followed by the query if any.
    pub media_path: String,
}

impl MmsUrl {
    pub fn parse(raw: &str) -> Result<Self, MmsError> {
        let url = Url::parse(raw)?;

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => {
                return Err(MmsError {
                    value: MmsErrorValue::MissingHost,
                })
            }
        };

        let mut media_path = url.path().trim_start_matches('/').to_string();
        if let Some(query) = url.query() {
            media_path += "?";
            media_path += query;
        }

        Ok(Self {
            raw: raw.to_string(),
            scheme: url.scheme().to_ascii_lowercase(),
            host,
            port: url.port(),
            media_path,
        })
    }

    pub fn check_transport(&self, transport: Transport) -> Result<(), MmsError> {
        if !transport.accepts(&self.scheme) {
            return Err(MmsError {
                value: MmsErrorValue::UnsupportedProtocol(self.scheme.clone()),
            });
        }
        if transport == Transport::Tcp && self.media_path.len() >= CMD_BODY_LEN - 64 {
            return Err(MmsError {
                value: MmsErrorValue::UrlTooLong,
            });
        }
        Ok(())
    }

    pub fn port_for(&self, transport: Transport) -> u16 {
        self.port.unwrap_or_else(|| transport.default_port())
    }

    /// Absolute path used in http requests.
    pub fn http_path(&self) -> String {
        format!("/{}", self.media_path)
    }
}

#[cfg(test)]
mod tests {
    use super::{MmsUrl, Transport};

    #[test]
    fn test_parse() {
        let url = MmsUrl::parse("mms://media.example.com/live/tv1.wmv?key=1").unwrap();
        assert_eq!(url.scheme, "mms");
        assert_eq!(url.host, "media.example.com");
        assert_eq!(url.media_path, "live/tv1.wmv?key=1");
        assert_eq!(url.http_path(), "/live/tv1.wmv?key=1");
        assert_eq!(url.port_for(Transport::Tcp), 1755);
        assert_eq!(url.port_for(Transport::Http), 80);

        let url = MmsUrl::parse("MMSH://10.0.0.1:8080/a.asf").unwrap();
        assert_eq!(url.port_for(Transport::Http), 8080);
    }

    #[test]
    fn test_transport_check() {
        let url = MmsUrl::parse("mmsh://host/a.asf").unwrap();
        assert!(url.check_transport(Transport::Http).is_ok());
        assert!(url.check_transport(Transport::Tcp).is_err());

        let url = MmsUrl::parse("mmst://host/a.asf").unwrap();
        assert!(url.check_transport(Transport::Tcp).is_ok());
        assert!(url.check_transport(Transport::Http).is_err());

        assert!(MmsUrl::parse("http://host/a.asf")
            .unwrap()
            .check_transport(Transport::Tcp)
            .is_err());
        assert!(MmsUrl::parse("not a url").is_err());
    }
}
