use {
    super::define::{MMSH_CLIENT_GUID, MMSH_USER_AGENT},
    indexmap::IndexMap,
};

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub version: String,
    pub status_code: u16,
    pub reason_phrase: String,
    pub headers: IndexMap<String, String>,
}

impl HttpResponse {
    /// Parses a status line and headers. Repeated headers are folded into
    /// one comma separated value.
    pub fn unmarshal(response_data: &str) -> Option<Self> {
        let mut response = HttpResponse::default();
        let head = match response_data.find("\r\n\r\n") {
            Some(idx) => &response_data[..idx],
            None => response_data,
        };
        let mut lines = head.lines();

        let first_line = lines.next()?;
        let mut fields = first_line.split_ascii_whitespace();
        response.version = fields.next()?.to_string();
        if !response.version.starts_with("HTTP/") {
            return None;
        }
        response.status_code = fields.next()?.parse::<u16>().ok()?;
        response.reason_phrase = fields.collect::<Vec<&str>>().join(" ");

        for line in lines {
            if let Some(index) = line.find(':') {
                let name = line[..index].trim().to_ascii_lowercase();
                let value = line[index + 1..].trim().to_string();
                match response.headers.get_mut(&name) {
                    Some(existing) => {
                        existing.push_str(", ");
                        existing.push_str(&value);
                    }
                    None => {
                        response.headers.insert(name, value);
                    }
                }
            }
        }

        Some(response)
    }

    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Value of `features=` in the pragma headers, quotes removed.
    pub fn features(&self) -> Option<String> {
        let pragma = self.get_header("Pragma")?;
        let start = pragma.find("features=")? + "features=".len();
        let rest = &pragma[start..];
        let value = match rest.strip_prefix('"') {
            Some(quoted) => quoted.split('"').next().unwrap_or(""),
            None => rest.split(',').next().unwrap_or(""),
        };
        Some(value.trim().to_string())
    }
}

/// The three request shapes of the http variant.
#[derive(Debug, Clone)]
pub enum MmshRequest {
    /// Fetches the header only.
    Describe,
    Seekable {
        stream_time_ms: u32,
        stream_offset: u64,
        max_duration: u32,
    },
    Live,
}

impl MmshRequest {
    pub fn marshal(
        &self,
        path: &str,
        host: &str,
        port: u16,
        request_context: u32,
        switch_count: usize,
        switch_entries: &str,
    ) -> String {
        let mut request = format!(
            "GET {path} HTTP/1.0\r\nAccept: */*\r\nUser-Agent: {MMSH_USER_AGENT}\r\nHost: {host}:{port}\r\n"
        );
        match self {
            MmshRequest::Describe => {
                request += &format!(
                    "Pragma: no-cache,rate=1.000000,stream-time=0,stream-offset=0:0,request-context={request_context},max-duration=0\r\n"
                );
                request += &format!("Pragma: xClientGUID={MMSH_CLIENT_GUID}\r\n");
            }
            MmshRequest::Seekable {
                stream_time_ms,
                stream_offset,
                max_duration,
            } => {
                request += &format!(
                    "Pragma: no-cache,rate=1.000000,stream-time={},stream-offset={}:{},request-context={},max-duration={}\r\n",
                    stream_time_ms,
                    stream_offset >> 32,
                    stream_offset & 0xFFFF_FFFF,
                    request_context,
                    max_duration
                );
                request += &format!("Pragma: xClientGUID={MMSH_CLIENT_GUID}\r\n");
                request += "Pragma: xPlayStrm=1\r\n";
                request += &format!("Pragma: stream-switch-count={switch_count}\r\n");
                request += &format!("Pragma: stream-switch-entry={switch_entries}\r\n");
            }
            MmshRequest::Live => {
                request += &format!(
                    "Pragma: no-cache,rate=1.000000,request-context={request_context}\r\n"
                );
                request += "Pragma: xPlayStrm=1\r\n";
                request += &format!("Pragma: xClientGUID={MMSH_CLIENT_GUID}\r\n");
                request += &format!("Pragma: stream-switch-count={switch_count}\r\n");
                request += &format!("Pragma: stream-switch-entry={switch_entries}\r\n");
            }
        }
        request += "Connection: Close\r\n\r\n";
        request
    }
}

#[cfg(test)]
mod tests {
    use super::{HttpResponse, MmshRequest};

    #[test]
    fn test_unmarshal_response() {
        let data = "HTTP/1.0 200 OK\r\nContent-Type: application/vnd.ms.wms-hdr.asfv1\r\nPragma: no-cache,client-id=3320437311\r\nPragma: features=\"seekable,stridable\"\r\n\r\n";
        let response = HttpResponse::unmarshal(data).unwrap();

        assert_eq!(response.status_code, 200);
        assert!(response.is_success());
        assert_eq!(response.headers.len(), 2);
        assert_eq!(response.features().unwrap(), "seekable,stridable");
        assert_eq!(
            response.get_header("content-type").unwrap(),
            "application/vnd.ms.wms-hdr.asfv1"
        );

        let response = HttpResponse::unmarshal("HTTP/1.1 404 Not Found\r\n\r\n").unwrap();
        assert_eq!(response.reason_phrase, "Not Found");
        assert!(!response.is_success());
        assert!(response.features().is_none());

        assert!(HttpResponse::unmarshal("garbage\r\n\r\n").is_none());
    }

    #[test]
    fn test_marshal_requests() {
        let request = MmshRequest::Describe.marshal("/a.asf", "host", 80, 1, 0, "");
        assert!(request.starts_with("GET /a.asf HTTP/1.0\r\n"));
        assert!(request.contains("Host: host:80\r\n"));
        assert!(request.contains("request-context=1,max-duration=0\r\n"));
        assert!(!request.contains("xPlayStrm"));
        assert!(request.ends_with("Connection: Close\r\n\r\n"));

        let request = MmshRequest::Seekable {
            stream_time_ms: 3100,
            stream_offset: (1 << 32) + 6000,
            max_duration: 0,
        }
        .marshal("/a.asf", "host", 80, 2, 2, "ffff:1:0 ffff:2:2 ");
        assert!(request.contains("stream-time=3100,stream-offset=1:6000,request-context=2"));
        assert!(request.contains("Pragma: stream-switch-count=2\r\n"));
        assert!(request.contains("Pragma: stream-switch-entry=ffff:1:0 ffff:2:2 \r\n"));

        let request = MmshRequest::Live.marshal("/live", "host", 8080, 3, 1, "ffff:1:0 ");
        assert!(request.contains("Pragma: no-cache,rate=1.000000,request-context=3\r\n"));
        assert!(request.contains("Pragma: xPlayStrm=1\r\n"));
    }
}
