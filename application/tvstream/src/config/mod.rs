pub mod errors;

use {
    env_logger_extend::logger::Rotate,
    errors::{ConfigError, ConfigErrorValue},
    mms::define::{MmsTimeouts, DEFAULT_BANDWIDTH},
    serde_derive::Deserialize,
    std::{fs, str::FromStr, time::Duration},
    streamhub::define::{
        WorkerConfig, DEFAULT_KEEPALIVE, DEFAULT_RING_BUFFER_SIZE, DEFAULT_SIGNAL_INTERVAL,
    },
    xmpegts::define::DEFAULT_MAX_STREAMS,
};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub mms: Option<MmsConfig>,
    pub demux: Option<DemuxConfig>,
    pub log: Option<LogConfig>,
}

impl Config {
    pub fn new(log_level: String) -> Self {
        Self {
            mms: None,
            demux: None,
            log: Some(LogConfig {
                level: log_level,
                file: None,
            }),
        }
    }

    pub fn mms(&self) -> MmsConfig {
        self.mms.clone().unwrap_or_default()
    }

    pub fn demux(&self) -> DemuxConfig {
        self.demux.clone().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MmsConfig {
    /// Bits per second offered to stream selection.
    pub bandwidth: u32,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for MmsConfig {
    fn default() -> Self {
        let timeouts = MmsTimeouts::default();
        Self {
            bandwidth: DEFAULT_BANDWIDTH,
            connect_timeout_ms: timeouts.connect.as_millis() as u64,
            read_timeout_ms: timeouts.read.as_millis() as u64,
        }
    }
}

impl MmsConfig {
    pub fn timeouts(&self) -> MmsTimeouts {
        MmsTimeouts {
            connect: Duration::from_millis(self.connect_timeout_ms),
            read: Duration::from_millis(self.read_timeout_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DemuxConfig {
    pub max_streams: usize,
    pub keepalive_ms: u64,
    pub signal_interval_ms: u64,
    pub ring_buffer_size: usize,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            max_streams: DEFAULT_MAX_STREAMS,
            keepalive_ms: DEFAULT_KEEPALIVE.as_millis() as u64,
            signal_interval_ms: DEFAULT_SIGNAL_INTERVAL.as_millis() as u64,
            ring_buffer_size: DEFAULT_RING_BUFFER_SIZE,
        }
    }
}

impl DemuxConfig {
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            max_streams: self.max_streams,
            keepalive: Duration::from_millis(self.keepalive_ms),
            signal_interval: Duration::from_millis(self.signal_interval_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub level: String,
    pub file: Option<LogFile>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogFile {
    pub enabled: bool,
    pub rotate: String,
    pub path: String,
}

impl LogConfig {
    /// Rotation and directory of the file target, `None` for stderr.
    pub fn file_target(&self) -> Result<Option<(Rotate, String)>, ConfigError> {
        match &self.file {
            Some(file) if file.enabled => match Rotate::from_str(&file.rotate) {
                Ok(rotate) => Ok(Some((rotate, file.path.clone()))),
                Err(_) => Err(ConfigError {
                    value: ConfigErrorValue::InvalidRotate(file.rotate.clone()),
                }),
            },
            _ => Ok(None),
        }
    }
}

pub fn parse(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

pub fn load(cfg_path: &str) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(cfg_path)?;
    parse(&content)
}

#[cfg(test)]
mod tests {
    use super::{load, parse, Config};
    use env_logger_extend::logger::Rotate;
    use std::time::Duration;

    #[test]
    fn test_full_config() {
        let content = r#"
[mms]
bandwidth = 564000
connect_timeout_ms = 5000

[demux]
max_streams = 8
keepalive_ms = 500

[log]
level = "debug"
[log.file]
enabled = true
rotate = "hour"
path = "./logs"
"#;
        let config = parse(content).unwrap();

        let mms = config.mms();
        assert_eq!(mms.bandwidth, 564000);
        assert_eq!(mms.timeouts().connect, Duration::from_millis(5000));
        assert_eq!(mms.timeouts().read, Duration::from_secs(10));

        let worker = config.demux().worker_config();
        assert_eq!(worker.max_streams, 8);
        assert_eq!(worker.keepalive, Duration::from_millis(500));
        assert_eq!(worker.signal_interval, Duration::from_millis(10000));
        assert_eq!(config.demux().ring_buffer_size, 4 * 1024 * 1024);

        let log = config.log.unwrap();
        assert_eq!(log.level, "debug");
        assert_eq!(
            log.file_target().unwrap(),
            Some((Rotate::Hour, "./logs".to_string()))
        );
    }

    #[test]
    fn test_empty_config() {
        let config = parse("").unwrap();
        assert!(config.log.is_none());
        assert_eq!(config.mms().bandwidth, 1_544_000);
        assert_eq!(config.demux().max_streams, Config::default().demux().max_streams);
    }

    #[test]
    fn test_bad_config() {
        assert!(parse("[mms]\nbandwidth = \"fast\"\n").is_err());

        let config = parse("[log]\nlevel = \"info\"\n[log.file]\nenabled = true\nrotate = \"week\"\npath = \"/tmp\"\n").unwrap();
        assert!(config.log.unwrap().file_target().is_err());

        assert!(load("/nonexistent/tvstream.toml").is_err());
    }
}
