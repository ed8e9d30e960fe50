use {
    super::target::{swap_file, FileTarget},
    anyhow::{anyhow, Result},
    chrono::prelude::*,
    env_logger::{Builder, Env, Target},
    job_scheduler_ng::{Job, JobScheduler, Schedule},
    std::{
        fs,
        fs::{File, OpenOptions},
        path::{Path, PathBuf},
        str::FromStr,
        sync::mpsc::{channel, Receiver, Sender},
        thread,
        time::Duration,
    },
};

const LOG_FILE_PREFIX: &str = "tvstream";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rotate {
    Day,
    Hour,
    Minute,
}

impl Rotate {
    // sec min hour day month weekday
    fn schedule_rule(&self) -> &'static str {
        match self {
            Rotate::Minute => "0 * * * * *",
            Rotate::Hour => "0 0 * * * *",
            Rotate::Day => "0 0 0 * * *",
        }
    }
}

impl FromStr for Rotate {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Rotate, Self::Err> {
        match input {
            "day" => Ok(Rotate::Day),
            "hour" => Ok(Rotate::Hour),
            "minute" => Ok(Rotate::Minute),
            _ => Err(anyhow!("unknown log rotation: {}", input)),
        }
    }
}

/// Name of the log file covering `time`, truncated to the rotation period.
pub fn log_file_name<Tz: TimeZone>(rotate: Rotate, time: &DateTime<Tz>) -> String {
    let (hour, minute) = match rotate {
        Rotate::Day => (0, 0),
        Rotate::Hour => (time.hour(), 0),
        Rotate::Minute => (time.hour(), time.minute()),
    };
    format!(
        "{}-{}{:02}{:02}{:02}{:02}.log",
        LOG_FILE_PREFIX,
        time.year(),
        time.month(),
        time.day(),
        hour,
        minute
    )
}

/// Opens the log file for the current period, appending when it exists.
pub fn open_log_file(rotate: Rotate, dir: &Path) -> Result<File> {
    let full_path = dir.join(log_file_name(rotate, &Local::now()));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(full_path)?;
    Ok(file)
}

fn run_rotation(
    target: FileTarget,
    rotate: Rotate,
    dir: PathBuf,
    schedule: Schedule,
    stop: Receiver<()>,
) {
    let handler = target.cur_file_handler;
    thread::spawn(move || {
        let mut sched = JobScheduler::new();
        sched.add(Job::new(schedule, || match open_log_file(rotate, &dir) {
            Ok(file) => swap_file(&handler, file),
            Err(err) => eprintln!("cannot rotate log file in {}: {}", dir.display(), err),
        }));

        loop {
            sched.tick();
            if stop.recv_timeout(Duration::from_millis(500)).is_ok() {
                return;
            }
        }
    });
}

/// Keeps the rotation thread of a file logger alive.
#[derive(Default)]
pub struct Logger {
    close_sender: Option<Sender<()>>,
}

impl Logger {
    /// Installs the global logger. Without both `rotate` and `path` logs go
    /// to stderr, `RUST_LOG` overrides `level`.
    pub fn new(level: &str, rotate: Option<Rotate>, path: Option<String>) -> Result<Logger> {
        let env = Env::default().default_filter_or(level);

        let (rotate, path) = match (rotate, path) {
            (Some(rotate), Some(path)) => (rotate, PathBuf::from(path)),
            _ => {
                Builder::from_env(env).try_init()?;
                return Ok(Self::default());
            }
        };

        fs::create_dir_all(&path)?;
        let schedule: Schedule = rotate
            .schedule_rule()
            .parse()
            .map_err(|err| anyhow!("bad rotation schedule: {:?}", err))?;

        let file = open_log_file(rotate, &path)?;
        let target = FileTarget::new(file);
        let rotating = FileTarget {
            cur_file_handler: target.cur_file_handler.clone(),
        };

        Builder::from_env(env.write_style_or("RUST_LOG_STYLE", "never"))
            .target(Target::Pipe(Box::new(target)))
            .try_init()?;
        log::info!("logging to {}, rotate every {:?}", path.display(), rotate);

        let (sender, receiver) = channel();
        run_rotation(rotating, rotate, path, schedule, receiver);

        Ok(Self {
            close_sender: Some(sender),
        })
    }

    pub fn stop(&self) {
        if let Some(sender) = &self.close_sender {
            //the thread may already be gone
            let _ = sender.send(());
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::{log_file_name, open_log_file, Rotate};
    use chrono::{TimeZone, Utc};
    use std::fs;
    use std::io::Write;

    #[test]
    fn test_rotate_names() {
        let time = Utc.with_ymd_and_hms(2024, 3, 9, 7, 45, 12).unwrap();
        assert_eq!(
            log_file_name(Rotate::Day, &time),
            "tvstream-202403090000.log"
        );
        assert_eq!(
            log_file_name(Rotate::Hour, &time),
            "tvstream-202403090700.log"
        );
        assert_eq!(
            log_file_name(Rotate::Minute, &time),
            "tvstream-202403090745.log"
        );
    }

    #[test]
    fn test_parse_rotate() {
        assert_eq!("hour".parse::<Rotate>().unwrap(), Rotate::Hour);
        assert!("weekly".parse::<Rotate>().is_err());
    }

    #[test]
    fn test_open_appends() {
        let dir = std::env::temp_dir().join(format!("tvstream-logger-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        open_log_file(Rotate::Day, &dir)
            .unwrap()
            .write_all(b"first\n")
            .unwrap();
        open_log_file(Rotate::Day, &dir)
            .unwrap()
            .write_all(b"second\n")
            .unwrap();

        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let path = entries[0].as_ref().unwrap().path();
        assert_eq!(fs::read_to_string(path).unwrap(), "first\nsecond\n");
        fs::remove_dir_all(&dir).unwrap();
    }
}
