use std::{
    fs::File,
    io,
    sync::{Arc, Mutex, MutexGuard},
};

/// `env_logger` pipe target whose file can be swapped underneath it when
/// the log rotates.
pub struct FileTarget {
    pub cur_file_handler: Arc<Mutex<File>>,
}

impl FileTarget {
    pub fn new(file: File) -> Self {
        Self {
            cur_file_handler: Arc::new(Mutex::new(file)),
        }
    }

    fn file(&self) -> MutexGuard<'_, File> {
        match self.cur_file_handler.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Replaces the file a `FileTarget` writes to.
pub fn swap_file(handler: &Arc<Mutex<File>>, file: File) {
    match handler.lock() {
        Ok(mut current) => *current = file,
        Err(poisoned) => *poisoned.into_inner() = file,
    }
}

impl io::Write for FileTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file().flush()
    }
}
