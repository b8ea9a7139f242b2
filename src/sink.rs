//! Persistence sinks. The core treats persistence as an opaque synchronous
//! call; retry policy, if any, belongs to the sink implementation.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// Destination for finished log records. One call per record; each record
/// is a single line without its trailing newline.
pub trait PersistSink {
    fn persist(&self, record: &str) -> io::Result<()>;
}

/// Appends each record as one line to a file.
#[derive(Debug)]
pub struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    /// Open (or create) the log file in append mode.
    pub fn open(path: impl AsRef<Path>) -> io::Result<FileSink> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FileSink { file: Mutex::new(file) })
    }
}

impl PersistSink for FileSink {
    fn persist(&self, record: &str) -> io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(record.as_bytes())?;
        file.write_all(b"\n")
    }
}

/// Collects records in memory. Useful in tests and for buffering setups.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    /// All records persisted so far, in order.
    pub fn records(&self) -> Vec<String> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl PersistSink for MemorySink {
    fn persist(&self, record: &str) -> io::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.to_string());
        Ok(())
    }
}
