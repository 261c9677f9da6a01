use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::record::RunRecord;

/// Sink failures are recoverable: the caller still holds the record and
/// may retry or export it by hand.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to serialize run record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write run record: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink rejected run record: {0}")]
    Rejected(String),
}

/// Destination for a finalized run record. Implementations must not take
/// ownership of the record; a failed submit leaves it untouched.
pub trait ExternalSink {
    fn submit(&mut self, record: &RunRecord) -> Result<(), SinkError>;
}

/// Writes each record as pretty JSON to `<dir>/<unique_id>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ExternalSink for JsonFileSink {
    fn submit(&mut self, record: &RunRecord) -> Result<(), SinkError> {
        let path = self.dir.join(format!("{}.json", record.unique_id));
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, record)?;
        writer.flush()?;
        info!(path = %path.display(), trials = record.trials.len(), "run record written");
        Ok(())
    }
}

/// Submit a record, falling back to an in-memory JSON dump on failure so
/// the data survives for retry or manual recovery.
pub fn submit_or_recover<S: ExternalSink>(
    sink: &mut S,
    record: &RunRecord,
) -> Result<(), (SinkError, String)> {
    match sink.submit(record) {
        Ok(()) => Ok(()),
        Err(err) => {
            warn!(%err, unique_id = %record.unique_id, "sink rejected run record; keeping backup");
            let backup = record.to_json().unwrap_or_else(|_| format!("{record:?}"));
            Err((err, backup))
        }
    }
}
