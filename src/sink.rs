use std::path::Path;
use std::time::SystemTime;
use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::device::types::TelemetryEvent;
use crate::error::SinkError;

/// Receives every successfully decoded telemetry event.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn append(&self, event: &TelemetryEvent) -> Result<(), SinkError>;
}

/// Appends one timestamped line per event to a text file.
pub struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    pub async fn open(path: &Path) -> Result<Self, SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        Ok(FileSink { file: Mutex::new(file) })
    }
}

pub fn format_line(timestamp: SystemTime, event: &TelemetryEvent) -> String {
    format!("{} - {}\n", humantime::format_rfc3339(timestamp), event)
}

#[async_trait]
impl TelemetrySink for FileSink {
    async fn append(&self, event: &TelemetryEvent) -> Result<(), SinkError> {
        let line = format_line(SystemTime::now(), event);

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
