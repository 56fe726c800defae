//! Servo sinks - where the target hands converted snapshots
//!
//! A converted snapshot carries pulse widths in microseconds. The
//! [`SchedulerSink`] turns it into a pulse table for the in-process
//! scheduler; the [`DeviceFileSink`] writes the record array to a character
//! device whose kernel driver does the pulsing.

use crate::pulse::{PinMap, PulseTable, SharedPulseTable};
use crate::snapshot::ChannelSnapshot;
use crate::transport::wire;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("device accepted {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// The consumer behind the sink has stopped
    #[error("sink closed")]
    Closed,
}

pub trait ServoSink: Send {
    /// Takes a converted snapshot; the new widths apply from the next period.
    fn write(
        &mut self,
        converted: &ChannelSnapshot,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// The sink a target was configured with
#[derive(Debug)]
pub enum OutputSink {
    Scheduler(SchedulerSink),
    Device(DeviceFileSink),
}

impl ServoSink for OutputSink {
    async fn write(&mut self, converted: &ChannelSnapshot) -> Result<(), SinkError> {
        match self {
            Self::Scheduler(sink) => sink.write(converted).await,
            Self::Device(sink) => sink.write(converted).await,
        }
    }
}

impl From<SchedulerSink> for OutputSink {
    fn from(sink: SchedulerSink) -> Self {
        Self::Scheduler(sink)
    }
}

impl From<DeviceFileSink> for OutputSink {
    fn from(sink: DeviceFileSink) -> Self {
        Self::Device(sink)
    }
}

/// Publishes pulse tables to the in-process scheduler
#[derive(Debug, Clone)]
pub struct SchedulerSink {
    table: SharedPulseTable,
    pins: PinMap,
    max_width_us: u32,
    cancel: CancellationToken,
}

impl SchedulerSink {
    /// `cancel` is the scheduler's token; once it fires writes fail.
    pub fn new(
        table: SharedPulseTable,
        pins: PinMap,
        max_width_us: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            table,
            pins,
            max_width_us,
            cancel,
        }
    }
}

impl ServoSink for SchedulerSink {
    async fn write(&mut self, converted: &ChannelSnapshot) -> Result<(), SinkError> {
        if self.cancel.is_cancelled() {
            return Err(SinkError::Closed);
        }
        let table = PulseTable::plan(converted, &self.pins, self.max_width_us);
        debug!("Publishing pulse table with {} pulses", table.len());
        self.table.publish(table);
        Ok(())
    }
}

/// Writes the encoded record array to a write-only servo device
#[derive(Debug)]
pub struct DeviceFileSink {
    file: File,
    path: PathBuf,
}

impl DeviceFileSink {
    pub async fn open(path: &Path) -> Result<Self, SinkError> {
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(path)
            .await
            .map_err(|source| SinkError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Writing servo records to {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl ServoSink for DeviceFileSink {
    async fn write(&mut self, converted: &ChannelSnapshot) -> Result<(), SinkError> {
        let bytes = wire::encode(converted);
        // one write per snapshot, the driver takes the whole array at once
        let written = self
            .file
            .write(&bytes)
            .await
            .map_err(|source| SinkError::Write {
                path: self.path.clone(),
                source,
            })?;
        if written != bytes.len() {
            return Err(SinkError::ShortWrite {
                written,
                expected: bytes.len(),
            });
        }
        // the write runs on the blocking pool until flushed
        self.file.flush().await.map_err(|source| SinkError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
