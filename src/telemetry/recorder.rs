//! JSONL telemetry recorder with file rotation and retention.
//!
//! Each line is one [`TelemetrySnapshot`] with a `timestamp` field. A new file
//! is started after `max_records_per_file` lines, and only the newest
//! `max_files_to_keep` files survive a rotation.

use chrono::Local;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::state::TelemetrySnapshot;
use crate::config::TelemetryConfig;
use crate::error::Result;

const FILE_PREFIX: &str = "telemetry_";
const FILE_SUFFIX: &str = ".jsonl";

#[derive(Serialize)]
struct TelemetryRecord<'a> {
    timestamp: String,
    #[serde(flatten)]
    snapshot: &'a TelemetrySnapshot,
}

/// Writes telemetry snapshots to rotating JSONL files
pub struct TelemetryRecorder {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    records_in_file: usize,
    sequence: u64,
}

impl TelemetryRecorder {
    /// Create a recorder writing into `dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P, max_records_per_file: usize, max_files_to_keep: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer: None,
            records_in_file: 0,
            sequence: 0,
        })
    }

    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        Self::new(&config.log_dir, config.max_records_per_file, config.max_files_to_keep)
    }

    /// Append one snapshot, rotating first if the current file is full.
    pub fn record(&mut self, snapshot: &TelemetrySnapshot) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let record = TelemetryRecord {
            timestamp: Local::now().to_rfc3339(),
            snapshot,
        };
        let line = serde_json::to_string(&record)?;

        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            self.records_in_file += 1;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;

        let name = format!(
            "{}{}_{:06}{}",
            FILE_PREFIX,
            Local::now().format("%Y%m%d_%H%M%S"),
            self.sequence,
            FILE_SUFFIX
        );
        self.sequence += 1;

        let path = self.dir.join(name);
        debug!("Opening telemetry file {}", path.display());
        self.writer = Some(BufWriter::new(File::create(&path)?));
        self.records_in_file = 0;

        self.prune()
    }

    /// Remove the oldest telemetry files beyond the retention count
    fn prune(&self) -> Result<()> {
        let mut files: Vec<PathBuf> = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX) {
                    files.push(path);
                }
            }
        }

        // Names embed timestamp then sequence, so lexical order is age order
        files.sort();

        if files.len() > self.max_files_to_keep {
            let excess = files.len() - self.max_files_to_keep;
            for path in files.iter().take(excess) {
                if let Err(e) = fs::remove_file(path) {
                    warn!("Failed to remove old telemetry file {}: {}", path.display(), e);
                }
            }
        }

        Ok(())
    }

    /// Run a file operation on the blocking pool and hand the recorder back.
    ///
    /// Returns `None` only if the blocking task itself died.
    async fn offload<F>(self, op: F) -> Option<Self>
    where
        F: FnOnce(&mut Self) -> Result<()> + Send + 'static,
    {
        let outcome = tokio::task::spawn_blocking(move || {
            let mut recorder = self;
            let result = op(&mut recorder);
            (recorder, result)
        })
        .await;

        match outcome {
            Ok((recorder, result)) => {
                if let Err(e) = result {
                    warn!("Telemetry write failed: {}", e);
                }
                Some(recorder)
            }
            Err(e) => {
                warn!("Telemetry writer task failed: {}", e);
                None
            }
        }
    }

    /// Sample `changes` every `interval` and record it when it has changed,
    /// until `shutdown` flips to true or its sender is dropped.
    ///
    /// File IO runs on the blocking pool, one sample at a time.
    pub async fn run(
        self,
        mut changes: watch::Receiver<TelemetrySnapshot>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Telemetry recorder writing to {}", self.dir.display());
        let mut ticker = tokio::time::interval(interval);
        let mut recorder = self;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if changes.has_changed().unwrap_or(false) {
                        let snapshot = changes.borrow_and_update().clone();
                        let Some(next) = recorder.offload(move |r| r.record(&snapshot)).await else {
                            return;
                        };
                        recorder = next;
                    }
                }
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if recorder.offload(|r| r.flush()).await.is_some() {
            info!("Telemetry recorder stopped");
        }
    }
}
