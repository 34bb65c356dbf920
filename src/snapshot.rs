//! Throttled, non-blocking frame snapshots to disk.
//!
//! The pipeline hands over a copy of the raw frame at most once per
//! `min_interval`; a background thread encodes and writes it. If the writer is
//! still busy with the previous frame the new one is dropped.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use image::RgbImage;
use log::{debug, warn};
use time::OffsetDateTime;
use time::format_description::{self, OwnedFormatItem};

use crate::error::{Result, VisionError};

const FILENAME_FORMAT: &str = "[year][month][day]-[hour][minute][second]-[subsecond digits:3]";

pub struct FrameSnapshotter {
    sender: Option<SyncSender<RgbImage>>,
    worker: Option<JoinHandle<()>>,
    min_interval: Duration,
    last_sent: Option<Instant>,
    dropped: u64,
}

impl FrameSnapshotter {
    /// Starts the writer thread; `output_dir` is created if missing.
    pub fn spawn(output_dir: impl Into<PathBuf>, min_interval: Duration) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        let format = format_description::parse_owned::<2>(FILENAME_FORMAT)
            .map_err(|e| VisionError::Snapshot(e.to_string()))?;

        let (sender, receiver) = mpsc::sync_channel::<RgbImage>(1);
        let worker = std::thread::Builder::new()
            .name("frame-snapshots".to_string())
            .spawn(move || write_loop(receiver, &output_dir, &format))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            min_interval,
            last_sent: None,
            dropped: 0,
        })
    }

    /// Offers a frame; returns whether a copy was queued.
    ///
    /// Never waits on the writer.
    pub fn offer(&mut self, frame: &RgbImage) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_sent {
            if now.duration_since(last) < self.min_interval {
                return false;
            }
        }
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(frame.clone()) {
            Ok(()) => {
                self.last_sent = Some(now);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                debug!("Snapshot writer busy, dropped frame ({} total)", self.dropped);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("Snapshot writer stopped, disabling snapshots");
                self.sender = None;
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Stops accepting frames and waits for queued writes to finish.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Snapshot writer panicked");
            }
        }
    }
}

impl Drop for FrameSnapshotter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn write_loop(receiver: Receiver<RgbImage>, output_dir: &Path, format: &OwnedFormatItem) {
    let mut sequence: u64 = 0;
    for frame in receiver {
        sequence += 1;
        let stamp = OffsetDateTime::now_utc()
            .format(format)
            .unwrap_or_else(|_| "unknown".to_string());
        let path = output_dir.join(format!("snapshot_{}_{:05}.png", stamp, sequence));
        match frame.save(&path) {
            Ok(()) => debug!("Saved snapshot {}", path.display()),
            Err(e) => warn!("Failed to save snapshot {}: {}", path.display(), e),
        }
    }
}
