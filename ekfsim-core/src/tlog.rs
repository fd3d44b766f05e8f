//! Telemetry log (.tlog) writing and reading
//!
//! A log is a plain sequence of records, each an 8 byte big-endian
//! microsecond timestamp followed by one MAVLink frame exactly as it went
//! over the wire. There is no length prefix; record boundaries come from the
//! MAVLink framing itself.

use crate::codec::{self, Scan};
use chrono::Utc;
use mavlink::ardupilotmega::MavMessage;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const TIMESTAMP_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum TlogError {
    #[error("refusing to log an empty payload")]
    EmptyPayload,

    #[error("log write failed: {0}")]
    Io(#[from] io::Error),

    #[error("truncated record at byte offset {offset}")]
    Truncated { offset: usize },
}

/// One record as stored on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp_usec: u64,
    pub payload: Vec<u8>,
}

/// Microseconds since the Unix epoch, from the wall clock
pub fn now_usec() -> u64 {
    Utc::now().timestamp_micros().max(0) as u64
}

/// Append-only log sink. Every write is flushed before returning.
pub struct TlogWriter {
    path: PathBuf,
    file: BufWriter<File>,
    records: u64,
}

impl TlogWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, TlogError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            file: BufWriter::new(file),
            records: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Write `payload` stamped with the current wall-clock time.
    pub fn write(&mut self, payload: &[u8]) -> Result<(), TlogError> {
        self.write_at(now_usec(), payload)
    }

    pub fn write_at(&mut self, timestamp_usec: u64, payload: &[u8]) -> Result<(), TlogError> {
        if payload.is_empty() {
            return Err(TlogError::EmptyPayload);
        }

        self.file.write_all(&timestamp_usec.to_be_bytes())?;
        self.file.write_all(payload)?;
        self.file.flush()?;
        self.records += 1;
        Ok(())
    }
}

/// Split raw log bytes back into records.
pub fn read_records(bytes: &[u8]) -> Result<Vec<LogRecord>, TlogError> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let (timestamp_usec, frame_start) = read_timestamp(bytes, offset)?;
        match codec::scan_frame(&bytes[frame_start..]) {
            Scan::Frame { skip: 0, len } => {
                records.push(LogRecord {
                    timestamp_usec,
                    payload: bytes[frame_start..frame_start + len].to_vec(),
                });
                offset = frame_start + len;
            }
            _ => return Err(TlogError::Truncated { offset }),
        }
    }

    Ok(records)
}

fn read_timestamp(bytes: &[u8], offset: usize) -> Result<(u64, usize), TlogError> {
    let end = offset + TIMESTAMP_LEN;
    let raw: [u8; TIMESTAMP_LEN] = bytes
        .get(offset..end)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(TlogError::Truncated { offset })?;
    Ok((u64::from_be_bytes(raw), end))
}

/// A previously captured message together with its capture time
#[derive(Debug, Clone)]
pub struct RecordedItem {
    /// Seconds since the Unix epoch
    pub capture_timestamp: f64,
    pub message: MavMessage,
}

/// Iterates the decodable messages of a recorded log, in file order.
///
/// Garbage between records, including frames that fail their checksum, is
/// skipped by re-synchronising on the next timestamp/frame pair. Frames that
/// pass the checksum but cannot be parsed are dropped with a warning.
pub struct TlogReader {
    bytes: Vec<u8>,
    offset: usize,
    skipped: usize,
}

impl TlogReader {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::from_bytes(std::fs::read(path)?))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            offset: 0,
            skipped: 0,
        }
    }

    /// Frames dropped so far because their message could not be parsed
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn resync(&mut self) {
        debug!("resynchronising log at byte {}", self.offset);
        self.offset += 1;
    }

    fn finish(&mut self) {
        if self.offset < self.bytes.len() {
            warn!(
                "ignoring {} trailing bytes in log",
                self.bytes.len() - self.offset
            );
        }
        self.offset = self.bytes.len();
    }

    /// Next record whose frame starts right after its timestamp. A candidate
    /// that fails its checksum only costs one byte of resynchronisation, so a
    /// stray magic byte never swallows the records behind it.
    fn next_frame(&mut self) -> Option<(u64, &[u8])> {
        loop {
            let Ok((timestamp_usec, frame_start)) = read_timestamp(&self.bytes, self.offset)
            else {
                self.finish();
                return None;
            };
            match codec::find_frame(&self.bytes[frame_start..]) {
                Scan::Frame { skip: 0, len } => {
                    self.offset = frame_start + len;
                    return Some((timestamp_usec, &self.bytes[frame_start..frame_start + len]));
                }
                Scan::Frame { .. } | Scan::Incomplete { .. } => self.resync(),
                Scan::Garbage => {
                    self.finish();
                    return None;
                }
            }
        }
    }
}

impl Iterator for TlogReader {
    type Item = RecordedItem;

    fn next(&mut self) -> Option<RecordedItem> {
        loop {
            let (timestamp_usec, frame) = self.next_frame()?;
            match codec::decode(frame) {
                Ok((_, message)) => {
                    return Some(RecordedItem {
                        capture_timestamp: timestamp_usec as f64 / 1.0e6,
                        message,
                    });
                }
                Err(e) => {
                    self.skipped += 1;
                    warn!("skipping recorded frame: {}", e);
                }
            }
        }
    }
}
