//! Stabilization data file.
//!
//! The file is a single protobuf message, field-compatible with existing
//! stabilization data files:
//!
//! ```text
//! message Frame {
//!   uint64 id = 1;
//!   float dx = 2; float dy = 3; float da = 4;
//!   float x = 5;  float y = 6;  float a = 7;
//! }
//! message Stabilization {
//!   repeated Frame frame = 1;
//!   google.protobuf.Timestamp last_updated = 2;
//! }
//! ```
//!
//! Values are stored as `f32`, so a round trip is exact only to single
//! precision. Unknown fields are skipped and missing fields read as zero.

use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use prost::Message;
use steadyframe_common::error::SteadyError;

use crate::data::StabilizationData;
use crate::motion::{CameraTrajectory, CorrectiveTransform};

/// Conventional extension for stabilization data files.
pub const STABILIZATION_FILE_EXTENSION: &str = "data";

/// One frame record in the stabilization data file.
#[derive(Clone, PartialEq, Message)]
pub struct FrameRecord {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(float, tag = "2")]
    pub dx: f32,
    #[prost(float, tag = "3")]
    pub dy: f32,
    #[prost(float, tag = "4")]
    pub da: f32,
    #[prost(float, tag = "5")]
    pub x: f32,
    #[prost(float, tag = "6")]
    pub y: f32,
    #[prost(float, tag = "7")]
    pub a: f32,
}

/// Top-level message of the stabilization data file.
#[derive(Clone, PartialEq, Message)]
pub struct StabilizationRecord {
    #[prost(message, repeated, tag = "1")]
    pub frame: Vec<FrameRecord>,
    #[prost(message, optional, tag = "2")]
    pub last_updated: Option<prost_types::Timestamp>,
}

/// Errors that can occur when reading or writing stabilization data files.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Stabilization data file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed stabilization data in {path}: {source}")]
    DecodeError {
        path: PathBuf,
        source: prost::DecodeError,
    },
}

impl From<StoreError> for SteadyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { path } => SteadyError::FileNotFound { path },
            other => SteadyError::store(other.to_string()),
        }
    }
}

impl StabilizationData {
    /// Encode into the file's message, stamped with `last_updated`.
    pub fn to_record(&self, last_updated: DateTime<Utc>) -> StabilizationRecord {
        let frame = self
            .iter()
            .map(|(id, f)| FrameRecord {
                id,
                dx: f.transform.dx as f32,
                dy: f.transform.dy as f32,
                da: f.transform.da as f32,
                x: f.trajectory.x as f32,
                y: f.trajectory.y as f32,
                a: f.trajectory.a as f32,
            })
            .collect();

        StabilizationRecord {
            frame,
            last_updated: Some(prost_types::Timestamp {
                seconds: last_updated.timestamp(),
                nanos: 0,
            }),
        }
    }

    /// Decode from the file's message.
    ///
    /// Records are keyed by their `id` field; their order is irrelevant.
    /// When an id repeats, the later record wins.
    pub fn from_record(record: StabilizationRecord) -> Self {
        let mut data = StabilizationData::new();

        for frame in record.frame {
            let previous = data.insert(
                frame.id,
                CameraTrajectory::new(frame.x.into(), frame.y.into(), frame.a.into()),
                CorrectiveTransform::new(frame.dx.into(), frame.dy.into(), frame.da.into()),
            );
            if previous.is_some() {
                tracing::warn!(frame = frame.id, "Duplicate frame record, keeping the later one");
            }
        }

        data.last_updated = record
            .last_updated
            .and_then(|ts| DateTime::from_timestamp(ts.seconds, ts.nanos.max(0) as u32));
        data
    }

    /// Serialize to bytes, stamped with `last_updated`.
    pub fn to_bytes(&self, last_updated: DateTime<Utc>) -> Vec<u8> {
        self.to_record(last_updated).encode_to_vec()
    }

    /// Parse from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        StabilizationRecord::decode(bytes).map(Self::from_record)
    }

    /// Write the data file, replacing whatever is at `path`.
    ///
    /// The message is built in memory, written to a sibling temporary file
    /// and renamed over `path`, so readers never see a half-written file.
    /// Returns the timestamp stored in the file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<DateTime<Utc>, StoreError> {
        let path = path.as_ref();
        let now = Utc::now();
        let bytes = self.to_bytes(now);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let tmp_path = temporary_path(path);
        if let Err(e) = write_synced(&tmp_path, &bytes) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(StoreError::IoError {
                path: tmp_path,
                source: e,
            });
        }

        std::fs::rename(&tmp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            StoreError::IoError {
                path: path.to_path_buf(),
                source: e,
            }
        })?;

        tracing::info!(
            path = %path.display(),
            frames = self.len(),
            bytes = bytes.len(),
            "Saved stabilization data"
        );
        Ok(now)
    }

    /// Read a data file written by [`StabilizationData::save`] or by any
    /// tool producing the same message layout.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound {
                path: path.to_path_buf(),
            },
            _ => StoreError::IoError {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let data = Self::from_bytes(&bytes).map_err(|e| StoreError::DecodeError {
            path: path.to_path_buf(),
            source: e,
        })?;

        match data.last_updated {
            Some(ts) => tracing::info!(
                path = %path.display(),
                frames = data.len(),
                saved_at = %ts.to_rfc3339(),
                "Loaded stabilization data"
            ),
            None => tracing::info!(
                path = %path.display(),
                frames = data.len(),
                "Loaded stabilization data"
            ),
        }
        Ok(data)
    }

    /// Replace this data with the contents of `path`.
    ///
    /// On failure `self` is left exactly as it was.
    pub fn reload_from(&mut self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        *self = Self::load(path)?;
        Ok(())
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> StabilizationData {
        let mut data = StabilizationData::new();
        data.insert(
            0,
            CameraTrajectory::new(1.0, 2.0, 0.01),
            CorrectiveTransform::new(0.5, -0.5, 0.002),
        );
        data.insert(
            1,
            CameraTrajectory::new(1.5, 2.5, 0.02),
            CorrectiveTransform::new(0.25, -0.25, 0.001),
        );
        data
    }

    fn temp_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("steadyframe_test_store");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn test_record_field_mapping() {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let record = sample_data().to_record(ts);

        assert_eq!(record.frame.len(), 2);
        assert_eq!(record.frame[1].id, 1);
        assert_eq!(record.frame[1].x, 1.5);
        assert_eq!(record.frame[1].dx, 0.25);
        assert_eq!(record.last_updated.unwrap().seconds, 1_700_000_000);
    }

    #[test]
    fn test_records_keyed_by_id_not_position() {
        let record = StabilizationRecord {
            frame: vec![
                FrameRecord {
                    id: 9,
                    dx: 3.0,
                    ..Default::default()
                },
                FrameRecord {
                    id: 4,
                    dx: 1.0,
                    ..Default::default()
                },
            ],
            last_updated: None,
        };

        let data = StabilizationData::from_record(record);
        assert_eq!(data.transform(4).unwrap().dx, 1.0);
        assert_eq!(data.transform(9).unwrap().dx, 3.0);
        assert!(data.transform(0).is_err());
        assert!(data.last_updated.is_none());
    }

    #[test]
    fn test_duplicate_id_keeps_later_record() {
        let record = StabilizationRecord {
            frame: vec![
                FrameRecord {
                    id: 2,
                    dx: 1.0,
                    ..Default::default()
                },
                FrameRecord {
                    id: 2,
                    dx: 7.0,
                    ..Default::default()
                },
            ],
            last_updated: None,
        };

        let data = StabilizationData::from_record(record);
        assert_eq!(data.len(), 1);
        assert_eq!(data.transform(2).unwrap().dx, 7.0);
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        // Field 1, wire type 2 (length-delimited) claiming 100 bytes that are not there.
        let bytes = [0x0a, 0x64, 0x01, 0x02];
        assert!(StabilizationData::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut bytes = sample_data().to_bytes(ts);
        // Field 15, varint, value 1.
        bytes.extend_from_slice(&[0x78, 0x01]);

        let data = StabilizationData::from_bytes(&bytes).unwrap();
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn test_save_overwrites_existing_file() {
        let path = temp_file("overwrite.data");
        std::fs::write(&path, vec![0xffu8; 4096]).unwrap();

        let data = sample_data();
        data.save(&path).unwrap();

        let loaded = StabilizationData::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(!temporary_path(&path).exists());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing_file_reports_not_found() {
        let path = temp_file("does-not-exist.data");
        std::fs::remove_file(&path).ok();

        match StabilizationData::load(&path) {
            Err(StoreError::NotFound { path: p }) => assert_eq!(p, path),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_reload_leaves_data_untouched() {
        let path = temp_file("corrupt.data");
        std::fs::write(&path, [0x0a, 0x64, 0x01]).unwrap();

        let mut data = sample_data();
        assert!(data.reload_from(&path).is_err());
        assert_eq!(data, sample_data());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_store_error_converts_to_steady_error() {
        let err: SteadyError = StoreError::NotFound {
            path: PathBuf::from("x.data"),
        }
        .into();
        assert!(matches!(err, SteadyError::FileNotFound { .. }));
    }
}
