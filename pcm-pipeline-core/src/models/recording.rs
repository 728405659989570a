use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::config::PcmFormat;

/// Metadata stored alongside a finished recording.
///
/// Serialized as a JSON sidecar next to the waveform file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    /// File stem, e.g. `recording_20260101_120000`.
    pub name: String,
    pub file_path: String,
    pub duration_ms: u64,
    pub created_at: String,
    pub file_size: u64,
    /// SHA-256 hex digest of the waveform file.
    pub checksum: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl RecordingMetadata {
    pub fn new(
        file_path: &Path,
        format: &PcmFormat,
        sample_count: usize,
        file_size: u64,
        checksum: &str,
    ) -> Self {
        let name = file_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let duration_ms = (format.duration_secs(sample_count) * 1000.0).round() as u64;

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            file_path: file_path.to_string_lossy().to_string(),
            duration_ms,
            created_at: chrono::Utc::now().to_rfc3339(),
            file_size,
            checksum: checksum.to_string(),
            sample_rate: format.sample_rate,
            channels: format.channels,
            bits_per_sample: format.bits_per_sample,
        }
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.file_path)
    }
}
