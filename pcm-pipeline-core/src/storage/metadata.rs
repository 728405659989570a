use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::PipelineError;
use crate::models::recording::RecordingMetadata;
use crate::processing::wav_format;

/// `{stem}.metadata.json` next to the recording.
pub fn sidecar_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

/// Write recording metadata as a JSON sidecar file.
pub fn write_metadata(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| PipelineError::Storage(format!("failed to serialize metadata: {}", e)))?;
    fs::write(sidecar_path(recording_path), json)
        .map_err(|e| PipelineError::Storage(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read recording metadata from a JSON sidecar file.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, PipelineError> {
    read_sidecar(&sidecar_path(recording_path))
}

pub(crate) fn read_sidecar(path: &Path) -> Result<RecordingMetadata, PipelineError> {
    let json = fs::read_to_string(path)
        .map_err(|e| PipelineError::Storage(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| PipelineError::Storage(format!("failed to parse metadata: {}", e)))
}

/// Build metadata for a finished waveform file from its header and bytes.
pub fn describe_recording(recording_path: &Path) -> Result<RecordingMetadata, PipelineError> {
    let data = fs::read(recording_path).map_err(|e| {
        PipelineError::FileOpen(format!("{}: {}", recording_path.display(), e))
    })?;
    let header = wav_format::parse_header(&data)?;

    let checksum = hex_encode(&Sha256::digest(&data));
    Ok(RecordingMetadata::new(
        recording_path,
        &header.format(),
        header.sample_count(),
        data.len() as u64,
        &checksum,
    ))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
