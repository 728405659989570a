//! WAV file format utilities.
//!
//! Writes the canonical 44-byte RIFF header followed by raw little-endian
//! 16-bit PCM, and reads such files back by skipping the fixed-size header.

use std::io::{self, Read, Write};

use crate::models::config::PcmFormat;
use crate::models::error::PipelineError;

/// `RIFF` descriptor (12 bytes) + `fmt ` chunk (24) + `data` chunk header (8).
pub const WAV_HEADER_SIZE: usize = 44;

/// Canonical PCM header (format code 1) for a payload of `data_size` bytes.
///
/// Every numeric field is little-endian. The RIFF size field is
/// `36 + data_size`.
pub fn generate_wav_header(format: &PcmFormat, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let mut header = [0u8; WAV_HEADER_SIZE];
    let mut at = 0;
    let mut put = |field: &[u8]| {
        header[at..at + field.len()].copy_from_slice(field);
        at += field.len();
    };

    put(b"RIFF");
    put(&data_size.saturating_add(36).to_le_bytes());
    put(b"WAVE");

    put(b"fmt ");
    put(&16u32.to_le_bytes());
    put(&1u16.to_le_bytes());
    put(&format.channels.to_le_bytes());
    put(&format.sample_rate.to_le_bytes());
    put(&format.byte_rate().to_le_bytes());
    put(&format.block_align().to_le_bytes());
    put(&format.bits_per_sample.to_le_bytes());

    put(b"data");
    put(&data_size.to_le_bytes());

    header
}

/// Payload size in bytes for `sample_count` samples, if it fits the
/// 32-bit RIFF size fields.
pub fn data_size_for(sample_count: usize, format: &PcmFormat) -> Result<u32, PipelineError> {
    sample_count
        .checked_mul(format.bytes_per_sample())
        .and_then(|bytes| u32::try_from(bytes).ok())
        .filter(|bytes| bytes.checked_add(36).is_some())
        .ok_or_else(|| {
            PipelineError::InvalidFormat(format!("{} samples exceed the RIFF size limit", sample_count))
        })
}

/// Write the header for a payload of `sample_count` samples.
///
/// The caller writes exactly `sample_count` samples right after it.
pub fn write_header<W: Write>(
    sink: &mut W,
    sample_count: usize,
    format: &PcmFormat,
) -> Result<(), PipelineError> {
    let data_size = data_size_for(sample_count, format)?;
    let header = generate_wav_header(format, data_size);
    sink.write_all(&header)
        .map_err(|e| PipelineError::Io(format!("failed to write header: {}", e)))
}

/// Write raw little-endian PCM samples.
pub fn write_samples<W: Write>(sink: &mut W, samples: &[i16]) -> Result<(), PipelineError> {
    sink.write_all(&samples_to_le_bytes(samples))
        .map_err(|e| PipelineError::Io(format!("failed to write samples: {}", e)))
}

/// Write a complete waveform: header followed by the payload.
pub fn write_wav<W: Write>(sink: &mut W, samples: &[i16], format: &PcmFormat) -> Result<(), PipelineError> {
    write_header(sink, samples.len(), format)?;
    write_samples(sink, samples)?;
    sink.flush()
        .map_err(|e| PipelineError::Io(format!("flush failed: {}", e)))
}

pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Read every sample after a fixed 44-byte header.
///
/// Header fields are not inspected. A trailing odd byte is dropped, and a
/// source shorter than the header yields no samples.
pub fn read_samples<R: Read>(source: &mut R) -> Result<Vec<i16>, PipelineError> {
    let skipped = io::copy(&mut source.by_ref().take(WAV_HEADER_SIZE as u64), &mut io::sink())
        .map_err(|e| PipelineError::Io(format!("failed to skip header: {}", e)))?;
    if skipped < WAV_HEADER_SIZE as u64 {
        return Ok(Vec::new());
    }

    let mut payload = Vec::new();
    source
        .read_to_end(&mut payload)
        .map_err(|e| PipelineError::Io(format!("failed to read samples: {}", e)))?;

    Ok(payload
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Header fields of a canonical PCM waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    pub fn format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: self.bits_per_sample,
        }
    }

    /// Number of samples (all channels) declared by the data chunk.
    pub fn sample_count(&self) -> usize {
        let bytes_per_sample = (self.bits_per_sample / 8).max(1) as usize;
        self.data_size as usize / bytes_per_sample
    }

    pub fn duration_secs(&self) -> f64 {
        if self.byte_rate == 0 {
            return 0.0;
        }
        self.data_size as f64 / self.byte_rate as f64
    }
}

/// Parse a canonical 44-byte header.
///
/// Used for inspection and metadata only; playback never parses headers.
pub fn parse_header(bytes: &[u8]) -> Result<WavHeader, PipelineError> {
    if bytes.len() < WAV_HEADER_SIZE {
        return Err(PipelineError::InvalidFormat(format!(
            "header is {} bytes, expected {}",
            bytes.len(),
            WAV_HEADER_SIZE
        )));
    }

    for (offset, magic) in [(0, b"RIFF"), (8, b"WAVE"), (12, b"fmt "), (36, b"data")] {
        if &bytes[offset..offset + 4] != magic {
            return Err(PipelineError::InvalidFormat(format!(
                "missing {:?} at offset {}",
                String::from_utf8_lossy(magic),
                offset
            )));
        }
    }

    let u16_at = |offset: usize| u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
    let u32_at = |offset: usize| {
        u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
    };

    let audio_format = u16_at(20);
    if audio_format != 1 {
        return Err(PipelineError::InvalidFormat(format!(
            "unsupported audio format code {}",
            audio_format
        )));
    }

    Ok(WavHeader {
        riff_size: u32_at(4),
        audio_format,
        channels: u16_at(22),
        sample_rate: u32_at(24),
        byte_rate: u32_at(28),
        block_align: u16_at(32),
        bits_per_sample: u16_at(34),
        data_size: u32_at(40),
    })
}

/// Read and parse the header at the start of `source`.
pub fn read_header<R: Read>(source: &mut R) -> Result<WavHeader, PipelineError> {
    let mut bytes = [0u8; WAV_HEADER_SIZE];
    source.read_exact(&mut bytes).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => PipelineError::InvalidFormat("truncated header".into()),
        _ => PipelineError::Io(format!("failed to read header: {}", e)),
    })?;
    parse_header(&bytes)
}
