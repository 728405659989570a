/// Samples per hardware buffer (one scratch buffer / one playback chunk).
pub const BUFFER_SIZE: usize = 4096;

pub const SAMPLE_RATE: u32 = 44_100;
pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;

/// PCM layout exchanged with the hardware and stored in waveform files.
///
/// Signed little-endian integer samples. Only mono 16-bit is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Bytes per second of audio.
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bits_per_sample as u32 / 8
    }

    /// Bytes per frame (one sample per channel).
    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    /// Duration of `sample_count` mono samples in seconds.
    pub fn duration_secs(&self, sample_count: usize) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        sample_count as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            bits_per_sample: BITS_PER_SAMPLE,
        }
    }
}

/// Configuration shared by `CaptureEngine` and `PlaybackEngine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Samples per scratch buffer / playback chunk (default: 4096).
    pub buffer_size: usize,

    /// Hardware and file format (default: 44.1 kHz mono 16-bit).
    pub format: PcmFormat,
}

impl EngineConfig {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_size == 0 {
            return Err("buffer size must be positive".into());
        }
        if self.format.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.format.channels != CHANNELS {
            return Err(format!("unsupported channel count: {}", self.format.channels));
        }
        if self.format.bits_per_sample != BITS_PER_SAMPLE {
            return Err(format!("unsupported bit depth: {}", self.format.bits_per_sample));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_size: BUFFER_SIZE,
            format: PcmFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_format_derived_fields() {
        let format = PcmFormat::default();
        assert_eq!(format.byte_rate(), 88_200);
        assert_eq!(format.block_align(), 2);
        assert_eq!(format.bytes_per_sample(), 2);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_unsupported_layouts() {
        let zero = EngineConfig::default().with_buffer_size(0);
        assert!(zero.validate().is_err());

        let mut stereo = EngineConfig::default();
        stereo.format.channels = 2;
        assert!(stereo.validate().unwrap_err().contains("channel"));

        let mut wide = EngineConfig::default();
        wide.format.bits_per_sample = 24;
        assert!(wide.validate().unwrap_err().contains("bit depth"));
    }

    #[test]
    fn duration_of_one_second() {
        let format = PcmFormat::default();
        assert!((format.duration_secs(44_100) - 1.0).abs() < 1e-9);
        assert_eq!(format.duration_secs(0), 0.0);
    }
}
