use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::PipelineError;
use crate::models::recording::RecordingMetadata;

use super::metadata;

const SIDECAR_SUFFIX: &str = ".metadata.json";

/// Directory of finished recordings, each with a JSON sidecar.
///
/// The sidecars are the index: a waveform without one is not listed.
#[derive(Debug, Clone)]
pub struct RecordingLibrary {
    dir: PathBuf,
}

impl RecordingLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A fresh `recording_YYYYMMDD_HHMMSS.wav` path inside the library.
    ///
    /// A numeric suffix is appended when a file for the same second exists.
    pub fn new_recording_path(&self) -> Result<PathBuf, PipelineError> {
        self.ensure_dir()?;
        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let mut path = self.dir.join(format!("recording_{}.wav", stamp));
        let mut n = 2;
        while path.exists() {
            path = self.dir.join(format!("recording_{}_{}.wav", stamp, n));
            n += 1;
        }
        Ok(path)
    }

    /// Describe a finished waveform file and write its sidecar.
    pub fn register(&self, recording_path: &Path) -> Result<RecordingMetadata, PipelineError> {
        let metadata = metadata::describe_recording(recording_path)?;
        metadata::write_metadata(&metadata, recording_path)?;
        log::info!(
            "Registered recording {} ({} ms, {} bytes)",
            metadata.id,
            metadata.duration_ms,
            metadata.file_size
        );
        Ok(metadata)
    }

    /// All recordings, newest first. Unreadable sidecars are skipped.
    pub fn list(&self) -> Result<Vec<RecordingMetadata>, PipelineError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PipelineError::Storage(format!(
                    "failed to read {}: {}",
                    self.dir.display(),
                    e
                )))
            }
        };

        let mut recordings = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_sidecar = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().ends_with(SIDECAR_SUFFIX));
            if !is_sidecar {
                continue;
            }
            match metadata::read_sidecar(&path) {
                Ok(recording) => recordings.push(recording),
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        recordings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(recordings)
    }

    pub fn get(&self, id: &str) -> Result<Option<RecordingMetadata>, PipelineError> {
        Ok(self.list()?.into_iter().find(|r| r.id == id))
    }

    pub fn count(&self) -> Result<usize, PipelineError> {
        Ok(self.list()?.len())
    }

    /// Remove a recording's waveform file and its sidecar.
    pub fn delete(&self, id: &str) -> Result<RecordingMetadata, PipelineError> {
        let recording = self
            .get(id)?
            .ok_or_else(|| PipelineError::Storage(format!("no recording with id {}", id)))?;

        let path = recording.path();
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Waveform {} already gone", path.display());
            }
            Err(e) => {
                return Err(PipelineError::Storage(format!(
                    "failed to delete {}: {}",
                    path.display(),
                    e
                )))
            }
        }
        fs::remove_file(metadata::sidecar_path(&path))
            .map_err(|e| PipelineError::Storage(format!("failed to delete metadata: {}", e)))?;

        log::info!("Deleted recording {}", id);
        Ok(recording)
    }

    fn ensure_dir(&self) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            PipelineError::Storage(format!("failed to create {}: {}", self.dir.display(), e))
        })
    }
}

/// `MM:SS`, or `HH:MM:SS` once a recording passes an hour.
pub fn format_duration(duration_ms: u64) -> String {
    let total_secs = duration_ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::PcmFormat;
    use crate::processing::wav_format;

    fn temp_library(name: &str) -> RecordingLibrary {
        let dir = std::env::temp_dir().join(format!("pcm_pipeline_library_{}", name));
        let _ = fs::remove_dir_all(&dir);
        RecordingLibrary::new(dir)
    }

    fn write_recording(path: &Path, samples: usize) {
        let mut file = fs::File::create(path).unwrap();
        wav_format::write_wav(&mut file, &vec![7i16; samples], &PcmFormat::default()).unwrap();
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let library = temp_library("missing");
        assert!(library.list().unwrap().is_empty());
        assert_eq!(library.count().unwrap(), 0);
    }

    #[test]
    fn new_recording_path_is_timestamped() {
        let library = temp_library("naming");
        let path = library.new_recording_path().unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("recording_"));
        assert!(name.ends_with(".wav"));
        assert!(library.dir().exists());

        write_recording(&path, 10);
        let next = library.new_recording_path().unwrap();
        assert_ne!(next, path);

        fs::remove_dir_all(library.dir()).ok();
    }

    #[test]
    fn register_get_and_delete() {
        let library = temp_library("register");
        let path = library.new_recording_path().unwrap();
        write_recording(&path, 4410);

        let registered = library.register(&path).unwrap();
        assert_eq!(registered.duration_ms, 100);
        assert_eq!(library.count().unwrap(), 1);
        assert_eq!(library.get(&registered.id).unwrap(), Some(registered.clone()));

        let deleted = library.delete(&registered.id).unwrap();
        assert_eq!(deleted.id, registered.id);
        assert!(!path.exists());
        assert!(!metadata::sidecar_path(&path).exists());
        assert_eq!(library.count().unwrap(), 0);

        fs::remove_dir_all(library.dir()).ok();
    }

    #[test]
    fn delete_unknown_id_fails() {
        let library = temp_library("unknown");
        assert!(matches!(library.delete("nope"), Err(PipelineError::Storage(_))));
    }

    #[test]
    fn list_is_newest_first_and_skips_bad_sidecars() {
        let library = temp_library("ordering");
        fs::create_dir_all(library.dir()).unwrap();

        let format = PcmFormat::default();
        for (name, created_at) in [
            ("a", "2026-01-01T10:00:00+00:00"),
            ("b", "2026-03-01T10:00:00+00:00"),
            ("c", "2026-02-01T10:00:00+00:00"),
        ] {
            let path = library.dir().join(format!("{}.wav", name));
            let mut recording = RecordingMetadata::new(&path, &format, 0, 44, "00");
            recording.created_at = created_at.to_string();
            metadata::write_metadata(&recording, &path).unwrap();
        }
        fs::write(library.dir().join("broken.metadata.json"), "{not json").unwrap();
        fs::write(library.dir().join("stray.wav"), b"RIFF").unwrap();

        let names: Vec<String> = library.list().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["b", "c", "a"]);

        fs::remove_dir_all(library.dir()).ok();
    }

    #[test]
    fn durations_format_as_clock() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(65_400), "01:05");
        assert_eq!(format_duration(3_599_999), "59:59");
        assert_eq!(format_duration(3_723_000), "01:02:03");
    }
}
