pub mod audio_backend;
