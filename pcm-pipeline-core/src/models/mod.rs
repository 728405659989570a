pub mod config;
pub mod diagnostics;
pub mod error;
pub mod recording;
pub mod state;
