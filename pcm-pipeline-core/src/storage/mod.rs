pub mod library;
pub mod metadata;
