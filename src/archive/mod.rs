//! Archive handling utilities.
//!
//! Provides unified archive extraction using native Rust crates for
//! ZIP (zip crate), tar/tar.gz (tar + flate2) and 7z (sevenz-rust2).

pub mod unpack;

pub use unpack::{detect_archive_type, extract_archive, ArchiveError, ArchiveType};
