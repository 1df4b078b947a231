//! Native archive unpacking.
//!
//! The format is detected from magic bytes first and the file extension
//! second, so a mislabeled download (e.g. `vscode.zip` that is really a
//! tarball) still unpacks. Supported containers:
//!
//! - ZIP (`zip` crate)
//! - tar and gzip-compressed tar (`tar` + `flate2`)
//! - 7z (`sevenz-rust2`)

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{debug, info};
use zip::ZipArchive;

/// Archive container detected for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    /// ZIP archive (PK signature)
    Zip,
    /// Uncompressed tar (`ustar` at offset 257)
    Tar,
    /// Gzip stream, assumed to wrap a tar
    TarGz,
    /// 7z archive (7z signature)
    SevenZ,
    /// Unknown/unsupported format
    Unknown,
}

impl ArchiveType {
    pub fn display_name(&self) -> &'static str {
        match self {
            ArchiveType::Zip => "zip",
            ArchiveType::Tar => "tar",
            ArchiveType::TarGz => "tar.gz",
            ArchiveType::SevenZ => "7z",
            ArchiveType::Unknown => "unknown",
        }
    }

    fn from_extension(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            ArchiveType::TarGz
        } else if name.ends_with(".tar") {
            ArchiveType::Tar
        } else if name.ends_with(".zip") {
            ArchiveType::Zip
        } else if name.ends_with(".7z") {
            ArchiveType::SevenZ
        } else {
            ArchiveType::Unknown
        }
    }
}

/// Unpacking errors
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported archive format: {0}")]
    Unsupported(PathBuf),

    #[error("Invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid tar archive: {0}")]
    Tar(#[source] io::Error),

    #[error("Invalid 7z archive: {0}")]
    SevenZ(String),
}

impl ArchiveError {
    fn io(path: &Path, source: io::Error) -> Self {
        ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Detect archive type by reading magic bytes, falling back to the extension.
pub fn detect_archive_type(path: &Path) -> Result<ArchiveType, ArchiveError> {
    let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;

    let mut header = Vec::with_capacity(262);
    file.take(262)
        .read_to_end(&mut header)
        .map_err(|e| ArchiveError::io(path, e))?;

    if header.len() >= 4 {
        // ZIP: PK\x03\x04 or PK\x05\x06 (empty) or PK\x07\x08 (spanned)
        if header[0..2] == [0x50, 0x4B] && matches!(header[2], 0x03 | 0x05 | 0x07) {
            return Ok(ArchiveType::Zip);
        }

        // 7z: 7z\xBC\xAF\x27\x1C
        if header.len() >= 6 && header[0..6] == [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C] {
            return Ok(ArchiveType::SevenZ);
        }

        // gzip: \x1F\x8B
        if header[0..2] == [0x1F, 0x8B] {
            return Ok(ArchiveType::TarGz);
        }

        // POSIX tar: "ustar" at offset 257
        if header.len() >= 262 && &header[257..262] == b"ustar" {
            return Ok(ArchiveType::Tar);
        }
    }

    Ok(ArchiveType::from_extension(path))
}

/// Unpack `archive_path` into `output_dir`, creating it if needed.
pub fn extract_archive(archive_path: &Path, output_dir: &Path) -> Result<ArchiveType, ArchiveError> {
    let archive_type = detect_archive_type(archive_path)?;
    debug!(
        "Detected {} archive: {}",
        archive_type.display_name(),
        archive_path.display()
    );

    fs::create_dir_all(output_dir).map_err(|e| ArchiveError::io(output_dir, e))?;

    match archive_type {
        ArchiveType::Zip => extract_zip(archive_path, output_dir)?,
        ArchiveType::Tar => {
            let file = open(archive_path)?;
            extract_tar(BufReader::new(file), output_dir)?
        }
        ArchiveType::TarGz => {
            let file = open(archive_path)?;
            extract_tar(GzDecoder::new(BufReader::new(file)), output_dir)?
        }
        ArchiveType::SevenZ => sevenz_rust2::decompress_file(archive_path, output_dir)
            .map_err(|e| ArchiveError::SevenZ(e.to_string()))?,
        ArchiveType::Unknown => {
            return Err(ArchiveError::Unsupported(archive_path.to_path_buf()));
        }
    }

    info!(
        "Extracted {} into {}",
        archive_path.display(),
        output_dir.display()
    );
    Ok(archive_type)
}

fn open(path: &Path) -> Result<File, ArchiveError> {
    File::open(path).map_err(|e| ArchiveError::io(path, e))
}

fn extract_zip(archive_path: &Path, output_dir: &Path) -> Result<(), ArchiveError> {
    let reader = BufReader::new(open(archive_path)?);
    let mut archive = ZipArchive::new(reader)?;
    debug!("ZIP contains {} entries", archive.len());
    archive.extract(output_dir)?;
    Ok(())
}

fn extract_tar<R: Read>(reader: R, output_dir: &Path) -> Result<(), ArchiveError> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_mtime(true);
    archive.unpack(output_dir).map_err(ArchiveError::Tar)
}
