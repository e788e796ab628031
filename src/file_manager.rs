//! # File Management Module
//!
//! Questo modulo gestisce la validazione dei path in input e la classificazione dei media.
//!
//! ## Responsabilità:
//! - Verifica esistenza, tipo di entry e permessi di lettura/scrittura
//! - Determinazione formato file (immagine vs video) dall'estensione
//! - Costruzione di `MediaFile` con path assoluto
//! - Utilità per dimensioni file e percentuali di riduzione
//!
//! ## Formati supportati:
//! - **Immagini**: PNG, JPG, JPEG
//! - **Video**: MOV, MP4, WebM
//!
//! ## Ordine dei controlli (il primo che fallisce vince):
//! 1. Il path esiste → `NotFound`
//! 2. È un file regolare → `NotAFile`
//! 3. È leggibile → `Unreadable`
//! 4. È scrivibile (serve per la sostituzione atomica) → `Unwritable`
//! 5. Estensione supportata → `UnsupportedFormat`
//!
//! La validazione non modifica mai il filesystem.
//!
//! ## Esempio:
//! ```rust,ignore
//! let media = FileManager::validate("photo.png")?;
//! if media.kind == MediaKind::Image {
//!     // process image
//! }
//! ```

use crate::error::ValidationError;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Extensions handled by the image backend
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Extensions handled by the video backend
pub const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "webm"];

/// Broad media category, decides which backend runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a lowercase extension without the leading dot
    pub fn from_extension(ext: &str) -> Option<Self> {
        if IMAGE_EXTENSIONS.contains(&ext) {
            Some(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            Some(Self::Video)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/// A validated input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Absolute path with symlinks resolved
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaFile {
    /// Lowercased extension of the file, without the dot
    pub fn extension(&self) -> Option<String> {
        lowercase_extension(&self.path)
    }
}

/// Lowercased extension of a path, without the dot
pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension().map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Sorted, comma separated list of every supported extension (".jpeg, .jpg, ...")
pub fn supported_formats_list() -> String {
    let mut all: Vec<String> = IMAGE_EXTENSIONS
        .iter()
        .chain(VIDEO_EXTENSIONS.iter())
        .map(|ext| format!(".{}", ext))
        .collect();
    all.sort();
    all.join(", ")
}

/// Manages file inspection
pub struct FileManager;

impl FileManager {
    /// Validate a raw path argument and classify it.
    ///
    /// Error messages quote `raw_path` as the user typed it (lossily, for
    /// names that are not valid UTF-8).
    pub fn validate(raw_path: impl AsRef<Path>) -> Result<MediaFile, ValidationError> {
        let path = raw_path.as_ref();
        let raw_path = path.to_string_lossy();

        // Follows symlinks, so a dangling link counts as missing
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ValidationError::NotFound(raw_path.to_string()));
            }
            Err(_) => return Err(ValidationError::Unreadable(raw_path.to_string())),
        };

        if !metadata.is_file() {
            return Err(ValidationError::NotAFile(raw_path.to_string()));
        }

        if !Self::is_readable(path) {
            return Err(ValidationError::Unreadable(raw_path.to_string()));
        }

        if !Self::is_writable(path) {
            return Err(ValidationError::Unwritable(raw_path.to_string()));
        }

        let extension = lowercase_extension(path);
        let kind = extension
            .as_deref()
            .and_then(MediaKind::from_extension)
            .ok_or_else(|| ValidationError::UnsupportedFormat {
                extension: extension
                    .as_deref()
                    .map(|ext| format!(".{}", ext))
                    .unwrap_or_else(|| "(none)".to_string()),
                supported: supported_formats_list(),
            })?;

        let path = fs::canonicalize(path)
            .map_err(|_| ValidationError::NotFound(raw_path.to_string()))?;

        Ok(MediaFile { path, kind })
    }

    // Opening a handle is the portable way to ask "may this process read it".
    fn is_readable(path: &Path) -> bool {
        OpenOptions::new().read(true).open(path).is_ok()
    }

    // write(true) without truncate/append leaves the content untouched.
    fn is_writable(path: &Path) -> bool {
        OpenOptions::new().write(true).open(path).is_ok()
    }

    /// Size of a file in bytes
    pub async fn file_size(path: &Path) -> std::io::Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
