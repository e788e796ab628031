//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce un enum per ogni fase della pipeline (validazione, compressione, sostituzione)
//! - Fornisce messaggi di errore leggibili, stampati così come sono su stderr
//! - Classifica ogni errore nella categoria mostrata all'utente (`Error` / `Compression error`)
//!
//! ## Categorie di errori:
//! - `ValidationError`: file mancante, non regolare, permessi, formato non supportato
//! - `CompressionError`: fallimenti dei backend immagine/video, encoder mancante
//! - `ReplaceError`: fallimento della rename atomica
//! - `ProcessError`: unione delle precedenti, usata dall'orchestratore
//!
//! ## Esempio:
//! ```rust,ignore
//! let err = ProcessError::from(ValidationError::NotFound("missing.jpg".into()));
//! assert_eq!(format!("{}: {}", err.category(), err), "Error: File not found: missing.jpg");
//! ```

use std::path::PathBuf;

/// Errors produced while inspecting an input path.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Cannot read file: {0}")]
    Unreadable(String),

    #[error("Cannot write to file: {0}")]
    Unwritable(String),

    #[error("Unsupported file format: {extension}. Supported formats: {supported}")]
    UnsupportedFormat { extension: String, supported: String },
}

/// Errors produced by the atomic replace step.
#[derive(thiserror::Error, Debug)]
pub enum ReplaceError {
    #[error("Source file does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Failed to replace file {}: {source}", .destination.display())]
    Rename {
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors produced by the image and video backends.
#[derive(thiserror::Error, Debug)]
pub enum CompressionError {
    /// The encoder executable could not be found; fixed by installing it.
    #[error("FFmpeg is not installed or not in PATH. Please install FFmpeg: {hint}")]
    EncoderNotFound { hint: String },

    #[error("Unsupported {kind} format: {extension}")]
    UnsupportedFormat {
        kind: &'static str,
        extension: String,
    },

    #[error("Failed to compress {format} {}: {source}", .path.display())]
    Image {
        format: &'static str,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("FFmpeg compression failed for {}: {stderr}", .path.display())]
    EncodeFailed { path: PathBuf, stderr: String },

    #[error("FFmpeg did not create output file: {}", .0.display())]
    NoOutput(PathBuf),

    #[error("Failed to run FFmpeg for {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Replace(#[from] ReplaceError),
}

impl CompressionError {
    /// Wraps a codec failure for the given format and input path.
    pub fn image<E>(format: &'static str, path: impl Into<PathBuf>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Image {
            format,
            path: path.into(),
            source: source.into(),
        }
    }

    /// True when the failure is about the environment rather than the data.
    pub fn is_environment(&self) -> bool {
        matches!(self, Self::EncoderNotFound { .. })
    }
}

/// Any failure that ends the processing of a single input path.
#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Compression(#[from] CompressionError),
}

impl ProcessError {
    /// Label printed before the message on stderr.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Error",
            Self::Compression(e) if e.is_environment() => "Error",
            Self::Compression(_) => "Compression error",
        }
    }

    /// Full stderr line for this failure.
    pub fn report_line(&self) -> String {
        format!("{}: {}", self.category(), self)
    }
}
