//! # Atomic Replacement Module
//!
//! Questo modulo garantisce che un file su disco sia sempre o completamente
//! l'originale o completamente la versione compressa, mai un file parziale.
//!
//! ## Responsabilità:
//! - Naming deterministico dei file temporanei accanto all'originale
//! - `TempArtifact`: scope guard che elimina il temporaneo su ogni percorso di uscita
//! - `atomically_replace()`: una singola rename atomica del temporaneo sull'originale
//! - Politica di sostituzione (dry run, soglia di riduzione)
//!
//! ## Naming dei temporanei:
//! ```text
//! Immagine: /photos/IMG_001.png  → /photos/.IMG_001.png.tmp
//! Video:    /videos/clip.mp4     → /videos/.clip.mp4.tmp.mp4
//! ```
//! Il video conserva l'estensione perché FFmpeg deduce il container
//! dall'estensione del file di output. Creare un `TempArtifact` elimina
//! qualsiasi file già presente con lo stesso nome.
//!
//! ## Perché stessa directory:
//! - La rename è atomica solo all'interno dello stesso filesystem
//! - Mai copy + delete: un crash lascerebbe zero o due copie del file
//!
//! ## Esempio:
//! ```rust,ignore
//! let temp = TempArtifact::for_image(&media.path)?;
//! encode(&media.path, temp.path())?;          // on error, drop deletes the temp
//! temp.commit(&media.path, &config).await?;   // rename over the original
//! ```

use crate::config::Config;
use crate::error::ReplaceError;
use crate::file_manager::FileManager;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Leading marker that hides temp artifacts in directory listings
pub const TEMP_MARKER: char = '.';

/// Suffix shared by every temp artifact
pub const TEMP_SUFFIX: &str = ".tmp";

/// Atomically replace `destination` with `temp_path`.
///
/// On failure the destination is untouched and the temp file is removed
/// (best effort).
pub async fn atomically_replace(temp_path: &Path, destination: &Path) -> Result<(), ReplaceError> {
    if tokio::fs::metadata(temp_path).await.is_err() {
        return Err(ReplaceError::SourceMissing(temp_path.to_path_buf()));
    }

    match tokio::fs::rename(temp_path, destination).await {
        Ok(()) => {
            debug!("Replaced {} with {}", destination.display(), temp_path.display());
            Ok(())
        }
        Err(source) => {
            remove_quietly(temp_path);
            Err(ReplaceError::Rename {
                destination: destination.to_path_buf(),
                source,
            })
        }
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed temp artifact {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove temp artifact {}: {}", path.display(), e),
    }
}

/// Why a compressed artifact was not swapped in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepReason {
    DryRun,
    NotSmaller,
}

/// What happened to the original after a successful encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Replaced {
        original_size: u64,
        compressed_size: u64,
    },
    Kept {
        original_size: u64,
        compressed_size: u64,
        reason: KeepReason,
    },
}

impl CommitOutcome {
    pub fn sizes(&self) -> (u64, u64) {
        match *self {
            Self::Replaced {
                original_size,
                compressed_size,
            }
            | Self::Kept {
                original_size,
                compressed_size,
                ..
            } => (original_size, compressed_size),
        }
    }
}

/// An intermediate output file living next to the original.
///
/// Dropping it without a successful [`commit`](Self::commit) deletes the
/// file, so a failed or abandoned attempt never leaves a stray `.tmp`.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    armed: bool,
}

impl TempArtifact {
    /// `<dir>/.<name>.tmp`
    pub fn for_image(original: &Path) -> io::Result<Self> {
        let name = file_name(original)?;
        Ok(Self::at(original.with_file_name(format!(
            "{}{}{}",
            TEMP_MARKER, name, TEMP_SUFFIX
        ))))
    }

    /// `<dir>/.<name>.tmp.<ext>`, keeping the container extension for the encoder
    pub fn for_video(original: &Path) -> io::Result<Self> {
        let name = file_name(original)?;
        let extension = original
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        Ok(Self::at(original.with_file_name(format!(
            "{}{}{}{}",
            TEMP_MARKER, name, TEMP_SUFFIX, extension
        ))))
    }

    // A leftover from an interrupted run must never pass for fresh output
    fn at(path: PathBuf) -> Self {
        remove_quietly(&path);
        Self { path, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Swap the artifact in for `destination`, unless the config says to keep
    /// the original (dry run, or not enough of a size reduction).
    pub async fn commit(mut self, destination: &Path, config: &Config) -> Result<CommitOutcome, ReplaceError> {
        let compressed_size = match FileManager::file_size(&self.path).await {
            Ok(size) => size,
            Err(_) => return Err(ReplaceError::SourceMissing(self.path.clone())),
        };
        let original_size = FileManager::file_size(destination).await.unwrap_or(0);

        let keep = if config.dry_run {
            Some(KeepReason::DryRun)
        } else if let Some(threshold) = config.size_threshold {
            let limit = original_size as f64 * threshold;
            (compressed_size as f64 > limit).then_some(KeepReason::NotSmaller)
        } else {
            None
        };

        if let Some(reason) = keep {
            debug!(
                "Keeping original {} ({:?}): {} -> {}",
                destination.display(),
                reason,
                FileManager::format_size(original_size),
                FileManager::format_size(compressed_size)
            );
            // drop removes the artifact
            return Ok(CommitOutcome::Kept {
                original_size,
                compressed_size,
                reason,
            });
        }

        self.copy_permissions_from(destination).await;

        // atomically_replace cleans up after itself, nothing left to guard
        self.armed = false;
        atomically_replace(&self.path, destination).await?;

        Ok(CommitOutcome::Replaced {
            original_size,
            compressed_size,
        })
    }

    async fn copy_permissions_from(&self, destination: &Path) {
        let permissions = match tokio::fs::metadata(destination).await {
            Ok(metadata) => metadata.permissions(),
            Err(_) => return,
        };
        if let Err(e) = tokio::fs::set_permissions(&self.path, permissions).await {
            warn!(
                "Could not copy permissions of {} to {}: {}",
                destination.display(),
                self.path.display(),
                e
            );
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.armed {
            remove_quietly(&self.path);
        }
    }
}

fn file_name(path: &Path) -> io::Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Path has no file name: {}", path.display()),
            )
        })
}
