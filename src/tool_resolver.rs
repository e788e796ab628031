//! # Tool Path Resolver
//!
//! Questo modulo trova l'eseguibile dell'encoder video (FFmpeg).
//!
//! ## Responsabilità:
//! - Valore con separatore di path (`/opt/ffmpeg/bin/ffmpeg`): deve essere un file esistente
//! - Nome semplice (`ffmpeg`): ricerca nel `PATH` con il crate `which`
//! - Istruzioni di installazione specifiche per piattaforma quando manca

use crate::error::CompressionError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolves the configured encoder executable
#[derive(Debug, Clone)]
pub struct ToolPathResolver {
    tool: String,
}

impl ToolPathResolver {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    /// Resolve the path to the tool, if it can be run
    pub fn resolve_tool(&self) -> Option<PathBuf> {
        let candidate = Path::new(&self.tool);

        if candidate.is_absolute() || candidate.components().count() > 1 {
            debug!("Checking explicit tool path: {}", candidate.display());
            return candidate.is_file().then(|| candidate.to_path_buf());
        }

        match which::which(&self.tool) {
            Ok(path) => {
                debug!("Resolved tool {} -> {}", self.tool, path.display());
                Some(path)
            }
            Err(e) => {
                debug!("Tool {} not found in PATH: {}", self.tool, e);
                None
            }
        }
    }

    /// Resolve the tool or explain how to install it
    pub fn check_tool_with_instructions(&self) -> Result<PathBuf, CompressionError> {
        self.resolve_tool().ok_or_else(not_found)
    }
}

/// `EncoderNotFound` with the install command for this platform
pub fn not_found() -> CompressionError {
    CompressionError::EncoderNotFound {
        hint: install_instructions().to_string(),
    }
}

/// Get installation instructions for FFmpeg on the current platform
pub fn install_instructions() -> &'static str {
    if cfg!(target_os = "macos") {
        "brew install ffmpeg"
    } else if cfg!(target_os = "windows") {
        "winget install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "sudo apt-get install ffmpeg"
    } else {
        "https://ffmpeg.org/download.html"
    }
}
