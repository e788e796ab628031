//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con i parametri dei backend di compressione
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default che riproducono la pipeline standard
//!
//! ## Parametri di configurazione:
//! - `jpeg_quality`: Qualità JPEG (1-100, default: 85)
//! - `h264_crf`: CRF per MOV/MP4 con libx264 (0-51, default: 28)
//! - `h264_preset`: Preset velocità/qualità di libx264 (default: "medium")
//! - `vp9_crf`: CRF per WebM con libvpx-vp9 (0-63, default: 30)
//! - `encoder`: Nome o path dell'eseguibile FFmpeg (default: "ffmpeg")
//! - `size_threshold`: Sostituisce solo se nuovo < originale * soglia (default: nessuna soglia)
//! - `dry_run`: Comprime ma non sostituisce gli originali (default: false)
//! - `json_output`: Output JSON per uso programmatico (default: false)
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     jpeg_quality: 80,
//!     dry_run: true,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for media compression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// CRF for MOV/MP4 (0-51, lower = better quality)
    pub h264_crf: u8,
    /// libx264 speed/quality preset
    pub h264_preset: String,
    /// CRF for WebM (0-63, lower = better quality)
    pub vp9_crf: u8,
    /// Encoder executable name (looked up on PATH) or path
    pub encoder: String,
    /// Replace only when new size <= original * threshold
    pub size_threshold: Option<f64>,
    /// Encode but never replace the originals
    pub dry_run: bool,
    /// Output per-file results as JSON lines
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jpeg_quality: 85,
            h264_crf: 28,
            h264_preset: "medium".to_string(),
            vp9_crf: 30,
            encoder: "ffmpeg".to_string(),
            size_threshold: None,
            dry_run: false,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(anyhow::anyhow!("JPEG quality must be between 1 and 100"));
        }

        if self.h264_crf > 51 {
            return Err(anyhow::anyhow!("H.264 CRF must be between 0 and 51"));
        }

        if self.vp9_crf > 63 {
            return Err(anyhow::anyhow!("VP9 CRF must be between 0 and 63"));
        }

        if self.h264_preset.trim().is_empty() {
            return Err(anyhow::anyhow!("H.264 preset must not be empty"));
        }

        if self.encoder.trim().is_empty() {
            return Err(anyhow::anyhow!("Encoder executable must not be empty"));
        }

        if let Some(threshold) = self.size_threshold {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(anyhow::anyhow!("Size threshold must be between 0.0 and 1.0"));
            }
        }

        Ok(())
    }

    /// Default location of the configuration file, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mpress").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
