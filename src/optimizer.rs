//! # Main Optimizer Orchestrator Module
//!
//! Questo è il modulo che orchestra l'elaborazione di ogni path passato da riga di comando.
//!
//! ## Responsabilità:
//! - Per ogni path, in ordine: validazione → backend (immagine/video) → risultato
//! - Isolamento dei fallimenti: un path fallito non interrompe i successivi
//! - Una riga per path: `Compressed: <path>` su stdout, `<categoria>: <dettaglio>` su stderr
//! - Statistiche aggregate e exit code finale
//!
//! ## Processing pipeline per file:
//! 1. `FileManager::validate` → `MediaFile`
//! 2. `ImageProcessor` o `VideoProcessor` secondo `MediaKind`
//! 3. Il backend scrive un `TempArtifact` e lo sostituisce atomicamente all'originale
//! 4. `ProcessingResult` con esito e messaggio
//!
//! ## Exit code:
//! - 0 solo se ci sono path e tutti hanno avuto successo
//! - 1 se almeno un path è fallito o la lista è vuota
//!
//! ## Dry run / soglia:
//! Il file compresso viene prodotto ma scartato; l'esito conta come successo.
//!
//! ## Esempio:
//! ```rust,ignore
//! let optimizer = MediaOptimizer::new(config)?;
//! let summary = optimizer.process_all(&paths).await;
//! std::process::exit(summary.exit_code().into());
//! ```

use crate::{
    atomic::{CommitOutcome, KeepReason},
    config::Config,
    error::ProcessError,
    file_manager::{FileManager, MediaKind},
    image_processor::ImageProcessor,
    json_output::JsonMessage,
    progress::OptimizationStats,
    video_processor::VideoProcessor,
};
use anyhow::Result;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of processing one input path
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    /// Path exactly as given by the caller
    pub path: String,
    pub success: bool,
    /// Line reported to the user
    pub message: String,
    /// Sizes and replacement decision, present on success
    pub outcome: Option<CommitOutcome>,
}

impl ProcessingResult {
    fn succeeded(path: &str, outcome: CommitOutcome) -> Self {
        Self {
            path: path.to_string(),
            success: true,
            message: success_line(path, &outcome),
            outcome: Some(outcome),
        }
    }

    fn failed(path: &str, error: &ProcessError) -> Self {
        Self {
            path: path.to_string(),
            success: false,
            message: error.report_line(),
            outcome: None,
        }
    }

    pub fn to_json(&self) -> JsonMessage {
        let sizes = self.outcome.map(|outcome| outcome.sizes());
        JsonMessage::FileComplete {
            path: self.path.clone(),
            success: self.success,
            replaced: matches!(self.outcome, Some(CommitOutcome::Replaced { .. })),
            original_size: sizes.map(|(original, _)| original),
            compressed_size: sizes.map(|(_, compressed)| compressed),
            reduction_percent: sizes
                .map(|(original, compressed)| FileManager::calculate_reduction(original, compressed)),
            message: self.message.clone(),
        }
    }
}

fn success_line(path: &str, outcome: &CommitOutcome) -> String {
    match outcome {
        CommitOutcome::Replaced { .. } => format!("Compressed: {}", path),
        CommitOutcome::Kept {
            original_size,
            compressed_size,
            reason: KeepReason::DryRun,
        } => format!(
            "Would compress: {} ({} -> {})",
            path,
            FileManager::format_size(*original_size),
            FileManager::format_size(*compressed_size)
        ),
        CommitOutcome::Kept {
            reason: KeepReason::NotSmaller,
            ..
        } => format!("Skipped: {} (no worthwhile size reduction)", path),
    }
}

/// Results of a whole run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub results: Vec<ProcessingResult>,
    pub stats: OptimizationStats,
}

impl RunSummary {
    /// True only for a non-empty run where every path succeeded
    pub fn success(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|result| result.success)
    }

    pub fn exit_code(&self) -> u8 {
        if self.success() {
            0
        } else {
            1
        }
    }
}

/// Main media optimizer orchestrator
pub struct MediaOptimizer {
    config: Config,
    images: ImageProcessor,
    videos: VideoProcessor,
}

impl MediaOptimizer {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            images: ImageProcessor::new(config.clone()),
            videos: VideoProcessor::new(config.clone()),
            config,
        })
    }

    /// Process every path in order and report each result as it completes
    pub async fn process_all<P: AsRef<Path>>(&self, paths: &[P]) -> RunSummary {
        let start_time = Instant::now();
        let mut summary = RunSummary::default();

        if self.config.dry_run {
            info!("Dry run: originals will not be replaced");
        }

        for path in paths {
            let result = self.process_file(path).await;

            match result.outcome {
                Some(CommitOutcome::Replaced {
                    original_size,
                    compressed_size,
                }) => summary.stats.add_compressed(original_size, compressed_size),
                Some(CommitOutcome::Kept { original_size, .. }) => {
                    summary.stats.add_kept(original_size)
                }
                None => summary.stats.add_error(),
            }

            self.report(&result);
            summary.results.push(result);
        }

        if self.config.json_output {
            JsonMessage::complete(
                &summary.stats,
                start_time.elapsed().as_secs_f64(),
                summary.success(),
            )
            .emit();
        }

        info!("{}", summary.stats.format_summary());
        summary
    }

    /// Validate, compress and replace a single path
    pub async fn process_file(&self, raw_path: impl AsRef<Path>) -> ProcessingResult {
        let raw_path = raw_path.as_ref();
        let shown = raw_path.to_string_lossy();
        debug!("Processing {}", shown);

        match self.compress(raw_path).await {
            Ok(outcome) => ProcessingResult::succeeded(&shown, outcome),
            Err(e) => {
                debug!("{} failed: {:?}", shown, e);
                ProcessingResult::failed(&shown, &e)
            }
        }
    }

    async fn compress(&self, raw_path: &Path) -> Result<CommitOutcome, ProcessError> {
        let media = FileManager::validate(raw_path)?;
        debug!("{} is a {} file", media.path.display(), media.kind.as_str());

        let outcome = match media.kind {
            MediaKind::Image => self.images.compress(&media).await?,
            MediaKind::Video => self.videos.compress(&media).await?,
        };
        Ok(outcome)
    }

    fn report(&self, result: &ProcessingResult) {
        if self.config.json_output {
            result.to_json().emit();
        } else if result.success {
            println!("{}", result.message);
        } else {
            eprintln!("{}", result.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn write_png(dir: &TempDir, name: &str) -> String {
        let path = dir.path().join(name);
        // Noise: incompressible as truecolor, so quantizing always shrinks it
        let mut seed: u32 = 7;
        RgbImage::from_fn(100, 100, |_, _| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let [r, g, b, _] = seed.to_be_bytes();
            Rgb([r, g, b])
        })
        .save(&path)
        .unwrap();
        path.to_string_lossy().into_owned()
    }

    fn optimizer(config: Config) -> MediaOptimizer {
        MediaOptimizer::new(config).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            jpeg_quality: 0,
            ..Default::default()
        };
        assert!(MediaOptimizer::new(config).is_err());
    }

    #[tokio::test]
    async fn test_missing_file_result() {
        let result = optimizer(Config::default()).process_file("missing.jpg").await;

        assert!(!result.success);
        assert_eq!(result.message, "Error: File not found: missing.jpg");
        assert_eq!(result.outcome, None);
    }

    #[tokio::test]
    async fn test_png_is_compressed() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "photo.png");
        let original_size = fs::metadata(&path).unwrap().len();

        let result = optimizer(Config::default()).process_file(&path).await;

        assert!(result.success, "{}", result.message);
        assert_eq!(result.message, format!("Compressed: {}", path));
        assert!(fs::metadata(&path).unwrap().len() <= original_size);
    }

    #[tokio::test]
    async fn test_corrupt_image_is_a_compression_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        fs::write(&path, b"not a jpeg").unwrap();

        let result = optimizer(Config::default())
            .process_file(&path)
            .await;

        assert!(!result.success);
        assert!(result.message.starts_with("Compression error: Failed to compress JPEG"));
        assert_eq!(fs::read(&path).unwrap(), b"not a jpeg");
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_files() {
        let dir = TempDir::new().unwrap();
        let good = write_png(&dir, "good.png");
        let paths = vec!["missing.jpg".to_string(), good];

        let summary = optimizer(Config::default()).process_all(&paths).await;

        assert_eq!(summary.results.len(), 2);
        assert!(!summary.results[0].success);
        assert!(summary.results[1].success);
        assert_eq!(summary.stats.errors, 1);
        assert_eq!(summary.stats.files_compressed, 1);
        assert_eq!(summary.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_exit_code_law() {
        let dir = TempDir::new().unwrap();
        let optimizer = optimizer(Config::default());

        let none: [String; 0] = [];
        assert_eq!(optimizer.process_all(&none).await.exit_code(), 1);

        let paths = vec![write_png(&dir, "a.png"), write_png(&dir, "b.png")];
        assert_eq!(optimizer.process_all(&paths).await.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_message() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "photo.png");
        let before = fs::read(&path).unwrap();

        let config = Config {
            dry_run: true,
            ..Default::default()
        };
        let result = optimizer(config).process_file(&path).await;

        assert!(result.success);
        assert!(result.message.starts_with(&format!("Would compress: {} (", path)));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_utf8_name_is_reported_per_file() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"caf\xe9.png"));

        let result = optimizer(Config::default()).process_file(&path).await;

        assert!(!result.success);
        assert!(result.message.starts_with("Error: File not found: "));
        assert!(result.message.ends_with("caf\u{FFFD}.png"));
    }

    #[test]
    fn test_success_lines() {
        let replaced = CommitOutcome::Replaced {
            original_size: 10,
            compressed_size: 5,
        };
        assert_eq!(success_line("a.png", &replaced), "Compressed: a.png");

        let skipped = CommitOutcome::Kept {
            original_size: 10,
            compressed_size: 10,
            reason: KeepReason::NotSmaller,
        };
        assert_eq!(
            success_line("a.png", &skipped),
            "Skipped: a.png (no worthwhile size reduction)"
        );

        let dry = CommitOutcome::Kept {
            original_size: 2048,
            compressed_size: 512,
            reason: KeepReason::DryRun,
        };
        assert_eq!(
            success_line("a.png", &dry),
            "Would compress: a.png (2.00 KB -> 512 B)"
        );
    }

    #[test]
    fn test_json_result_fields() {
        let result = ProcessingResult::succeeded(
            "a.png",
            CommitOutcome::Replaced {
                original_size: 200,
                compressed_size: 50,
            },
        );

        match result.to_json() {
            JsonMessage::FileComplete {
                replaced,
                reduction_percent,
                ..
            } => {
                assert!(replaced);
                assert_eq!(reduction_percent, Some(75.0));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
