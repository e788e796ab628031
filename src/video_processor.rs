//! # Video Processing Module
//!
//! Questo modulo gestisce la compressione dei video tramite un processo FFmpeg esterno.
//!
//! ## Responsabilità:
//! - Risoluzione dell'eseguibile FFmpeg prima di creare qualsiasi file
//! - Costruzione degli argomenti per container (MOV/MP4 vs WebM)
//! - Cattura di stdout/stderr del processo figlio (mai ereditati)
//! - Distinzione tra encoder mancante, exit code non zero e output assente
//!
//! ## Parametri per container:
//! | Container | Video                          | Audio     |
//! |-----------|--------------------------------|-----------|
//! | MOV/MP4   | libx264, CRF 28, preset medium | copia     |
//! | WebM      | libvpx-vp9, CRF 30, `-b:v 0`   | libopus   |
//!
//! `-b:v 0` mette VP9 in modalità a qualità costante. Un temporaneo rimasto
//! da un'esecuzione interrotta viene eliminato prima di lanciare FFmpeg, così
//! il controllo sull'output vede solo ciò che FFmpeg ha scritto.
//!
//! ## Controllo qualità (CRF):
//! - 0-17: Visualmente lossless (file grandi)
//! - 18-23: Alta qualità
//! - 24-28: Buona qualità (default H.264, bilanciato)
//! - 29-35: Qualità accettabile (default VP9)
//!
//! ## Esempio:
//! ```rust,ignore
//! let processor = VideoProcessor::new(config);
//! let outcome = processor.compress(&media).await?;
//! ```

use crate::args;
use crate::atomic::{CommitOutcome, TempArtifact};
use crate::config::Config;
use crate::error::CompressionError;
use crate::file_manager::MediaFile;
use crate::tool_resolver::{self, ToolPathResolver};
use crate::utils::display_command;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

/// Codec family chosen from the container extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// MOV and MP4
    H264,
    /// WebM
    Vp9,
}

impl VideoCodec {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "mov" | "mp4" => Some(Self::H264),
            "webm" => Some(Self::Vp9),
            _ => None,
        }
    }
}

/// Handles video compression
pub struct VideoProcessor {
    config: Config,
    resolver: ToolPathResolver,
}

impl VideoProcessor {
    pub fn new(config: Config) -> Self {
        let resolver = ToolPathResolver::new(config.encoder.clone());
        Self { config, resolver }
    }

    /// Compress `media` with FFmpeg and swap the result in for the original.
    pub async fn compress(&self, media: &MediaFile) -> Result<CommitOutcome, CompressionError> {
        let extension = media.extension().unwrap_or_default();
        let codec = VideoCodec::from_extension(&extension).ok_or_else(|| {
            CompressionError::UnsupportedFormat {
                kind: "video",
                extension: format!(".{}", extension),
            }
        })?;

        // Checked before the temp exists, so a missing encoder leaves nothing behind
        let encoder = self.resolver.check_tool_with_instructions()?;

        let temp = TempArtifact::for_video(&media.path)?;
        let args = self.encoder_args(codec, &media.path, temp.path());
        debug!("Running {}", display_command(&encoder, &args));

        let start_time = Instant::now();
        let output = Command::new(&encoder)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => tool_resolver::not_found(),
                _ => CompressionError::Spawn {
                    path: media.path.clone(),
                    source: e,
                },
            })?;

        if !output.status.success() {
            debug!(
                "FFmpeg exited with {} after {:.1}s",
                output.status,
                start_time.elapsed().as_secs_f64()
            );
            return Err(CompressionError::EncodeFailed {
                path: media.path.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if tokio::fs::metadata(temp.path()).await.is_err() {
            return Err(CompressionError::NoOutput(temp.path().to_path_buf()));
        }

        debug!(
            "Video compression of {} completed in {:.1}s",
            media.path.display(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(temp.commit(&media.path, &self.config).await?)
    }

    /// Full FFmpeg argument list for one transcode
    pub fn encoder_args(&self, codec: VideoCodec, input: &Path, output: &Path) -> Vec<OsString> {
        let codec_args = match codec {
            VideoCodec::H264 => args![
                "-c:v",
                "libx264",
                "-crf",
                self.config.h264_crf,
                "-preset",
                self.config.h264_preset,
                "-c:a",
                "copy",
            ],
            VideoCodec::Vp9 => args![
                "-c:v",
                "libvpx-vp9",
                "-crf",
                self.config.vp9_crf,
                "-b:v",
                0,
                "-c:a",
                "libopus",
            ],
        };

        let mut args = vec![OsString::from("-i"), input.into()];
        args.extend(codec_args.into_iter().map(OsString::from));
        args.push("-y".into());
        args.push(output.into());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_manager::FileManager;
    use std::fs;
    use tempfile::TempDir;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_h264_args() {
        let processor = VideoProcessor::new(Config::default());
        let args = processor.encoder_args(
            VideoCodec::H264,
            Path::new("/v/clip.mp4"),
            Path::new("/v/.clip.mp4.tmp.mp4"),
        );
        assert_eq!(
            strings(&args),
            vec![
                "-i", "/v/clip.mp4", "-c:v", "libx264", "-crf", "28", "-preset", "medium", "-c:a",
                "copy", "-y", "/v/.clip.mp4.tmp.mp4"
            ]
        );
    }

    #[test]
    fn test_vp9_args() {
        let processor = VideoProcessor::new(Config::default());
        let args = processor.encoder_args(
            VideoCodec::Vp9,
            Path::new("/v/clip.webm"),
            Path::new("/v/.clip.webm.tmp.webm"),
        );
        assert_eq!(
            strings(&args),
            vec![
                "-i", "/v/clip.webm", "-c:v", "libvpx-vp9", "-crf", "30", "-b:v", "0", "-c:a",
                "libopus", "-y", "/v/.clip.webm.tmp.webm"
            ]
        );
    }

    #[test]
    fn test_codec_from_extension() {
        assert_eq!(VideoCodec::from_extension("mov"), Some(VideoCodec::H264));
        assert_eq!(VideoCodec::from_extension("mp4"), Some(VideoCodec::H264));
        assert_eq!(VideoCodec::from_extension("webm"), Some(VideoCodec::Vp9));
        assert_eq!(VideoCodec::from_extension("avi"), None);
    }

    fn video(dir: &TempDir, name: &str) -> MediaFile {
        let path = dir.path().join(name);
        fs::write(&path, b"original video payload").unwrap();
        FileManager::validate(&path).unwrap()
    }

    fn leftover_temp_files(dir: &TempDir) -> Vec<String> {
        fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".tmp"))
            .collect()
    }

    #[tokio::test]
    async fn test_missing_encoder() {
        let dir = TempDir::new().unwrap();
        let media = video(&dir, "clip.mp4");
        let config = Config {
            encoder: "/nonexistent/bin/ffmpeg".to_string(),
            ..Default::default()
        };

        let err = VideoProcessor::new(config).compress(&media).await.unwrap_err();

        assert!(matches!(err, CompressionError::EncoderNotFound { .. }));
        assert_eq!(fs::read(&media.path).unwrap(), b"original video payload");
        assert!(leftover_temp_files(&dir).is_empty());
    }

    #[cfg(unix)]
    mod fake_encoder {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Write an executable shell script standing in for ffmpeg
        fn script(dir: &Path, body: &str) -> String {
            let path = dir.join("fake-ffmpeg");
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn processor(encoder: String) -> VideoProcessor {
            VideoProcessor::new(Config {
                encoder,
                ..Default::default()
            })
        }

        #[tokio::test]
        async fn test_nonzero_exit_carries_stderr() {
            let tools = TempDir::new().unwrap();
            let dir = TempDir::new().unwrap();
            let media = video(&dir, "clip.mov");
            let encoder = script(tools.path(), "echo boom >&2\nexit 1");

            let err = processor(encoder).compress(&media).await.unwrap_err();

            match err {
                CompressionError::EncodeFailed { stderr, .. } => assert_eq!(stderr, "boom"),
                other => panic!("unexpected error: {other:?}"),
            }
            assert_eq!(fs::read(&media.path).unwrap(), b"original video payload");
            assert!(leftover_temp_files(&dir).is_empty());
        }

        #[tokio::test]
        async fn test_success_without_output_file() {
            let tools = TempDir::new().unwrap();
            let dir = TempDir::new().unwrap();
            let media = video(&dir, "clip.mp4");
            let encoder = script(tools.path(), "exit 0");

            let err = processor(encoder).compress(&media).await.unwrap_err();

            assert!(matches!(err, CompressionError::NoOutput(_)));
            assert!(err.to_string().starts_with("FFmpeg did not create output file"));
            assert_eq!(fs::read(&media.path).unwrap(), b"original video payload");
        }

        #[tokio::test]
        async fn test_leftover_temp_is_not_mistaken_for_output() {
            let tools = TempDir::new().unwrap();
            let dir = TempDir::new().unwrap();
            let media = video(&dir, "clip.mp4");
            // What a run killed mid-encode leaves behind
            fs::write(dir.path().join(".clip.mp4.tmp.mp4"), b"trunc").unwrap();
            let encoder = script(tools.path(), "exit 0");

            let err = processor(encoder).compress(&media).await.unwrap_err();

            assert!(matches!(err, CompressionError::NoOutput(_)));
            assert_eq!(fs::read(&media.path).unwrap(), b"original video payload");
            assert!(leftover_temp_files(&dir).is_empty());
        }

        #[tokio::test]
        async fn test_successful_encode_replaces_original() {
            let tools = TempDir::new().unwrap();
            let dir = TempDir::new().unwrap();
            let media = video(&dir, "clip.webm");
            let log = tools.path().join("args.log");
            let encoder = script(
                tools.path(),
                &format!(
                    "for last; do :; done\nprintf '%s\\n' \"$@\" > '{}'\nprintf small > \"$last\"",
                    log.display()
                ),
            );

            let outcome = processor(encoder).compress(&media).await.unwrap();

            assert_eq!(
                outcome,
                CommitOutcome::Replaced {
                    original_size: 22,
                    compressed_size: 5
                }
            );
            assert_eq!(fs::read(&media.path).unwrap(), b"small");
            assert!(leftover_temp_files(&dir).is_empty());

            let logged = fs::read_to_string(&log).unwrap();
            let logged: Vec<&str> = logged.lines().collect();
            assert_eq!(&logged[2..4], &["-c:v", "libvpx-vp9"]);
            assert!(logged.last().unwrap().ends_with(".clip.webm.tmp.webm"));
        }

        #[tokio::test]
        async fn test_stale_temp_is_overwritten() {
            let tools = TempDir::new().unwrap();
            let dir = TempDir::new().unwrap();
            let media = video(&dir, "clip.mp4");
            fs::write(dir.path().join(".clip.mp4.tmp.mp4"), b"stale leftover").unwrap();
            let encoder = script(tools.path(), "for last; do :; done\nprintf new > \"$last\"");

            processor(encoder).compress(&media).await.unwrap();

            assert_eq!(fs::read(&media.path).unwrap(), b"new");
            assert!(leftover_temp_files(&dir).is_empty());
        }
    }
}
