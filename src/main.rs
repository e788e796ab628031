//! # mpress - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del logging con `tracing` (sempre su stderr)
//! - Caricamento della configurazione (file JSON + override da CLI)
//! - Avvio dell'orchestratore e traduzione del risultato in exit code
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (file, qualità, crf, encoder, etc.)
//! 2. Configura il logging (WARN o DEBUG a seconda del flag verbose, `RUST_LOG` vince)
//! 3. Nessun file (e niente `--save-config`) → usage + `Error: No files specified.`, exit 1
//! 4. Carica `Config` dal file di default o da `--config`, applica gli override
//! 5. Con `--save-config` salva la configurazione effettiva; senza file termina con 0
//! 6. Elabora i file in sequenza ed esce con 0 solo se tutti hanno avuto successo
//!
//! I path restano `PathBuf` fino alla validazione, così i nomi non UTF-8
//! arrivano al validatore invece di essere rifiutati da `clap`.
//!
//! ## Esempio di utilizzo:
//! ```bash
//! mpress photo.png clip.mp4 --quality 80 --crf 30 --verbose
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use mpress::{Config, MediaOptimizer};

#[derive(Parser)]
#[command(name = "mpress", version)]
#[command(about = "Compress images and videos in place, replacing each original atomically")]
struct Args {
    /// Media files to compress (.png, .jpg, .jpeg, .mov, .mp4, .webm)
    files: Vec<PathBuf>,

    /// Configuration file (JSON); defaults to the user config directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// JPEG quality (1-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// CRF for MOV/MP4 (0-51, lower = better quality)
    #[arg(long)]
    crf: Option<u8>,

    /// CRF for WebM (0-63, lower = better quality)
    #[arg(long)]
    webm_crf: Option<u8>,

    /// libx264 preset for MOV/MP4
    #[arg(long)]
    preset: Option<String>,

    /// FFmpeg executable name or path
    #[arg(long)]
    ffmpeg: Option<String>,

    /// Replace only if new size <= original * threshold
    #[arg(long)]
    threshold: Option<f64>,

    /// Dry run - compress but don't replace the originals
    #[arg(long)]
    dry_run: bool,

    /// Output results as JSON lines
    #[arg(long)]
    json: bool,

    /// Write the effective configuration to the config file
    #[arg(long)]
    save_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.files.is_empty() && !args.save_config {
        eprintln!("{}", Args::command().render_usage());
        eprintln!("Error: No files specified.");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "mpress=debug,warn" } else { "warn" })
    });

    // Logs go to stderr; stdout carries one result line per file
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = load_config(&args).await?;
    debug!("Effective configuration: {:?}", config);

    if args.save_config {
        let path = args
            .config
            .clone()
            .or_else(Config::default_path)
            .context("No configuration directory available; pass --config")?;
        config.save_to_file(&path).await?;
        println!("Saved configuration to {}", path.display());

        if args.files.is_empty() {
            return Ok(ExitCode::SUCCESS);
        }
    }

    let optimizer = MediaOptimizer::new(config)?;
    let summary = optimizer.process_all(&args.files).await;

    Ok(ExitCode::from(summary.exit_code()))
}

async fn load_config(args: &Args) -> Result<Config> {
    let mut config = match (&args.config, Config::default_path()) {
        (Some(path), _) => {
            // --save-config may create the file
            if !args.save_config && !path.is_file() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Config::from_file(path).await?
        }
        (None, Some(path)) => Config::from_file(&path)
            .await
            .with_context(|| format!("Failed to load {}", path.display()))?,
        (None, None) => Config::default(),
    };

    if let Some(quality) = args.quality {
        config.jpeg_quality = quality;
    }
    if let Some(crf) = args.crf {
        config.h264_crf = crf;
    }
    if let Some(crf) = args.webm_crf {
        config.vp9_crf = crf;
    }
    if let Some(preset) = &args.preset {
        config.h264_preset = preset.clone();
    }
    if let Some(ffmpeg) = &args.ffmpeg {
        config.encoder = ffmpeg.clone();
    }
    if args.threshold.is_some() {
        config.size_threshold = args.threshold;
    }
    config.dry_run |= args.dry_run;
    config.json_output |= args.json;

    config.validate()?;
    Ok(config)
}
