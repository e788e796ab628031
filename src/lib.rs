//! # mpress Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per i test di integrazione
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore per validazione, compressione e sostituzione
//! - `file_manager`: Validazione dei path e classificazione immagine/video
//! - `atomic`: File temporanei e sostituzione atomica dell'originale
//! - `quantize`: Riduzione della palette PNG a ≤ 256 colori
//! - `image_processor`: Compressione PNG/JPEG in-process
//! - `tool_resolver`: Ricerca dell'eseguibile FFmpeg
//! - `video_processor`: Compressione MOV/MP4/WebM tramite FFmpeg
//! - `optimizer`: Orchestratore per-file ed exit code
//! - `progress`: Statistiche cumulative
//! - `json_output`: Output JSON per `--json`
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use mpress::{Config, MediaOptimizer};
//!
//! let optimizer = MediaOptimizer::new(Config::default())?;
//! let summary = optimizer.process_all(&["photo.png"]).await;
//! ```

pub mod atomic;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod json_output;
pub mod optimizer;
pub mod progress;
pub mod quantize;
pub mod tool_resolver;
pub mod utils;
pub mod video_processor;

pub use atomic::{atomically_replace, CommitOutcome, TempArtifact};
pub use config::Config;
pub use error::{CompressionError, ProcessError, ReplaceError, ValidationError};
pub use file_manager::{FileManager, MediaFile, MediaKind};
pub use optimizer::{MediaOptimizer, ProcessingResult, RunSummary};
