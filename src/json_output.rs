//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per uso programmatico (`--json`).
//!
//! ## Responsabilità:
//! - Emette una riga JSON per ogni path elaborato al posto delle righe leggibili
//! - Emette una riga finale con le statistiche aggregate
//!
//! ## Tipi di messaggi:
//! - `file_complete`: Fine elaborazione di un path (successo o errore)
//! - `complete`: Fine esecuzione con statistiche finali

use crate::progress::OptimizationStats;
use serde::{Deserialize, Serialize};

/// Tipo di messaggio JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Fine elaborazione di un path
    #[serde(rename = "file_complete")]
    FileComplete {
        /// Path as given on the command line
        path: String,
        success: bool,
        /// Whether the original was replaced
        replaced: bool,
        original_size: Option<u64>,
        compressed_size: Option<u64>,
        reduction_percent: Option<f64>,
        /// Human-readable line, or the error report on failure
        message: String,
    },

    /// Esecuzione completata
    #[serde(rename = "complete")]
    Complete {
        files_processed: usize,
        files_compressed: usize,
        files_kept: usize,
        errors: usize,
        total_bytes_saved: u64,
        average_reduction: f64,
        duration_seconds: f64,
        success: bool,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::warn!("Failed to serialize JSON message: {}", e),
        }
    }

    /// Crea un messaggio di completamento generale
    pub fn complete(stats: &OptimizationStats, duration_seconds: f64, success: bool) -> Self {
        Self::Complete {
            files_processed: stats.files_processed,
            files_compressed: stats.files_compressed,
            files_kept: stats.files_kept,
            errors: stats.errors,
            total_bytes_saved: stats.total_bytes_saved,
            average_reduction: stats.overall_reduction_percent(),
            duration_seconds,
            success,
        }
    }
}
