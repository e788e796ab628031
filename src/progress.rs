//! # Statistics Module
//!
//! Questo modulo traccia le statistiche cumulative di una esecuzione.
//!
//! ## Statistiche tracciate:
//! - **files_processed**: Totale path elaborati
//! - **files_compressed**: File effettivamente sostituiti
//! - **files_kept**: File compressi ma non sostituiti (dry run o soglia)
//! - **total_bytes_saved**: Byte risparmiati dai file sostituiti
//! - **total_original_size**: Dimensione totale dei file compressi con successo
//! - **errors**: Numero di path falliti (validazione o compressione)

use crate::file_manager::FileManager;

/// Statistics tracker for compression results
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OptimizationStats {
    pub files_processed: usize,
    pub files_compressed: usize,
    pub files_kept: usize,
    pub total_bytes_saved: u64,
    pub total_original_size: u64,
    pub errors: usize,
}

impl OptimizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_compressed(&mut self, original_size: u64, new_size: u64) {
        self.files_processed += 1;
        self.files_compressed += 1;
        self.total_original_size += original_size;
        self.total_bytes_saved += original_size.saturating_sub(new_size);
    }

    pub fn add_kept(&mut self, original_size: u64) {
        self.files_processed += 1;
        self.files_kept += 1;
        self.total_original_size += original_size;
    }

    pub fn add_error(&mut self) {
        self.files_processed += 1;
        self.errors += 1;
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        if self.total_original_size > 0 {
            (self.total_bytes_saved as f64 / self.total_original_size as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Compressed: {} | Kept: {} | Errors: {} | Total saved: {} ({:.2}%)",
            self.files_processed,
            self.files_compressed,
            self.files_kept,
            self.errors,
            FileManager::format_size(self.total_bytes_saved),
            self.overall_reduction_percent()
        )
    }
}
