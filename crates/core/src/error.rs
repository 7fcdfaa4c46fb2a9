//! Fehlertypen fuer Funknetz
//!
//! Zentraler Fehler-Enum fuer Querschnittsbelange (Frames, Konfiguration).
//! Die Subsysteme (Krypto, Sicherheits-Engine) definieren eigene Fehler
//! und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Funknetz
pub type Result<T> = std::result::Result<T, FunknetzError>;

/// Querschnitts-Fehler im Funknetz-Stack
#[derive(Debug, Error)]
pub enum FunknetzError {
    #[error("Ungueltiger Frame: {0}")]
    UngueltigerFrame(String),

    #[error("Frame zu kurz: erwartet mindestens {erwartet} Bytes, erhalten {erhalten}")]
    FrameZuKurz { erwartet: usize, erhalten: usize },

    #[error("Unbekanntes Kommando: 0x{0:02X}")]
    UnbekanntesKommando(u8),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl FunknetzError {
    /// Erstellt einen Frame-Fehler aus einer beliebigen Nachricht
    pub fn frame(msg: impl Into<String>) -> Self {
        Self::UngueltigerFrame(msg.into())
    }
}
