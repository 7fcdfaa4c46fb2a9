//! Fehlertypen fuer das Krypto-Subsystem

use thiserror::Error;

/// Fehler im Krypto-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Authentifizierung fehlgeschlagen: AEAD-Tag ungueltig")]
    Authentifizierung,

    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    #[error("Geheimtext zu kurz: mindestens {erwartet} Bytes erwartet, erhalten {erhalten}")]
    GeheimtextZuKurz { erwartet: usize, erhalten: usize },
}

pub type CryptoResult<T> = Result<T, CryptoError>;
