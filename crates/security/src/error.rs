//! Fehlertypen der Sicherheits-Engine

use thiserror::Error;

use funknetz_core::error::FunknetzError;
use funknetz_core::types::NodeId;
use funknetz_crypto::error::CryptoError;
use funknetz_protocol::command::KexFailGrund;

/// Result-Alias der Sicherheits-Engine
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;

/// Fehler der Sicherheits-Engine
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Kein Netzwerkschluessel fuer Knoten {node}")]
    KeinSchluessel { node: NodeId },

    #[error("Zeitlimit im Enrollment mit Knoten {node} (Schritt: {schritt})")]
    HandshakeZeitlimit { node: NodeId, schritt: &'static str },

    #[error("Replay von Knoten {node} erkannt (Sequenz {sequenz})")]
    ReplayErkannt { node: NodeId, sequenz: u8 },

    #[error("Gegenstelle meldet KEX-Fehler: {0}")]
    ProtokollSignal(KexFailGrund),

    #[error("Gegenstelle unterstuetzt weder Schema noch Kurve")]
    Inkompatibel,

    #[error("Enrollment abgebrochen")]
    Abgebrochen,

    #[error("Transport-Fehler: {0}")]
    Transport(String),

    #[error(transparent)]
    Krypto(#[from] CryptoError),

    #[error(transparent)]
    Frame(#[from] FunknetzError),
}
