//! Kommando-IDs der Sicherheits-Kommandoklasse und KEX-Fehlercodes

use serde::{Deserialize, Serialize};

use funknetz_core::error::FunknetzError;

/// Kommandoklassen-ID der Sicherheitsschicht
pub const KOMMANDOKLASSE_SICHERHEIT: u8 = 0x9F;

/// Kommandos der Sicherheits-Kommandoklasse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SecurityCommand {
    NonceGet = 0x01,
    NonceReport = 0x02,
    MessageEncap = 0x03,
    KexGet = 0x04,
    KexReport = 0x05,
    KexSet = 0x06,
    KexFail = 0x07,
    PublicKeyReport = 0x08,
    NetworkKeyGet = 0x09,
    NetworkKeyReport = 0x0A,
    NetworkKeyVerify = 0x0B,
    TransferEnd = 0x0C,
    CommandsSupportedGet = 0x0D,
    CommandsSupportedReport = 0x0E,
}

impl TryFrom<u8> for SecurityCommand {
    type Error = FunknetzError;

    fn try_from(wert: u8) -> Result<Self, Self::Error> {
        Ok(match wert {
            0x01 => Self::NonceGet,
            0x02 => Self::NonceReport,
            0x03 => Self::MessageEncap,
            0x04 => Self::KexGet,
            0x05 => Self::KexReport,
            0x06 => Self::KexSet,
            0x07 => Self::KexFail,
            0x08 => Self::PublicKeyReport,
            0x09 => Self::NetworkKeyGet,
            0x0A => Self::NetworkKeyReport,
            0x0B => Self::NetworkKeyVerify,
            0x0C => Self::TransferEnd,
            0x0D => Self::CommandsSupportedGet,
            0x0E => Self::CommandsSupportedReport,
            sonst => return Err(FunknetzError::UnbekanntesKommando(sonst)),
        })
    }
}

/// Vom Geraet signalisierter KEX-Fehlergrund
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum KexFailGrund {
    Schluessel = 0x01,
    Schema = 0x02,
    Kurve = 0x03,
    Entschluesselung = 0x05,
    Abbruch = 0x06,
    Authentifizierung = 0x07,
    SchluesselAbruf = 0x08,
    SchluesselVerifikation = 0x09,
    SchluesselReport = 0x0A,
}

impl KexFailGrund {
    pub fn beschreibung(&self) -> &'static str {
        match self {
            Self::Schluessel => "Schluessel-Fehler",
            Self::Schema => "Schema nicht unterstuetzt",
            Self::Kurve => "Kurve nicht unterstuetzt",
            Self::Entschluesselung => "Entschluesselung fehlgeschlagen",
            Self::Abbruch => "Vom Benutzer abgebrochen",
            Self::Authentifizierung => "Authentifizierung fehlgeschlagen",
            Self::SchluesselAbruf => "Schluessel-Abruf fehlgeschlagen",
            Self::SchluesselVerifikation => "Schluessel-Verifikation fehlgeschlagen",
            Self::SchluesselReport => "Schluessel-Report fehlgeschlagen",
        }
    }
}

impl TryFrom<u8> for KexFailGrund {
    type Error = FunknetzError;

    fn try_from(wert: u8) -> Result<Self, Self::Error> {
        Ok(match wert {
            0x01 => Self::Schluessel,
            0x02 => Self::Schema,
            0x03 => Self::Kurve,
            0x05 => Self::Entschluesselung,
            0x06 => Self::Abbruch,
            0x07 => Self::Authentifizierung,
            0x08 => Self::SchluesselAbruf,
            0x09 => Self::SchluesselVerifikation,
            0x0A => Self::SchluesselReport,
            sonst => {
                return Err(FunknetzError::frame(format!(
                    "Unbekannter KEX-Fehlercode: 0x{sonst:02X}"
                )))
            }
        })
    }
}

impl std::fmt::Display for KexFailGrund {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.beschreibung())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
