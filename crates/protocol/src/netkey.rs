//! Frames des Netzwerkschluessel-Transfers
//!
//! PublicKeyReport, NetworkKeyReport und TransferEnd. NetworkKeyGet und
//! NetworkKeyVerify benoetigen keine eigene Struktur (ein Byte bzw.
//! leer).

use funknetz_core::error::{FunknetzError, Result};
use funknetz_core::types::KeyClass;

/// PublicKeyReport: Flag-Byte + 32-Byte-Curve25519-Schluessel
///
/// ## Frame-Format
/// ```text
/// [flags(1)] [public_key(32)]
///   flags: bit0 = Frame stammt vom aufnehmenden Controller
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyFrame {
    /// True wenn der Absender der in das Netz aufnehmende Controller ist
    pub vom_controller: bool,
    pub public_key: [u8; 32],
}

impl PublicKeyFrame {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(33);
        bytes.push(if self.vom_controller { 0x01 } else { 0x00 });
        bytes.extend_from_slice(&self.public_key);
        bytes
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 33 {
            return Err(FunknetzError::FrameZuKurz {
                erwartet: 33,
                erhalten: bytes.len(),
            });
        }
        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(&bytes[1..33]);
        Ok(Self {
            vom_controller: bytes[0] & 0x01 != 0,
            public_key,
        })
    }
}

/// NetworkKeyReport: gewaehrte Klasse + 16-Byte-Netzwerkschluessel
///
/// Wird ausschliesslich verschluesselt unter dem temporaeren
/// Enrollment-Schluessel uebertragen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkKeyReportFrame {
    pub klasse: KeyClass,
    pub schluessel: [u8; 16],
}

impl NetworkKeyReportFrame {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(17);
        bytes.push(self.klasse.bitmaske());
        bytes.extend_from_slice(&self.schluessel);
        bytes
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 17 {
            return Err(FunknetzError::FrameZuKurz {
                erwartet: 17,
                erhalten: bytes.len(),
            });
        }
        let klasse = *KeyClass::aus_bitmaske(bytes[0]).first().ok_or_else(|| {
            FunknetzError::frame(format!("Unbekannte Schluessel-Klasse: 0x{:02X}", bytes[0]))
        })?;
        let mut schluessel = [0u8; 16];
        schluessel.copy_from_slice(&bytes[1..17]);
        Ok(Self { klasse, schluessel })
    }
}

/// TransferEnd-Flags
///
/// ## Frame-Format
/// ```text
/// [flags(1)]
///   flags: bit0 = Schluessel verifiziert, bit1 = Transfer abgeschlossen
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferEndFrame {
    pub schluessel_verifiziert: bool,
    pub transfer_abgeschlossen: bool,
}

impl TransferEndFrame {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut flags = 0u8;
        if self.schluessel_verifiziert {
            flags |= 0x01;
        }
        if self.transfer_abgeschlossen {
            flags |= 0x02;
        }
        vec![flags]
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(FunknetzError::FrameZuKurz {
                erwartet: 1,
                erhalten: 0,
            });
        }
        Ok(Self {
            schluessel_verifiziert: bytes[0] & 0x01 != 0,
            transfer_abgeschlossen: bytes[0] & 0x02 != 0,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_round_trip() {
        let frame = PublicKeyFrame {
            vom_controller: true,
            public_key: [0xAB; 32],
        };
        let zurueck = PublicKeyFrame::parse(&frame.to_bytes()).unwrap();
        assert_eq!(zurueck, frame);
    }

    #[test]
    fn public_key_zu_kurz() {
        assert!(PublicKeyFrame::parse(&[0x01; 20]).is_err());
    }

    #[test]
    fn network_key_report_round_trip() {
        let frame = NetworkKeyReportFrame {
            klasse: KeyClass::Unauthenticated,
            schluessel: [0x5A; 16],
        };
        let zurueck = NetworkKeyReportFrame::parse(&frame.to_bytes()).unwrap();
        assert_eq!(zurueck, frame);
    }

    #[test]
    fn network_key_unbekannte_klasse() {
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(NetworkKeyReportFrame::parse(&bytes).is_err());
    }

    #[test]
    fn transfer_end_round_trip() {
        let frame = TransferEndFrame {
            schluessel_verifiziert: true,
            transfer_abgeschlossen: false,
        };
        let zurueck = TransferEndFrame::parse(&frame.to_bytes()).unwrap();
        assert_eq!(zurueck, frame);
    }
}
