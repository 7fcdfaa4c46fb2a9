//! NonceGet/NonceReport-Frames
//!
//! NonceGet traegt nur die Sequenznummer. Der NonceReport antwortet mit
//! dem Entropie-Beitrag des Empfaengers (SOS) und/oder dem Hinweis auf
//! verlorenen Gruppen-Zustand (MOS).
//!
//! ## NonceReport-Format
//! ```text
//! [sequenz(1)] [flags(1)] [entropie(16), nur wenn SOS]
//!   flags: bit0 = SOS, bit1 = MOS
//! ```

use funknetz_core::error::{FunknetzError, Result};

/// NonceReport-Frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceReportFrame {
    pub sequenz: u8,
    /// Singlecast out of sync: Entropie-Beitrag liegt bei
    pub sos: bool,
    /// Multicast out of sync
    pub mos: bool,
    pub entropie: Option<[u8; 16]>,
}

impl NonceReportFrame {
    /// Baut einen SOS-Report mit Entropie-Beitrag
    pub fn mit_entropie(sequenz: u8, entropie: [u8; 16]) -> Self {
        Self {
            sequenz,
            sos: true,
            mos: false,
            entropie: Some(entropie),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut flags = 0u8;
        if self.sos {
            flags |= 0x01;
        }
        if self.mos {
            flags |= 0x02;
        }
        let mut bytes = vec![self.sequenz, flags];
        if let Some(entropie) = &self.entropie {
            bytes.extend_from_slice(entropie);
        }
        bytes
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(FunknetzError::FrameZuKurz {
                erwartet: 2,
                erhalten: bytes.len(),
            });
        }
        let sos = bytes[1] & 0x01 != 0;
        let mos = bytes[1] & 0x02 != 0;
        let entropie = if sos {
            if bytes.len() < 18 {
                return Err(FunknetzError::FrameZuKurz {
                    erwartet: 18,
                    erhalten: bytes.len(),
                });
            }
            let mut e = [0u8; 16];
            e.copy_from_slice(&bytes[2..18]);
            Some(e)
        } else {
            None
        };
        Ok(Self {
            sequenz: bytes[0],
            sos,
            mos,
            entropie,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
