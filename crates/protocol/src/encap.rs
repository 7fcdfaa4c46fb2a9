//! Layout des Encapsulation-Bodys
//!
//! Der Body beginnt mit dem Klartext-Header (Sequenznummer, Flags,
//! optionale Klartext-Erweiterungen); dahinter folgt der Geheimtext
//! samt 8-Byte-Tag. Verschluesselte Erweiterungen liegen innerhalb des
//! Geheimtexts und werden erst nach der Entschluesselung geparst.
//!
//! ## Body-Format
//! ```text
//! [sequenz(1)] [flags(1)] [klartext-TLVs] [geheimtext || tag(8)]
//!   flags: bit0 = Klartext-Erweiterungen, bit1 = verschluesselte Erweiterungen
//! ```

use funknetz_core::error::{FunknetzError, Result};

use crate::extension::{erweiterungen_parsen, erweiterungen_serialisieren, Extension};

const FLAG_ERWEITERUNG: u8 = 0x01;
const FLAG_VERSCHLUESSELTE_ERWEITERUNG: u8 = 0x02;

/// Geparster bzw. zu serialisierender Encapsulation-Body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncapsulationBody {
    pub sequenz: u8,
    /// Klartext-Erweiterungen
    pub erweiterungen: Vec<Extension>,
    /// True wenn der Geheimtext mit einem Erweiterungsblock beginnt
    pub hat_verschluesselte_erweiterungen: bool,
    /// Geheimtext inklusive Tag
    pub geheimtext: Vec<u8>,
}

impl EncapsulationBody {
    /// Serialisiert den Body; liefert die Bytes und die Laenge des
    /// Klartext-Headers (der Teil, der in die Zusatzdaten eingeht)
    pub fn to_bytes(&self) -> (Vec<u8>, usize) {
        let mut flags = 0u8;
        if !self.erweiterungen.is_empty() {
            flags |= FLAG_ERWEITERUNG;
        }
        if self.hat_verschluesselte_erweiterungen {
            flags |= FLAG_VERSCHLUESSELTE_ERWEITERUNG;
        }
        let mut bytes = vec![self.sequenz, flags];
        if !self.erweiterungen.is_empty() {
            bytes.extend_from_slice(&erweiterungen_serialisieren(&self.erweiterungen));
        }
        let header_laenge = bytes.len();
        bytes.extend_from_slice(&self.geheimtext);
        (bytes, header_laenge)
    }

    /// Parst einen Body; liefert den Body und die Laenge des
    /// Klartext-Headers
    pub fn parse(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < 2 {
            return Err(FunknetzError::FrameZuKurz {
                erwartet: 2,
                erhalten: bytes.len(),
            });
        }
        let sequenz = bytes[0];
        let flags = bytes[1];
        let mut pos = 2usize;
        let erweiterungen = if flags & FLAG_ERWEITERUNG != 0 {
            let (liste, konsumiert) = erweiterungen_parsen(&bytes[2..])?;
            pos += konsumiert;
            liste
        } else {
            Vec::new()
        };
        Ok((
            Self {
                sequenz,
                erweiterungen,
                hat_verschluesselte_erweiterungen: flags & FLAG_VERSCHLUESSELTE_ERWEITERUNG != 0,
                geheimtext: bytes[pos..].to_vec(),
            },
            pos,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
