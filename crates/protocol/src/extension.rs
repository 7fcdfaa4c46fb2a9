//! Erweiterungs-TLVs des Encapsulation-Bodys
//!
//! Jede Erweiterung traegt ein Laengen-Byte (inklusive Laengen- und
//! Typ-Byte) und ein Typ-Byte. Bit 7 des Typ-Bytes kuendigt eine
//! weitere Erweiterung an, die Bits 0-5 bestimmen den Typ.
//!
//! ## TLV-Format
//! ```text
//! [laenge(1)] [cont(bit7) | typ(bits 0-5)] [daten(laenge - 2)]
//! ```

use funknetz_core::error::{FunknetzError, Result};

const TYP_SPAN: u8 = 0x01;
const TYP_MPAN: u8 = 0x02;
const TYP_MULTICAST_GRUPPE: u8 = 0x03;

const CONT_BIT: u8 = 0x80;
const TYP_MASKE: u8 = 0x3F;

/// Eine einzelne Erweiterung
///
/// `Mpan` darf nur im verschluesselten Erweiterungsblock auftreten, die
/// uebrigen Typen nur im Klartext-Block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    /// Entropie-Beitrag des Senders fuer die SPAN-Synchronisation
    Span { entropie: [u8; 16] },
    /// Gruppen-Zustand fuer Multicast (nur verschluesselt)
    Mpan { gruppe: u8, zustand: [u8; 16] },
    /// Multicast-Gruppen-ID
    MulticastGruppe { gruppe: u8 },
    /// Unbekannter Typ, Daten werden durchgereicht
    Unbekannt { typ: u8, daten: Vec<u8> },
}

impl Extension {
    fn typ(&self) -> u8 {
        match self {
            Self::Span { .. } => TYP_SPAN,
            Self::Mpan { .. } => TYP_MPAN,
            Self::MulticastGruppe { .. } => TYP_MULTICAST_GRUPPE,
            Self::Unbekannt { typ, .. } => *typ,
        }
    }

    fn daten(&self) -> Vec<u8> {
        match self {
            Self::Span { entropie } => entropie.to_vec(),
            Self::Mpan { gruppe, zustand } => {
                let mut d = Vec::with_capacity(17);
                d.push(*gruppe);
                d.extend_from_slice(zustand);
                d
            }
            Self::MulticastGruppe { gruppe } => vec![*gruppe],
            Self::Unbekannt { daten, .. } => daten.clone(),
        }
    }
}

/// Serialisiert eine Liste von Erweiterungen als TLV-Kette
pub fn erweiterungen_serialisieren(erweiterungen: &[Extension]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (i, erweiterung) in erweiterungen.iter().enumerate() {
        let daten = erweiterung.daten();
        let mut typ = erweiterung.typ() & TYP_MASKE;
        if i + 1 < erweiterungen.len() {
            typ |= CONT_BIT;
        }
        bytes.push((daten.len() + 2) as u8);
        bytes.push(typ);
        bytes.extend_from_slice(&daten);
    }
    bytes
}

/// Parst eine TLV-Kette und liefert die Erweiterungen samt konsumierter
/// Byte-Anzahl
pub fn erweiterungen_parsen(bytes: &[u8]) -> Result<(Vec<Extension>, usize)> {
    let mut erweiterungen = Vec::new();
    let mut pos = 0usize;
    loop {
        if bytes.len() < pos + 2 {
            return Err(FunknetzError::FrameZuKurz {
                erwartet: pos + 2,
                erhalten: bytes.len(),
            });
        }
        let laenge = bytes[pos] as usize;
        if laenge < 2 || bytes.len() < pos + laenge {
            return Err(FunknetzError::frame(format!(
                "Ungueltige Erweiterungs-Laenge: {laenge}"
            )));
        }
        let typ_byte = bytes[pos + 1];
        let daten = &bytes[pos + 2..pos + laenge];
        let erweiterung = match typ_byte & TYP_MASKE {
            TYP_SPAN => {
                if daten.len() != 16 {
                    return Err(FunknetzError::frame(format!(
                        "SPAN-Erweiterung mit {} statt 16 Entropie-Bytes",
                        daten.len()
                    )));
                }
                let mut entropie = [0u8; 16];
                entropie.copy_from_slice(daten);
                Extension::Span { entropie }
            }
            TYP_MPAN => {
                if daten.len() != 17 {
                    return Err(FunknetzError::frame(format!(
                        "MPAN-Erweiterung mit {} statt 17 Bytes",
                        daten.len()
                    )));
                }
                let mut zustand = [0u8; 16];
                zustand.copy_from_slice(&daten[1..]);
                Extension::Mpan {
                    gruppe: daten[0],
                    zustand,
                }
            }
            TYP_MULTICAST_GRUPPE => {
                if daten.is_empty() {
                    return Err(FunknetzError::frame(
                        "Multicast-Erweiterung ohne Gruppen-ID".to_string(),
                    ));
                }
                Extension::MulticastGruppe { gruppe: daten[0] }
            }
            typ => Extension::Unbekannt {
                typ,
                daten: daten.to_vec(),
            },
        };
        erweiterungen.push(erweiterung);
        pos += laenge;
        if typ_byte & CONT_BIT == 0 {
            break;
        }
    }
    Ok((erweiterungen, pos))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
