//! Aufbau der Additional Authenticated Data
//!
//! Die Zusatzdaten binden den Geheimtext an Absender, Empfaenger und
//! den unverschluesselt uebertragenen Teil des Bodys. Beide Seiten
//! muessen sie byte-identisch rekonstruieren.
//!
//! ## Layout
//! ```text
//! [sender(2, BE)] [empfaenger(2, BE)] [flags(1)] [gesamt_laenge(2, BE)] [header(n)]
//!   flags: bit0 = Broadcast
//! ```

use funknetz_core::types::NodeId;

/// Baut die Zusatzdaten fuer Ver- und Entschluesselung
///
/// `gesamt_laenge` ist die Laenge des kompletten Encapsulation-Bodys
/// plus der zwei Kommando-Bytes davor; `header` ist der konsumierte
/// Klartext-Header (Sequenznummer, Flags, Klartext-Erweiterungen).
pub fn zusatzdaten_bauen(
    sender: NodeId,
    empfaenger: NodeId,
    broadcast: bool,
    gesamt_laenge: u16,
    header: &[u8],
) -> Vec<u8> {
    let mut aad = Vec::with_capacity(7 + header.len());
    aad.extend_from_slice(&sender.to_be_bytes());
    aad.extend_from_slice(&empfaenger.to_be_bytes());
    aad.push(if broadcast { 0x01 } else { 0x00 });
    aad.extend_from_slice(&gesamt_laenge.to_be_bytes());
    aad.extend_from_slice(header);
    aad
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
