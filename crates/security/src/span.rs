//! SPAN-Zustand: synchronisierter Nonce-Ratchet pro Gegenstelle
//!
//! Beide Seiten initialisieren den Ratchet aus demselben MEI (gemischte
//! Entropie beider Seiten) und demselben Personalisierungs-String der
//! Schluessel-Klasse. Jeder gekapselte Frame verbraucht auf beiden
//! Seiten genau eine Nonce; die Stroeme bleiben dadurch synchron.

use funknetz_crypto::drbg::CtrDrbg;
use funknetz_crypto::kdf::{entropie_expandieren, entropie_extrahieren};

/// Synchronisierter Nonce-Ratchet
#[derive(Debug)]
pub struct SpanZustand {
    ratchet: CtrDrbg,
}

impl SpanZustand {
    /// Initialisiert den Ratchet aus den Entropie-Beitraegen beider
    /// Seiten und dem Personalisierungs-String der Schluessel-Klasse
    pub fn neu(
        sender_entropie: &[u8; 16],
        empfaenger_entropie: &[u8; 16],
        personalisierung: &[u8; 32],
    ) -> Self {
        let prk = entropie_extrahieren(sender_entropie, empfaenger_entropie);
        let mei = entropie_expandieren(&prk);
        Self {
            ratchet: CtrDrbg::neu(&mei, personalisierung),
        }
    }

    /// Liefert die naechste 16-Byte-Nonce und schaltet den Ratchet weiter
    pub fn naechste_nonce(&mut self) -> [u8; 16] {
        self.ratchet.naechste_nonce()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
