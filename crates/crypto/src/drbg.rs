//! AES-CTR-DRBG als SPAN-Nonce-Ratchet
//!
//! Beide Seiten instanziieren den DRBG aus demselben MEI und derselben
//! Personalisierung und erhalten damit eine identische, nie
//! wiederholende Nonce-Folge. Der Zustand ratchet bei jeder Ausgabe
//! weiter; ein Zuruecksetzen ist nur ueber eine frische
//! Entropie-Mischung moeglich.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;

/// AES-128-CTR-DRBG (ohne Ableitungsfunktion)
pub struct CtrDrbg {
    schluessel: [u8; 16],
    v: [u8; 16],
}

impl std::fmt::Debug for CtrDrbg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CtrDrbg {{ zustand: [REDACTED] }}")
    }
}

fn inkrementieren(v: &mut [u8; 16]) {
    for i in (0..16).rev() {
        v[i] = v[i].wrapping_add(1);
        if v[i] != 0 {
            return;
        }
    }
}

impl CtrDrbg {
    /// Instanziiert den DRBG aus 32 Bytes Entropie (MEI) und der
    /// 32-Byte-Personalisierung der Schluessel-Klasse
    pub fn neu(entropie: &[u8; 32], personalisierung: &[u8; 32]) -> Self {
        let mut saat = [0u8; 32];
        for i in 0..32 {
            saat[i] = entropie[i] ^ personalisierung[i];
        }
        let mut drbg = CtrDrbg {
            schluessel: [0u8; 16],
            v: [0u8; 16],
        };
        drbg.aktualisieren(&saat);
        drbg
    }

    /// Update-Funktion des CTR-DRBG: mischt `daten` in Schluessel und V
    fn aktualisieren(&mut self, daten: &[u8; 32]) {
        let cipher = Aes128::new(GenericArray::from_slice(&self.schluessel));
        let mut temp = [0u8; 32];
        for runde in 0..2 {
            inkrementieren(&mut self.v);
            let mut block = GenericArray::clone_from_slice(&self.v);
            cipher.encrypt_block(&mut block);
            temp[runde * 16..(runde + 1) * 16].copy_from_slice(&block);
        }
        for i in 0..16 {
            self.schluessel[i] = temp[i] ^ daten[i];
            self.v[i] = temp[16 + i] ^ daten[16 + i];
        }
    }

    /// Liefert die naechste 16-Byte-Nonce und ratchet den Zustand weiter
    pub fn naechste_nonce(&mut self) -> [u8; 16] {
        let cipher = Aes128::new(GenericArray::from_slice(&self.schluessel));
        inkrementieren(&mut self.v);
        let mut block = GenericArray::clone_from_slice(&self.v);
        cipher.encrypt_block(&mut block);
        let ausgabe: [u8; 16] = block.into();
        self.aktualisieren(&[0u8; 32]);
        ausgabe
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
