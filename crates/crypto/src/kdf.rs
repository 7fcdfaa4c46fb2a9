//! CKDF-Ableitungsketten
//!
//! Zwei Extract/Expand-Ketten auf CMAC-Basis:
//!
//! 1. Entropie-Mischung: beide Seiten steuern 16 Bytes Zufall bei,
//!    daraus entsteht das 32-Byte-MEI, mit dem der SPAN-Zustand
//!    (Nonce-Ratchet) beider Seiten identisch initialisiert wird.
//! 2. Schluessel-Familie: aus einem geteilten Geheimnis (ECDH waehrend
//!    des Enrollments bzw. dem Netzwerkschluessel einer Klasse) werden
//!    CCM-Schluessel, Personalisierungs-String und optional der
//!    Gruppen-Schluessel abgeleitet.
//!
//! Alle Konstanten und Rundenzahlen sind protokollfest; jede Abweichung
//! bricht die Interoperabilitaet.

use crate::cmac::{cmac_berechnen, BLOCK_GROESSE};

/// Domaenen-Konstante der Entropie-Mischung
const KONST_ENTROPIE: [u8; 16] = [0x26; 16];
/// Domaenen-Konstante der Temp-Schluessel-Ableitung
const KONST_TEMP: [u8; 16] = [0x33; 16];

/// Ergebnis der Schluessel-Expansion
#[derive(Debug, Clone)]
pub struct AbgeleiteteSchluessel {
    /// 16-Byte-Schluessel fuer AES-CCM
    pub ccm_schluessel: [u8; 16],
    /// 32-Byte-Personalisierungs-String (Domaenen-Trennung des Nonce-Ratchets)
    pub personalisierung: [u8; 32],
    /// Gruppen-Schluessel; nur bei permanenter Ableitung vorhanden
    pub gruppen_schluessel: Option<[u8; 16]>,
}

/// Extract-Schritt der Entropie-Mischung: liefert den Nonce-PRK
pub fn entropie_extrahieren(sender_entropie: &[u8; 16], empfaenger_entropie: &[u8; 16]) -> [u8; 16] {
    let mut puffer = [0u8; 32];
    puffer[..16].copy_from_slice(sender_entropie);
    puffer[16..].copy_from_slice(empfaenger_entropie);
    cmac_berechnen(&KONST_ENTROPIE, &puffer)
}

/// Expand-Schritt der Entropie-Mischung: liefert das 32-Byte-MEI
///
/// Byte 15 des 0x88-Puffers wird genullt, Byte 31 traegt den
/// Runden-Zaehler; Runde 2 behaelt T1 in der ersten Haelfte.
pub fn entropie_expandieren(nonce_prk: &[u8; 16]) -> [u8; 32] {
    let mut puffer = [0x88u8; 32];
    puffer[15] = 0x00;
    puffer[31] = 0x01;
    let t1 = cmac_berechnen(nonce_prk, &puffer);

    puffer[..BLOCK_GROESSE].copy_from_slice(&t1);
    puffer[31] = 0x02;
    let t2 = cmac_berechnen(nonce_prk, &puffer);

    let mut mei = [0u8; 32];
    mei[..BLOCK_GROESSE].copy_from_slice(&t1);
    mei[BLOCK_GROESSE..].copy_from_slice(&t2);
    mei
}

/// Leitet den PRK des temporaeren Enrollment-Schluessels ab
///
/// Eingabe ist das ECDH-Geheimnis plus beide oeffentlichen Schluessel,
/// damit der Schluessel an genau dieses Teilnehmerpaar gebunden ist.
/// Die Reihenfolge ist protokollfest: erst der Schluessel der
/// aufnehmenden Seite, dann der des beitretenden Geraets.
pub fn temp_schluessel_extrahieren(
    geheimnis: &[u8; 32],
    aufnehmender_pubkey: &[u8; 32],
    beitretender_pubkey: &[u8; 32],
) -> [u8; 16] {
    let mut puffer = [0u8; 96];
    puffer[..32].copy_from_slice(geheimnis);
    puffer[32..64].copy_from_slice(aufnehmender_pubkey);
    puffer[64..].copy_from_slice(beitretender_pubkey);
    cmac_berechnen(&KONST_TEMP, &puffer)
}

/// Expandiert einen PRK zur Schluessel-Familie
///
/// Vier CMAC-Runden (drei bei `temporaer`) ueber einen verketteten
/// 32-Byte-Puffer: T1 = CCM-Schluessel, T2||T3 = Personalisierung,
/// T4 = Gruppen-Schluessel (entfaellt bei `temporaer`).
pub fn schluessel_expandieren(prk: &[u8; 16], temporaer: bool) -> AbgeleiteteSchluessel {
    let mut konstante = [if temporaer { 0x88u8 } else { 0x55u8 }; BLOCK_GROESSE];
    konstante[15] = 0x01;
    let t1 = cmac_berechnen(prk, &konstante);

    let mut puffer = [0u8; 32];
    puffer[..BLOCK_GROESSE].copy_from_slice(&t1);
    puffer[BLOCK_GROESSE..].copy_from_slice(&konstante);
    puffer[31] = 0x02;
    let t2 = cmac_berechnen(prk, &puffer);

    puffer[..BLOCK_GROESSE].copy_from_slice(&t2);
    puffer[31] = 0x03;
    let t3 = cmac_berechnen(prk, &puffer);

    let gruppen_schluessel = if temporaer {
        None
    } else {
        puffer[..BLOCK_GROESSE].copy_from_slice(&t3);
        puffer[31] = 0x04;
        Some(cmac_berechnen(prk, &puffer))
    };

    let mut personalisierung = [0u8; 32];
    personalisierung[..BLOCK_GROESSE].copy_from_slice(&t2);
    personalisierung[BLOCK_GROESSE..].copy_from_slice(&t3);

    AbgeleiteteSchluessel {
        ccm_schluessel: t1,
        personalisierung,
        gruppen_schluessel,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entropie_mischung_deterministisch() {
        let sender = [0x01u8; 16];
        let empfaenger = [0x02u8; 16];
        let prk1 = entropie_extrahieren(&sender, &empfaenger);
        let prk2 = entropie_extrahieren(&sender, &empfaenger);
        assert_eq!(prk1, prk2);
        assert_eq!(entropie_expandieren(&prk1), entropie_expandieren(&prk2));
    }

    #[test]
    fn entropie_reihenfolge_relevant() {
        let a = [0x01u8; 16];
        let b = [0x02u8; 16];
        assert_ne!(entropie_extrahieren(&a, &b), entropie_extrahieren(&b, &a));
    }

    #[test]
    fn mei_haelften_verschieden() {
        let prk = entropie_extrahieren(&[0xAA; 16], &[0xBB; 16]);
        let mei = entropie_expandieren(&prk);
        assert_ne!(mei[..16], mei[16..]);
    }

    #[test]
    fn temp_extract_bindet_beide_pubkeys() {
        let geheimnis = [0x42u8; 32];
        let pub_a = [0x01u8; 32];
        let pub_b = [0x02u8; 32];
        let prk = temp_schluessel_extrahieren(&geheimnis, &pub_a, &pub_b);
        let prk_getauscht = temp_schluessel_extrahieren(&geheimnis, &pub_b, &pub_a);
        assert_ne!(prk, prk_getauscht);
    }

    #[test]
    fn temp_extract_referenzwert() {
        let prk = temp_schluessel_extrahieren(&[0x42u8; 32], &[0x01u8; 32], &[0x02u8; 32]);
        assert_eq!(hex::encode(prk), "80c39592e49db36313647bd8b4ebc2e8");
    }

    #[test]
    fn temporaere_expansion_ohne_gruppen_schluessel() {
        let prk = [0x42u8; 16];
        let abgeleitet = schluessel_expandieren(&prk, true);
        assert!(abgeleitet.gruppen_schluessel.is_none());
    }

    #[test]
    fn permanente_expansion_mit_gruppen_schluessel() {
        let prk = [0x42u8; 16];
        let abgeleitet = schluessel_expandieren(&prk, false);
        assert!(abgeleitet.gruppen_schluessel.is_some());
    }

    #[test]
    fn temporaer_und_permanent_verschieden() {
        let prk = [0x42u8; 16];
        let temp = schluessel_expandieren(&prk, true);
        let perm = schluessel_expandieren(&prk, false);
        // Verschiedene Konstanten (0x88 vs. 0x55) liefern verschiedene Familien
        assert_ne!(temp.ccm_schluessel, perm.ccm_schluessel);
        assert_ne!(temp.personalisierung, perm.personalisierung);
    }

    #[test]
    fn expansion_teile_paarweise_verschieden() {
        let abgeleitet = schluessel_expandieren(&[0x07u8; 16], false);
        assert_ne!(abgeleitet.ccm_schluessel[..], abgeleitet.personalisierung[..16]);
        assert_ne!(abgeleitet.personalisierung[..16], abgeleitet.personalisierung[16..]);
        assert_ne!(
            abgeleitet.gruppen_schluessel.unwrap()[..],
            abgeleitet.ccm_schluessel[..]
        );
    }
}
