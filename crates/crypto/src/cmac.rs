//! AES-128-CMAC (RFC 4493)
//!
//! Der CMAC dient im Protokoll nicht nur als MAC, sondern auch als
//! Pseudo-Zufallsfunktion der Schluessel-Ableitung (siehe `kdf`).
//! Die Konstruktion muss deshalb bit-genau mit der Gegenstelle
//! uebereinstimmen; die Tests enthalten die offiziellen Testvektoren.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;

/// Blockgroesse von AES-128 in Bytes
pub const BLOCK_GROESSE: usize = 16;

/// Polynom-Konstante fuer 128-Bit-Blockchiffren (RFC 4493 Abschnitt 2.3)
const RB: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x87];

fn xor_block(a: &[u8; 16], b: &[u8; 16]) -> [u8; 16] {
    let mut ret = [0u8; 16];
    for i in 0..16 {
        ret[i] = a[i] ^ b[i];
    }
    ret
}

fn links_schieben(block: &[u8; 16]) -> [u8; 16] {
    let mut ret = [0u8; 16];
    for i in 0..15 {
        ret[i] = block[i] << 1 | block[i + 1] >> 7;
    }
    ret[15] = block[15] << 1;
    ret
}

/// Leitet die beiden Unterschluessel K1/K2 aus dem Chiffrenschluessel ab
fn unterschluessel(cipher: &Aes128) -> ([u8; 16], [u8; 16]) {
    let mut l = GenericArray::from([0u8; 16]);
    cipher.encrypt_block(&mut l);
    let l: [u8; 16] = l.into();

    let mut k1 = links_schieben(&l);
    if l[0] & 0x80 != 0 {
        k1 = xor_block(&k1, &RB);
    }
    let mut k2 = links_schieben(&k1);
    if k1[0] & 0x80 != 0 {
        k2 = xor_block(&k2, &RB);
    }
    (k1, k2)
}

/// Berechnet den AES-128-CMAC ueber `nachricht`
///
/// Eine leere Nachricht wird als ein einzelner gepaddeter Block
/// verarbeitet (0x80 gefolgt von Nullen).
pub fn cmac_berechnen(schluessel: &[u8; 16], nachricht: &[u8]) -> [u8; 16] {
    let cipher = Aes128::new(GenericArray::from_slice(schluessel));
    let (k1, k2) = unterschluessel(&cipher);

    let ganze_bloecke = !nachricht.is_empty() && nachricht.len() % BLOCK_GROESSE == 0;
    let mut daten = nachricht.to_vec();
    if !ganze_bloecke {
        daten.push(0x80);
        while daten.len() % BLOCK_GROESSE != 0 {
            daten.push(0x00);
        }
    }

    let letzter = daten.len() / BLOCK_GROESSE - 1;
    let mut x = [0u8; 16];
    for (i, block) in daten.chunks_exact(BLOCK_GROESSE).enumerate() {
        let mut b = [0u8; 16];
        b.copy_from_slice(block);
        if i == letzter {
            // Letzter Block wird mit K1 (ganze Bloecke) bzw. K2 (gepaddet) gemischt
            b = xor_block(&b, if ganze_bloecke { &k1 } else { &k2 });
        }
        let mut y = GenericArray::from(xor_block(&x, &b));
        cipher.encrypt_block(&mut y);
        x = y.into();
    }
    x
}

// ---------------------------------------------------------------------------
// Tests (RFC 4493 Abschnitt 4)
// ---------------------------------------------------------------------------
