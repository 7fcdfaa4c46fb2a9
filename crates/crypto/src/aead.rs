//! AES-128-CCM mit 8-Byte-Tag
//!
//! Das Protokoll schreibt einen 64-Bit-Tag vor (schmaler als der
//! CCM-Standardwert) - der Tag-Parameter ist deshalb explizit und darf
//! nie einem Default ueberlassen werden. Die SPAN-Nonce ist 16 Bytes
//! lang; CCM akzeptiert maximal 13, es gehen die ersten 13 Bytes ein.
//!
//! ## Format
//! ```text
//! [ciphertext] [auth_tag(8)]
//! ```

use ccm::aead::{Aead, KeyInit, Payload};
use ccm::consts::{U13, U8};
use ccm::Ccm;

use crate::error::{CryptoError, CryptoResult};

/// Laenge des Authentifizierungs-Tags in Bytes
pub const TAG_GROESSE: usize = 8;

/// Laenge der SPAN-Nonce in Bytes
pub const NONCE_GROESSE: usize = 16;

/// Anteil der SPAN-Nonce, der in CCM eingeht
const CCM_NONCE_GROESSE: usize = 13;

type Aes128Ccm = Ccm<aes::Aes128, U8, U13>;

/// Verschluesselt `klartext` und haengt den 8-Byte-Tag an
pub fn ccm_verschluesseln(
    schluessel: &[u8; 16],
    nonce: &[u8; NONCE_GROESSE],
    klartext: &[u8],
    zusatzdaten: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = Aes128Ccm::new(schluessel.into());
    cipher
        .encrypt(
            nonce[..CCM_NONCE_GROESSE].into(),
            Payload {
                msg: klartext,
                aad: zusatzdaten,
            },
        )
        .map_err(|e| CryptoError::Verschluesselung(e.to_string()))
}

/// Entschluesselt `geheimtext` (Ciphertext inkl. angehaengtem Tag)
///
/// Schlaegt die Tag-Pruefung fehl, wird keinerlei Klartext
/// zurueckgegeben.
pub fn ccm_entschluesseln(
    schluessel: &[u8; 16],
    nonce: &[u8; NONCE_GROESSE],
    geheimtext: &[u8],
    zusatzdaten: &[u8],
) -> CryptoResult<Vec<u8>> {
    if geheimtext.len() < TAG_GROESSE {
        return Err(CryptoError::GeheimtextZuKurz {
            erwartet: TAG_GROESSE,
            erhalten: geheimtext.len(),
        });
    }
    let cipher = Aes128Ccm::new(schluessel.into());
    cipher
        .decrypt(
            nonce[..CCM_NONCE_GROESSE].into(),
            Payload {
                msg: geheimtext,
                aad: zusatzdaten,
            },
        )
        .map_err(|_| CryptoError::Authentifizierung)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
