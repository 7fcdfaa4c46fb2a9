//! KEX-Report/Set-Frames
//!
//! Report und Set teilen sich das Layout; der Report meldet
//! Faehigkeiten bzw. angefragte Schluessel, das Set gewaehrt sie.
//!
//! ## Frame-Format
//! ```text
//! [flags(1)] [schemata(1)] [kurven(1)] [schluessel(1)]
//!   flags: bit0 = Echo, bit1 = Client-Side-Auth angefragt
//! ```

use funknetz_core::error::{FunknetzError, Result};
use funknetz_core::types::KeyClass;

/// Unterstuetztes Schluessel-Austausch-Schema (Schema 1)
pub const SCHEMA_1: u8 = 0x02;

/// Unterstuetzte ECDH-Kurve (Curve25519)
pub const KURVE_25519: u8 = 0x01;

/// KEX-Report bzw. KEX-Set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyExchangeFrame {
    /// Echo-Bit: Frame wiederholt einen frueheren Austausch verschluesselt
    pub echo: bool,
    /// Geraet bittet um Client-Side-Authentication
    pub csa: bool,
    /// Bitfeld der Schemata
    pub schemata: u8,
    /// Bitfeld der Kurven
    pub kurven: u8,
    /// Bitfeld der Schluessel-Klassen
    pub schluessel: u8,
}

impl KeyExchangeFrame {
    /// Baut ein KEX-Set mit den gewaehrten Klassen
    pub fn gewaehrung(klassen: &[KeyClass]) -> Self {
        let schluessel = klassen.iter().fold(0u8, |bits, k| bits | k.bitmaske());
        Self {
            echo: false,
            csa: false,
            schemata: SCHEMA_1,
            kurven: KURVE_25519,
            schluessel,
        }
    }

    /// Kopie mit gesetztem Echo-Bit
    pub fn als_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Dekodiert das Schluessel-Bitfeld (absteigend nach Vertrauen)
    pub fn schluessel_klassen(&self) -> Vec<KeyClass> {
        KeyClass::aus_bitmaske(self.schluessel)
    }

    /// True wenn Schema 1 und Curve25519 angeboten werden
    pub fn kompatibel(&self) -> bool {
        self.schemata & SCHEMA_1 != 0 && self.kurven & KURVE_25519 != 0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut flags = 0u8;
        if self.echo {
            flags |= 0x01;
        }
        if self.csa {
            flags |= 0x02;
        }
        vec![flags, self.schemata, self.kurven, self.schluessel]
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(FunknetzError::FrameZuKurz {
                erwartet: 4,
                erhalten: bytes.len(),
            });
        }
        Ok(Self {
            echo: bytes[0] & 0x01 != 0,
            csa: bytes[0] & 0x02 != 0,
            schemata: bytes[1],
            kurven: bytes[2],
            schluessel: bytes[3],
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
