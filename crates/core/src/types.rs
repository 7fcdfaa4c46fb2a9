//! Gemeinsame Typen fuer das Funknetz-Protokoll
//!
//! Knoten werden ueber numerische IDs adressiert. Jeder symmetrische
//! Netzwerkschluessel gehoert zu genau einer Schluessel-Klasse mit
//! fester Vertrauensstufe.

use serde::{Deserialize, Serialize};

/// Numerische Knoten-ID im Mesh-Netz
pub type NodeId = u16;

/// Broadcast-Markierung (alle Knoten)
pub const BROADCAST_ID: NodeId = 0xFF;

/// Schluessel-Klasse eines symmetrischen Netzwerkschluessels
///
/// Die Klassen bilden eine feste, nach Vertrauen geordnete Menge.
/// `EcdhTemp` ist der temporaere Enrollment-Schluessel und wird nach
/// Abschluss des Handshakes widerrufen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyClass {
    /// Temporaerer Schluessel waehrend des Enrollments (ECDH-abgeleitet)
    EcdhTemp,
    /// Nicht authentifizierte Klasse
    Unauthenticated,
    /// Authentifizierte Klasse (PIN/QR-Verifikation)
    Authenticated,
    /// Zugangskontroll-Klasse (Tuerschloesser etc.)
    AccessControl,
    /// Legacy-Schema der ersten Generation
    Legacy,
}

impl KeyClass {
    /// Alle Klassen, absteigend nach Vertrauensstufe
    pub const ABSTEIGEND: [KeyClass; 5] = [
        KeyClass::AccessControl,
        KeyClass::Authenticated,
        KeyClass::Unauthenticated,
        KeyClass::EcdhTemp,
        KeyClass::Legacy,
    ];

    /// Vertrauensstufe (hoeher = vertrauenswuerdiger)
    pub fn vertrauensstufe(&self) -> u8 {
        match self {
            KeyClass::Legacy => 0,
            KeyClass::EcdhTemp => 1,
            KeyClass::Unauthenticated => 2,
            KeyClass::Authenticated => 3,
            KeyClass::AccessControl => 4,
        }
    }

    /// Bit im KEX-Schluessel-Bitfeld (0 fuer den temporaeren Schluessel,
    /// der nie per KEX angefragt wird)
    pub fn bitmaske(&self) -> u8 {
        match self {
            KeyClass::Unauthenticated => 0x01,
            KeyClass::Authenticated => 0x02,
            KeyClass::AccessControl => 0x04,
            KeyClass::Legacy => 0x80,
            KeyClass::EcdhTemp => 0x00,
        }
    }

    /// Dekodiert ein KEX-Bitfeld in die enthaltenen Klassen
    /// (absteigend nach Vertrauensstufe)
    pub fn aus_bitmaske(bits: u8) -> Vec<KeyClass> {
        Self::ABSTEIGEND
            .iter()
            .copied()
            .filter(|k| k.bitmaske() != 0 && bits & k.bitmaske() != 0)
            .collect()
    }

    /// True wenn die Klasse ein dauerhafter Netzwerkschluessel ist
    pub fn ist_permanent(&self) -> bool {
        !matches!(self, KeyClass::EcdhTemp)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
