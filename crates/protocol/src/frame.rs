//! Aeusserer Sicherheits-Frame
//!
//! Ein Frame traegt die Kommandoklassen-ID, das Kommando und die rohe
//! Nutzlast; Quelle und Ziel stammen aus dem darunterliegenden
//! Transport-Header.
//!
//! ## Frame-Format
//! ```text
//! [kommandoklasse(1)] [kommando(1)] [nutzlast(n)]
//! ```

use bytes::{BufMut, BytesMut};

use funknetz_core::error::{FunknetzError, Result};
use funknetz_core::types::NodeId;

use crate::command::{SecurityCommand, KOMMANDOKLASSE_SICHERHEIT};

/// Ein Frame der Sicherheits-Kommandoklasse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityFrame {
    /// Sendender Knoten
    pub quelle: NodeId,
    /// Empfangender Knoten
    pub ziel: NodeId,
    /// Kommando innerhalb der Sicherheitsklasse
    pub kommando: SecurityCommand,
    /// Kommando-Nutzlast (ohne Klassen-/Kommando-Byte)
    pub nutzlast: Vec<u8>,
}

impl SecurityFrame {
    pub fn neu(
        quelle: NodeId,
        ziel: NodeId,
        kommando: SecurityCommand,
        nutzlast: Vec<u8>,
    ) -> Self {
        Self {
            quelle,
            ziel,
            kommando,
            nutzlast,
        }
    }

    /// True wenn der Frame ein sicher gekapseltes Kommando traegt
    pub fn ist_gekapselt(&self) -> bool {
        self.kommando == SecurityCommand::MessageEncap
    }

    /// Serialisiert den Frame-Body (Klasse + Kommando + Nutzlast)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(2 + self.nutzlast.len());
        buf.put_u8(KOMMANDOKLASSE_SICHERHEIT);
        buf.put_u8(self.kommando as u8);
        buf.put_slice(&self.nutzlast);
        buf.to_vec()
    }

    /// Parst einen Frame-Body
    pub fn parse(quelle: NodeId, ziel: NodeId, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(FunknetzError::FrameZuKurz {
                erwartet: 2,
                erhalten: bytes.len(),
            });
        }
        if bytes[0] != KOMMANDOKLASSE_SICHERHEIT {
            return Err(FunknetzError::frame(format!(
                "Falsche Kommandoklasse: 0x{:02X}",
                bytes[0]
            )));
        }
        let kommando = SecurityCommand::try_from(bytes[1])?;
        Ok(Self {
            quelle,
            ziel,
            kommando,
            nutzlast: bytes[2..].to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
