//! Domaenen-Events des Sicherheits-Subsystems
//!
//! Events werden vom Protokoll-Engine ueber einen Broadcast-Kanal
//! publiziert. Abonnenten (Inclusion-Workflow, Logging) reagieren
//! darauf, ohne den Engine zu blockieren.

use serde::{Deserialize, Serialize};

use crate::types::{KeyClass, NodeId};

/// Grund fuer einen verworfenen eingehenden Frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerwerfGrund {
    /// Sequenznummer bereits gesehen
    Replay,
    /// AEAD-Tag ungueltig
    Authentifizierung,
    /// Kein Schluessel / kein SPAN-Zustand vorhanden
    FehlenderZustand,
    /// Frame nicht parsebar
    UngueltigerFrame,
}

/// Events aus dem Sicherheits-Subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SecurityEvent {
    /// Enrollment erfolgreich abgeschlossen, dauerhafter Schluessel installiert
    EnrollmentAbgeschlossen { node: NodeId, klasse: KeyClass },
    /// Enrollment fehlgeschlagen oder abgebrochen
    EnrollmentFehlgeschlagen { node: NodeId, grund: String },
    /// Eingehender Frame wurde verworfen (nicht fatal)
    FrameVerworfen { node: NodeId, grund: VerwerfGrund },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialisierbar() {
        let e = SecurityEvent::EnrollmentAbgeschlossen {
            node: 7,
            klasse: KeyClass::Unauthenticated,
        };
        let json = serde_json::to_string(&e).unwrap();
        let zurueck: SecurityEvent = serde_json::from_str(&json).unwrap();
        match zurueck {
            SecurityEvent::EnrollmentAbgeschlossen { node, klasse } => {
                assert_eq!(node, 7);
                assert_eq!(klasse, KeyClass::Unauthenticated);
            }
            _ => panic!("Falsches Event dekodiert"),
        }
    }

    #[test]
    fn verwerf_grund_vergleichbar() {
        assert_eq!(VerwerfGrund::Replay, VerwerfGrund::Replay);
        assert_ne!(VerwerfGrund::Replay, VerwerfGrund::Authentifizierung);
    }
}
