//! Konfiguration der Sicherheits-Engine
//!
//! Wird aus einer TOML-Datei geladen oder programmatisch gebaut.
//! Zeitlimits stehen in Sekunden in der Datei und werden als
//! `Duration` herausgegeben.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use funknetz_core::error::{FunknetzError, Result};
use funknetz_core::types::NodeId;

/// Konfiguration der Sicherheits-Engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Eigene Knoten-ID im Netz
    pub knoten_id: NodeId,
    /// Zeitlimit pro Enrollment-Schritt in Sekunden
    pub handshake_zeitlimit_sekunden: u64,
    /// Zeitlimit fuer Nonce-Anfragen in Sekunden
    pub antwort_zeitlimit_sekunden: u64,
    /// Wie viele Ratchet-Schritte die Entschluesselung zur
    /// Neusynchronisation probieren darf
    pub max_nonce_versuche: u8,
    /// Optional vorab provisionierte Netzwerkschluessel (Klassen-Name ->
    /// 32 Hex-Zeichen); fehlende Klassen werden zufaellig erzeugt
    pub netzwerk_schluessel: HashMap<String, String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            knoten_id: 1,
            handshake_zeitlimit_sekunden: 10,
            antwort_zeitlimit_sekunden: 5,
            max_nonce_versuche: 5,
            netzwerk_schluessel: HashMap::new(),
        }
    }
}

impl SecurityConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei
    pub fn aus_datei(pfad: impl AsRef<Path>) -> Result<Self> {
        let inhalt = std::fs::read_to_string(pfad.as_ref()).map_err(|e| {
            FunknetzError::Konfiguration(format!(
                "Konfigurationsdatei {} nicht lesbar: {e}",
                pfad.as_ref().display()
            ))
        })?;
        let config: Self = toml::from_str(&inhalt)
            .map_err(|e| FunknetzError::Konfiguration(format!("Ungueltiges TOML: {e}")))?;
        config.validieren()?;
        Ok(config)
    }

    /// Prueft die Konfiguration auf offensichtliche Fehler
    pub fn validieren(&self) -> Result<()> {
        if self.handshake_zeitlimit_sekunden == 0 || self.antwort_zeitlimit_sekunden == 0 {
            return Err(FunknetzError::Konfiguration(
                "Zeitlimits muessen groesser als 0 sein".to_string(),
            ));
        }
        if self.max_nonce_versuche == 0 {
            return Err(FunknetzError::Konfiguration(
                "max_nonce_versuche muss groesser als 0 sein".to_string(),
            ));
        }
        Ok(())
    }

    pub fn handshake_zeitlimit(&self) -> Duration {
        Duration::from_secs(self.handshake_zeitlimit_sekunden)
    }

    pub fn antwort_zeitlimit(&self) -> Duration {
        Duration::from_secs(self.antwort_zeitlimit_sekunden)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
