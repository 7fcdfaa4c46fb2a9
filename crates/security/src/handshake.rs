//! Enrollment-Handshake (Controller-Seite)
//!
//! Nimmt ein Geraet in das Netz auf: Faehigkeiten abfragen, Klassen
//! gewaehren, oeffentliche Schluessel tauschen, den temporaeren
//! ECDH-Schluessel ableiten, die Gewaehrung verschluesselt verifizieren
//! und zuletzt die dauerhaften Netzwerkschluessel unter dem temporaeren
//! Schluessel ausliefern.
//!
//! Jeder Schritt traegt ein Zeitlimit. Schlaegt irgendein Schritt fehl
//! oder bricht die Gegenseite ab, werden saemtliche fuer den Knoten
//! installierten Schluessel widerrufen; ein halbes Enrollment
//! hinterlaesst keinen dauerhaften Schluessel.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;

use funknetz_core::error::FunknetzError;
use funknetz_core::event::SecurityEvent;
use funknetz_core::types::{KeyClass, NodeId};
use funknetz_crypto::kdf::{schluessel_expandieren, temp_schluessel_extrahieren};
use funknetz_crypto::keypair::ControllerKeyPair;
use funknetz_crypto::types::SecretBytes;
use funknetz_protocol::command::{KexFailGrund, SecurityCommand};
use funknetz_protocol::frame::SecurityFrame;
use funknetz_protocol::kex::{KeyExchangeFrame, SCHEMA_1};
use funknetz_protocol::netkey::{NetworkKeyReportFrame, PublicKeyFrame, TransferEndFrame};

use crate::channel::SecureChannel;
use crate::config::SecurityConfig;
use crate::error::{SecurityError, SecurityResult};
use crate::transport::FrameTransport;

/// Phasen des Enrollment-Handshakes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentPhase {
    Leerlauf,
    SchemataAngefragt,
    SchluesselGewaehrt,
    PublicKeyAusgetauscht,
    WartetAufSchluesselVerifikation,
    Abgeschlossen,
    Fehlgeschlagen,
}

/// Die dauerhaften Netzwerkschluessel des Controllers
///
/// Ein Schluessel pro permanenter Klasse; ausgeliefert wird nur, was
/// ein Enrollment gewaehrt.
pub struct SchluesselVorrat {
    schluessel: HashMap<KeyClass, SecretBytes>,
}

impl SchluesselVorrat {
    /// Erzeugt fuer jede permanente Klasse einen frischen Zufallsschluessel
    pub fn erzeugen() -> Self {
        let mut schluessel = HashMap::new();
        for klasse in KeyClass::ABSTEIGEND.iter().filter(|k| k.ist_permanent()) {
            let mut bytes = [0u8; 16];
            OsRng.fill_bytes(&mut bytes);
            schluessel.insert(*klasse, SecretBytes::aus_array(bytes));
        }
        Self { schluessel }
    }

    /// Baut den Vorrat aus der Konfiguration; nicht provisionierte
    /// Klassen erhalten Zufallsschluessel
    pub fn aus_konfiguration(config: &SecurityConfig) -> SecurityResult<Self> {
        let mut vorrat = Self::erzeugen();
        for (name, hexwert) in &config.netzwerk_schluessel {
            let klasse = match name.as_str() {
                "unauthenticated" => KeyClass::Unauthenticated,
                "authenticated" => KeyClass::Authenticated,
                "access_control" => KeyClass::AccessControl,
                "legacy" => KeyClass::Legacy,
                sonst => {
                    return Err(SecurityError::Frame(FunknetzError::Konfiguration(format!(
                        "Unbekannte Schluessel-Klasse in der Konfiguration: {sonst}"
                    ))))
                }
            };
            let bytes = hex::decode(hexwert).map_err(|e| {
                SecurityError::Frame(FunknetzError::Konfiguration(format!(
                    "Netzwerkschluessel {name} ist kein Hex: {e}"
                )))
            })?;
            if bytes.len() != 16 {
                return Err(SecurityError::Frame(FunknetzError::Konfiguration(format!(
                    "Netzwerkschluessel {name} muss 16 Bytes lang sein"
                ))));
            }
            vorrat.schluessel.insert(klasse, SecretBytes::new(bytes));
        }
        Ok(vorrat)
    }

    /// Der Netzwerkschluessel einer Klasse
    pub fn schluessel(&self, klasse: KeyClass) -> Option<[u8; 16]> {
        self.schluessel.get(&klasse).map(|s| s.als_schluessel16())
    }
}

/// Fuehrt Enrollments ueber einem sicheren Kanal durch
pub struct EnrollmentKoordinator<T: FrameTransport> {
    kanal: Arc<SecureChannel<T>>,
    schluesselpaar: ControllerKeyPair,
    vorrat: SchluesselVorrat,
}

impl<T: FrameTransport> EnrollmentKoordinator<T> {
    pub fn neu(
        kanal: Arc<SecureChannel<T>>,
        schluesselpaar: ControllerKeyPair,
        vorrat: SchluesselVorrat,
    ) -> Self {
        Self {
            kanal,
            schluesselpaar,
            vorrat,
        }
    }

    pub fn kanal(&self) -> &Arc<SecureChannel<T>> {
        &self.kanal
    }

    /// Nimmt einen Knoten auf und liefert die gewaehrten Klassen
    ///
    /// Bei jedem Fehler werden alle fuer den Knoten installierten
    /// Schluessel (temporaer wie dauerhaft) widerrufen.
    pub async fn aufnehmen(
        &self,
        node: NodeId,
        erlaubte: &[KeyClass],
    ) -> SecurityResult<Vec<KeyClass>> {
        match self.aufnahme_durchfuehren(node, erlaubte).await {
            Ok(gewaehrt) => {
                self.kanal.metriken().enrollments_abgeschlossen.inc();
                for klasse in &gewaehrt {
                    self.kanal.ereignis(SecurityEvent::EnrollmentAbgeschlossen {
                        node,
                        klasse: *klasse,
                    });
                }
                tracing::info!(node, klassen = ?gewaehrt, "Enrollment abgeschlossen");
                Ok(gewaehrt)
            }
            Err(fehler) => {
                self.kanal.manager().alle_widerrufen(node);
                if !matches!(fehler, SecurityError::ProtokollSignal(_)) {
                    // Gegenseite ueber den Abbruch informieren; ein
                    // Transportfehler hier ist nicht mehr zu retten
                    let _ = self.kex_fail_senden(node, KexFailGrund::Abbruch).await;
                }
                self.kanal.metriken().enrollments_fehlgeschlagen.inc();
                self.kanal.ereignis(SecurityEvent::EnrollmentFehlgeschlagen {
                    node,
                    grund: fehler.to_string(),
                });
                tracing::warn!(node, fehler = %fehler, phase = ?EnrollmentPhase::Fehlgeschlagen, "Enrollment fehlgeschlagen");
                Err(fehler)
            }
        }
    }

    async fn aufnahme_durchfuehren(
        &self,
        node: NodeId,
        erlaubte: &[KeyClass],
    ) -> SecurityResult<Vec<KeyClass>> {
        let manager = self.kanal.manager();
        let zeitlimit = self.kanal.config().handshake_zeitlimit();
        let selbst = self.kanal.config().knoten_id;

        // Faehigkeiten abfragen
        let mut phase = EnrollmentPhase::SchemataAngefragt;
        tracing::debug!(node, phase = ?phase, "Enrollment gestartet");
        self.kanal
            .senden(SecurityFrame::neu(
                selbst,
                node,
                SecurityCommand::KexGet,
                vec![],
            ))
            .await?;
        let report_frame = self
            .kanal
            .warten_auf(zeitlimit, "kex_report", node, |f| {
                f.kommando == SecurityCommand::KexReport
            })
            .await?;
        let report = KeyExchangeFrame::parse(&report_frame.nutzlast)?;
        if !report.kompatibel() {
            let grund = if report.schemata & SCHEMA_1 == 0 {
                KexFailGrund::Schema
            } else {
                KexFailGrund::Kurve
            };
            self.kex_fail_senden(node, grund).await?;
            return Err(SecurityError::Inkompatibel);
        }

        // Klassen gewaehren (Schnittmenge aus Anfrage und Erlaubnis)
        let angefragt = report.schluessel_klassen();
        manager.angefragte_klassen_speichern(node, angefragt.clone());
        let gewaehrt: Vec<KeyClass> = angefragt
            .iter()
            .copied()
            .filter(|k| erlaubte.contains(k))
            .collect();
        if gewaehrt.is_empty() {
            self.kex_fail_senden(node, KexFailGrund::Schluessel).await?;
            return Err(SecurityError::Abgebrochen);
        }
        phase = EnrollmentPhase::SchluesselGewaehrt;
        tracing::debug!(node, phase = ?phase, klassen = ?gewaehrt, "Klassen gewaehrt");

        let gewaehrung = KeyExchangeFrame::gewaehrung(&gewaehrt);
        self.kanal
            .senden(SecurityFrame::neu(
                selbst,
                node,
                SecurityCommand::KexSet,
                gewaehrung.to_bytes(),
            ))
            .await?;

        // Oeffentliche Schluessel tauschen, temporaeren Schluessel ableiten
        let pk_frame = self
            .kanal
            .warten_auf(zeitlimit, "public_key", node, |f| {
                f.kommando == SecurityCommand::PublicKeyReport
            })
            .await?;
        let geraete_pk = PublicKeyFrame::parse(&pk_frame.nutzlast)?;
        if geraete_pk.vom_controller {
            return Err(SecurityError::Frame(FunknetzError::frame(
                "PublicKeyReport des Geraets traegt das Controller-Flag",
            )));
        }

        let geheimnis = self.schluesselpaar.shared_secret(&geraete_pk.public_key);
        let prk = temp_schluessel_extrahieren(
            &geheimnis,
            self.schluesselpaar.public_key(),
            &geraete_pk.public_key,
        );
        manager.ableitung_installieren(node, KeyClass::EcdhTemp, schluessel_expandieren(&prk, true));

        self.kanal
            .senden(SecurityFrame::neu(
                selbst,
                node,
                SecurityCommand::PublicKeyReport,
                PublicKeyFrame {
                    vom_controller: true,
                    public_key: *self.schluesselpaar.public_key(),
                }
                .to_bytes(),
            ))
            .await?;
        phase = EnrollmentPhase::PublicKeyAusgetauscht;
        tracing::debug!(node, phase = ?phase, "Temporaerer Schluessel installiert");

        // Echo-Runde: Geraet wiederholt die Gewaehrung verschluesselt,
        // wir antworten mit dem Echo-Report
        let echo_nutzlast = self
            .verschluesselt_empfangen(node, KeyClass::EcdhTemp, "kex_set_echo", SecurityCommand::KexSet)
            .await?;
        let echo = KeyExchangeFrame::parse(&echo_nutzlast)?;
        if !echo.echo
            || echo.schluessel != gewaehrung.schluessel
            || echo.schemata != gewaehrung.schemata
            || echo.kurven != gewaehrung.kurven
        {
            self.kex_fail_senden(node, KexFailGrund::Authentifizierung)
                .await?;
            return Err(SecurityError::Frame(FunknetzError::frame(
                "KEX-Echo weicht von der Gewaehrung ab",
            )));
        }
        self.verschluesselt_senden(
            node,
            KeyClass::EcdhTemp,
            SecurityCommand::KexReport,
            report.als_echo().to_bytes(),
        )
        .await?;

        // Schluessel-Transfer pro gewaehrter Klasse
        phase = EnrollmentPhase::WartetAufSchluesselVerifikation;
        tracing::debug!(node, phase = ?phase, "Echo verifiziert, Transfer beginnt");
        for _ in 0..gewaehrt.len() {
            let anfrage = self
                .verschluesselt_empfangen(
                    node,
                    KeyClass::EcdhTemp,
                    "network_key_get",
                    SecurityCommand::NetworkKeyGet,
                )
                .await?;
            let maske = anfrage.first().copied().ok_or_else(|| {
                SecurityError::Frame(FunknetzError::frame("NetworkKeyGet ohne Klassen-Bit"))
            })?;
            let klasse = *KeyClass::aus_bitmaske(maske).first().ok_or_else(|| {
                SecurityError::Frame(FunknetzError::frame(format!(
                    "NetworkKeyGet mit unbekannter Klasse: 0x{maske:02X}"
                )))
            })?;
            if !gewaehrt.contains(&klasse) {
                self.kex_fail_senden(node, KexFailGrund::SchluesselAbruf)
                    .await?;
                return Err(SecurityError::Abgebrochen);
            }

            let netz_schluessel = self.vorrat.schluessel(klasse).ok_or_else(|| {
                SecurityError::Frame(FunknetzError::Intern(format!(
                    "Kein Vorrat fuer Klasse {klasse:?}"
                )))
            })?;
            self.verschluesselt_senden(
                node,
                KeyClass::EcdhTemp,
                SecurityCommand::NetworkKeyReport,
                NetworkKeyReportFrame {
                    klasse,
                    schluessel: netz_schluessel,
                }
                .to_bytes(),
            )
            .await?;
            manager.netzwerk_schluessel_installieren(node, klasse, &netz_schluessel);

            // Verifikation laeuft bereits unter dem frisch
            // ausgelieferten Schluessel
            self.verschluesselt_empfangen(node, klasse, "network_key_verify", SecurityCommand::NetworkKeyVerify)
                .await?;
            self.verschluesselt_senden(
                node,
                KeyClass::EcdhTemp,
                SecurityCommand::TransferEnd,
                TransferEndFrame {
                    schluessel_verifiziert: true,
                    transfer_abgeschlossen: false,
                }
                .to_bytes(),
            )
            .await?;
            tracing::debug!(node, klasse = ?klasse, "Netzwerkschluessel verifiziert");
        }

        // Abschluss durch das Geraet
        let ende_nutzlast = self
            .verschluesselt_empfangen(node, KeyClass::EcdhTemp, "transfer_end", SecurityCommand::TransferEnd)
            .await?;
        let ende = TransferEndFrame::parse(&ende_nutzlast)?;
        if !ende.transfer_abgeschlossen {
            return Err(SecurityError::Frame(FunknetzError::frame(
                "TransferEnd ohne Abschluss-Flag",
            )));
        }

        // Der temporaere Schluessel hat ausgedient
        manager.schluessel_widerrufen(node, KeyClass::EcdhTemp);
        phase = EnrollmentPhase::Abgeschlossen;
        tracing::debug!(node, phase = ?phase, "Handshake beendet");
        Ok(gewaehrt)
    }

    /// Kapselt ein inneres Kommando unter der angegebenen Klasse und
    /// sendet es
    async fn verschluesselt_senden(
        &self,
        node: NodeId,
        klasse: KeyClass,
        kommando: SecurityCommand,
        nutzlast: Vec<u8>,
    ) -> SecurityResult<()> {
        let inneres = SecurityFrame::neu(self.kanal.config().knoten_id, node, kommando, nutzlast);
        let gekapselt = self.kanal.kapseln_mit(node, klasse, &inneres.to_bytes()).await?;
        self.kanal.senden(gekapselt).await
    }

    /// Wartet auf ein gekapseltes inneres Kommando der angegebenen Art
    ///
    /// Verworfene Frames (Replay, Tag-Fehler) und andere innere
    /// Kommandos werden uebersprungen, bis das Zeitlimit ablaeuft.
    async fn verschluesselt_empfangen(
        &self,
        node: NodeId,
        klasse: KeyClass,
        schritt: &'static str,
        erwartet: SecurityCommand,
    ) -> SecurityResult<Vec<u8>> {
        let frist = tokio::time::Instant::now() + self.kanal.config().handshake_zeitlimit();
        loop {
            let rest = frist
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or(SecurityError::HandshakeZeitlimit { node, schritt })?;
            let frame = self
                .kanal
                .warten_auf(rest, schritt, node, |f| f.ist_gekapselt())
                .await?;
            let Some(klartext) = self.kanal.entkapseln_mit(&frame, klasse).await? else {
                continue;
            };
            let Ok(inneres) = SecurityFrame::parse(node, self.kanal.config().knoten_id, &klartext)
            else {
                tracing::debug!(node, "Inneres Kommando nicht parsebar, verworfen");
                continue;
            };
            if inneres.kommando == erwartet {
                return Ok(inneres.nutzlast);
            }
            tracing::debug!(
                node,
                kommando = ?inneres.kommando,
                "Unerwartetes inneres Kommando verworfen"
            );
        }
    }

    async fn kex_fail_senden(&self, node: NodeId, grund: KexFailGrund) -> SecurityResult<()> {
        tracing::warn!(node, grund = %grund, "KEX-Fehler gesendet");
        self.kanal
            .senden(SecurityFrame::neu(
                self.kanal.config().knoten_id,
                node,
                SecurityCommand::KexFail,
                vec![grund as u8],
            ))
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
