//! Sichere Kapselung und Entkapselung von Kommandos
//!
//! Der `SecureChannel` verbindet Schluessel-Verwaltung, Nonce-Ratchet
//! und Transport. Kapseln waehlt die hoechste installierte
//! Schluessel-Klasse der Gegenstelle; fehlt der Ratchet, wird er ueber
//! NonceGet/NonceReport neu aufgebaut und der eigene Entropie-Beitrag
//! als Klartext-Erweiterung mitgeschickt.
//!
//! Entkapseln verwirft Replays und nicht authentische Frames ohne
//! Fehler (`Ok(None)`), publiziert aber ein Event und zaehlt die
//! Metrik. Fataler sind nur fehlende Schluessel und Transport-Abbrueche.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::broadcast;

use funknetz_core::error::FunknetzError;
use funknetz_core::event::{SecurityEvent, VerwerfGrund};
use funknetz_core::types::{KeyClass, NodeId, BROADCAST_ID};
use funknetz_crypto::aead::{ccm_entschluesseln, ccm_verschluesseln, TAG_GROESSE};
use funknetz_crypto::error::CryptoError;
use funknetz_observability::FunknetzMetrics;
use funknetz_protocol::aad::zusatzdaten_bauen;
use funknetz_protocol::command::{KexFailGrund, SecurityCommand};
use funknetz_protocol::encap::EncapsulationBody;
use funknetz_protocol::extension::{erweiterungen_parsen, Extension};
use funknetz_protocol::frame::SecurityFrame;
use funknetz_protocol::nonce::NonceReportFrame;

use crate::config::SecurityConfig;
use crate::error::{SecurityError, SecurityResult};
use crate::manager::SecurityManager;
use crate::transport::FrameTransport;

/// Kapazitaet des Event-Broadcast-Kanals
const EVENT_KAPAZITAET: usize = 64;

/// Sicherer Kanal ueber einem Frame-Transport
pub struct SecureChannel<T: FrameTransport> {
    manager: Arc<SecurityManager>,
    transport: Arc<T>,
    config: SecurityConfig,
    metrics: FunknetzMetrics,
    ereignisse: broadcast::Sender<SecurityEvent>,
}

impl<T: FrameTransport> SecureChannel<T> {
    pub fn neu(
        manager: Arc<SecurityManager>,
        transport: Arc<T>,
        config: SecurityConfig,
    ) -> SecurityResult<Self> {
        config.validieren()?;
        let metrics = FunknetzMetrics::neu().map_err(FunknetzError::from)?;
        let (ereignisse, _) = broadcast::channel(EVENT_KAPAZITAET);
        Ok(Self {
            manager,
            transport,
            config,
            metrics,
            ereignisse,
        })
    }

    pub fn manager(&self) -> &Arc<SecurityManager> {
        &self.manager
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub fn metriken(&self) -> &FunknetzMetrics {
        &self.metrics
    }

    /// Abonniert die Sicherheits-Events des Kanals
    pub fn ereignisse_abonnieren(&self) -> broadcast::Receiver<SecurityEvent> {
        self.ereignisse.subscribe()
    }

    pub(crate) fn ereignis(&self, event: SecurityEvent) {
        // Ohne Abonnenten verpufft das Event
        let _ = self.ereignisse.send(event);
    }

    /// Sendet einen rohen Frame ueber den Transport
    pub async fn senden(&self, frame: SecurityFrame) -> SecurityResult<()> {
        self.transport.senden(frame).await
    }

    // -- Kapselung ------------------------------------------------------

    /// Kapselt eine Nutzlast unter der hoechsten installierten Klasse
    pub async fn kapseln(&self, ziel: NodeId, nutzlast: &[u8]) -> SecurityResult<SecurityFrame> {
        let klasse = self
            .manager
            .hoechste_klasse(ziel)
            .ok_or(SecurityError::KeinSchluessel { node: ziel })?;
        self.kapseln_mit(ziel, klasse, nutzlast).await
    }

    /// Kapselt eine Nutzlast unter einer expliziten Klasse
    ///
    /// Fehlt der Nonce-Ratchet, wird er zuerst ueber
    /// NonceGet/NonceReport aufgebaut; der eigene Entropie-Beitrag
    /// wandert dann als Klartext-Erweiterung in den Frame.
    pub async fn kapseln_mit(
        &self,
        ziel: NodeId,
        klasse: KeyClass,
        nutzlast: &[u8],
    ) -> SecurityResult<SecurityFrame> {
        let schluessel = self.manager.ccm_schluessel(ziel, klasse)?;

        let mut erweiterungen = Vec::new();
        let nonce = match self.manager.naechste_nonce(ziel, klasse) {
            Some(nonce) => nonce,
            None => {
                let mut eigene_entropie = [0u8; 16];
                OsRng.fill_bytes(&mut eigene_entropie);

                let report = self.nonce_anfordern(ziel).await?;
                let fremde_entropie = report.entropie.ok_or_else(|| {
                    SecurityError::Frame(FunknetzError::frame("NonceReport ohne Entropie"))
                })?;

                self.manager
                    .span_initialisieren(ziel, klasse, &eigene_entropie, &fremde_entropie)?;
                self.metrics.span_neusynchronisationen.inc();
                erweiterungen.push(Extension::Span {
                    entropie: eigene_entropie,
                });

                self.manager.naechste_nonce(ziel, klasse).ok_or_else(|| {
                    SecurityError::Frame(FunknetzError::Intern(
                        "Ratchet fehlt nach Initialisierung".to_string(),
                    ))
                })?
            }
        };

        let sequenz = self.manager.naechste_sequenz(ziel);
        let kopf = EncapsulationBody {
            sequenz,
            erweiterungen,
            hat_verschluesselte_erweiterungen: false,
            geheimtext: vec![],
        };
        let (kopf_bytes, kopf_laenge) = kopf.to_bytes();

        // Gesamtlaenge des Bodys inkl. Geheimtext, Tag und der zwei
        // Kommando-Bytes davor
        let gesamt = (kopf_laenge + nutzlast.len() + TAG_GROESSE + 2) as u16;
        let aad = zusatzdaten_bauen(
            self.config.knoten_id,
            ziel,
            ziel == BROADCAST_ID,
            gesamt,
            &kopf_bytes,
        );

        let geheimtext = ccm_verschluesseln(&schluessel, &nonce, nutzlast, &aad)?;
        let mut body = kopf_bytes;
        body.extend_from_slice(&geheimtext);

        self.metrics.frames_gekapselt.inc();
        tracing::trace!(ziel, klasse = ?klasse, sequenz, "Frame gekapselt");
        Ok(SecurityFrame::neu(
            self.config.knoten_id,
            ziel,
            SecurityCommand::MessageEncap,
            body,
        ))
    }

    // -- Entkapselung ---------------------------------------------------

    /// Entkapselt einen Frame unter der hoechsten installierten Klasse
    ///
    /// `Ok(None)` heisst: Frame wurde verworfen (Replay, Tag-Fehler,
    /// fehlender Ratchet), der Kanal bleibt nutzbar.
    pub async fn entkapseln(&self, frame: &SecurityFrame) -> SecurityResult<Option<Vec<u8>>> {
        let klasse = self
            .manager
            .hoechste_klasse(frame.quelle)
            .ok_or(SecurityError::KeinSchluessel { node: frame.quelle })?;
        self.entkapseln_mit(frame, klasse).await
    }

    /// Entkapselt einen Frame unter einer expliziten Klasse
    pub async fn entkapseln_mit(
        &self,
        frame: &SecurityFrame,
        klasse: KeyClass,
    ) -> SecurityResult<Option<Vec<u8>>> {
        // Nicht parsebare Frames werden verworfen, nie zum Fehler
        let (body, kopf_laenge) = match EncapsulationBody::parse(&frame.nutzlast) {
            Ok(geparst) => geparst,
            Err(fehler) => {
                tracing::warn!(quelle = frame.quelle, fehler = %fehler, "Nicht parsebarer Frame verworfen");
                self.metrics.ungueltige_frames.inc();
                self.ereignis(SecurityEvent::FrameVerworfen {
                    node: frame.quelle,
                    grund: VerwerfGrund::UngueltigerFrame,
                });
                return Ok(None);
            }
        };

        // Replay-Pruefung vor jeder Krypto-Arbeit
        if self.manager.ist_replay(frame.quelle, body.sequenz) {
            tracing::warn!(quelle = frame.quelle, sequenz = body.sequenz, "Replay verworfen");
            self.metrics.replays_verworfen.inc();
            self.ereignis(SecurityEvent::FrameVerworfen {
                node: frame.quelle,
                grund: VerwerfGrund::Replay,
            });
            return Ok(None);
        }

        let schluessel = self.manager.ccm_schluessel(frame.quelle, klasse)?;

        // SPAN-Erweiterung: Gegenseite hat einen neuen Ratchet aufgebaut
        for erweiterung in &body.erweiterungen {
            if let Extension::Span { entropie } = erweiterung {
                let Some(eigene_entropie) = self.manager.lokale_entropie_verbrauchen(frame.quelle)
                else {
                    tracing::warn!(
                        quelle = frame.quelle,
                        "SPAN-Erweiterung ohne herausgegebene Entropie"
                    );
                    self.ereignis(SecurityEvent::FrameVerworfen {
                        node: frame.quelle,
                        grund: VerwerfGrund::FehlenderZustand,
                    });
                    return Ok(None);
                };
                self.manager
                    .span_initialisieren(frame.quelle, klasse, entropie, &eigene_entropie)?;
                self.metrics.span_neusynchronisationen.inc();
            }
        }

        if !self.manager.hat_span(frame.quelle, klasse) {
            // Gegenseite um Neusynchronisation bitten
            self.nonce_get_beantworten(frame.quelle).await?;
            self.ereignis(SecurityEvent::FrameVerworfen {
                node: frame.quelle,
                grund: VerwerfGrund::FehlenderZustand,
            });
            return Ok(None);
        }

        let kopf = &frame.nutzlast[..kopf_laenge];
        let gesamt = (frame.nutzlast.len() + 2) as u16;
        let aad = zusatzdaten_bauen(
            frame.quelle,
            frame.ziel,
            frame.ziel == BROADCAST_ID,
            gesamt,
            kopf,
        );

        // Bis zu `max_nonce_versuche` Ratchet-Schritte zur
        // Neusynchronisation nach verlorenen Frames
        let mut klartext = None;
        for _ in 0..self.config.max_nonce_versuche {
            let Some(nonce) = self.manager.naechste_nonce(frame.quelle, klasse) else {
                break;
            };
            match ccm_entschluesseln(&schluessel, &nonce, &body.geheimtext, &aad) {
                Ok(entschluesselt) => {
                    klartext = Some(entschluesselt);
                    break;
                }
                Err(CryptoError::Authentifizierung) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let Some(mut klartext) = klartext else {
            tracing::warn!(quelle = frame.quelle, klasse = ?klasse, "Tag-Pruefung fehlgeschlagen");
            self.metrics.auth_fehler.inc();
            self.ereignis(SecurityEvent::FrameVerworfen {
                node: frame.quelle,
                grund: VerwerfGrund::Authentifizierung,
            });
            // Ratchet gilt als verloren, naechster Frame erzwingt Neuaufbau
            self.manager.span_verwerfen(frame.quelle, klasse);
            return Ok(None);
        };

        self.manager.replay_merken(frame.quelle, body.sequenz);

        if body.hat_verschluesselte_erweiterungen {
            let (innere, konsumiert) = match erweiterungen_parsen(&klartext) {
                Ok(geparst) => geparst,
                Err(fehler) => {
                    tracing::warn!(
                        quelle = frame.quelle,
                        fehler = %fehler,
                        "Verschluesselte Erweiterungen nicht parsebar, Frame verworfen"
                    );
                    self.metrics.ungueltige_frames.inc();
                    self.ereignis(SecurityEvent::FrameVerworfen {
                        node: frame.quelle,
                        grund: VerwerfGrund::UngueltigerFrame,
                    });
                    return Ok(None);
                }
            };
            for erweiterung in innere {
                if let Extension::Mpan { gruppe, zustand } = erweiterung {
                    self.manager.mpan_speichern(frame.quelle, gruppe, zustand);
                }
            }
            klartext.drain(..konsumiert);
        }

        self.metrics.frames_entkapselt.inc();
        tracing::trace!(quelle = frame.quelle, sequenz = body.sequenz, "Frame entkapselt");
        Ok(Some(klartext))
    }

    // -- Nonce-Austausch ------------------------------------------------

    /// Beantwortet ein NonceGet mit einem SOS-NonceReport
    ///
    /// Bereits herausgegebene Entropie wird wiederverwendet, sonst
    /// frische erzeugt.
    pub async fn nonce_get_beantworten(&self, quelle: NodeId) -> SecurityResult<()> {
        let entropie = self.manager.entropie_abrufen_oder_erzeugen(quelle);
        let report =
            NonceReportFrame::mit_entropie(self.manager.naechste_sequenz(quelle), entropie);
        self.transport
            .senden(SecurityFrame::neu(
                self.config.knoten_id,
                quelle,
                SecurityCommand::NonceReport,
                report.to_bytes(),
            ))
            .await
    }

    /// Fordert den Entropie-Beitrag der Gegenseite an
    async fn nonce_anfordern(&self, ziel: NodeId) -> SecurityResult<NonceReportFrame> {
        let anfrage = SecurityFrame::neu(
            self.config.knoten_id,
            ziel,
            SecurityCommand::NonceGet,
            vec![self.manager.naechste_sequenz(ziel)],
        );
        self.transport.senden(anfrage).await?;

        let antwort = self
            .warten_auf(self.config.antwort_zeitlimit(), "nonce_report", ziel, |f| {
                f.kommando == SecurityCommand::NonceReport
            })
            .await?;
        Ok(NonceReportFrame::parse(&antwort.nutzlast)?)
    }

    // -- Kommando-Abfrage -----------------------------------------------

    /// Fragt die unter Sicherheit unterstuetzten Kommandoklassen eines
    /// Knotens ab (gekapselte Get/Report-Runde)
    pub async fn kommandos_abfragen(&self, node: NodeId) -> SecurityResult<Vec<u8>> {
        let anfrage = SecurityFrame::neu(
            self.config.knoten_id,
            node,
            SecurityCommand::CommandsSupportedGet,
            vec![],
        );
        let gekapselt = self.kapseln(node, &anfrage.to_bytes()).await?;
        self.transport.senden(gekapselt).await?;

        let frist = tokio::time::Instant::now() + self.config.antwort_zeitlimit();
        loop {
            let rest = frist
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or(SecurityError::HandshakeZeitlimit {
                    node,
                    schritt: "commands_supported",
                })?;
            let antwort = self
                .warten_auf(rest, "commands_supported", node, |f| f.ist_gekapselt())
                .await?;
            let Some(klartext) = self.entkapseln(&antwort).await? else {
                continue;
            };
            let Ok(inneres) = SecurityFrame::parse(node, self.config.knoten_id, &klartext) else {
                tracing::debug!(quelle = node, "Inneres Kommando nicht parsebar, verworfen");
                continue;
            };
            if inneres.kommando == SecurityCommand::CommandsSupportedReport {
                return Ok(inneres.nutzlast);
            }
        }
    }

    // -- Empfangsschleife -----------------------------------------------

    /// Wartet auf einen Frame von `node`, der das Praedikat erfuellt
    ///
    /// Zwischenzeitliche NonceGets werden automatisch beantwortet, ein
    /// KexFail der Gegenstelle bricht mit `ProtokollSignal` ab, andere
    /// Frames werden verworfen. Nach Ablauf des Zeitlimits kommt
    /// `HandshakeZeitlimit` mit dem benannten Schritt.
    pub async fn warten_auf<F>(
        &self,
        zeitlimit: Duration,
        schritt: &'static str,
        node: NodeId,
        passt: F,
    ) -> SecurityResult<SecurityFrame>
    where
        F: Fn(&SecurityFrame) -> bool,
    {
        let frist = tokio::time::Instant::now() + zeitlimit;
        loop {
            let frame = tokio::time::timeout_at(frist, self.transport.empfangen())
                .await
                .map_err(|_| SecurityError::HandshakeZeitlimit { node, schritt })??;

            if frame.kommando == SecurityCommand::NonceGet {
                self.nonce_get_beantworten(frame.quelle).await?;
                continue;
            }
            if frame.kommando == SecurityCommand::KexFail && frame.quelle == node {
                let grund = frame
                    .nutzlast
                    .first()
                    .copied()
                    .map(KexFailGrund::try_from)
                    .transpose()?
                    .unwrap_or(KexFailGrund::Abbruch);
                return Err(SecurityError::ProtokollSignal(grund));
            }
            if frame.quelle == node && passt(&frame) {
                return Ok(frame);
            }
            tracing::debug!(
                quelle = frame.quelle,
                kommando = ?frame.kommando,
                "Unerwarteter Frame verworfen"
            );
        }
    }
}
