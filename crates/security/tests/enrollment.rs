//! Integrationstests: vollstaendiges Enrollment ueber das
//! In-Memory-Transport-Paar
//!
//! Die Geraete-Seite wird hier mit denselben Bausteinen simuliert wie
//! die Controller-Seite (Manager, Kanal, KDF), gesteuert von einem
//! Skript pro Testfall.

use std::sync::Arc;
use std::time::Duration;

use funknetz_core::event::{SecurityEvent, VerwerfGrund};
use funknetz_core::types::{KeyClass, NodeId};
use funknetz_crypto::kdf::{schluessel_expandieren, temp_schluessel_extrahieren};
use funknetz_crypto::keypair::ControllerKeyPair;
use funknetz_protocol::command::{KexFailGrund, SecurityCommand};
use funknetz_protocol::frame::SecurityFrame;
use funknetz_protocol::kex::{KeyExchangeFrame, KURVE_25519, SCHEMA_1};
use funknetz_protocol::netkey::{NetworkKeyReportFrame, PublicKeyFrame, TransferEndFrame};
use funknetz_security::channel::SecureChannel;
use funknetz_security::config::SecurityConfig;
use funknetz_security::error::SecurityError;
use funknetz_security::handshake::{EnrollmentKoordinator, SchluesselVorrat};
use funknetz_security::manager::SecurityManager;
use funknetz_security::transport::mock::MemoryTransport;

const CONTROLLER: NodeId = 1;
const GERAET: NodeId = 7;

fn kanal_bauen(
    knoten_id: NodeId,
    transport: MemoryTransport,
) -> Arc<SecureChannel<MemoryTransport>> {
    let config = SecurityConfig {
        knoten_id,
        handshake_zeitlimit_sekunden: 5,
        antwort_zeitlimit_sekunden: 5,
        ..Default::default()
    };
    Arc::new(
        SecureChannel::neu(Arc::new(SecurityManager::neu()), Arc::new(transport), config)
            .expect("Kanal-Aufbau"),
    )
}

/// Wartet auf ein gekapseltes inneres Kommando der erwarteten Art
async fn encap_empfangen(
    kanal: &SecureChannel<MemoryTransport>,
    von: NodeId,
    klasse: KeyClass,
    erwartet: SecurityCommand,
) -> Vec<u8> {
    loop {
        let frame = kanal
            .warten_auf(Duration::from_secs(5), "test", von, |f| f.ist_gekapselt())
            .await
            .expect("gekapselter Frame");
        let Some(klartext) = kanal.entkapseln_mit(&frame, klasse).await.expect("entkapseln")
        else {
            continue;
        };
        let inneres =
            SecurityFrame::parse(von, kanal.config().knoten_id, &klartext).expect("inneres Kommando");
        if inneres.kommando == erwartet {
            return inneres.nutzlast;
        }
    }
}

/// Kapselt ein inneres Kommando und sendet es
async fn encap_senden(
    kanal: &SecureChannel<MemoryTransport>,
    an: NodeId,
    klasse: KeyClass,
    kommando: SecurityCommand,
    nutzlast: Vec<u8>,
) {
    let inneres = SecurityFrame::neu(kanal.config().knoten_id, an, kommando, nutzlast);
    let gekapselt = kanal
        .kapseln_mit(an, klasse, &inneres.to_bytes())
        .await
        .expect("kapseln");
    kanal.senden(gekapselt).await.expect("senden");
}

/// Spielt die Geraete-Seite eines vollstaendigen Enrollments durch
async fn geraet_enrollment(
    kanal: Arc<SecureChannel<MemoryTransport>>,
    angefragte_maske: u8,
) -> Vec<KeyClass> {
    let schluesselpaar = ControllerKeyPair::erzeugen();
    let manager = kanal.manager().clone();

    // KexGet -> KexReport
    kanal
        .warten_auf(Duration::from_secs(5), "kex_get", CONTROLLER, |f| {
            f.kommando == SecurityCommand::KexGet
        })
        .await
        .expect("KexGet");
    let report = KeyExchangeFrame {
        echo: false,
        csa: false,
        schemata: SCHEMA_1,
        kurven: KURVE_25519,
        schluessel: angefragte_maske,
    };
    kanal
        .senden(SecurityFrame::neu(
            GERAET,
            CONTROLLER,
            SecurityCommand::KexReport,
            report.to_bytes(),
        ))
        .await
        .expect("KexReport senden");

    // KexSet -> eigene Gewaehrung merken
    let set_frame = kanal
        .warten_auf(Duration::from_secs(5), "kex_set", CONTROLLER, |f| {
            f.kommando == SecurityCommand::KexSet
        })
        .await
        .expect("KexSet");
    let gewaehrung = KeyExchangeFrame::parse(&set_frame.nutzlast).expect("KexSet parse");
    let gewaehrte = gewaehrung.schluessel_klassen();

    // Oeffentliche Schluessel tauschen
    kanal
        .senden(SecurityFrame::neu(
            GERAET,
            CONTROLLER,
            SecurityCommand::PublicKeyReport,
            PublicKeyFrame {
                vom_controller: false,
                public_key: *schluesselpaar.public_key(),
            }
            .to_bytes(),
        ))
        .await
        .expect("PublicKeyReport senden");
    let pk_frame = kanal
        .warten_auf(Duration::from_secs(5), "public_key", CONTROLLER, |f| {
            f.kommando == SecurityCommand::PublicKeyReport
        })
        .await
        .expect("PublicKeyReport");
    let controller_pk = PublicKeyFrame::parse(&pk_frame.nutzlast).expect("PublicKey parse");
    assert!(controller_pk.vom_controller);

    // Temporaeren Schluessel ableiten (Aufnehmender-Pubkey zuerst,
    // dann der eigene)
    let geheimnis = schluesselpaar.shared_secret(&controller_pk.public_key);
    let prk = temp_schluessel_extrahieren(
        &geheimnis,
        &controller_pk.public_key,
        schluesselpaar.public_key(),
    );
    manager.ableitung_installieren(CONTROLLER, KeyClass::EcdhTemp, schluessel_expandieren(&prk, true));

    // Echo-Runde unter dem temporaeren Schluessel
    encap_senden(
        &kanal,
        CONTROLLER,
        KeyClass::EcdhTemp,
        SecurityCommand::KexSet,
        gewaehrung.als_echo().to_bytes(),
    )
    .await;
    let echo_report = encap_empfangen(
        &kanal,
        CONTROLLER,
        KeyClass::EcdhTemp,
        SecurityCommand::KexReport,
    )
    .await;
    assert!(KeyExchangeFrame::parse(&echo_report).expect("Echo-Report").echo);

    // Schluessel-Transfer pro gewaehrter Klasse
    for klasse in &gewaehrte {
        encap_senden(
            &kanal,
            CONTROLLER,
            KeyClass::EcdhTemp,
            SecurityCommand::NetworkKeyGet,
            vec![klasse.bitmaske()],
        )
        .await;
        let report_bytes = encap_empfangen(
            &kanal,
            CONTROLLER,
            KeyClass::EcdhTemp,
            SecurityCommand::NetworkKeyReport,
        )
        .await;
        let schluessel_report =
            NetworkKeyReportFrame::parse(&report_bytes).expect("NetworkKeyReport");
        assert_eq!(schluessel_report.klasse, *klasse);
        manager.netzwerk_schluessel_installieren(
            CONTROLLER,
            *klasse,
            &schluessel_report.schluessel,
        );

        // Verifikation unter dem frisch erhaltenen Schluessel
        encap_senden(
            &kanal,
            CONTROLLER,
            *klasse,
            SecurityCommand::NetworkKeyVerify,
            vec![],
        )
        .await;
        let ende_bytes = encap_empfangen(
            &kanal,
            CONTROLLER,
            KeyClass::EcdhTemp,
            SecurityCommand::TransferEnd,
        )
        .await;
        assert!(
            TransferEndFrame::parse(&ende_bytes)
                .expect("TransferEnd")
                .schluessel_verifiziert
        );
    }

    // Abschluss melden und den temporaeren Schluessel verwerfen
    encap_senden(
        &kanal,
        CONTROLLER,
        KeyClass::EcdhTemp,
        SecurityCommand::TransferEnd,
        TransferEndFrame {
            schluessel_verifiziert: false,
            transfer_abgeschlossen: true,
        }
        .to_bytes(),
    )
    .await;
    manager.schluessel_widerrufen(CONTROLLER, KeyClass::EcdhTemp);

    gewaehrte
}

#[tokio::test]
async fn enrollment_komplett_mit_einer_klasse() {
    let (controller_transport, geraete_transport) = MemoryTransport::paar();
    let controller = kanal_bauen(CONTROLLER, controller_transport);
    let geraet = kanal_bauen(GERAET, geraete_transport);

    let mut ereignisse = controller.ereignisse_abonnieren();

    let geraete_aufgabe = tokio::spawn({
        let geraet = geraet.clone();
        async move { geraet_enrollment(geraet, KeyClass::Unauthenticated.bitmaske()).await }
    });

    let koordinator = EnrollmentKoordinator::neu(
        controller.clone(),
        ControllerKeyPair::erzeugen(),
        SchluesselVorrat::erzeugen(),
    );
    let gewaehrt = koordinator
        .aufnehmen(GERAET, &[KeyClass::Unauthenticated])
        .await
        .expect("Enrollment");
    assert_eq!(gewaehrt, vec![KeyClass::Unauthenticated]);
    assert_eq!(
        geraete_aufgabe.await.expect("Geraete-Task"),
        vec![KeyClass::Unauthenticated]
    );

    // Dauerhafter Schluessel installiert, temporaerer widerrufen
    let manager = controller.manager();
    assert!(manager.hat_schluessel(GERAET, KeyClass::Unauthenticated));
    assert!(!manager.hat_schluessel(GERAET, KeyClass::EcdhTemp));
    assert_eq!(
        manager.hoechste_klasse(GERAET),
        Some(KeyClass::Unauthenticated)
    );

    // Event publiziert
    let event = ereignisse.recv().await.expect("Event");
    assert!(matches!(
        event,
        SecurityEvent::EnrollmentAbgeschlossen {
            node: GERAET,
            klasse: KeyClass::Unauthenticated
        }
    ));

    // Nach dem Enrollment: sichere Runde in beide Richtungen
    let hin = geraet.kapseln(CONTROLLER, b"Temperatur 21").await.expect("kapseln");
    let klartext = controller.entkapseln(&hin).await.expect("entkapseln");
    assert_eq!(klartext.as_deref(), Some(&b"Temperatur 21"[..]));

    let zurueck = controller.kapseln(GERAET, b"Sollwert 19").await.expect("kapseln");
    let klartext = geraet.entkapseln(&zurueck).await.expect("entkapseln");
    assert_eq!(klartext.as_deref(), Some(&b"Sollwert 19"[..]));
}

#[tokio::test]
async fn enrollment_mit_mehreren_klassen() {
    let (controller_transport, geraete_transport) = MemoryTransport::paar();
    let controller = kanal_bauen(CONTROLLER, controller_transport);
    let geraet = kanal_bauen(GERAET, geraete_transport);

    let maske = KeyClass::Unauthenticated.bitmaske() | KeyClass::AccessControl.bitmaske();
    let geraete_aufgabe = tokio::spawn({
        let geraet = geraet.clone();
        async move { geraet_enrollment(geraet, maske).await }
    });

    let koordinator = EnrollmentKoordinator::neu(
        controller.clone(),
        ControllerKeyPair::erzeugen(),
        SchluesselVorrat::erzeugen(),
    );
    let gewaehrt = koordinator
        .aufnehmen(
            GERAET,
            &[KeyClass::Unauthenticated, KeyClass::AccessControl],
        )
        .await
        .expect("Enrollment");

    assert_eq!(
        gewaehrt,
        vec![KeyClass::AccessControl, KeyClass::Unauthenticated]
    );
    geraete_aufgabe.await.expect("Geraete-Task");

    let manager = controller.manager();
    assert!(manager.hat_schluessel(GERAET, KeyClass::AccessControl));
    assert!(manager.hat_schluessel(GERAET, KeyClass::Unauthenticated));
    assert_eq!(manager.hoechste_klasse(GERAET), Some(KeyClass::AccessControl));
}

#[tokio::test]
async fn gewaehrung_schneidet_mit_erlaubnis() {
    let (controller_transport, geraete_transport) = MemoryTransport::paar();
    let controller = kanal_bauen(CONTROLLER, controller_transport);
    let geraet = kanal_bauen(GERAET, geraete_transport);

    // Geraet fragt zwei Klassen an, erlaubt ist nur eine
    let maske = KeyClass::Unauthenticated.bitmaske() | KeyClass::AccessControl.bitmaske();
    let geraete_aufgabe = tokio::spawn({
        let geraet = geraet.clone();
        async move { geraet_enrollment(geraet, maske).await }
    });

    let koordinator = EnrollmentKoordinator::neu(
        controller.clone(),
        ControllerKeyPair::erzeugen(),
        SchluesselVorrat::erzeugen(),
    );
    let gewaehrt = koordinator
        .aufnehmen(GERAET, &[KeyClass::Unauthenticated])
        .await
        .expect("Enrollment");

    assert_eq!(gewaehrt, vec![KeyClass::Unauthenticated]);
    geraete_aufgabe.await.expect("Geraete-Task");
    assert!(!controller
        .manager()
        .hat_schluessel(GERAET, KeyClass::AccessControl));
}

#[tokio::test]
async fn abbruch_durch_geraet_laesst_keine_schluessel_zurueck() {
    let (controller_transport, geraete_transport) = MemoryTransport::paar();
    let controller = kanal_bauen(CONTROLLER, controller_transport);
    let geraet = kanal_bauen(GERAET, geraete_transport);

    let geraete_aufgabe = tokio::spawn({
        let geraet = geraet.clone();
        async move {
            geraet
                .warten_auf(Duration::from_secs(5), "kex_get", CONTROLLER, |f| {
                    f.kommando == SecurityCommand::KexGet
                })
                .await
                .expect("KexGet");
            geraet
                .senden(SecurityFrame::neu(
                    GERAET,
                    CONTROLLER,
                    SecurityCommand::KexFail,
                    vec![KexFailGrund::Abbruch as u8],
                ))
                .await
                .expect("KexFail senden");
        }
    });

    let koordinator = EnrollmentKoordinator::neu(
        controller.clone(),
        ControllerKeyPair::erzeugen(),
        SchluesselVorrat::erzeugen(),
    );
    let fehler = koordinator
        .aufnehmen(GERAET, &[KeyClass::Unauthenticated])
        .await
        .expect_err("Enrollment muss scheitern");
    assert!(matches!(
        fehler,
        SecurityError::ProtokollSignal(KexFailGrund::Abbruch)
    ));
    geraete_aufgabe.await.expect("Geraete-Task");

    assert_eq!(controller.manager().hoechste_klasse(GERAET), None);
    assert_eq!(controller.metriken().enrollments_fehlgeschlagen.get(), 1.0);
}

#[tokio::test]
async fn inkompatibles_geraet_wird_abgewiesen() {
    let (controller_transport, geraete_transport) = MemoryTransport::paar();
    let controller = kanal_bauen(CONTROLLER, controller_transport);
    let geraet = kanal_bauen(GERAET, geraete_transport);

    let geraete_aufgabe = tokio::spawn({
        let geraet = geraet.clone();
        async move {
            geraet
                .warten_auf(Duration::from_secs(5), "kex_get", CONTROLLER, |f| {
                    f.kommando == SecurityCommand::KexGet
                })
                .await
                .expect("KexGet");
            // Unbekannte Kurve angeboten
            let report = KeyExchangeFrame {
                echo: false,
                csa: false,
                schemata: SCHEMA_1,
                kurven: 0x80,
                schluessel: KeyClass::Unauthenticated.bitmaske(),
            };
            geraet
                .senden(SecurityFrame::neu(
                    GERAET,
                    CONTROLLER,
                    SecurityCommand::KexReport,
                    report.to_bytes(),
                ))
                .await
                .expect("KexReport senden");
        }
    });

    let koordinator = EnrollmentKoordinator::neu(
        controller.clone(),
        ControllerKeyPair::erzeugen(),
        SchluesselVorrat::erzeugen(),
    );
    let fehler = koordinator
        .aufnehmen(GERAET, &[KeyClass::Unauthenticated])
        .await
        .expect_err("Enrollment muss scheitern");
    assert!(matches!(fehler, SecurityError::Inkompatibel));
    geraete_aufgabe.await.expect("Geraete-Task");
}

#[tokio::test]
async fn replay_wird_verworfen() {
    let (controller_transport, geraete_transport) = MemoryTransport::paar();
    let controller = kanal_bauen(CONTROLLER, controller_transport);
    let geraet = kanal_bauen(GERAET, geraete_transport);

    let geraete_aufgabe = tokio::spawn({
        let geraet = geraet.clone();
        async move { geraet_enrollment(geraet, KeyClass::Unauthenticated.bitmaske()).await }
    });
    let koordinator = EnrollmentKoordinator::neu(
        controller.clone(),
        ControllerKeyPair::erzeugen(),
        SchluesselVorrat::erzeugen(),
    );
    koordinator
        .aufnehmen(GERAET, &[KeyClass::Unauthenticated])
        .await
        .expect("Enrollment");
    geraete_aufgabe.await.expect("Geraete-Task");

    let frame = geraet.kapseln(CONTROLLER, b"einmalig").await.expect("kapseln");
    assert!(controller.entkapseln(&frame).await.expect("entkapseln").is_some());

    // Identischer Frame ein zweites Mal: verworfen, kein Fehler
    assert!(controller.entkapseln(&frame).await.expect("entkapseln").is_none());
    assert_eq!(controller.metriken().replays_verworfen.get(), 1.0);
}

#[tokio::test]
async fn manipulierter_frame_wird_verworfen() {
    let (controller_transport, geraete_transport) = MemoryTransport::paar();
    let controller = kanal_bauen(CONTROLLER, controller_transport);
    let geraet = kanal_bauen(GERAET, geraete_transport);

    let geraete_aufgabe = tokio::spawn({
        let geraet = geraet.clone();
        async move { geraet_enrollment(geraet, KeyClass::Unauthenticated.bitmaske()).await }
    });
    let koordinator = EnrollmentKoordinator::neu(
        controller.clone(),
        ControllerKeyPair::erzeugen(),
        SchluesselVorrat::erzeugen(),
    );
    koordinator
        .aufnehmen(GERAET, &[KeyClass::Unauthenticated])
        .await
        .expect("Enrollment");
    geraete_aufgabe.await.expect("Geraete-Task");

    let mut frame = geraet.kapseln(CONTROLLER, b"geheim").await.expect("kapseln");
    let letzter = frame.nutzlast.len() - 1;
    frame.nutzlast[letzter] ^= 0x01;

    assert!(controller.entkapseln(&frame).await.expect("entkapseln").is_none());
    assert_eq!(controller.metriken().auth_fehler.get(), 1.0);
}

#[tokio::test]
async fn nicht_parsebarer_frame_wird_verworfen() {
    let (controller_transport, _geraete_transport) = MemoryTransport::paar();
    let controller = kanal_bauen(CONTROLLER, controller_transport);
    controller
        .manager()
        .netzwerk_schluessel_installieren(GERAET, KeyClass::Unauthenticated, &[0x42; 16]);
    let mut ereignisse = controller.ereignisse_abonnieren();

    // Gekapselter Rumpf mit nur einem Byte: zu kurz fuer jeden Kopf
    let kaputt = SecurityFrame::neu(GERAET, CONTROLLER, SecurityCommand::MessageEncap, vec![0x01]);
    assert!(controller.entkapseln(&kaputt).await.expect("entkapseln").is_none());
    assert_eq!(controller.metriken().ungueltige_frames.get(), 1.0);

    let event = ereignisse.recv().await.expect("Event");
    assert!(matches!(
        event,
        SecurityEvent::FrameVerworfen {
            node: GERAET,
            grund: VerwerfGrund::UngueltigerFrame
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn stummes_geraet_fuehrt_zum_zeitlimit() {
    let (controller_transport, geraete_transport) = MemoryTransport::paar();
    let controller = kanal_bauen(CONTROLLER, controller_transport);
    let geraet = kanal_bauen(GERAET, geraete_transport);

    // Das Geraet spielt bis zum Schluesseltausch mit und verstummt dann
    let geraete_aufgabe = tokio::spawn({
        let geraet = geraet.clone();
        async move {
            let schluesselpaar = ControllerKeyPair::erzeugen();
            geraet
                .warten_auf(Duration::from_secs(5), "kex_get", CONTROLLER, |f| {
                    f.kommando == SecurityCommand::KexGet
                })
                .await
                .expect("KexGet");
            let report = KeyExchangeFrame {
                echo: false,
                csa: false,
                schemata: SCHEMA_1,
                kurven: KURVE_25519,
                schluessel: KeyClass::Unauthenticated.bitmaske(),
            };
            geraet
                .senden(SecurityFrame::neu(
                    GERAET,
                    CONTROLLER,
                    SecurityCommand::KexReport,
                    report.to_bytes(),
                ))
                .await
                .expect("KexReport senden");
            geraet
                .warten_auf(Duration::from_secs(5), "kex_set", CONTROLLER, |f| {
                    f.kommando == SecurityCommand::KexSet
                })
                .await
                .expect("KexSet");
            geraet
                .senden(SecurityFrame::neu(
                    GERAET,
                    CONTROLLER,
                    SecurityCommand::PublicKeyReport,
                    PublicKeyFrame {
                        vom_controller: false,
                        public_key: *schluesselpaar.public_key(),
                    }
                    .to_bytes(),
                ))
                .await
                .expect("PublicKeyReport senden");
            geraet
                .warten_auf(Duration::from_secs(5), "public_key", CONTROLLER, |f| {
                    f.kommando == SecurityCommand::PublicKeyReport
                })
                .await
                .expect("PublicKeyReport");
        }
    });

    let koordinator = EnrollmentKoordinator::neu(
        controller.clone(),
        ControllerKeyPair::erzeugen(),
        SchluesselVorrat::erzeugen(),
    );
    let fehler = koordinator
        .aufnehmen(GERAET, &[KeyClass::Unauthenticated])
        .await
        .expect_err("Enrollment muss scheitern");
    assert!(matches!(
        fehler,
        SecurityError::HandshakeZeitlimit { node: GERAET, .. }
    ));
    geraete_aufgabe.await.expect("Geraete-Task");

    // Auch der temporaere Schluessel ist wieder weg
    assert_eq!(controller.manager().hoechste_klasse(GERAET), None);
    assert_eq!(controller.metriken().enrollments_fehlgeschlagen.get(), 1.0);
}

#[tokio::test]
async fn kapseln_ohne_schluessel_schlaegt_fehl() {
    let (controller_transport, _geraete_transport) = MemoryTransport::paar();
    let controller = kanal_bauen(CONTROLLER, controller_transport);

    let fehler = controller
        .kapseln(99, b"niemand kennt dich")
        .await
        .expect_err("muss scheitern");
    assert!(matches!(fehler, SecurityError::KeinSchluessel { node: 99 }));
}

#[tokio::test]
async fn kommandos_abfragen_nach_enrollment() {
    let (controller_transport, geraete_transport) = MemoryTransport::paar();
    let controller = kanal_bauen(CONTROLLER, controller_transport);
    let geraet = kanal_bauen(GERAET, geraete_transport);

    let geraete_aufgabe = tokio::spawn({
        let geraet = geraet.clone();
        async move {
            geraet_enrollment(geraet.clone(), KeyClass::Unauthenticated.bitmaske()).await;

            // Auf die gekapselte Abfrage antworten
            encap_empfangen(
                &geraet,
                CONTROLLER,
                KeyClass::Unauthenticated,
                SecurityCommand::CommandsSupportedGet,
            )
            .await;
            encap_senden(
                &geraet,
                CONTROLLER,
                KeyClass::Unauthenticated,
                SecurityCommand::CommandsSupportedReport,
                vec![0x25, 0x26],
            )
            .await;
        }
    });

    let koordinator = EnrollmentKoordinator::neu(
        controller.clone(),
        ControllerKeyPair::erzeugen(),
        SchluesselVorrat::erzeugen(),
    );
    koordinator
        .aufnehmen(GERAET, &[KeyClass::Unauthenticated])
        .await
        .expect("Enrollment");

    let kommandos = controller.kommandos_abfragen(GERAET).await.expect("Abfrage");
    assert_eq!(kommandos, vec![0x25, 0x26]);
    geraete_aufgabe.await.expect("Geraete-Task");
}
