//! Schluessel- und Zustandsverwaltung pro Gegenstelle
//!
//! Der `SecurityManager` haelt fuer jeden bekannten Knoten die
//! installierten Schluessel-Ableitungen, den Nonce-Ratchet pro Klasse,
//! das Replay-Fenster und die zuletzt herausgegebene lokale Entropie.
//! Die Tabelle ist eine DashMap mit einem `parking_lot::Mutex` pro
//! Knoten; alle Zugriffe auf den Zustand einer Gegenstelle laufen
//! dadurch strikt serialisiert, verschiedene Knoten blockieren sich
//! nicht.

use std::collections::HashMap;

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;

use funknetz_core::types::{KeyClass, NodeId};
use funknetz_crypto::kdf::{schluessel_expandieren, AbgeleiteteSchluessel};

use crate::error::{SecurityError, SecurityResult};
use crate::replay::ReplayFenster;
use crate::span::SpanZustand;

/// Installierte Ableitung einer Schluessel-Klasse
#[derive(Debug, Clone)]
pub struct SchluesselEintrag {
    pub ccm_schluessel: [u8; 16],
    pub personalisierung: [u8; 32],
}

impl From<AbgeleiteteSchluessel> for SchluesselEintrag {
    fn from(abgeleitet: AbgeleiteteSchluessel) -> Self {
        Self {
            ccm_schluessel: abgeleitet.ccm_schluessel,
            personalisierung: abgeleitet.personalisierung,
        }
    }
}

/// Gesamter Sicherheits-Zustand einer Gegenstelle
#[derive(Debug, Default)]
struct PeerZustand {
    schluessel: HashMap<KeyClass, SchluesselEintrag>,
    spans: HashMap<KeyClass, SpanZustand>,
    /// Zuletzt per NonceReport herausgegebene eigene Entropie
    lokale_entropie: Option<[u8; 16]>,
    /// Im KEX-Report angefragte Klassen (bis zum Abschluss des Enrollments)
    angefragte_klassen: Option<Vec<KeyClass>>,
    /// Empfangene Gruppen-Zustaende (Gruppe -> MPAN)
    mpans: HashMap<u8, [u8; 16]>,
    replay: ReplayFenster,
    ausgehende_sequenz: u8,
}

/// Verwaltet Schluessel und Nonce-Zustand aller Gegenstellen
#[derive(Debug, Default)]
pub struct SecurityManager {
    peers: DashMap<NodeId, Mutex<PeerZustand>>,
}

impl SecurityManager {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Serialisierter Zugriff auf den Zustand eines Knotens
    /// (legt den Eintrag bei Bedarf an)
    fn mit_peer<R>(&self, node: NodeId, f: impl FnOnce(&mut PeerZustand) -> R) -> R {
        let eintrag = self.peers.entry(node).or_default();
        let mut zustand = eintrag.lock();
        f(&mut zustand)
    }

    /// Wie `mit_peer`, aber ohne Eintrag anzulegen
    fn mit_bekanntem_peer<R>(
        &self,
        node: NodeId,
        f: impl FnOnce(&mut PeerZustand) -> R,
    ) -> Option<R> {
        self.peers.get(&node).map(|eintrag| f(&mut eintrag.lock()))
    }

    // -- Schluessel-Verwaltung ------------------------------------------

    /// Installiert einen dauerhaften Netzwerkschluessel einer Klasse
    ///
    /// Die CCM-Ableitung und der Personalisierungs-String werden sofort
    /// expandiert; ein bestehender Ratchet der Klasse wird verworfen.
    pub fn netzwerk_schluessel_installieren(
        &self,
        node: NodeId,
        klasse: KeyClass,
        netzwerk_schluessel: &[u8; 16],
    ) {
        let abgeleitet = schluessel_expandieren(netzwerk_schluessel, false);
        self.ableitung_installieren(node, klasse, abgeleitet);
    }

    /// Installiert eine bereits expandierte Ableitung (z.B. den
    /// temporaeren Enrollment-Schluessel)
    pub fn ableitung_installieren(
        &self,
        node: NodeId,
        klasse: KeyClass,
        abgeleitet: AbgeleiteteSchluessel,
    ) {
        self.mit_peer(node, |peer| {
            peer.spans.remove(&klasse);
            peer.schluessel.insert(klasse, abgeleitet.into());
        });
        tracing::debug!(node, klasse = ?klasse, "Schluessel installiert");
    }

    /// Widerruft den Schluessel einer Klasse samt Ratchet
    pub fn schluessel_widerrufen(&self, node: NodeId, klasse: KeyClass) {
        self.mit_bekanntem_peer(node, |peer| {
            peer.schluessel.remove(&klasse);
            peer.spans.remove(&klasse);
        });
        tracing::debug!(node, klasse = ?klasse, "Schluessel widerrufen");
    }

    /// Widerruft alle Schluessel eines Knotens (Enrollment-Rueckbau)
    pub fn alle_widerrufen(&self, node: NodeId) {
        self.mit_bekanntem_peer(node, |peer| {
            peer.schluessel.clear();
            peer.spans.clear();
            peer.angefragte_klassen = None;
        });
        tracing::debug!(node, "Alle Schluessel widerrufen");
    }

    pub fn hat_schluessel(&self, node: NodeId, klasse: KeyClass) -> bool {
        self.mit_bekanntem_peer(node, |peer| peer.schluessel.contains_key(&klasse))
            .unwrap_or(false)
    }

    /// Hoechste Klasse, fuer die ein Schluessel installiert ist
    pub fn hoechste_klasse(&self, node: NodeId) -> Option<KeyClass> {
        self.mit_bekanntem_peer(node, |peer| {
            KeyClass::ABSTEIGEND
                .iter()
                .copied()
                .find(|k| peer.schluessel.contains_key(k))
        })
        .flatten()
    }

    /// CCM-Schluessel einer Klasse
    pub fn ccm_schluessel(&self, node: NodeId, klasse: KeyClass) -> SecurityResult<[u8; 16]> {
        self.mit_bekanntem_peer(node, |peer| {
            peer.schluessel.get(&klasse).map(|s| s.ccm_schluessel)
        })
        .flatten()
        .ok_or(SecurityError::KeinSchluessel { node })
    }

    // -- Enrollment-Buchhaltung -----------------------------------------

    /// Merkt sich die im KEX-Report angefragten Klassen
    pub fn angefragte_klassen_speichern(&self, node: NodeId, klassen: Vec<KeyClass>) {
        self.mit_peer(node, |peer| peer.angefragte_klassen = Some(klassen));
    }

    /// Die zuletzt angefragten Klassen eines Knotens
    pub fn angefragte_klassen(&self, node: NodeId) -> Option<Vec<KeyClass>> {
        self.mit_bekanntem_peer(node, |peer| peer.angefragte_klassen.clone())
            .flatten()
    }

    // -- Nonce-Synchronisation ------------------------------------------

    /// Initialisiert den Ratchet einer Klasse aus den Entropie-Beitraegen
    /// beider Seiten
    pub fn span_initialisieren(
        &self,
        node: NodeId,
        klasse: KeyClass,
        sender_entropie: &[u8; 16],
        empfaenger_entropie: &[u8; 16],
    ) -> SecurityResult<()> {
        self.mit_bekanntem_peer(node, |peer| {
            let personalisierung = peer
                .schluessel
                .get(&klasse)
                .map(|s| s.personalisierung)
                .ok_or(SecurityError::KeinSchluessel { node })?;
            peer.spans.insert(
                klasse,
                SpanZustand::neu(sender_entropie, empfaenger_entropie, &personalisierung),
            );
            Ok(())
        })
        .unwrap_or(Err(SecurityError::KeinSchluessel { node }))
    }

    pub fn hat_span(&self, node: NodeId, klasse: KeyClass) -> bool {
        self.mit_bekanntem_peer(node, |peer| peer.spans.contains_key(&klasse))
            .unwrap_or(false)
    }

    /// Naechste Nonce des Ratchets, `None` ohne synchronisierten Zustand
    pub fn naechste_nonce(&self, node: NodeId, klasse: KeyClass) -> Option<[u8; 16]> {
        self.mit_bekanntem_peer(node, |peer| {
            peer.spans.get_mut(&klasse).map(|s| s.naechste_nonce())
        })
        .flatten()
    }

    pub fn span_verwerfen(&self, node: NodeId, klasse: KeyClass) {
        self.mit_bekanntem_peer(node, |peer| {
            peer.spans.remove(&klasse);
        });
    }

    /// Erzeugt frische lokale Entropie fuer einen NonceReport und merkt
    /// sie sich fuer den folgenden Ratchet-Aufbau
    pub fn entropie_erzeugen(&self, node: NodeId) -> [u8; 16] {
        let mut entropie = [0u8; 16];
        OsRng.fill_bytes(&mut entropie);
        self.mit_peer(node, |peer| peer.lokale_entropie = Some(entropie));
        entropie
    }

    /// Zuletzt herausgegebene lokale Entropie
    pub fn lokale_entropie(&self, node: NodeId) -> Option<[u8; 16]> {
        self.mit_bekanntem_peer(node, |peer| peer.lokale_entropie)
            .flatten()
    }

    /// Nimmt die herausgegebene lokale Entropie heraus
    ///
    /// Der Aufbau des Ratchets verbraucht sie; ein spaeterer Neuaufbau
    /// braucht eine frische NonceGet-Runde.
    pub fn lokale_entropie_verbrauchen(&self, node: NodeId) -> Option<[u8; 16]> {
        self.mit_bekanntem_peer(node, |peer| peer.lokale_entropie.take())
            .flatten()
    }

    /// Liefert die bereits herausgegebene Entropie oder erzeugt frische
    pub fn entropie_abrufen_oder_erzeugen(&self, node: NodeId) -> [u8; 16] {
        match self.lokale_entropie(node) {
            Some(entropie) => entropie,
            None => self.entropie_erzeugen(node),
        }
    }

    // -- Sequenznummern und Replay --------------------------------------

    /// Naechste ausgehende Sequenznummer (wrappt bei 255)
    pub fn naechste_sequenz(&self, node: NodeId) -> u8 {
        self.mit_peer(node, |peer| {
            peer.ausgehende_sequenz = peer.ausgehende_sequenz.wrapping_add(1);
            peer.ausgehende_sequenz
        })
    }

    pub fn ist_replay(&self, node: NodeId, sequenz: u8) -> bool {
        self.mit_bekanntem_peer(node, |peer| peer.replay.ist_replay(sequenz))
            .unwrap_or(false)
    }

    /// Merkt eine akzeptierte Sequenznummer im Replay-Fenster
    pub fn replay_merken(&self, node: NodeId, sequenz: u8) {
        self.mit_peer(node, |peer| peer.replay.merken(sequenz));
    }

    // -- Gruppen-Zustand ------------------------------------------------

    /// Speichert einen per verschluesselter Erweiterung gelieferten
    /// Gruppen-Zustand
    pub fn mpan_speichern(&self, node: NodeId, gruppe: u8, zustand: [u8; 16]) {
        self.mit_peer(node, |peer| {
            peer.mpans.insert(gruppe, zustand);
        });
        tracing::debug!(node, gruppe, "Gruppen-Zustand gespeichert");
    }

    pub fn mpan(&self, node: NodeId, gruppe: u8) -> Option<[u8; 16]> {
        self.mit_bekanntem_peer(node, |peer| peer.mpans.get(&gruppe).copied())
            .flatten()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schluessel_installieren_und_aufloesen() {
        let manager = SecurityManager::neu();
        manager.netzwerk_schluessel_installieren(5, KeyClass::Unauthenticated, &[0x42; 16]);

        assert!(manager.hat_schluessel(5, KeyClass::Unauthenticated));
        assert!(!manager.hat_schluessel(5, KeyClass::AccessControl));
        assert_eq!(manager.hoechste_klasse(5), Some(KeyClass::Unauthenticated));
        assert!(manager.ccm_schluessel(5, KeyClass::Unauthenticated).is_ok());
    }

    #[test]
    fn hoechste_klasse_bevorzugt_vertrauen() {
        let manager = SecurityManager::neu();
        manager.netzwerk_schluessel_installieren(5, KeyClass::Unauthenticated, &[0x01; 16]);
        manager.netzwerk_schluessel_installieren(5, KeyClass::AccessControl, &[0x02; 16]);
        assert_eq!(manager.hoechste_klasse(5), Some(KeyClass::AccessControl));
    }

    #[test]
    fn unbekannter_knoten_ohne_schluessel() {
        let manager = SecurityManager::neu();
        assert_eq!(manager.hoechste_klasse(99), None);
        assert!(matches!(
            manager.ccm_schluessel(99, KeyClass::Unauthenticated),
            Err(SecurityError::KeinSchluessel { node: 99 })
        ));
    }

    #[test]
    fn span_erfordert_schluessel() {
        let manager = SecurityManager::neu();
        assert!(manager
            .span_initialisieren(5, KeyClass::Unauthenticated, &[0x01; 16], &[0x02; 16])
            .is_err());

        manager.netzwerk_schluessel_installieren(5, KeyClass::Unauthenticated, &[0x42; 16]);
        manager
            .span_initialisieren(5, KeyClass::Unauthenticated, &[0x01; 16], &[0x02; 16])
            .unwrap();
        assert!(manager.hat_span(5, KeyClass::Unauthenticated));
        assert!(manager.naechste_nonce(5, KeyClass::Unauthenticated).is_some());
    }

    #[test]
    fn beide_seiten_ratchet_synchron() {
        let a = SecurityManager::neu();
        let b = SecurityManager::neu();
        a.netzwerk_schluessel_installieren(2, KeyClass::Unauthenticated, &[0x42; 16]);
        b.netzwerk_schluessel_installieren(1, KeyClass::Unauthenticated, &[0x42; 16]);

        a.span_initialisieren(2, KeyClass::Unauthenticated, &[0x01; 16], &[0x02; 16])
            .unwrap();
        b.span_initialisieren(1, KeyClass::Unauthenticated, &[0x01; 16], &[0x02; 16])
            .unwrap();

        for _ in 0..5 {
            assert_eq!(
                a.naechste_nonce(2, KeyClass::Unauthenticated),
                b.naechste_nonce(1, KeyClass::Unauthenticated)
            );
        }
    }

    #[test]
    fn widerruf_entfernt_span() {
        let manager = SecurityManager::neu();
        manager.netzwerk_schluessel_installieren(5, KeyClass::Unauthenticated, &[0x42; 16]);
        manager
            .span_initialisieren(5, KeyClass::Unauthenticated, &[0x01; 16], &[0x02; 16])
            .unwrap();
        manager.schluessel_widerrufen(5, KeyClass::Unauthenticated);
        assert!(!manager.hat_schluessel(5, KeyClass::Unauthenticated));
        assert!(!manager.hat_span(5, KeyClass::Unauthenticated));
    }

    #[test]
    fn neuer_schluessel_verwirft_alten_span() {
        let manager = SecurityManager::neu();
        manager.netzwerk_schluessel_installieren(5, KeyClass::Unauthenticated, &[0x42; 16]);
        manager
            .span_initialisieren(5, KeyClass::Unauthenticated, &[0x01; 16], &[0x02; 16])
            .unwrap();
        manager.netzwerk_schluessel_installieren(5, KeyClass::Unauthenticated, &[0x43; 16]);
        assert!(!manager.hat_span(5, KeyClass::Unauthenticated));
    }

    #[test]
    fn sequenznummern_steigen_und_wrappen() {
        let manager = SecurityManager::neu();
        assert_eq!(manager.naechste_sequenz(5), 1);
        assert_eq!(manager.naechste_sequenz(5), 2);
        for _ in 0..253 {
            manager.naechste_sequenz(5);
        }
        assert_eq!(manager.naechste_sequenz(5), 0);
    }

    #[test]
    fn replay_fenster_pro_knoten() {
        let manager = SecurityManager::neu();
        manager.replay_merken(5, 10);
        assert!(manager.ist_replay(5, 10));
        assert!(!manager.ist_replay(6, 10));
    }

    #[test]
    fn entropie_gemerkt_und_wiederverwendet() {
        let manager = SecurityManager::neu();
        assert!(manager.lokale_entropie(5).is_none());
        let entropie = manager.entropie_erzeugen(5);
        assert_eq!(manager.lokale_entropie(5), Some(entropie));
        assert_eq!(manager.entropie_abrufen_oder_erzeugen(5), entropie);
    }

    #[test]
    fn entropie_wird_beim_verbrauch_entfernt() {
        let manager = SecurityManager::neu();
        let entropie = manager.entropie_erzeugen(5);
        assert_eq!(manager.lokale_entropie_verbrauchen(5), Some(entropie));
        assert!(manager.lokale_entropie(5).is_none());

        // Die naechste NonceGet-Runde liefert frische Entropie
        let frisch = manager.entropie_abrufen_oder_erzeugen(5);
        assert_ne!(frisch, entropie);
    }

    #[test]
    fn angefragte_klassen_buchhaltung() {
        let manager = SecurityManager::neu();
        assert!(manager.angefragte_klassen(5).is_none());
        manager.angefragte_klassen_speichern(
            5,
            vec![KeyClass::AccessControl, KeyClass::Unauthenticated],
        );
        assert_eq!(
            manager.angefragte_klassen(5),
            Some(vec![KeyClass::AccessControl, KeyClass::Unauthenticated])
        );
        manager.alle_widerrufen(5);
        assert!(manager.angefragte_klassen(5).is_none());
    }

    #[test]
    fn mpan_speichern_und_lesen() {
        let manager = SecurityManager::neu();
        manager.mpan_speichern(5, 3, [0xAB; 16]);
        assert_eq!(manager.mpan(5, 3), Some([0xAB; 16]));
        assert_eq!(manager.mpan(5, 4), None);
    }
}
