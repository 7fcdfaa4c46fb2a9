//! X25519-Schluesselpaar des Controllers
//!
//! Wird einmal pro Prozess-Lebensdauer erzeugt und fuer jedes
//! Enrollment wiederverwendet; pro Geraet entsteht daraus ein eigenes
//! geteiltes Geheimnis.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

/// Langlebiges ECDH-Schluesselpaar des Controllers
pub struct ControllerKeyPair {
    geheimnis: StaticSecret,
    oeffentlich: [u8; 32],
}

impl ControllerKeyPair {
    /// Erzeugt ein frisches Schluesselpaar
    pub fn erzeugen() -> Self {
        let geheimnis = StaticSecret::random_from_rng(OsRng);
        let oeffentlich = X25519PublicKey::from(&geheimnis).to_bytes();
        Self {
            geheimnis,
            oeffentlich,
        }
    }

    /// Rekonstruiert das Paar aus einem persistierten privaten Schluessel
    pub fn aus_bytes(bytes: [u8; 32]) -> Self {
        let geheimnis = StaticSecret::from(bytes);
        let oeffentlich = X25519PublicKey::from(&geheimnis).to_bytes();
        Self {
            geheimnis,
            oeffentlich,
        }
    }

    /// Oeffentlicher Schluessel (32 Bytes)
    pub fn public_key(&self) -> &[u8; 32] {
        &self.oeffentlich
    }

    /// Fuehrt den Diffie-Hellman-Austausch mit dem oeffentlichen
    /// Schluessel der Gegenstelle durch
    pub fn shared_secret(&self, peer_public: &[u8; 32]) -> [u8; 32] {
        let peer = X25519PublicKey::from(*peer_public);
        self.geheimnis.diffie_hellman(&peer).to_bytes()
    }
}

impl std::fmt::Debug for ControllerKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ControllerKeyPair {{ public: {} }}", hex::encode(self.oeffentlich))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
