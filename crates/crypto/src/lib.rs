//! # funknetz-crypto
//!
//! Kryptografische Bausteine des Funknetz-Sicherheits-Subsystems.
//!
//! ## Module
//! - `cmac` - AES-128-CMAC (RFC 4493), auch als PRF des Handshakes
//! - `kdf` - CKDF-Ableitungsketten (Entropie-Mischung, Schluessel-Familie)
//! - `aead` - AES-128-CCM mit 8-Byte-Tag
//! - `drbg` - AES-CTR-DRBG als SPAN-Nonce-Ratchet
//! - `keypair` - X25519-Schluesselpaar des Controllers
//! - `types` - SecretBytes und abgeleitete Schluessel
//! - `error` - Fehlertypen

pub mod aead;
pub mod cmac;
pub mod drbg;
pub mod error;
pub mod kdf;
pub mod keypair;
pub mod types;

// Bequeme Re-Exports
pub use aead::{ccm_entschluesseln, ccm_verschluesseln, NONCE_GROESSE, TAG_GROESSE};
pub use cmac::cmac_berechnen;
pub use drbg::CtrDrbg;
pub use error::{CryptoError, CryptoResult};
pub use kdf::{
    entropie_expandieren, entropie_extrahieren, schluessel_expandieren,
    temp_schluessel_extrahieren, AbgeleiteteSchluessel,
};
pub use keypair::ControllerKeyPair;
pub use types::SecretBytes;
