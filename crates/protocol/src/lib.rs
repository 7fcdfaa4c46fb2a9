//! # funknetz-protocol
//!
//! Wire-Format der Sicherheits-Kommandoklasse.
//!
//! ## Module
//! - `command` - Kommando-IDs und KEX-Fehlercodes
//! - `frame` - Aeusserer Sicherheits-Frame (Klasse + Kommando + Nutzlast)
//! - `kex` - KEX-Report/Set-Frames (Schemata, Kurven, Schluessel-Bitfeld)
//! - `nonce` - NonceGet/NonceReport-Frames
//! - `netkey` - Netzwerkschluessel-Transfer und TransferEnd
//! - `extension` - Klartext- und verschluesselte Erweiterungs-TLVs
//! - `encap` - Layout des Encapsulation-Bodys
//! - `aad` - Aufbau der Additional Authenticated Data

pub mod aad;
pub mod command;
pub mod encap;
pub mod extension;
pub mod frame;
pub mod kex;
pub mod netkey;
pub mod nonce;

// Bequeme Re-Exports
pub use aad::zusatzdaten_bauen;
pub use command::{KexFailGrund, SecurityCommand, KOMMANDOKLASSE_SICHERHEIT};
pub use encap::EncapsulationBody;
pub use extension::Extension;
pub use frame::SecurityFrame;
pub use kex::{KeyExchangeFrame, KURVE_25519, SCHEMA_1};
pub use netkey::{NetworkKeyReportFrame, PublicKeyFrame, TransferEndFrame};
pub use nonce::NonceReportFrame;
