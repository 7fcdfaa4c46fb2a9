//! # funknetz-security
//!
//! Die Sicherheits-Engine des Funknetz-Stacks: verwaltet Schluessel und
//! Nonce-Zustand pro Gegenstelle, kapselt und entkapselt Kommandos und
//! fuehrt das Enrollment neuer Knoten durch.
//!
//! ## Module
//! - `manager` - Schluessel-, Ratchet- und Replay-Zustand pro Knoten
//! - `span` - synchronisierter Nonce-Ratchet
//! - `replay` - Fenster der zuletzt gesehenen Sequenznummern
//! - `channel` - Kapselung/Entkapselung ueber einem Transport
//! - `handshake` - Enrollment-Handshake und Schluessel-Vorrat
//! - `transport` - Transport-Abstraktion plus In-Memory-Paar fuer Tests
//! - `config` - TOML-ladbare Konfiguration
//! - `error` - Fehler-Taxonomie der Engine

pub mod channel;
pub mod config;
pub mod error;
pub mod handshake;
pub mod manager;
pub mod replay;
pub mod span;
pub mod transport;

// Bequeme Re-Exports
pub use channel::SecureChannel;
pub use config::SecurityConfig;
pub use error::{SecurityError, SecurityResult};
pub use handshake::{EnrollmentKoordinator, EnrollmentPhase, SchluesselVorrat};
pub use manager::SecurityManager;
pub use replay::ReplayFenster;
pub use span::SpanZustand;
pub use transport::FrameTransport;
