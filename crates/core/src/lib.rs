//! # funknetz-core
//!
//! Gemeinsame Typen fuer den Funknetz-Controller-Stack.
//!
//! ## Module
//! - `types` - Knoten-IDs, Schluessel-Klassen und Vertrauensstufen
//! - `event` - Domaenen-Events (Enrollment, verworfene Frames)
//! - `error` - Fehlertypen

pub mod error;
pub mod event;
pub mod types;

// Bequeme Re-Exports
pub use error::{FunknetzError, Result};
pub use event::SecurityEvent;
pub use types::{KeyClass, NodeId, BROADCAST_ID};
