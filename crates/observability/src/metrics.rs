//! Prometheus-kompatible Metriken fuer den Sicherheits-Stack
//!
//! Registrierte Metriken:
//! - `funknetz_frames_gekapselt_total` - Counter: Erfolgreich gekapselte Frames
//! - `funknetz_frames_entkapselt_total` - Counter: Erfolgreich entkapselte Frames
//! - `funknetz_replays_verworfen_total` - Counter: Wegen Replay verworfene Frames
//! - `funknetz_auth_fehler_total` - Counter: Tag-Pruefung fehlgeschlagen
//! - `funknetz_ungueltige_frames_total` - Counter: Nicht parsebare Frames
//! - `funknetz_span_neusynchronisationen_total` - Counter: Neu aufgebaute SPANs
//! - `funknetz_enrollments_abgeschlossen_total` - Counter: Erfolgreiche Enrollments
//! - `funknetz_enrollments_fehlgeschlagen_total` - Counter: Abgebrochene Enrollments

use anyhow::Result;
use prometheus::{Counter, Encoder, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Funknetz-Prometheus-Metriken
#[derive(Clone)]
pub struct FunknetzMetrics {
    pub registry: Arc<Registry>,

    // Kapselungs-Metriken
    pub frames_gekapselt: Counter,
    pub frames_entkapselt: Counter,
    pub replays_verworfen: Counter,
    pub auth_fehler: Counter,
    pub ungueltige_frames: Counter,
    pub span_neusynchronisationen: Counter,

    // Enrollment-Metriken
    pub enrollments_abgeschlossen: Counter,
    pub enrollments_fehlgeschlagen: Counter,
}

impl FunknetzMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let frames_gekapselt = Counter::with_opts(Opts::new(
            "funknetz_frames_gekapselt_total",
            "Gesamtanzahl erfolgreich gekapselter Frames",
        ))?;
        registry.register(Box::new(frames_gekapselt.clone()))?;

        let frames_entkapselt = Counter::with_opts(Opts::new(
            "funknetz_frames_entkapselt_total",
            "Gesamtanzahl erfolgreich entkapselter Frames",
        ))?;
        registry.register(Box::new(frames_entkapselt.clone()))?;

        let replays_verworfen = Counter::with_opts(Opts::new(
            "funknetz_replays_verworfen_total",
            "Gesamtanzahl wegen Replay verworfener Frames",
        ))?;
        registry.register(Box::new(replays_verworfen.clone()))?;

        let auth_fehler = Counter::with_opts(Opts::new(
            "funknetz_auth_fehler_total",
            "Gesamtanzahl fehlgeschlagener Tag-Pruefungen",
        ))?;
        registry.register(Box::new(auth_fehler.clone()))?;

        let ungueltige_frames = Counter::with_opts(Opts::new(
            "funknetz_ungueltige_frames_total",
            "Gesamtanzahl nicht parsebarer verworfener Frames",
        ))?;
        registry.register(Box::new(ungueltige_frames.clone()))?;

        let span_neusynchronisationen = Counter::with_opts(Opts::new(
            "funknetz_span_neusynchronisationen_total",
            "Gesamtanzahl neu aufgebauter Nonce-Synchronisationen",
        ))?;
        registry.register(Box::new(span_neusynchronisationen.clone()))?;

        let enrollments_abgeschlossen = Counter::with_opts(Opts::new(
            "funknetz_enrollments_abgeschlossen_total",
            "Gesamtanzahl erfolgreich abgeschlossener Enrollments",
        ))?;
        registry.register(Box::new(enrollments_abgeschlossen.clone()))?;

        let enrollments_fehlgeschlagen = Counter::with_opts(Opts::new(
            "funknetz_enrollments_fehlgeschlagen_total",
            "Gesamtanzahl fehlgeschlagener Enrollments",
        ))?;
        registry.register(Box::new(enrollments_fehlgeschlagen.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            frames_gekapselt,
            frames_entkapselt,
            replays_verworfen,
            auth_fehler,
            ungueltige_frames,
            span_neusynchronisationen,
            enrollments_abgeschlossen,
            enrollments_fehlgeschlagen,
        })
    }

    /// Rendert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut puffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut puffer)?;
        Ok(String::from_utf8(puffer)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
