//! # funknetz-observability
//!
//! Prometheus-Metriken und Structured Logging fuer den
//! Sicherheits-Stack.
//!
//! ## Module
//! - `logging` - tracing-subscriber-Setup (FN_LOG_LEVEL / FN_LOG_FORMAT)
//! - `metrics` - Prometheus-Registry mit den Sicherheits-Countern

pub mod logging;
pub mod metrics;

pub use logging::logging_initialisieren;
pub use metrics::FunknetzMetrics;
