//! # funkstelle-observability
//!
//! Structured Logging via tracing-subscriber (Text oder JSON), gesteuert
//! ueber Konfiguration und die Umgebungsvariablen `FS_LOG_LEVEL` und
//! `FS_LOG_FORMAT`.

pub mod logging;

pub use logging::{
    log_format_gueltig, log_level_normalisieren, logging_initialisieren, LogFormat,
    LoggingFehler,
};
