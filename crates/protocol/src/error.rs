//! Fehlertypen fuer das Signaling-Protokoll
//!
//! Protokollfehler fuehren nie zu einer Fehlerantwort an den Client. Die
//! Engine protokolliert sie und verwirft das Dokument.

use thiserror::Error;

/// Result-Typ fuer das Protokoll
pub type ProtokollResult<T> = Result<T, ProtokollFehler>;

/// Gruende, aus denen ein Dokument verworfen wird
#[derive(Debug, Error)]
pub enum ProtokollFehler {
    /// Kein gueltiges JSON oder falsche Feldtypen
    #[error("Ungueltiges JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Dokument hat kein `signal`-Feld (oder es ist kein String)
    #[error("Feld 'signal' fehlt")]
    SignalFehlt,

    /// `signal` hat einen unbekannten Wert
    #[error("Unbekanntes Signal: {0}")]
    UnbekanntesSignal(String),

    /// Pflichtfeld fehlt
    #[error("Feld '{0}' fehlt")]
    FeldFehlt(&'static str),

    /// ID-Feld ist keine ganze Zahl in `0..=i32::MAX`
    #[error("Ungueltige ID in Feld '{feld}': {wert}")]
    UngueltigeId { feld: &'static str, wert: String },
}
