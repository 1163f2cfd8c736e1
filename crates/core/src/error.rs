//! Fehlertypen fuer Funkstelle
//!
//! Zentraler Fehler-Enum fuer crate-uebergreifende Fehler. Transport und
//! Protokoll definieren eigene Fehler und konvertieren bei Bedarf.

use thiserror::Error;

/// Globaler Result-Alias fuer Funkstelle
pub type Result<T> = std::result::Result<T, FunkstelleError>;

/// Crate-uebergreifende Fehler
#[derive(Debug, Error)]
pub enum FunkstelleError {
    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Ungueltiger ICE-Deskriptor '{deskriptor}': {grund}")]
    IceDeskriptor { deskriptor: String, grund: String },

    // --- Laufzeit ---
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl FunkstelleError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Deskriptor-Fehler
    pub fn ice_deskriptor(deskriptor: &str, grund: impl Into<String>) -> Self {
        Self::IceDeskriptor {
            deskriptor: deskriptor.to_string(),
            grund: grund.into(),
        }
    }

    /// Gibt true zurueck wenn der Fehler den Start verhindern muss
    pub fn ist_startfehler(&self) -> bool {
        matches!(self, Self::Konfiguration(_) | Self::IceDeskriptor { .. })
    }
}
