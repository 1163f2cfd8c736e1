//! Fehlertypen fuer den Transport
//!
//! Nur Startfehler (Binden, TLS-Material) verlassen den Transport. Fehler
//! einzelner Verbindungen werden protokolliert und bleiben lokal.

use std::io;
use thiserror::Error;

/// Fehlertyp fuer den Transport
#[derive(Debug, Error)]
pub enum TransportFehler {
    /// Listener konnte nicht gebunden werden
    #[error("Binden an {adresse} fehlgeschlagen: {quelle}")]
    Binden {
        adresse: String,
        #[source]
        quelle: io::Error,
    },

    /// Zertifikat, Schluessel oder DH-Parameter nicht lesbar
    #[error("TLS-Material '{pfad}' unbrauchbar: {grund}")]
    TlsMaterial { pfad: String, grund: String },

    /// rustls hat die Konfiguration abgelehnt
    #[error("TLS-Konfiguration ungueltig: {0}")]
    TlsKonfig(String),

    /// Sonstiger IO-Fehler (Runtime, Threads)
    #[error("IO-Fehler: {0}")]
    Io(#[from] io::Error),
}

impl TransportFehler {
    /// Erstellt einen Fehler fuer unbrauchbares TLS-Material
    pub fn tls_material(pfad: impl std::fmt::Display, grund: impl Into<String>) -> Self {
        Self::TlsMaterial {
            pfad: pfad.to_string(),
            grund: grund.into(),
        }
    }
}

/// Result-Typ fuer den Transport
pub type TransportResult<T> = Result<T, TransportFehler>;
