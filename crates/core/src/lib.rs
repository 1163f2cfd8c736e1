//! funkstelle-core – Gemeinsame Typen, ICE-Konfiguration und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die Transport-
//! und Signaling-Schicht gemeinsam nutzen.

pub mod error;
pub mod ice;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{FunkstelleError, Result};
pub use ice::IceKonfig;
pub use types::{ListenerArt, PeerId, VerbindungsId};
