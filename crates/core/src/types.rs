//! Gemeinsame Identifikationstypen fuer Funkstelle
//!
//! Newtypes verhindern Verwechslungen zwischen Peer-IDs (Protokollebene)
//! und Verbindungs-Handles (Transportebene) zur Compilezeit.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Protokoll-ID eines angemeldeten Peers
///
/// Immer `>= 0` und eindeutig unter den aktuell angemeldeten Peers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PeerId(pub i32);

impl PeerId {
    /// Gibt den Rohwert zurueck
    pub fn wert(&self) -> i32 {
        self.0
    }

    /// Naechster Kandidat bei der ID-Vergabe, bei Ueberlauf wieder ab 0
    pub fn naechste(self) -> Self {
        match self.0.checked_add(1) {
            Some(n) if n >= 0 => Self(n),
            _ => Self(0),
        }
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fortlaufender Zaehler fuer Verbindungs-Handles (0 ist nie vergeben)
static VERBINDUNGS_ZAEHLER: AtomicU64 = AtomicU64::new(1);

/// Undurchsichtiges Handle einer Transport-Verbindung
///
/// Gehoert dem Transport. Die Signaling-Schicht haelt nur Kopien und
/// prueft vor dem Senden, ob die Verbindung noch lebt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VerbindungsId(pub u64);

impl VerbindungsId {
    /// Vergibt ein neues, prozessweit eindeutiges Handle
    pub fn neu() -> Self {
        Self(VERBINDUNGS_ZAEHLER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for VerbindungsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Art des Listeners, ueber den eine Verbindung angenommen wurde
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerArt {
    /// Unverschluesseltes WebSocket (ws://)
    Klartext,
    /// WebSocket ueber TLS (wss://)
    Tls,
}

impl std::fmt::Display for ListenerArt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Klartext => f.write_str("ws"),
            Self::Tls => f.write_str("wss"),
        }
    }
}
