//! funkstelle-signaling – Signaling-Protokoll fuer WebRTC-Sitzungen
//!
//! Clients melden sich mit einem Namen an, finden andere Peers und tauschen
//! Angebote, Antworten und ICE-Kandidaten aus. Der Server leitet diese
//! Dokumente unveraendert weiter und wertet nur `to`, `from` und `type` aus.
//!
//! ## Architektur
//!
//! ```text
//! Worker-Thread (funkstelle-transport)
//!     |  bei_nachricht / bei_schliessen
//!     v
//! SignalingEngine
//!     +-- PeerRegistry   (ID-Vergabe, Name, Verbindung)
//!     +-- PaarTabelle    (offer: from -> to)
//!     +-- Diagnoseliste  (debug nach jeder Aenderung)
//!     |
//!     v
//! Ausgang (Versender des Transports)
//! ```

pub mod engine;
pub mod listing;
pub mod pairing;
pub mod peers;

// Bequeme Re-Exporte
pub use engine::SignalingEngine;
pub use pairing::{PaarEintrag, PaarTabelle};
pub use peers::{Peer, PeerRegistry};
