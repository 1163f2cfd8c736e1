//! funkstelle-transport – WebSocket-Transport und Nebenlaeufigkeitskern
//!
//! Dieser Crate besitzt alle Netzwerk-Listener und entkoppelt Netzwerk-I/O
//! von der Protokollverarbeitung ueber eine Action-Queue mit genau einem
//! Konsumenten.
//!
//! ## Architektur
//!
//! ```text
//! Listener ws:// (+ optional wss://)     tokio, Thread des Aufrufers
//!     |
//!     v
//! Verbindungs-Task (pro Socket)          Handshake, Frames, Pong-Timeout
//!     |  Subscribe / Message / Unsubscribe
//!     v
//! ActionQueue (Mutex + Condvar)
//!     |
//!     v
//! Worker-Thread (einziger Konsument) --> VerbindungsHandler (Signaling)
//!                                               |
//!                                               v
//!                                        Versender -> VerbindungsRegistry
//!                                               |
//!                                               v
//!                                        Ausgangs-Queue des Sockets
//!
//! Keepalive-Thread   pingt alle Verbindungen, wartet mit Timeout auf Stopp
//! Exit-Thread        wartet auf ExitSignal, stoppt Listener, reiht Exit ein
//! ```

pub mod action;
pub mod connection;
pub mod error;
pub mod exit;
pub mod handler;
pub mod handshake;
pub mod keepalive;
pub mod registry;
pub mod server;
pub mod tls;
pub mod versender;
pub mod worker;

// Bequeme Re-Exporte
pub use action::{Action, ActionQueue, Nutzlast};
pub use error::{TransportFehler, TransportResult};
pub use exit::{ExitGrund, ExitSignal, LokalesExitSignal};
pub use handler::{Ausgang, VerbindungsHandler};
pub use keepalive::StoppSignal;
pub use registry::{Ausgehend, VerbindungsHandle, VerbindungsRegistry};
pub use server::{GebundeneListener, TransportKonfig, TransportServer};
pub use tls::TlsDateien;
pub use versender::Versender;

#[cfg(unix)]
pub use exit::{stop_senden, SocketExitSignal};
