//! funkstelle-protocol – JSON-Signaling-Protokoll
//!
//! Dieses Crate definiert die Dokumente, die Clients als WebSocket-
//! Textframes senden und empfangen. Jedes Dokument traegt ein `signal`-Feld,
//! das die Operation auswaehlt (`sign_in`, `sign_out`, `message`, `exist`).
//!
//! Nutzdaten von `message`-Dokumenten (SDP, ICE-Kandidaten) werden nicht
//! interpretiert. Ausgewertet werden nur die Routing-Felder `to`, `from`
//! und `type`.

pub mod anfrage;
pub mod antwort;
pub mod error;

pub use anfrage::{
    anfrage_parsen, Anfrage, ExistAnfrage, NachrichtAnfrage, SignInAnfrage, SignOutAnfrage,
    SignalArt,
};
pub use antwort::{
    ExistAntwort, PeerEintrag, SignInAntwort, SignOutAntwort, SignOutMeldung,
};
pub use error::{ProtokollFehler, ProtokollResult};
