//! Ausgehende Dokumente (Server -> Client)
//!
//! Antworten auf Anfragen tragen `signal:"return"` und ein `request`-Feld
//! mit der urspruenglichen Operation. Unaufgeforderte Meldungen tragen das
//! Signal der Operation selbst (`sign_out`).

use funkstelle_core::{IceKonfig, PeerId};
use serde::Serialize;

use crate::error::ProtokollResult;

/// Signal-Wert aller Antworten
const SIGNAL_RETURN: &str = "return";
/// Status erfolgreicher Operationen
const STATUS_OK: &str = "ok";

/// Serialisiert ein Dokument kompakt als Textframe
fn zu_text<T: Serialize>(dokument: &T) -> ProtokollResult<String> {
    Ok(serde_json::to_string(dokument)?)
}

// ---------------------------------------------------------------------------
// sign_in
// ---------------------------------------------------------------------------

/// Eintrag der Peer-Liste in der Sign-in-Antwort
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerEintrag {
    pub id: PeerId,
    pub name: String,
}

/// `{signal:"return", request:"sign_in", status:"ok", repeat, id, name, ice?, peers?}`
#[derive(Debug, Clone, Serialize)]
pub struct SignInAntwort {
    signal: &'static str,
    request: &'static str,
    status: &'static str,
    /// Ein anderer Peer mit gleichem Namen war bereits angemeldet
    pub repeat: bool,
    pub id: PeerId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ice: Option<IceKonfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peers: Option<Vec<PeerEintrag>>,
}

impl SignInAntwort {
    /// Erstellt die Antwort; eine leere ICE-Konfiguration wird weggelassen
    pub fn neu(
        id: PeerId,
        name: impl Into<String>,
        repeat: bool,
        ice: &IceKonfig,
        peers: Option<Vec<PeerEintrag>>,
    ) -> Self {
        Self {
            signal: SIGNAL_RETURN,
            request: "sign_in",
            status: STATUS_OK,
            repeat,
            id,
            name: name.into(),
            ice: (!ice.ist_leer()).then(|| ice.clone()),
            peers,
        }
    }

    pub fn zu_text(&self) -> ProtokollResult<String> {
        zu_text(self)
    }
}

// ---------------------------------------------------------------------------
// sign_out
// ---------------------------------------------------------------------------

/// `{signal:"return", request:"sign_out", status:"ok"}`
#[derive(Debug, Clone, Serialize)]
pub struct SignOutAntwort {
    signal: &'static str,
    request: &'static str,
    status: &'static str,
}

impl SignOutAntwort {
    pub fn neu() -> Self {
        Self {
            signal: SIGNAL_RETURN,
            request: "sign_out",
            status: STATUS_OK,
        }
    }

    pub fn zu_text(&self) -> ProtokollResult<String> {
        zu_text(self)
    }
}

impl Default for SignOutAntwort {
    fn default() -> Self {
        Self::neu()
    }
}

/// Meldung an den Gegenpart einer Paarung: `{signal:"sign_out", id}`
#[derive(Debug, Clone, Serialize)]
pub struct SignOutMeldung {
    signal: &'static str,
    pub id: PeerId,
}

impl SignOutMeldung {
    pub fn neu(id: PeerId) -> Self {
        Self {
            signal: "sign_out",
            id,
        }
    }

    pub fn zu_text(&self) -> ProtokollResult<String> {
        zu_text(self)
    }
}

// ---------------------------------------------------------------------------
// exist
// ---------------------------------------------------------------------------

/// `{signal:"return", request:"exist", exist, id?}`
#[derive(Debug, Clone, Serialize)]
pub struct ExistAntwort {
    signal: &'static str,
    request: &'static str,
    pub exist: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<PeerId>,
}

impl ExistAntwort {
    /// `id` vorhanden heisst: Peer existiert
    pub fn neu(id: Option<PeerId>) -> Self {
        Self {
            signal: SIGNAL_RETURN,
            request: "exist",
            exist: id.is_some(),
            id,
        }
    }

    pub fn zu_text(&self) -> ProtokollResult<String> {
        zu_text(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
