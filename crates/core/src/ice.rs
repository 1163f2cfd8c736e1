//! ICE-Server-Konfiguration
//!
//! Wird einmal beim Start gebaut und unveraendert an jede Sign-in-Antwort
//! gehaengt. Der Server interpretiert die Werte nicht, er reicht sie nur
//! an die Clients weiter.
//!
//! Deskriptor-Format: `turn:<uri> [<username>:<password>]`

use serde::{Deserialize, Serialize};

use crate::error::{FunkstelleError, Result};

/// Erlaubte URI-Schemata im Deskriptor
const SCHEMATA: &[&str] = &["turn:", "turns:", "stun:", "stuns:"];

/// Relay-/NAT-Traversal-Server, wie er an Clients ausgeliefert wird
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceKonfig {
    pub uri: String,
    pub username: String,
    pub password: String,
}

impl IceKonfig {
    /// Erstellt eine Konfiguration aus Einzelwerten
    pub fn neu(
        uri: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parst einen Deskriptor der Form `turn:<uri> [<username>:<password>]`
    ///
    /// Ein leerer Deskriptor ergibt eine leere Konfiguration.
    pub fn aus_deskriptor(deskriptor: &str) -> Result<Self> {
        let mut teile = deskriptor.split_whitespace();

        let uri = match teile.next() {
            Some(u) => u,
            None => return Ok(Self::default()),
        };

        if !SCHEMATA.iter().any(|s| uri.starts_with(s)) {
            return Err(FunkstelleError::ice_deskriptor(
                deskriptor,
                "URI muss mit turn:, turns:, stun: oder stuns: beginnen",
            ));
        }

        let (username, password) = match teile.next() {
            Some(zugang) => zugang.split_once(':').ok_or_else(|| {
                FunkstelleError::ice_deskriptor(
                    deskriptor,
                    "Zugangsdaten muessen die Form <username>:<password> haben",
                )
            })?,
            None => ("", ""),
        };

        if teile.next().is_some() {
            return Err(FunkstelleError::ice_deskriptor(
                deskriptor,
                "Zu viele Bestandteile",
            ));
        }

        Ok(Self::neu(uri, username, password))
    }

    /// Eine Konfiguration ohne URI wird nicht an Clients ausgeliefert
    pub fn ist_leer(&self) -> bool {
        self.uri.is_empty()
    }
}
