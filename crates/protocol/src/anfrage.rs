//! Eingehende Dokumente (Client -> Server)
//!
//! Ein Dokument wird genau einmal als `serde_json::Value` geparst. Danach
//! werden nur die Felder gelesen, die fuer die jeweilige Operation
//! gebraucht werden. Zusaetzliche Felder sind erlaubt und bleiben bei
//! `message` unangetastet, weil der Originaltext weitergeleitet wird.

use funkstelle_core::PeerId;
use serde_json::Value;

use crate::error::{ProtokollFehler, ProtokollResult};

/// Feldname, der die Operation auswaehlt
pub const FELD_SIGNAL: &str = "signal";

/// Markierung im `type`-Feld, die eine Paarung anlegt
pub const TYP_ANGEBOT: &str = "offer";

// ---------------------------------------------------------------------------
// Signal-Arten
// ---------------------------------------------------------------------------

/// Operationen, die ein Client anfordern kann
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalArt {
    SignIn,
    SignOut,
    Message,
    Exist,
}

impl SignalArt {
    /// Wert des `signal`-Felds auf dem Draht
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::SignIn => "sign_in",
            Self::SignOut => "sign_out",
            Self::Message => "message",
            Self::Exist => "exist",
        }
    }

    /// Gibt `None` fuer unbekannte Werte zurueck
    pub fn aus_str(wert: &str) -> Option<Self> {
        match wert {
            "sign_in" => Some(Self::SignIn),
            "sign_out" => Some(Self::SignOut),
            "message" => Some(Self::Message),
            "exist" => Some(Self::Exist),
            _ => None,
        }
    }
}

impl std::fmt::Display for SignalArt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

// ---------------------------------------------------------------------------
// Anfragen
// ---------------------------------------------------------------------------

/// `{signal:"sign_in", name, nolist?}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInAnfrage {
    pub name: String,
    /// `nolist` war vorhanden (Wert egal): keine Peer-Liste zurueckgeben
    pub ohne_liste: bool,
}

/// `{signal:"sign_out", id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOutAnfrage {
    pub id: Option<PeerId>,
}

/// `{signal:"message", to, from?, type?, ...}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NachrichtAnfrage {
    pub to: PeerId,
    pub from: Option<PeerId>,
    pub typ: Option<String>,
}

impl NachrichtAnfrage {
    /// Markiert die Nachricht den Beginn einer Sitzung?
    pub fn ist_angebot(&self) -> bool {
        self.typ.as_deref() == Some(TYP_ANGEBOT)
    }
}

/// `{signal:"exist", name}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistAnfrage {
    pub name: String,
}

/// Geparste Client-Anfrage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anfrage {
    SignIn(SignInAnfrage),
    SignOut(SignOutAnfrage),
    Nachricht(NachrichtAnfrage),
    Exist(ExistAnfrage),
}

impl Anfrage {
    /// Signal-Art der Anfrage (fuer Logging)
    pub fn signal(&self) -> SignalArt {
        match self {
            Self::SignIn(_) => SignalArt::SignIn,
            Self::SignOut(_) => SignalArt::SignOut,
            Self::Nachricht(_) => SignalArt::Message,
            Self::Exist(_) => SignalArt::Exist,
        }
    }
}

/// Parst einen Textframe in eine Anfrage
///
/// Fehler bedeuten immer "Dokument verwerfen". Der Aufrufer antwortet nicht.
pub fn anfrage_parsen(text: &str) -> ProtokollResult<Anfrage> {
    let dokument: Value = serde_json::from_str(text)?;

    let signal = dokument
        .get(FELD_SIGNAL)
        .and_then(Value::as_str)
        .ok_or(ProtokollFehler::SignalFehlt)?;

    let art = SignalArt::aus_str(signal)
        .ok_or_else(|| ProtokollFehler::UnbekanntesSignal(signal.to_string()))?;

    let anfrage = match art {
        SignalArt::SignIn => Anfrage::SignIn(SignInAnfrage {
            name: text_feld(&dokument, "name"),
            ohne_liste: dokument.get("nolist").is_some(),
        }),
        SignalArt::SignOut => Anfrage::SignOut(SignOutAnfrage {
            id: id_feld(&dokument, "id")?,
        }),
        SignalArt::Message => Anfrage::Nachricht(NachrichtAnfrage {
            to: id_feld(&dokument, "to")?.ok_or(ProtokollFehler::FeldFehlt("to"))?,
            // Ein kaputtes `from` verhindert nur die Paarung, nicht die Weiterleitung
            from: id_feld(&dokument, "from").ok().flatten(),
            typ: dokument
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        SignalArt::Exist => Anfrage::Exist(ExistAnfrage {
            name: text_feld(&dokument, "name"),
        }),
    };

    Ok(anfrage)
}

/// Liest ein Textfeld, Zahlen werden als Text uebernommen, sonst leer
fn text_feld(dokument: &Value, feld: &str) -> String {
    match dokument.get(feld) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Liest ein ID-Feld; fehlend oder `null` ergibt `None`
fn id_feld(dokument: &Value, feld: &'static str) -> ProtokollResult<Option<PeerId>> {
    match dokument.get(feld) {
        None | Some(Value::Null) => Ok(None),
        Some(wert) => wert
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .filter(|n| *n >= 0)
            .map(|n| Some(PeerId(n)))
            .ok_or_else(|| ProtokollFehler::UngueltigeId {
                feld,
                wert: wert.to_string(),
            }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_mit_und_ohne_liste() {
        let a = anfrage_parsen(r#"{"signal":"sign_in","name":"alice"}"#).unwrap();
        assert_eq!(
            a,
            Anfrage::SignIn(SignInAnfrage {
                name: "alice".into(),
                ohne_liste: false
            })
        );

        // Der Wert von nolist spielt keine Rolle, auch false und null zaehlen
        for wert in ["true", "false", "null", "0"] {
            let text = format!(r#"{{"signal":"sign_in","name":"bob","nolist":{wert}}}"#);
            match anfrage_parsen(&text).unwrap() {
                Anfrage::SignIn(s) => assert!(s.ohne_liste, "nolist={wert}"),
                andere => panic!("Erwartet SignIn, erhalten {andere:?}"),
            }
        }
    }

    #[test]
    fn sign_in_ohne_name_ergibt_leeren_namen() {
        match anfrage_parsen(r#"{"signal":"sign_in"}"#).unwrap() {
            Anfrage::SignIn(s) => assert_eq!(s.name, ""),
            andere => panic!("Erwartet SignIn, erhalten {andere:?}"),
        }
    }

    #[test]
    fn nachricht_mit_routing_feldern() {
        let a = anfrage_parsen(
            r#"{"signal":"message","to":0,"from":1,"type":"offer","sdp":"v=0"}"#,
        )
        .unwrap();
        match a {
            Anfrage::Nachricht(n) => {
                assert_eq!(n.to, PeerId(0));
                assert_eq!(n.from, Some(PeerId(1)));
                assert!(n.ist_angebot());
            }
            andere => panic!("Erwartet Nachricht, erhalten {andere:?}"),
        }
    }

    #[test]
    fn nachricht_ohne_ziel_wird_verworfen() {
        let e = anfrage_parsen(r#"{"signal":"message","from":1}"#).unwrap_err();
        assert!(matches!(e, ProtokollFehler::FeldFehlt("to")));
    }

    #[test]
    fn kaputtes_from_verhindert_weiterleitung_nicht() {
        match anfrage_parsen(r#"{"signal":"message","to":3,"from":"x","type":"answer"}"#)
            .unwrap()
        {
            Anfrage::Nachricht(n) => {
                assert_eq!(n.from, None);
                assert!(!n.ist_angebot());
            }
            andere => panic!("Erwartet Nachricht, erhalten {andere:?}"),
        }
    }

    #[test]
    fn ungueltige_ids() {
        for to in ["-1", "1.5", "\"7\"", "4294967296"] {
            let text = format!(r#"{{"signal":"message","to":{to}}}"#);
            assert!(
                matches!(
                    anfrage_parsen(&text),
                    Err(ProtokollFehler::UngueltigeId { feld: "to", .. })
                ),
                "to={to}"
            );
        }
    }

    #[test]
    fn sign_out_und_exist() {
        assert_eq!(
            anfrage_parsen(r#"{"signal":"sign_out","id":5}"#).unwrap(),
            Anfrage::SignOut(SignOutAnfrage { id: Some(PeerId(5)) })
        );
        assert_eq!(
            anfrage_parsen(r#"{"signal":"sign_out"}"#).unwrap(),
            Anfrage::SignOut(SignOutAnfrage { id: None })
        );
        assert_eq!(
            anfrage_parsen(r#"{"signal":"exist","name":"carol"}"#).unwrap(),
            Anfrage::Exist(ExistAnfrage {
                name: "carol".into()
            })
        );
    }

    #[test]
    fn unbrauchbare_dokumente() {
        assert!(matches!(
            anfrage_parsen("kein json"),
            Err(ProtokollFehler::Json(_))
        ));
        assert!(matches!(
            anfrage_parsen(r#"{"name":"x"}"#),
            Err(ProtokollFehler::SignalFehlt)
        ));
        assert!(matches!(
            anfrage_parsen(r#"[1,2,3]"#),
            Err(ProtokollFehler::SignalFehlt)
        ));
        assert!(matches!(
            anfrage_parsen(r#"{"signal":7}"#),
            Err(ProtokollFehler::SignalFehlt)
        ));
        assert!(matches!(
            anfrage_parsen(r#"{"signal":"dance"}"#),
            Err(ProtokollFehler::UnbekanntesSignal(s)) if s == "dance"
        ));
    }

    #[test]
    fn signal_art_hin_und_zurueck() {
        for art in [
            SignalArt::SignIn,
            SignalArt::SignOut,
            SignalArt::Message,
            SignalArt::Exist,
        ] {
            assert_eq!(SignalArt::aus_str(art.als_str()), Some(art));
        }
    }
}
