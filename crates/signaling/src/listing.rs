//! Diagnoseliste der angemeldeten Peers
//!
//! Wird nach jeder Aenderung der Peer-Registry mit `debug` protokolliert.
//! `+` markiert Peers, deren Verbindung noch in der Verbindungs-Registry
//! steht, `-` solche, deren Verbindung schon fehlt. Beide Registries haben
//! eigene Locks und duerfen kurzzeitig voneinander abweichen.

use funkstelle_core::{PeerId, VerbindungsId};
use funkstelle_transport::Ausgang;
use std::fmt::Write;

/// Zeile der Diagnoseliste
#[derive(Debug, Clone)]
pub struct ListenEintrag {
    pub id: PeerId,
    pub name: String,
    pub verbindung: VerbindungsId,
}

/// Rendert die Liste; `eintraege` muessen nach ID sortiert sein
pub fn liste_rendern(eintraege: &[ListenEintrag], ausgang: &dyn Ausgang) -> String {
    let verbindungen = ausgang.verbindungs_anzahl();
    let mut text = format!(
        "{} Peers, {} Verbindungen{}",
        eintraege.len(),
        verbindungen,
        if eintraege.len() == verbindungen {
            ""
        } else {
            " (abweichend)"
        }
    );
    for eintrag in eintraege {
        let marke = if ausgang.ist_verbunden(eintrag.verbindung) {
            '+'
        } else {
            '-'
        };
        let _ = write!(
            text,
            "\n  {marke} {:>4} {} [{}]",
            eintrag.id, eintrag.name, eintrag.verbindung
        );
    }
    text
}

/// Protokolliert die Liste, falls `debug` aktiv ist
pub fn liste_protokollieren(eintraege: &[ListenEintrag], ausgang: &dyn Ausgang) {
    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!("Peer-Liste:\n{}", liste_rendern(eintraege, ausgang));
    }
}
