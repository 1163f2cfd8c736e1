//! Worker-Thread – einziger Konsument der Action-Queue
//!
//! Pflegt die Verbindungs-Registry und ruft den [`VerbindungsHandler`] auf.
//! Weil es genau einen Worker gibt, laufen alle Handler-Aufrufe
//! nacheinander und in Ankunftsreihenfolge.

use funkstelle_core::ListenerArt;
use std::sync::Arc;

use crate::action::{Action, ActionQueue, Nutzlast};
use crate::handler::VerbindungsHandler;
use crate::registry::VerbindungsRegistry;

/// Zaehler eines Worker-Laufs
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStatistik {
    pub geoeffnet: u64,
    pub geschlossen: u64,
    pub nachrichten: u64,
    pub binaer_ignoriert: u64,
}

/// Verarbeitet Actions bis `Exit`
pub fn worker_schleife(
    queue: Arc<ActionQueue>,
    registry: Arc<VerbindungsRegistry>,
    handler: Arc<dyn VerbindungsHandler>,
) -> WorkerStatistik {
    tracing::debug!("Worker gestartet");
    let mut statistik = WorkerStatistik::default();

    loop {
        let action = queue.entnehmen();
        tracing::trace!(action = action.art(), "Action entnommen");

        match action {
            Action::Subscribe(handle) => {
                registry.hinzufuegen(ListenerArt::Klartext, handle);
                statistik.geoeffnet += 1;
            }
            Action::TlsSubscribe(handle) => {
                registry.hinzufuegen(ListenerArt::Tls, handle);
                statistik.geoeffnet += 1;
            }
            Action::Unsubscribe(id) => match registry.entfernen(id) {
                Some(art) => {
                    statistik.geschlossen += 1;
                    tracing::debug!(
                        verbindung = %id,
                        art = %art,
                        verbleibend = registry.anzahl_nach_art(art),
                        "Verbindung abgemeldet"
                    );
                    handler.bei_schliessen(id);
                }
                None => tracing::debug!(verbindung = %id, "Unsubscribe fuer unbekannte Verbindung"),
            },
            Action::Message(id, Nutzlast::Text(text)) => {
                statistik.nachrichten += 1;
                handler.bei_nachricht(id, &text);
            }
            Action::Message(id, Nutzlast::Binaer(daten)) => {
                statistik.binaer_ignoriert += 1;
                tracing::debug!(verbindung = %id, bytes = daten.len(), "Binaerframe ignoriert");
            }
            Action::Exit => break,
        }
    }

    if !queue.ist_leer() {
        tracing::debug!(verworfen = queue.laenge(), "Actions nach Exit verworfen");
    }
    tracing::debug!(?statistik, "Worker beendet");
    statistik
}
