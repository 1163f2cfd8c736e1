//! Versender – einziger Sendepfad zu den Verbindungen
//!
//! Schlaegt Verbindungen in der Registry nach und reiht Frames in deren
//! Ausgangs-Queue ein. Fehlschlaege werden mit `warn` protokolliert und
//! als `false` zurueckgegeben.

use funkstelle_core::VerbindungsId;
use std::sync::Arc;

use crate::handler::Ausgang;
use crate::registry::{Ausgehend, VerbindungsRegistry};

/// Sendet ueber die gemeinsame Registry
#[derive(Clone)]
pub struct Versender {
    registry: Arc<VerbindungsRegistry>,
}

impl Versender {
    pub fn neu(registry: Arc<VerbindungsRegistry>) -> Self {
        Self { registry }
    }

    /// Sendet einen Textframe
    pub fn senden_text(&self, verbindung: VerbindungsId, text: impl Into<String>) -> bool {
        let text = text.into();
        let laenge = text.len();
        let ok = self.registry.senden(verbindung, Ausgehend::Text(text));
        if ok {
            tracing::trace!(verbindung = %verbindung, bytes = laenge, "Text eingereiht");
        } else {
            tracing::warn!(verbindung = %verbindung, "Senden fehlgeschlagen: Verbindung nicht verfuegbar");
        }
        ok
    }

    /// Sendet einen Binaerframe
    pub fn senden_binaer(&self, verbindung: VerbindungsId, daten: impl Into<Vec<u8>>) -> bool {
        let ok = self.registry.senden(verbindung, Ausgehend::Binaer(daten.into()));
        if !ok {
            tracing::warn!(verbindung = %verbindung, "Binaer-Senden fehlgeschlagen: Verbindung nicht verfuegbar");
        }
        ok
    }

    /// Sendet einen Textframe an alle Verbindungen beider Listener
    pub fn broadcast_text(&self, text: impl Into<String>) -> usize {
        self.verteilen(Ausgehend::Text(text.into()))
    }

    /// Sendet einen Binaerframe an alle Verbindungen beider Listener
    pub fn broadcast_binaer(&self, daten: impl Into<Vec<u8>>) -> usize {
        self.verteilen(Ausgehend::Binaer(daten.into()))
    }

    fn verteilen(&self, auftrag: Ausgehend) -> usize {
        let gesamt = self.registry.anzahl();
        let gesendet = self.registry.broadcast(&auftrag);
        if gesendet < gesamt {
            tracing::warn!(
                gesendet,
                fehlgeschlagen = gesamt - gesendet,
                "Broadcast teilweise fehlgeschlagen"
            );
        } else {
            tracing::trace!(gesendet, "Broadcast eingereiht");
        }
        gesendet
    }

    /// Die zugrundeliegende Registry
    pub fn registry(&self) -> &Arc<VerbindungsRegistry> {
        &self.registry
    }
}

impl Ausgang for Versender {
    fn senden(&self, verbindung: VerbindungsId, text: &str) -> bool {
        self.senden_text(verbindung, text)
    }

    fn broadcast(&self, text: &str) -> usize {
        self.broadcast_text(text)
    }

    fn ist_verbunden(&self, verbindung: VerbindungsId) -> bool {
        self.registry.ist_verbunden(verbindung)
    }

    fn verbindungs_anzahl(&self) -> usize {
        self.registry.anzahl()
    }
}
