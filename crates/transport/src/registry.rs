//! Verbindungs-Registry – Menge der lebenden Transport-Verbindungen
//!
//! Die Registry haelt pro Verbindung nur die Ausgangs-Queue des Sockets,
//! getrennt nach Listener-Art. Den Socket selbst besitzt der
//! Verbindungs-Task.
//!
//! Alle Operationen laufen unter einem einzigen Lock. Senden heisst hier
//! nur "in die Ausgangs-Queue einreihen" und blockiert nie, daher darf der
//! Lock auch fuer Broadcast ueber alle Verbindungen gehalten werden.
//!
//! Die Ausgangs-Queue ist begrenzt. Ist sie voll, schlaegt das Senden fehl,
//! statt Speicher fuer einen Client anzuhaeufen, der nicht mehr liest.

use funkstelle_core::{ListenerArt, VerbindungsId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Maximale Anzahl wartender Auftraege pro Verbindung
pub const AUSGANGS_KAPAZITAET: usize = 256;

// ---------------------------------------------------------------------------
// Ausgehende Frames
// ---------------------------------------------------------------------------

/// Auftrag an einen Verbindungs-Task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ausgehend {
    /// Textframe
    Text(String),
    /// Binaerframe
    Binaer(Vec<u8>),
    /// Keepalive-Ping, startet die Pong-Frist
    Ping,
}

// ---------------------------------------------------------------------------
// VerbindungsHandle
// ---------------------------------------------------------------------------

/// Handle auf die Ausgangs-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct VerbindungsHandle {
    pub id: VerbindungsId,
    pub adresse: SocketAddr,
    tx: mpsc::Sender<Ausgehend>,
}

impl VerbindungsHandle {
    /// Erstellt Handle und zugehoerige Empfangsseite fuer den Verbindungs-Task
    pub fn neu(
        id: VerbindungsId,
        adresse: SocketAddr,
    ) -> (Self, mpsc::Receiver<Ausgehend>) {
        let (tx, rx) = mpsc::channel(AUSGANGS_KAPAZITAET);
        (Self { id, adresse, tx }, rx)
    }

    /// Reiht einen Auftrag ein
    ///
    /// `false` wenn der Task schon beendet oder die Queue voll ist.
    pub fn senden(&self, auftrag: Ausgehend) -> bool {
        match self.tx.try_send(auftrag) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!(verbindung = %self.id, "Ausgangs-Queue voll, Auftrag verworfen");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Lebt der Verbindungs-Task noch?
    pub fn ist_offen(&self) -> bool {
        !self.tx.is_closed()
    }
}

// ---------------------------------------------------------------------------
// VerbindungsRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RegistryInner {
    klartext: HashMap<VerbindungsId, VerbindungsHandle>,
    tls: HashMap<VerbindungsId, VerbindungsHandle>,
}

impl RegistryInner {
    fn finden(&self, id: &VerbindungsId) -> Option<&VerbindungsHandle> {
        self.klartext.get(id).or_else(|| self.tls.get(id))
    }

    fn alle(&self) -> impl Iterator<Item = &VerbindungsHandle> {
        self.klartext.values().chain(self.tls.values())
    }
}

/// Lebende Verbindungen beider Listener
#[derive(Default)]
pub struct VerbindungsRegistry {
    inner: Mutex<RegistryInner>,
}

impl VerbindungsRegistry {
    /// Erstellt eine leere Registry
    pub fn neu() -> Self {
        Self::default()
    }

    /// Nimmt eine Verbindung auf
    pub fn hinzufuegen(&self, art: ListenerArt, handle: VerbindungsHandle) {
        let mut inner = self.inner.lock();
        let id = handle.id;
        match art {
            ListenerArt::Klartext => inner.klartext.insert(id, handle),
            ListenerArt::Tls => inner.tls.insert(id, handle),
        };
        tracing::debug!(verbindung = %id, art = %art, "Verbindung registriert");
    }

    /// Entfernt eine Verbindung und gibt zurueck, zu welchem Listener sie gehoerte
    pub fn entfernen(&self, id: VerbindungsId) -> Option<ListenerArt> {
        let mut inner = self.inner.lock();
        if inner.klartext.remove(&id).is_some() {
            Some(ListenerArt::Klartext)
        } else if inner.tls.remove(&id).is_some() {
            Some(ListenerArt::Tls)
        } else {
            None
        }
    }

    /// Sendet an eine Verbindung, egal an welchem Listener sie haengt
    ///
    /// `false` wenn die Verbindung unbekannt oder ihr Task beendet ist.
    pub fn senden(&self, id: VerbindungsId, auftrag: Ausgehend) -> bool {
        let inner = self.inner.lock();
        match inner.finden(&id) {
            Some(handle) => handle.senden(auftrag),
            None => false,
        }
    }

    /// Sendet an alle Verbindungen beider Listener
    ///
    /// Gibt die Anzahl erfolgreich eingereihter Auftraege zurueck. Ein
    /// Fehlschlag bei einer Verbindung betrifft die anderen nicht.
    pub fn broadcast(&self, auftrag: &Ausgehend) -> usize {
        let inner = self.inner.lock();
        inner
            .alle()
            .filter(|handle| handle.senden(auftrag.clone()))
            .count()
    }

    /// Schickt allen Verbindungen einen Keepalive-Ping
    pub fn ping_an_alle(&self) -> usize {
        self.broadcast(&Ausgehend::Ping)
    }

    /// Ist die Verbindung registriert und ihr Task noch aktiv?
    pub fn ist_verbunden(&self, id: VerbindungsId) -> bool {
        self.inner
            .lock()
            .finden(&id)
            .is_some_and(VerbindungsHandle::ist_offen)
    }

    /// Anzahl registrierter Verbindungen ueber beide Listener
    pub fn anzahl(&self) -> usize {
        let inner = self.inner.lock();
        inner.klartext.len() + inner.tls.len()
    }

    /// Anzahl registrierter Verbindungen eines Listeners
    pub fn anzahl_nach_art(&self, art: ListenerArt) -> usize {
        let inner = self.inner.lock();
        match art {
            ListenerArt::Klartext => inner.klartext.len(),
            ListenerArt::Tls => inner.tls.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn adresse() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn senden_an_richtigen_listener() {
        let registry = VerbindungsRegistry::neu();
        let (h1, mut rx1) = VerbindungsHandle::neu(VerbindungsId::neu(), adresse());
        let (h2, mut rx2) = VerbindungsHandle::neu(VerbindungsId::neu(), adresse());
        let (id1, id2) = (h1.id, h2.id);

        registry.hinzufuegen(ListenerArt::Klartext, h1);
        registry.hinzufuegen(ListenerArt::Tls, h2);

        assert!(registry.senden(id1, Ausgehend::Text("a".into())));
        assert!(registry.senden(id2, Ausgehend::Text("b".into())));
        assert_eq!(rx1.try_recv().unwrap(), Ausgehend::Text("a".into()));
        assert_eq!(rx2.try_recv().unwrap(), Ausgehend::Text("b".into()));

        assert_eq!(registry.anzahl_nach_art(ListenerArt::Tls), 1);
        assert_eq!(registry.entfernen(id1), Some(ListenerArt::Klartext));
        assert_eq!(registry.entfernen(id2), Some(ListenerArt::Tls));
    }

    #[test]
    fn senden_an_unbekannte_verbindung_schlaegt_fehl() {
        let registry = VerbindungsRegistry::neu();
        assert!(!registry.senden(VerbindungsId::neu(), Ausgehend::Ping));
    }

    #[test]
    fn senden_an_beendeten_task_schlaegt_fehl() {
        let registry = VerbindungsRegistry::neu();
        let (h, rx) = VerbindungsHandle::neu(VerbindungsId::neu(), adresse());
        let id = h.id;
        registry.hinzufuegen(ListenerArt::Klartext, h);
        drop(rx);

        assert!(!registry.ist_verbunden(id));
        assert!(!registry.senden(id, Ausgehend::Text("x".into())));
    }

    #[test]
    fn broadcast_ueberspringt_tote_verbindungen() {
        let registry = VerbindungsRegistry::neu();
        let mut empfaenger = Vec::new();
        for i in 0..4 {
            let (h, rx) = VerbindungsHandle::neu(VerbindungsId::neu(), adresse());
            let art = if i % 2 == 0 {
                ListenerArt::Klartext
            } else {
                ListenerArt::Tls
            };
            registry.hinzufuegen(art, h);
            empfaenger.push(rx);
        }
        // Eine Verbindung stirbt
        drop(empfaenger.remove(0));

        let gesendet = registry.broadcast(&Ausgehend::Binaer(vec![1, 2, 3]));
        assert_eq!(gesendet, 3);
        for rx in &mut empfaenger {
            assert_eq!(rx.try_recv().unwrap(), Ausgehend::Binaer(vec![1, 2, 3]));
        }
    }

    #[test]
    fn volle_ausgangs_queue_verweigert_weitere_auftraege() {
        let registry = VerbindungsRegistry::neu();
        let (h, mut rx) = VerbindungsHandle::neu(VerbindungsId::neu(), adresse());
        let id = h.id;
        registry.hinzufuegen(ListenerArt::Klartext, h);

        for i in 0..AUSGANGS_KAPAZITAET {
            assert!(registry.senden(id, Ausgehend::Text(i.to_string())), "Auftrag {i}");
        }
        assert!(!registry.senden(id, Ausgehend::Text("zu viel".into())));
        assert_eq!(registry.ping_an_alle(), 0);
        // Die Verbindung gilt weiter als offen, nur die Queue ist voll
        assert!(registry.ist_verbunden(id));

        assert_eq!(rx.try_recv().unwrap(), Ausgehend::Text("0".into()));
        assert!(registry.senden(id, Ausgehend::Ping));
    }

    #[test]
    fn entfernen_meldet_listener_art() {
        let registry = VerbindungsRegistry::neu();
        let (h, _rx) = VerbindungsHandle::neu(VerbindungsId::neu(), adresse());
        let id = h.id;
        registry.hinzufuegen(ListenerArt::Tls, h);

        assert_eq!(registry.entfernen(id), Some(ListenerArt::Tls));
        assert_eq!(registry.entfernen(id), None);
        assert_eq!(registry.anzahl(), 0);
    }
}
