//! Action-Queue – FIFO zwischen Netzwerk-Tasks und Worker
//!
//! Produzenten (Verbindungs-Tasks, Exit-Watcher) reihen ein und wecken den
//! Konsumenten. Genau ein Worker-Thread entnimmt, blockierend auf einer
//! Condvar. Einreihen blockiert nie laenger als fuer den Queue-Lock.

use funkstelle_core::VerbindungsId;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

use crate::registry::VerbindungsHandle;

/// Nutzdaten eines empfangenen Frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nutzlast {
    Text(String),
    Binaer(Vec<u8>),
}

impl Nutzlast {
    /// Laenge in Bytes (fuer Logging)
    pub fn laenge(&self) -> usize {
        match self {
            Self::Text(t) => t.len(),
            Self::Binaer(b) => b.len(),
        }
    }
}

/// Arbeitseinheit fuer den Worker
#[derive(Debug)]
pub enum Action {
    /// Neue Verbindung am Klartext-Listener
    Subscribe(VerbindungsHandle),
    /// Neue Verbindung am TLS-Listener
    TlsSubscribe(VerbindungsHandle),
    /// Verbindung geschlossen (Client, Fehler oder Pong-Timeout)
    Unsubscribe(VerbindungsId),
    /// Frame empfangen
    Message(VerbindungsId, Nutzlast),
    /// Worker beenden
    Exit,
}

impl Action {
    /// Kurzname fuer Logging
    pub fn art(&self) -> &'static str {
        match self {
            Self::Subscribe(_) => "subscribe",
            Self::TlsSubscribe(_) => "tls_subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
            Self::Message(..) => "message",
            Self::Exit => "exit",
        }
    }
}

/// Thread-sichere FIFO mit blockierendem Entnehmen
#[derive(Default)]
pub struct ActionQueue {
    eintraege: Mutex<VecDeque<Action>>,
    bereit: Condvar,
}

impl ActionQueue {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Reiht eine Action ein und weckt den Konsumenten
    pub fn einreihen(&self, action: Action) {
        let mut eintraege = self.eintraege.lock();
        eintraege.push_back(action);
        drop(eintraege);
        self.bereit.notify_one();
    }

    /// Entnimmt die aelteste Action, wartet solange die Queue leer ist
    pub fn entnehmen(&self) -> Action {
        let mut eintraege = self.eintraege.lock();
        loop {
            if let Some(action) = eintraege.pop_front() {
                return action;
            }
            self.bereit.wait(&mut eintraege);
        }
    }

    /// Anzahl wartender Actions
    pub fn laenge(&self) -> usize {
        self.eintraege.lock().len()
    }

    pub fn ist_leer(&self) -> bool {
        self.eintraege.lock().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_reihenfolge() {
        let queue = ActionQueue::neu();
        let id = VerbindungsId::neu();
        queue.einreihen(Action::Message(id, Nutzlast::Text("1".into())));
        queue.einreihen(Action::Message(id, Nutzlast::Text("2".into())));
        queue.einreihen(Action::Exit);
        assert_eq!(queue.laenge(), 3);

        for erwartet in ["1", "2"] {
            match queue.entnehmen() {
                Action::Message(_, Nutzlast::Text(t)) => assert_eq!(t, erwartet),
                andere => panic!("Unerwartete Action: {andere:?}"),
            }
        }
        assert!(matches!(queue.entnehmen(), Action::Exit));
        assert!(queue.ist_leer());
    }

    #[test]
    fn entnehmen_wartet_auf_produzent() {
        let queue = Arc::new(ActionQueue::neu());
        let konsument = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.entnehmen())
        };

        thread::sleep(Duration::from_millis(50));
        queue.einreihen(Action::Exit);

        let action = konsument.join().unwrap();
        assert!(matches!(action, Action::Exit));
    }

    #[test]
    fn viele_produzenten_ein_konsument() {
        let queue = Arc::new(ActionQueue::neu());
        let produzenten: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let id = VerbindungsId::neu();
                    for i in 0..100 {
                        queue.einreihen(Action::Message(id, Nutzlast::Text(i.to_string())));
                    }
                })
            })
            .collect();
        for p in produzenten {
            p.join().unwrap();
        }

        // Reihenfolge pro Produzent bleibt erhalten
        let mut letzte: std::collections::HashMap<VerbindungsId, i32> = Default::default();
        for _ in 0..400 {
            match queue.entnehmen() {
                Action::Message(id, Nutzlast::Text(t)) => {
                    let n: i32 = t.parse().unwrap();
                    let vorher = letzte.insert(id, n).unwrap_or(-1);
                    assert_eq!(n, vorher + 1);
                }
                andere => panic!("Unerwartete Action: {andere:?}"),
            }
        }
        assert!(queue.ist_leer());
    }
}
