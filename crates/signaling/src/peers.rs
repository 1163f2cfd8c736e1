//! Peer-Registry – angemeldete Peers und ID-Vergabe
//!
//! Peers sind nach ID sortiert abgelegt, so dass Listen und Namenssuche
//! ohne zusaetzliches Sortieren deterministisch sind. Ein zweiter Index
//! ordnet jeder Verbindung hoechstens einen Peer zu.

use funkstelle_core::{PeerId, VerbindungsId};
use funkstelle_protocol::PeerEintrag;
use std::collections::{BTreeMap, HashMap};

/// Angemeldeter Peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: PeerId,
    pub name: String,
    pub verbindung: VerbindungsId,
}

/// Alle angemeldeten Peers
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: BTreeMap<PeerId, Peer>,
    nach_verbindung: HashMap<VerbindungsId, PeerId>,
    /// Zuletzt vergebene ID; `None` vor der ersten Vergabe
    letzte_id: Option<PeerId>,
}

impl PeerRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Vergibt die naechste freie ID
    ///
    /// Beginnt bei `letzte_id + 1` (nach `i32::MAX` wieder bei 0) und sucht
    /// linear weiter, bis eine ID frei ist.
    pub fn naechste_id(&mut self) -> PeerId {
        let mut kandidat = self.letzte_id.map_or(PeerId(0), PeerId::naechste);
        // Hoechstens i32::MAX + 1 Peers koennen existieren, die Schleife endet also
        while self.peers.contains_key(&kandidat) {
            kandidat = kandidat.naechste();
        }
        self.letzte_id = Some(kandidat);
        kandidat
    }

    /// Meldet einen Peer an
    ///
    /// Gibt den neuen Peer und `repeat` zurueck: `true` wenn bereits ein
    /// anderer Peer mit gleichem Namen angemeldet war. Die Verbindung darf
    /// noch keinen Peer haben.
    pub fn anmelden(&mut self, name: &str, verbindung: VerbindungsId) -> (Peer, bool) {
        let repeat = self.peers.values().any(|p| p.name == name);
        let id = self.naechste_id();
        let peer = Peer {
            id,
            name: name.to_string(),
            verbindung,
        };
        self.nach_verbindung.insert(verbindung, id);
        self.peers.insert(id, peer.clone());
        (peer, repeat)
    }

    /// Entfernt den Peer einer Verbindung
    pub fn abmelden_verbindung(&mut self, verbindung: VerbindungsId) -> Option<Peer> {
        let id = self.nach_verbindung.remove(&verbindung)?;
        self.peers.remove(&id)
    }

    pub fn peer_von(&self, verbindung: VerbindungsId) -> Option<&Peer> {
        self.nach_verbindung
            .get(&verbindung)
            .and_then(|id| self.peers.get(id))
    }

    pub fn verbindung_von(&self, id: PeerId) -> Option<VerbindungsId> {
        self.peers.get(&id).map(|p| p.verbindung)
    }

    /// Niedrigste ID mit diesem Namen
    pub fn finden_nach_name(&self, name: &str) -> Option<PeerId> {
        self.peers.values().find(|p| p.name == name).map(|p| p.id)
    }

    /// Schnappschuss aller Peers, sortiert nach ID
    pub fn liste(&self) -> Vec<PeerEintrag> {
        self.peers
            .values()
            .map(|p| PeerEintrag {
                id: p.id,
                name: p.name.clone(),
            })
            .collect()
    }

    /// Alle Peers, sortiert nach ID
    pub fn alle(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn anzahl(&self) -> usize {
        self.peers.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.peers.is_empty()
    }
}
