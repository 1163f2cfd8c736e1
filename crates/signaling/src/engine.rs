//! SignalingEngine – Protokoll-Zustandsmaschine
//!
//! Verarbeitet die vier Operationen `sign_in`, `sign_out`, `message` und
//! `exist` sowie das Schliessen von Verbindungen. Die Engine wird nur vom
//! Worker-Thread des Transports aufgerufen.
//!
//! ## Locking
//! Peer-Registry und Paarungstabelle liegen hinter einem gemeinsamen Lock,
//! der pro Operation genau einmal genommen wird. Ausgehende Nachrichten
//! werden unter dem Lock nur gesammelt und erst danach gesendet, damit nie
//! Engine-Lock und Registry-Lock des Transports gleichzeitig gehalten werden.

use funkstelle_core::{IceKonfig, PeerId, VerbindungsId};
use funkstelle_protocol::{
    anfrage_parsen, Anfrage, ExistAnfrage, ExistAntwort, NachrichtAnfrage, ProtokollResult,
    SignInAnfrage, SignInAntwort, SignOutAnfrage, SignOutAntwort, SignOutMeldung,
};
use funkstelle_transport::{Ausgang, VerbindungsHandler};
use parking_lot::Mutex;

use crate::listing::{liste_protokollieren, ListenEintrag};
use crate::pairing::PaarTabelle;
use crate::peers::PeerRegistry;

// ---------------------------------------------------------------------------
// Zustand
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct EngineZustand {
    peers: PeerRegistry,
    paare: PaarTabelle,
}

impl EngineZustand {
    /// Loest die Paarungen von `id` auf und adressiert die Gegenseiten
    fn abmeldung_melden(&mut self, id: PeerId, post: &mut Postausgang) {
        for gegenseite in self.paare.aufloesen(id) {
            match self.peers.verbindung_von(gegenseite) {
                Some(verbindung) => post.meldung(verbindung, SignOutMeldung::neu(id).zu_text()),
                None => tracing::debug!(peer_id = %gegenseite, "Gegenseite nicht mehr angemeldet"),
            }
        }
    }

    fn listen_eintraege(&self) -> Vec<ListenEintrag> {
        self.peers
            .alle()
            .map(|p| ListenEintrag {
                id: p.id,
                name: p.name.clone(),
                verbindung: p.verbindung,
            })
            .collect()
    }
}

/// Unter dem Lock gesammelte, danach zu sendende Nachrichten
#[derive(Default)]
struct Postausgang {
    antworten: Vec<(VerbindungsId, String)>,
    /// Meldungen an Gegenseiten, nur an noch lebende Verbindungen
    meldungen: Vec<(VerbindungsId, String)>,
    liste: Option<Vec<ListenEintrag>>,
}

impl Postausgang {
    fn antwort(&mut self, verbindung: VerbindungsId, text: ProtokollResult<String>) {
        match text {
            Ok(text) => self.antworten.push((verbindung, text)),
            Err(e) => tracing::warn!(verbindung = %verbindung, fehler = %e, "Antwort nicht serialisierbar"),
        }
    }

    fn meldung(&mut self, verbindung: VerbindungsId, text: ProtokollResult<String>) {
        match text {
            Ok(text) => self.meldungen.push((verbindung, text)),
            Err(e) => tracing::warn!(verbindung = %verbindung, fehler = %e, "Meldung nicht serialisierbar"),
        }
    }
}

// ---------------------------------------------------------------------------
// SignalingEngine
// ---------------------------------------------------------------------------

/// Signaling-Protokoll ueber einem [`Ausgang`]
pub struct SignalingEngine<A: Ausgang> {
    ausgang: A,
    ice: IceKonfig,
    zustand: Mutex<EngineZustand>,
}

impl<A: Ausgang> SignalingEngine<A> {
    /// Erstellt die Engine; die ICE-Konfiguration ist danach unveraenderlich
    pub fn neu(ausgang: A, ice: IceKonfig) -> Self {
        Self {
            ausgang,
            ice,
            zustand: Mutex::new(EngineZustand::default()),
        }
    }

    pub fn ausgang(&self) -> &A {
        &self.ausgang
    }

    pub fn ice(&self) -> &IceKonfig {
        &self.ice
    }

    /// Verarbeitet einen empfangenen Textframe
    ///
    /// Unbrauchbare Dokumente werden ohne Antwort verworfen.
    pub fn nachricht_verarbeiten(&self, verbindung: VerbindungsId, text: &str) {
        let anfrage = match anfrage_parsen(text) {
            Ok(anfrage) => anfrage,
            Err(e) => {
                tracing::debug!(verbindung = %verbindung, fehler = %e, "Dokument verworfen");
                return;
            }
        };
        tracing::trace!(verbindung = %verbindung, signal = %anfrage.signal(), "Anfrage");

        let post = match anfrage {
            Anfrage::SignIn(a) => self.sign_in(verbindung, a),
            Anfrage::SignOut(a) => self.sign_out(verbindung, a),
            Anfrage::Nachricht(a) => self.nachricht(verbindung, a, text),
            Anfrage::Exist(a) => self.exist(verbindung, a),
        };
        self.zustellen(post);
    }

    /// Raeumt nach dem Schliessen einer Verbindung auf
    pub fn verbindung_geschlossen(&self, verbindung: VerbindungsId) {
        let mut post = Postausgang::default();
        {
            let mut zustand = self.zustand.lock();
            let Some(peer) = zustand.peers.abmelden_verbindung(verbindung) else {
                tracing::debug!(verbindung = %verbindung, "Verbindung ohne Peer geschlossen");
                return;
            };
            tracing::info!(peer_id = %peer.id, name = %peer.name, "Peer getrennt");
            zustand.abmeldung_melden(peer.id, &mut post);
            post.liste = Some(zustand.listen_eintraege());
        }
        self.zustellen(post);
    }

    // -----------------------------------------------------------------------
    // Operationen
    // -----------------------------------------------------------------------

    fn sign_in(&self, verbindung: VerbindungsId, anfrage: SignInAnfrage) -> Postausgang {
        let mut post = Postausgang::default();
        let mut zustand = self.zustand.lock();

        // Zweites sign_in auf derselben Verbindung ersetzt den alten Peer
        if let Some(alt) = zustand.peers.abmelden_verbindung(verbindung) {
            tracing::info!(
                verbindung = %verbindung,
                peer_id = %alt.id,
                "Erneutes sign_in ersetzt bisherigen Peer"
            );
            zustand.abmeldung_melden(alt.id, &mut post);
        }

        let (peer, repeat) = zustand.peers.anmelden(&anfrage.name, verbindung);
        let peers = (!anfrage.ohne_liste).then(|| zustand.peers.liste());
        tracing::info!(peer_id = %peer.id, name = %peer.name, repeat, "Peer angemeldet");

        post.antwort(
            verbindung,
            SignInAntwort::neu(peer.id, peer.name, repeat, &self.ice, peers).zu_text(),
        );
        post.liste = Some(zustand.listen_eintraege());
        post
    }

    fn sign_out(&self, verbindung: VerbindungsId, anfrage: SignOutAnfrage) -> Postausgang {
        let mut post = Postausgang::default();
        let mut zustand = self.zustand.lock();

        let eigener = zustand.peers.abmelden_verbindung(verbindung);
        if let Some(peer) = &eigener {
            tracing::info!(peer_id = %peer.id, name = %peer.name, "Peer abgemeldet");
            post.liste = Some(zustand.listen_eintraege());
        }

        post.antwort(verbindung, SignOutAntwort::neu().zu_text());

        match anfrage.id.or(eigener.map(|p| p.id)) {
            Some(id) => zustand.abmeldung_melden(id, &mut post),
            None => tracing::debug!(verbindung = %verbindung, "sign_out ohne Peer und ohne id"),
        }
        post
    }

    fn nachricht(
        &self,
        verbindung: VerbindungsId,
        anfrage: NachrichtAnfrage,
        original: &str,
    ) -> Postausgang {
        let mut post = Postausgang::default();
        let mut zustand = self.zustand.lock();

        let Some(ziel) = zustand.peers.verbindung_von(anfrage.to) else {
            tracing::debug!(to = %anfrage.to, "Ziel nicht angemeldet, Nachricht verworfen");
            return post;
        };

        if anfrage.ist_angebot() {
            let from = anfrage
                .from
                .or_else(|| zustand.peers.peer_von(verbindung).map(|p| p.id));
            match from {
                Some(from) => {
                    zustand.paare.eintragen(from, anfrage.to);
                    tracing::debug!(from = %from, to = %anfrage.to, "Paarung eingetragen");
                }
                None => tracing::debug!(to = %anfrage.to, "Angebot ohne Absender, keine Paarung"),
            }
        }

        // Unveraendert weiterleiten
        post.antworten.push((ziel, original.to_string()));
        post
    }

    fn exist(&self, verbindung: VerbindungsId, anfrage: ExistAnfrage) -> Postausgang {
        let mut post = Postausgang::default();
        let id = self.zustand.lock().peers.finden_nach_name(&anfrage.name);
        post.antwort(verbindung, ExistAntwort::neu(id).zu_text());
        post
    }

    // -----------------------------------------------------------------------
    // Zustellung (ohne Engine-Lock)
    // -----------------------------------------------------------------------

    fn zustellen(&self, post: Postausgang) {
        for (verbindung, text) in &post.antworten {
            self.ausgang.senden(*verbindung, text);
        }
        for (verbindung, text) in &post.meldungen {
            if self.ausgang.ist_verbunden(*verbindung) {
                self.ausgang.senden(*verbindung, text);
            } else {
                tracing::debug!(verbindung = %verbindung, "Gegenseite nicht mehr verbunden");
            }
        }
        if let Some(liste) = &post.liste {
            liste_protokollieren(liste, &self.ausgang);
        }
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    /// Schnappschuss der angemeldeten Peers, sortiert nach ID
    pub fn peers(&self) -> Vec<funkstelle_protocol::PeerEintrag> {
        self.zustand.lock().peers.liste()
    }

    pub fn peer_anzahl(&self) -> usize {
        self.zustand.lock().peers.anzahl()
    }

    pub fn paar_anzahl(&self) -> usize {
        self.zustand.lock().paare.anzahl()
    }
}

impl<A: Ausgang> VerbindungsHandler for SignalingEngine<A> {
    fn bei_nachricht(&self, verbindung: VerbindungsId, text: &str) {
        self.nachricht_verarbeiten(verbindung, text);
    }

    fn bei_schliessen(&self, verbindung: VerbindungsId) {
        self.verbindung_geschlossen(verbindung);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::HashSet;

    /// Zeichnet alle gesendeten Nachrichten auf
    #[derive(Default)]
    struct Aufzeichner {
        gesendet: Mutex<Vec<(VerbindungsId, String)>>,
        getrennt: Mutex<HashSet<VerbindungsId>>,
    }

    impl Aufzeichner {
        fn abholen(&self, verbindung: VerbindungsId) -> Vec<Value> {
            let mut gesendet = self.gesendet.lock();
            let (fuer, rest): (Vec<_>, Vec<_>) =
                gesendet.drain(..).partition(|(v, _)| *v == verbindung);
            *gesendet = rest;
            fuer.into_iter()
                .map(|(_, t)| serde_json::from_str(&t).unwrap())
                .collect()
        }

        fn roh(&self) -> Vec<(VerbindungsId, String)> {
            self.gesendet.lock().clone()
        }
    }

    impl Ausgang for Aufzeichner {
        fn senden(&self, verbindung: VerbindungsId, text: &str) -> bool {
            if self.getrennt.lock().contains(&verbindung) {
                return false;
            }
            self.gesendet.lock().push((verbindung, text.to_string()));
            true
        }

        fn broadcast(&self, _text: &str) -> usize {
            0
        }

        fn ist_verbunden(&self, verbindung: VerbindungsId) -> bool {
            !self.getrennt.lock().contains(&verbindung)
        }

        fn verbindungs_anzahl(&self) -> usize {
            0
        }
    }

    fn engine() -> SignalingEngine<Aufzeichner> {
        SignalingEngine::neu(Aufzeichner::default(), IceKonfig::default())
    }

    const A: VerbindungsId = VerbindungsId(1001);
    const B: VerbindungsId = VerbindungsId(1002);
    const C: VerbindungsId = VerbindungsId(1003);

    fn anmelden(engine: &SignalingEngine<Aufzeichner>, v: VerbindungsId, name: &str) -> Value {
        engine.nachricht_verarbeiten(v, &json!({"signal": "sign_in", "name": name}).to_string());
        let mut antworten = engine.ausgang().abholen(v);
        assert_eq!(antworten.len(), 1);
        antworten.remove(0)
    }

    #[test]
    fn sign_in_antwort_und_peer_liste() {
        let engine = engine();
        let alice = anmelden(&engine, A, "alice");
        assert_eq!(
            alice,
            json!({
                "signal": "return", "request": "sign_in", "status": "ok",
                "repeat": false, "id": 0, "name": "alice",
                "peers": [{"id": 0, "name": "alice"}],
            })
        );

        let bob = anmelden(&engine, B, "bob");
        assert_eq!(bob["id"], 1);
        assert_eq!(
            bob["peers"],
            json!([{"id": 0, "name": "alice"}, {"id": 1, "name": "bob"}])
        );
        // Kein Broadcast an bestehende Peers
        assert!(engine.ausgang().abholen(A).is_empty());
    }

    #[test]
    fn sign_in_mit_nolist_und_ice() {
        let engine = SignalingEngine::neu(
            Aufzeichner::default(),
            IceKonfig::neu("turn:turn.example.org:3478", "u", "p"),
        );
        engine.nachricht_verarbeiten(A, r#"{"signal":"sign_in","name":"x","nolist":false}"#);
        let antwort = engine.ausgang().abholen(A).remove(0);
        assert!(antwort.get("peers").is_none());
        assert_eq!(antwort["ice"]["uri"], "turn:turn.example.org:3478");
        assert_eq!(engine.peer_anzahl(), 1);
    }

    #[test]
    fn repeat_bei_namensgleichheit() {
        let engine = engine();
        assert_eq!(anmelden(&engine, A, "carol")["repeat"], false);
        assert_eq!(anmelden(&engine, B, "carol")["repeat"], true);
    }

    #[test]
    fn exist_mit_und_ohne_treffer() {
        let engine = engine();
        anmelden(&engine, A, "alice");
        anmelden(&engine, B, "bob");

        engine.nachricht_verarbeiten(C, r#"{"signal":"exist","name":"bob"}"#);
        engine.nachricht_verarbeiten(C, r#"{"signal":"exist","name":"eve"}"#);
        let antworten = engine.ausgang().abholen(C);
        assert_eq!(
            antworten,
            vec![
                json!({"signal": "return", "request": "exist", "exist": true, "id": 1}),
                json!({"signal": "return", "request": "exist", "exist": false}),
            ]
        );
    }

    #[test]
    fn nachricht_wird_unveraendert_weitergeleitet() {
        let engine = engine();
        anmelden(&engine, A, "alice");
        anmelden(&engine, B, "bob");

        let original = r#"{"signal":"message","to":0,"from":1,"type":"offer","sdp":"v=0\r\n","x":[1, 2]}"#;
        engine.nachricht_verarbeiten(B, original);
        assert_eq!(engine.ausgang().roh(), vec![(A, original.to_string())]);
        assert_eq!(engine.paar_anzahl(), 1);
    }

    #[test]
    fn nachricht_an_unbekanntes_ziel_wird_verworfen() {
        let engine = engine();
        anmelden(&engine, A, "alice");
        engine.nachricht_verarbeiten(A, r#"{"signal":"message","to":42,"type":"offer"}"#);
        assert!(engine.ausgang().roh().is_empty());
        assert_eq!(engine.paar_anzahl(), 0);
    }

    #[test]
    fn schliessen_meldet_nur_die_gegenseite_einmal() {
        let engine = engine();
        anmelden(&engine, A, "alice");
        anmelden(&engine, B, "bob");
        anmelden(&engine, C, "carol");

        engine.nachricht_verarbeiten(B, r#"{"signal":"message","to":0,"from":1,"type":"offer"}"#);
        engine.ausgang().abholen(A);

        engine.verbindung_geschlossen(A);
        assert_eq!(
            engine.ausgang().abholen(B),
            vec![json!({"signal": "sign_out", "id": 0})]
        );
        assert!(engine.ausgang().abholen(C).is_empty());
        assert_eq!(engine.paar_anzahl(), 0);
        assert_eq!(engine.peer_anzahl(), 2);

        // Zweites Schliessen loest nichts mehr aus
        engine.verbindung_geschlossen(A);
        assert!(engine.ausgang().roh().is_empty());
    }

    #[test]
    fn sign_out_antwortet_und_meldet_gegenseite() {
        let engine = engine();
        anmelden(&engine, A, "alice");
        anmelden(&engine, B, "bob");
        // Angebot ohne from: Absender wird aus der Verbindung bestimmt
        engine.nachricht_verarbeiten(A, r#"{"signal":"message","to":1,"type":"offer"}"#);
        engine.ausgang().abholen(B);

        engine.nachricht_verarbeiten(A, r#"{"signal":"sign_out","id":0}"#);
        assert_eq!(
            engine.ausgang().abholen(A),
            vec![json!({"signal": "return", "request": "sign_out", "status": "ok"})]
        );
        assert_eq!(
            engine.ausgang().abholen(B),
            vec![json!({"signal": "sign_out", "id": 0})]
        );
        assert_eq!(engine.peers().len(), 1);

        // Schliessen nach sign_out: kein Peer mehr, keine Meldung
        engine.verbindung_geschlossen(A);
        assert!(engine.ausgang().roh().is_empty());
    }

    #[test]
    fn meldung_an_getrennte_gegenseite_entfaellt() {
        let engine = engine();
        anmelden(&engine, A, "alice");
        anmelden(&engine, B, "bob");
        engine.nachricht_verarbeiten(B, r#"{"signal":"message","to":0,"from":1,"type":"offer"}"#);
        engine.ausgang().abholen(A);

        // B ist auf Transportebene schon weg, der Worker hat es aber noch nicht verarbeitet
        engine.ausgang().getrennt.lock().insert(B);
        engine.verbindung_geschlossen(A);
        assert!(engine.ausgang().roh().is_empty());
        assert_eq!(engine.paar_anzahl(), 0);
    }

    #[test]
    fn erneutes_sign_in_ersetzt_peer() {
        let engine = engine();
        anmelden(&engine, A, "alice");
        anmelden(&engine, B, "bob");
        engine.nachricht_verarbeiten(B, r#"{"signal":"message","to":0,"from":1,"type":"offer"}"#);
        engine.ausgang().abholen(A);

        let neu = anmelden(&engine, A, "alice2");
        assert_eq!(neu["id"], 2);
        assert_eq!(
            engine.ausgang().abholen(B),
            vec![json!({"signal": "sign_out", "id": 0})]
        );
        let namen: Vec<_> = engine.peers().into_iter().map(|p| p.name).collect();
        assert_eq!(namen, vec!["bob", "alice2"]);
    }

    #[test]
    fn unbrauchbare_dokumente_bleiben_ohne_wirkung() {
        let engine = engine();
        anmelden(&engine, A, "alice");
        for text in [
            "",
            "kein json",
            "[]",
            r#"{"name":"x"}"#,
            r#"{"signal":"tanzen"}"#,
            r#"{"signal":"message"}"#,
            r#"{"signal":"message","to":-1}"#,
        ] {
            engine.nachricht_verarbeiten(A, text);
        }
        assert!(engine.ausgang().roh().is_empty());
        assert_eq!(engine.peer_anzahl(), 1);
    }

    #[test]
    fn ids_bleiben_bei_wechselnden_anmeldungen_eindeutig() {
        let engine = engine();
        for i in 0..30u64 {
            let v = VerbindungsId(5000 + i);
            anmelden(&engine, v, "p");
            if i % 4 == 1 {
                engine.verbindung_geschlossen(VerbindungsId(5000 + i - 1));
            }
            let ids: HashSet<_> = engine.peers().into_iter().map(|p| p.id).collect();
            assert_eq!(ids.len(), engine.peer_anzahl());
        }
    }
}
