//! Paarungstabelle – wer hat wem ein Angebot geschickt
//!
//! Ein Eintrag entsteht beim Weiterleiten einer `offer`-Nachricht und lebt,
//! bis eine der beiden Seiten sich abmeldet oder die Verbindung verliert.
//! Das Aufloesen liefert die Gegenseiten, damit genau diese eine
//! Abmeldemeldung bekommen.

use funkstelle_core::PeerId;

/// Vorlaeufige Verbindung zweier Peers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaarEintrag {
    pub from: PeerId,
    pub to: PeerId,
}

impl PaarEintrag {
    /// Gegenseite von `id`, falls der Eintrag `id` betrifft
    fn gegenseite(&self, id: PeerId) -> Option<PeerId> {
        if self.from == id {
            Some(self.to)
        } else if self.to == id {
            Some(self.from)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct PaarTabelle {
    eintraege: Vec<PaarEintrag>,
}

impl PaarTabelle {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Traegt eine Paarung ein; identische Eintraege werden nicht doppelt gefuehrt
    pub fn eintragen(&mut self, from: PeerId, to: PeerId) {
        let eintrag = PaarEintrag { from, to };
        if !self.eintraege.contains(&eintrag) {
            self.eintraege.push(eintrag);
        }
    }

    /// Entfernt alle Eintraege mit `id` und gibt die Gegenseiten zurueck
    ///
    /// Jede Gegenseite erscheint hoechstens einmal, `id` selbst nie.
    pub fn aufloesen(&mut self, id: PeerId) -> Vec<PeerId> {
        let mut gegenseiten = Vec::new();
        self.eintraege.retain(|eintrag| match eintrag.gegenseite(id) {
            Some(andere) => {
                if andere != id && !gegenseiten.contains(&andere) {
                    gegenseiten.push(andere);
                }
                false
            }
            None => true,
        });
        gegenseiten
    }

    pub fn anzahl(&self) -> usize {
        self.eintraege.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aufloesen_von_beiden_seiten() {
        let mut tabelle = PaarTabelle::neu();
        tabelle.eintragen(PeerId(1), PeerId(0));
        assert_eq!(tabelle.aufloesen(PeerId(0)), vec![PeerId(1)]);
        assert_eq!(tabelle.anzahl(), 0);

        tabelle.eintragen(PeerId(1), PeerId(0));
        assert_eq!(tabelle.aufloesen(PeerId(1)), vec![PeerId(0)]);
    }

    #[test]
    fn zweites_aufloesen_liefert_nichts() {
        let mut tabelle = PaarTabelle::neu();
        tabelle.eintragen(PeerId(0), PeerId(1));
        assert_eq!(tabelle.aufloesen(PeerId(0)).len(), 1);
        assert!(tabelle.aufloesen(PeerId(0)).is_empty());
    }

    #[test]
    fn mehrere_paarungen_je_gegenseite_einmal() {
        let mut tabelle = PaarTabelle::neu();
        tabelle.eintragen(PeerId(0), PeerId(1));
        tabelle.eintragen(PeerId(0), PeerId(1));
        tabelle.eintragen(PeerId(1), PeerId(0));
        tabelle.eintragen(PeerId(2), PeerId(0));
        tabelle.eintragen(PeerId(3), PeerId(4));
        assert_eq!(tabelle.anzahl(), 4);

        assert_eq!(tabelle.aufloesen(PeerId(0)), vec![PeerId(1), PeerId(2)]);
        // Nur die unbeteiligte Paarung bleibt
        assert_eq!(tabelle.anzahl(), 1);
        assert_eq!(tabelle.aufloesen(PeerId(4)), vec![PeerId(3)]);
    }

    #[test]
    fn selbstpaarung_meldet_niemanden() {
        let mut tabelle = PaarTabelle::neu();
        tabelle.eintragen(PeerId(5), PeerId(5));
        assert!(tabelle.aufloesen(PeerId(5)).is_empty());
        assert_eq!(tabelle.anzahl(), 0);
    }
}
