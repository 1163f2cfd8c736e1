//! Schnittstellen zwischen Transport und Protokollschicht
//!
//! Der Transport ruft die Protokollschicht ueber [`VerbindungsHandler`]
//! auf (nur aus dem Worker-Thread). Die Protokollschicht sendet ueber
//! [`Ausgang`] zurueck, ohne den Transport selbst zu kennen.

use funkstelle_core::VerbindungsId;

/// Empfaenger der Verbindungsereignisse
///
/// Wird ausschliesslich vom Worker-Thread aufgerufen, Aufrufe sind also
/// nie nebenlaeufig zueinander.
pub trait VerbindungsHandler: Send + Sync {
    /// Textframe auf einer Verbindung empfangen
    fn bei_nachricht(&self, verbindung: VerbindungsId, text: &str);

    /// Verbindung ist geschlossen und aus der Registry entfernt
    fn bei_schliessen(&self, verbindung: VerbindungsId);
}

/// Sendepfad zu den Verbindungen
///
/// Alle Methoden sind best effort: Fehler werden protokolliert und als
/// `false` gemeldet, nie als Fehler weitergereicht.
pub trait Ausgang: Send + Sync {
    /// Sendet einen Textframe an eine Verbindung
    fn senden(&self, verbindung: VerbindungsId, text: &str) -> bool;

    /// Sendet einen Textframe an alle Verbindungen, gibt die Anzahl zurueck
    fn broadcast(&self, text: &str) -> usize;

    /// Ist die Verbindung noch registriert und offen?
    fn ist_verbunden(&self, verbindung: VerbindungsId) -> bool;

    /// Anzahl registrierter Verbindungen
    fn verbindungs_anzahl(&self) -> usize;
}
