//! Keepalive-Thread
//!
//! Pingt in festen Abstaenden alle Verbindungen an. Die Pong-Frist selbst
//! ueberwacht jeder Verbindungs-Task fuer sich. Zwischen zwei Runden wartet
//! der Thread mit Timeout auf das [`StoppSignal`], so dass Shutdown nie
//! ein volles Intervall verzoegert wird.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::registry::VerbindungsRegistry;

/// Einmaliges, prozesslokales Stopp-Flag mit zeitbegrenztem Warten
#[derive(Default)]
pub struct StoppSignal {
    gestoppt: Mutex<bool>,
    geweckt: Condvar,
}

impl StoppSignal {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Setzt das Flag und weckt alle Wartenden
    pub fn ausloesen(&self) {
        let mut gestoppt = self.gestoppt.lock();
        *gestoppt = true;
        drop(gestoppt);
        self.geweckt.notify_all();
    }

    pub fn ist_ausgeloest(&self) -> bool {
        *self.gestoppt.lock()
    }

    /// Wartet hoechstens `dauer`; `true` wenn das Signal ausgeloest wurde
    pub fn warten_fuer(&self, dauer: Duration) -> bool {
        let frist = Instant::now() + dauer;
        let mut gestoppt = self.gestoppt.lock();
        while !*gestoppt {
            if self.geweckt.wait_until(&mut gestoppt, frist).timed_out() {
                break;
            }
        }
        *gestoppt
    }
}

/// Schleife des Keepalive-Threads
///
/// Laeuft bis `stopp` ausgeloest wird. Gibt die Anzahl der Ping-Runden
/// zurueck.
pub fn keepalive_schleife(
    registry: Arc<VerbindungsRegistry>,
    stopp: Arc<StoppSignal>,
    intervall: Duration,
) -> u64 {
    tracing::debug!(intervall_ms = intervall.as_millis() as u64, "Keepalive gestartet");
    let mut runden = 0u64;

    while !stopp.warten_fuer(intervall) {
        let gepingt = registry.ping_an_alle();
        runden += 1;
        tracing::trace!(runde = runden, verbindungen = gepingt, "Keepalive-Ping gesendet");
    }

    tracing::debug!(runden, "Keepalive beendet");
    runden
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Ausgehend, VerbindungsHandle};
    use funkstelle_core::{ListenerArt, VerbindungsId};
    use std::thread;

    #[test]
    fn warten_endet_mit_timeout() {
        let stopp = StoppSignal::neu();
        let start = Instant::now();
        assert!(!stopp.warten_fuer(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn ausloesen_weckt_sofort() {
        let stopp = Arc::new(StoppSignal::neu());
        let wartender = {
            let stopp = Arc::clone(&stopp);
            thread::spawn(move || {
                let start = Instant::now();
                let ausgeloest = stopp.warten_fuer(Duration::from_secs(30));
                (ausgeloest, start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        stopp.ausloesen();

        let (ausgeloest, dauer) = wartender.join().unwrap();
        assert!(ausgeloest);
        assert!(dauer < Duration::from_secs(5));
        assert!(stopp.ist_ausgeloest());
    }

    #[test]
    fn schleife_pingt_und_endet_prompt() {
        let registry = Arc::new(VerbindungsRegistry::neu());
        let (handle, mut rx) =
            VerbindungsHandle::neu(VerbindungsId::neu(), "127.0.0.1:2".parse().unwrap());
        registry.hinzufuegen(ListenerArt::Klartext, handle);
        let stopp = Arc::new(StoppSignal::neu());

        let thread = {
            let registry = Arc::clone(&registry);
            let stopp = Arc::clone(&stopp);
            thread::spawn(move || keepalive_schleife(registry, stopp, Duration::from_millis(10)))
        };

        // Mindestens ein Ping muss ankommen
        let start = Instant::now();
        loop {
            match rx.try_recv() {
                Ok(auftrag) => {
                    assert_eq!(auftrag, Ausgehend::Ping);
                    break;
                }
                Err(_) if start.elapsed() < Duration::from_secs(5) => {
                    thread::sleep(Duration::from_millis(5))
                }
                Err(e) => panic!("Kein Ping erhalten: {e}"),
            }
        }

        stopp.ausloesen();
        let runden = thread.join().unwrap();
        assert!(runden >= 1);
    }
}
