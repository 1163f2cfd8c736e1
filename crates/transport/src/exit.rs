//! Exit-Kanal – einmalige Stopp-Benachrichtigung
//!
//! Der Exit-Watcher-Thread blockiert in [`ExitSignal::warten`], bis entweder
//! ein anderer Prozess "stop" postet oder der eigene Prozess abbricht.
//! Danach beginnt der Shutdown.
//!
//! - [`LokalesExitSignal`]: nur innerhalb des Prozesses (Tests, Einbettung)
//! - [`SocketExitSignal`]: benannter Unix-Domain-Socket, erreichbar ueber
//!   [`stop_senden`] aus einem zweiten Prozess

use parking_lot::{Condvar, Mutex};

/// Warum das Warten endete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitGrund {
    /// Stopp wurde gepostet
    Stopp,
    /// Prozesslokal abgebrochen
    Abgebrochen,
}

impl std::fmt::Display for ExitGrund {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopp => write!(f, "stopp"),
            Self::Abgebrochen => write!(f, "abgebrochen"),
        }
    }
}

/// Einmaliger Exit-Kanal mit blockierendem Warten
pub trait ExitSignal: Send + Sync {
    /// Blockiert bis Stopp gepostet oder abgebrochen wurde
    fn warten(&self) -> ExitGrund;

    /// Beendet ein laufendes oder kuenftiges `warten` sofort
    fn abbrechen(&self);
}

// ---------------------------------------------------------------------------
// LokalesExitSignal
// ---------------------------------------------------------------------------

/// Prozesslokaler Exit-Kanal
#[derive(Default)]
pub struct LokalesExitSignal {
    grund: Mutex<Option<ExitGrund>>,
    gesetzt: Condvar,
}

impl LokalesExitSignal {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Postet "stop"; weitere Aufrufe aendern nichts mehr
    pub fn ausloesen(&self) {
        self.setzen(ExitGrund::Stopp);
    }

    fn setzen(&self, grund: ExitGrund) {
        let mut slot = self.grund.lock();
        if slot.is_none() {
            *slot = Some(grund);
        }
        drop(slot);
        self.gesetzt.notify_all();
    }
}

impl ExitSignal for LokalesExitSignal {
    fn warten(&self) -> ExitGrund {
        let mut slot = self.grund.lock();
        loop {
            if let Some(grund) = *slot {
                return grund;
            }
            self.gesetzt.wait(&mut slot);
        }
    }

    fn abbrechen(&self) {
        self.setzen(ExitGrund::Abgebrochen);
    }
}

// ---------------------------------------------------------------------------
// SocketExitSignal (Unix)
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod unix {
    use super::{ExitGrund, ExitSignal};
    use std::ffi::OsString;
    use std::fs::{self, Permissions};
    use std::io::{self, Read, Write};
    use std::os::unix::fs::PermissionsExt;
    use std::os::unix::net::{UnixListener, UnixStream};
    use std::path::PathBuf;
    use std::time::Duration;

    const STOPP_BYTE: u8 = b'S';
    const ABBRUCH_BYTE: u8 = b'A';

    /// Wie lange ein verbundener Client fuer sein Byte Zeit hat
    const LESE_TIMEOUT: Duration = Duration::from_secs(1);

    /// Pfad des Sockets fuer einen Kanalnamen
    ///
    /// Liegt in `$XDG_RUNTIME_DIR`, falls gesetzt, sonst im Temp-Verzeichnis.
    pub fn socket_pfad(name: &str) -> PathBuf {
        socket_verzeichnis(std::env::var_os("XDG_RUNTIME_DIR")).join(format!("{name}.sock"))
    }

    pub(super) fn socket_verzeichnis(runtime_dir: Option<OsString>) -> PathBuf {
        runtime_dir
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Benannter Exit-Kanal ueber einen Unix-Domain-Socket
    ///
    /// Eine verwaiste Socket-Datei eines frueheren Laufs wird beim Erstellen
    /// ersetzt, die eigene beim Drop entfernt. Nur der Eigentuemer darf
    /// verbinden.
    pub struct SocketExitSignal {
        listener: UnixListener,
        pfad: PathBuf,
    }

    impl SocketExitSignal {
        /// Erstellt den Kanal `<runtime-dir>/<name>.sock`
        ///
        /// Scheitert mit `AddrInUse`, wenn unter dem Namen schon ein Server
        /// lauscht.
        pub fn neu(name: &str) -> io::Result<Self> {
            let pfad = socket_pfad(name);
            if UnixStream::connect(&pfad).is_ok() {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("Exit-Kanal '{}' wird bereits benutzt", pfad.display()),
                ));
            }
            match fs::remove_file(&pfad) {
                Ok(()) => tracing::debug!(pfad = %pfad.display(), "Verwaiste Socket-Datei entfernt"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            let listener = UnixListener::bind(&pfad)?;
            fs::set_permissions(&pfad, Permissions::from_mode(0o600))?;
            tracing::info!(pfad = %pfad.display(), "Exit-Kanal geoeffnet");
            Ok(Self { listener, pfad })
        }

        pub fn pfad(&self) -> &std::path::Path {
            &self.pfad
        }
    }

    impl ExitSignal for SocketExitSignal {
        fn warten(&self) -> ExitGrund {
            loop {
                let mut stream = match self.listener.accept() {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        tracing::warn!(fehler = %e, "Exit-Kanal: accept fehlgeschlagen");
                        return ExitGrund::Abgebrochen;
                    }
                };
                if let Err(e) = stream.set_read_timeout(Some(LESE_TIMEOUT)) {
                    tracing::debug!(fehler = %e, "Exit-Kanal: Lese-Timeout nicht setzbar");
                    continue;
                }
                let mut byte = [0u8; 1];
                match stream.read_exact(&mut byte) {
                    Ok(()) if byte[0] == STOPP_BYTE => return ExitGrund::Stopp,
                    Ok(()) if byte[0] == ABBRUCH_BYTE => return ExitGrund::Abgebrochen,
                    Ok(()) => tracing::debug!(byte = byte[0], "Exit-Kanal: unbekanntes Byte ignoriert"),
                    Err(e) => tracing::debug!(fehler = %e, "Exit-Kanal: stumme Verbindung ignoriert"),
                }
            }
        }

        fn abbrechen(&self) {
            let ergebnis = UnixStream::connect(&self.pfad)
                .and_then(|mut stream| stream.write_all(&[ABBRUCH_BYTE]));
            if let Err(e) = ergebnis {
                tracing::warn!(fehler = %e, "Exit-Kanal: Abbruch nicht zustellbar");
            }
        }
    }

    impl Drop for SocketExitSignal {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.pfad);
        }
    }

    /// Postet "stop" an einen laufenden Server
    ///
    /// `Ok(false)` wenn unter dem Namen kein Server lauscht.
    pub fn stop_senden(name: &str) -> io::Result<bool> {
        let pfad = socket_pfad(name);
        let mut stream = match UnixStream::connect(&pfad) {
            Ok(stream) => stream,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
                ) =>
            {
                tracing::debug!(pfad = %pfad.display(), "Kein Server am Exit-Kanal");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        stream.write_all(&[STOPP_BYTE])?;
        Ok(true)
    }
}

#[cfg(unix)]
pub use unix::{socket_pfad, stop_senden, SocketExitSignal};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn lokales_signal_stopp() {
        let signal = Arc::new(LokalesExitSignal::neu());
        let wartender = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.warten())
        };
        thread::sleep(Duration::from_millis(20));
        signal.ausloesen();
        assert_eq!(wartender.join().unwrap(), ExitGrund::Stopp);
    }

    #[test]
    fn lokales_signal_ist_einmalig() {
        let signal = LokalesExitSignal::neu();
        signal.abbrechen();
        signal.ausloesen();
        assert_eq!(signal.warten(), ExitGrund::Abgebrochen);
        assert_eq!(signal.warten(), ExitGrund::Abgebrochen);
    }

    #[cfg(unix)]
    fn kanal_name(suffix: &str) -> String {
        format!("funkstelle-test-{}-{suffix}", std::process::id())
    }

    #[cfg(unix)]
    #[test]
    fn socket_signal_ueber_stop_senden() {
        let name = kanal_name("stop");
        let signal = Arc::new(SocketExitSignal::neu(&name).unwrap());
        let wartender = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.warten())
        };

        assert!(stop_senden(&name).unwrap());
        assert_eq!(wartender.join().unwrap(), ExitGrund::Stopp);
    }

    #[cfg(unix)]
    #[test]
    fn socket_signal_abbrechen() {
        let name = kanal_name("abbruch");
        let signal = SocketExitSignal::neu(&name).unwrap();
        signal.abbrechen();
        assert_eq!(signal.warten(), ExitGrund::Abgebrochen);
    }

    #[cfg(unix)]
    #[test]
    fn stummer_client_blockiert_den_kanal_nicht() {
        let name = kanal_name("stumm");
        let signal = Arc::new(SocketExitSignal::neu(&name).unwrap());
        let wartender = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.warten())
        };

        // Verbindet und sendet nie etwas, bleibt bis zum Testende offen
        let _stumm = std::os::unix::net::UnixStream::connect(signal.pfad()).unwrap();
        assert!(stop_senden(&name).unwrap());

        let (tx, rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(wartender.join().unwrap());
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(ExitGrund::Stopp));
    }

    #[cfg(unix)]
    #[test]
    fn zweiter_kanal_gleichen_namens_wird_abgelehnt() {
        let name = kanal_name("doppelt");
        let erster = SocketExitSignal::neu(&name).unwrap();

        let e = SocketExitSignal::neu(&name).err().expect("zweiter Kanal muss scheitern");
        assert_eq!(e.kind(), std::io::ErrorKind::AddrInUse);
        assert!(erster.pfad().exists());

        // Der erste Kanal funktioniert weiter; die Pruefverbindung wird uebersprungen
        assert!(stop_senden(&name).unwrap());
        assert_eq!(erster.warten(), ExitGrund::Stopp);
    }

    #[cfg(unix)]
    #[test]
    fn verwaiste_socket_datei_wird_ersetzt() {
        let name = kanal_name("verwaist");
        let pfad = socket_pfad(&name);
        // Gebunden und sofort geschlossen: Datei bleibt, niemand lauscht
        drop(std::os::unix::net::UnixListener::bind(&pfad).unwrap());
        assert!(pfad.exists());

        let signal = SocketExitSignal::neu(&name).unwrap();
        assert!(stop_senden(&name).unwrap());
        assert_eq!(signal.warten(), ExitGrund::Stopp);
    }

    #[cfg(unix)]
    #[test]
    fn socket_nur_fuer_eigentuemer() {
        use std::os::unix::fs::PermissionsExt;
        let signal = SocketExitSignal::neu(&kanal_name("rechte")).unwrap();
        let modus = std::fs::metadata(signal.pfad()).unwrap().permissions().mode();
        assert_eq!(modus & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn runtime_verzeichnis_hat_vorrang() {
        assert_eq!(
            unix::socket_verzeichnis(Some("/run/user/1000".into())),
            std::path::PathBuf::from("/run/user/1000")
        );
        assert_eq!(unix::socket_verzeichnis(Some("".into())), std::env::temp_dir());
        assert_eq!(unix::socket_verzeichnis(None), std::env::temp_dir());
    }

    #[cfg(unix)]
    #[test]
    fn stop_ohne_server_ist_kein_fehler() {
        let name = kanal_name("niemand");
        assert!(!stop_senden(&name).unwrap());

        // Socket-Datei verschwindet mit dem Signal
        let pfad = {
            let signal = SocketExitSignal::neu(&name).unwrap();
            signal.pfad().to_path_buf()
        };
        assert!(!pfad.exists());
        assert!(!stop_senden(&name).unwrap());
    }
}
