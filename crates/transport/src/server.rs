//! TransportServer – Listener, Threads und Shutdown-Reihenfolge
//!
//! [`TransportServer::listen`] bindet die Listener, startet Worker-,
//! Keepalive- und Exit-Watcher-Thread und treibt die Netzwerk-Event-Loop
//! auf dem aufrufenden Thread. Die Methode kehrt erst zurueck, wenn das
//! Exit-Signal kam und alle drei Threads beendet sind.
//!
//! Startfehler (Binden, TLS-Material) werden zurueckgegeben, bevor ein
//! Hintergrund-Thread laeuft.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use funkstelle_core::ListenerArt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;

use crate::action::{Action, ActionQueue};
use crate::connection::{verbindung_bedienen, VerbindungsKontext};
use crate::error::{TransportFehler, TransportResult};
use crate::exit::ExitSignal;
use crate::handler::VerbindungsHandler;
use crate::keepalive::{keepalive_schleife, StoppSignal};
use crate::registry::VerbindungsRegistry;
use crate::tls::{acceptor_laden, TlsDateien};
use crate::versender::Versender;
use crate::worker::worker_schleife;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Laufzeitparameter des Transports
#[derive(Debug, Clone)]
pub struct TransportKonfig {
    pub bind_adresse: IpAddr,
    pub port: u16,
    /// `Some` aktiviert den TLS-Listener (Port 0 waehlt einen freien Port)
    pub tls_port: Option<u16>,
    pub tls: TlsDateien,
    pub ping_intervall: Duration,
    pub pong_timeout: Duration,
    pub handshake_timeout: Duration,
    /// Wie lange offene Verbindungen beim Shutdown Zeit zum Schliessen haben
    pub schliess_frist: Duration,
}

impl Default for TransportKonfig {
    fn default() -> Self {
        Self {
            bind_adresse: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8888,
            tls_port: None,
            tls: TlsDateien::default(),
            ping_intervall: Duration::from_secs(5),
            pong_timeout: Duration::from_secs(15),
            handshake_timeout: Duration::from_secs(10),
            schliess_frist: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Gebundene Listener
// ---------------------------------------------------------------------------

/// Gebundene, noch nicht laufende Listener
pub struct GebundeneListener {
    klartext: std::net::TcpListener,
    klartext_adresse: SocketAddr,
    tls: Option<(std::net::TcpListener, SocketAddr, TlsAcceptor)>,
}

impl GebundeneListener {
    pub fn klartext_adresse(&self) -> SocketAddr {
        self.klartext_adresse
    }

    pub fn tls_adresse(&self) -> Option<SocketAddr> {
        self.tls.as_ref().map(|(_, adresse, _)| *adresse)
    }
}

impl std::fmt::Debug for GebundeneListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GebundeneListener")
            .field("klartext", &self.klartext_adresse)
            .field("tls", &self.tls_adresse())
            .finish()
    }
}

fn listener_binden(adresse: SocketAddr) -> TransportResult<(std::net::TcpListener, SocketAddr)> {
    let binden_fehler = |quelle| TransportFehler::Binden {
        adresse: adresse.to_string(),
        quelle,
    };
    let listener = std::net::TcpListener::bind(adresse).map_err(binden_fehler)?;
    listener.set_nonblocking(true).map_err(binden_fehler)?;
    let lokal = listener.local_addr().map_err(binden_fehler)?;
    Ok((listener, lokal))
}

// ---------------------------------------------------------------------------
// TransportServer
// ---------------------------------------------------------------------------

/// Besitzt Listener, Registry und Action-Queue
pub struct TransportServer {
    konfig: TransportKonfig,
    registry: Arc<VerbindungsRegistry>,
    queue: Arc<ActionQueue>,
    exit_signal: Arc<dyn ExitSignal>,
}

impl TransportServer {
    /// Erstellt den Server; gestartet wird erst mit [`listen`](Self::listen)
    pub fn neu(konfig: TransportKonfig, exit_signal: Arc<dyn ExitSignal>) -> Self {
        Self {
            konfig,
            registry: Arc::new(VerbindungsRegistry::neu()),
            queue: Arc::new(ActionQueue::neu()),
            exit_signal,
        }
    }

    /// Sendepfad fuer die Protokollschicht
    pub fn versender(&self) -> Versender {
        Versender::neu(Arc::clone(&self.registry))
    }

    /// Exit-Kanal des Servers, z.B. fuer einen Signal-Handler
    pub fn exit_signal(&self) -> &Arc<dyn ExitSignal> {
        &self.exit_signal
    }

    /// Bindet beide Listener und laedt das TLS-Material
    pub fn binden(&self) -> TransportResult<GebundeneListener> {
        let (klartext, klartext_adresse) =
            listener_binden(SocketAddr::new(self.konfig.bind_adresse, self.konfig.port))?;

        let tls = match self.konfig.tls_port {
            Some(port) => {
                let acceptor = acceptor_laden(&self.konfig.tls)?;
                let (listener, adresse) =
                    listener_binden(SocketAddr::new(self.konfig.bind_adresse, port))?;
                Some((listener, adresse, acceptor))
            }
            None => None,
        };

        Ok(GebundeneListener {
            klartext,
            klartext_adresse,
            tls,
        })
    }

    /// Bindet und laeuft bis zum Exit-Signal
    pub fn listen(&self, handler: Arc<dyn VerbindungsHandler>) -> TransportResult<()> {
        let listener = self.binden()?;
        self.ausfuehren(listener, handler)
    }

    /// Laeuft mit bereits gebundenen Listenern bis zum Exit-Signal
    pub fn ausfuehren(
        &self,
        listener: GebundeneListener,
        handler: Arc<dyn VerbindungsHandler>,
    ) -> TransportResult<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let klartext_adresse = listener.klartext_adresse();
        let tls_adresse = listener.tls_adresse();

        // Umwandlung in tokio-Listener braucht den Runtime-Kontext
        let (klartext, tls) = {
            let _kontext = runtime.enter();
            let klartext = TcpListener::from_std(listener.klartext)?;
            let tls = match listener.tls {
                Some((l, _, acceptor)) => Some((TcpListener::from_std(l)?, acceptor)),
                None => None,
            };
            (klartext, tls)
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stopp = Arc::new(StoppSignal::neu());

        let threads = self.threads_starten(handler, Arc::clone(&stopp), shutdown_tx)?;

        tracing::info!(adresse = %klartext_adresse, "Klartext-Listener (ws) gestartet");
        if let Some(adresse) = tls_adresse {
            tracing::info!(adresse = %adresse, "TLS-Listener (wss) gestartet");
        }

        runtime.block_on(async {
            let klartext_schleife = annahme_schleife(
                klartext,
                None,
                self.kontext(ListenerArt::Klartext),
                self.konfig.schliess_frist,
                shutdown_rx.clone(),
            );
            let tls_schleife = async {
                if let Some((listener, acceptor)) = tls {
                    annahme_schleife(
                        listener,
                        Some(acceptor),
                        self.kontext(ListenerArt::Tls),
                        self.konfig.schliess_frist,
                        shutdown_rx.clone(),
                    )
                    .await;
                }
            };
            tokio::join!(klartext_schleife, tls_schleife);
        });
        drop(runtime);

        threads.verbinden();
        tracing::info!("Transport beendet");
        Ok(())
    }

    fn kontext(&self, art: ListenerArt) -> VerbindungsKontext {
        VerbindungsKontext {
            art,
            queue: Arc::clone(&self.queue),
            pong_timeout: self.konfig.pong_timeout,
            handshake_timeout: self.konfig.handshake_timeout,
        }
    }

    /// Startet Worker, Keepalive und Exit-Watcher
    ///
    /// Scheitert ein spaeterer Start, werden die bereits laufenden Threads
    /// wieder beendet.
    fn threads_starten(
        &self,
        handler: Arc<dyn VerbindungsHandler>,
        stopp: Arc<StoppSignal>,
        shutdown_tx: watch::Sender<bool>,
    ) -> TransportResult<HintergrundThreads> {
        let worker = {
            let queue = Arc::clone(&self.queue);
            let registry = Arc::clone(&self.registry);
            thread::Builder::new()
                .name("funkstelle-worker".into())
                .spawn(move || {
                    worker_schleife(queue, registry, handler);
                })?
        };

        let keepalive = {
            let registry = Arc::clone(&self.registry);
            let stopp = Arc::clone(&stopp);
            let intervall = self.konfig.ping_intervall;
            thread::Builder::new()
                .name("funkstelle-keepalive".into())
                .spawn(move || {
                    keepalive_schleife(registry, stopp, intervall);
                })
        };
        let keepalive = match keepalive {
            Ok(t) => t,
            Err(e) => {
                self.queue.einreihen(Action::Exit);
                let _ = worker.join();
                return Err(e.into());
            }
        };

        let exit_watcher = {
            let signal = Arc::clone(&self.exit_signal);
            let queue = Arc::clone(&self.queue);
            let stopp = Arc::clone(&stopp);
            thread::Builder::new()
                .name("funkstelle-exit".into())
                .spawn(move || {
                    let grund = signal.warten();
                    tracing::info!(grund = %grund, "Exit-Signal empfangen, fahre herunter");
                    stopp.ausloesen();
                    shutdown_tx.send_replace(true);
                    queue.einreihen(Action::Exit);
                })
        };
        let exit_watcher = match exit_watcher {
            Ok(t) => t,
            Err(e) => {
                stopp.ausloesen();
                self.queue.einreihen(Action::Exit);
                let _ = keepalive.join();
                let _ = worker.join();
                return Err(e.into());
            }
        };

        Ok(HintergrundThreads {
            exit_watcher,
            keepalive,
            worker,
        })
    }
}

struct HintergrundThreads {
    exit_watcher: JoinHandle<()>,
    keepalive: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl HintergrundThreads {
    /// Wartet in fester Reihenfolge: Exit-Watcher, Keepalive, Worker
    fn verbinden(self) {
        for (name, thread) in [
            ("exit", self.exit_watcher),
            ("keepalive", self.keepalive),
            ("worker", self.worker),
        ] {
            if thread.join().is_err() {
                tracing::error!(thread = name, "Thread ist abgestuerzt");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Accept-Loop
// ---------------------------------------------------------------------------

async fn annahme_schleife(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    kontext: VerbindungsKontext,
    schliess_frist: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let art = kontext.art;
    let mut verbindungen = JoinSet::new();

    loop {
        tokio::select! {
            geaendert = shutdown_rx.changed() => {
                if geaendert.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }

            ergebnis = listener.accept() => match ergebnis {
                Ok((tcp, adresse)) => {
                    let _ = tcp.set_nodelay(true);
                    verbindungen.spawn(verbindung_starten(
                        tcp,
                        adresse,
                        tls.clone(),
                        kontext.clone(),
                        shutdown_rx.clone(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(art = %art, fehler = %e, "Accept fehlgeschlagen");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            },

            Some(beendet) = verbindungen.join_next(), if !verbindungen.is_empty() => {
                if let Err(e) = beendet {
                    tracing::warn!(art = %art, fehler = %e, "Verbindungs-Task abgebrochen");
                }
            }
        }
    }

    drop(listener);
    tracing::info!(art = %art, offen = verbindungen.len(), "Listener gestoppt");

    let alle_zu = async { while verbindungen.join_next().await.is_some() {} };
    if tokio::time::timeout(schliess_frist, alle_zu).await.is_err() {
        tracing::warn!(art = %art, offen = verbindungen.len(), "Verbindungen werden hart beendet");
        verbindungen.abort_all();
        while verbindungen.join_next().await.is_some() {}
    }
}

async fn verbindung_starten(
    tcp: TcpStream,
    adresse: SocketAddr,
    tls: Option<TlsAcceptor>,
    kontext: VerbindungsKontext,
    shutdown_rx: watch::Receiver<bool>,
) {
    match tls {
        None => verbindung_bedienen(tcp, adresse, kontext, shutdown_rx).await,
        Some(acceptor) => {
            match tokio::time::timeout(kontext.handshake_timeout, acceptor.accept(tcp)).await {
                Ok(Ok(stream)) => verbindung_bedienen(stream, adresse, kontext, shutdown_rx).await,
                Ok(Err(e)) => {
                    tracing::warn!(peer = %adresse, fehler = %e, "TLS-Handshake fehlgeschlagen")
                }
                Err(_) => tracing::warn!(peer = %adresse, "TLS-Handshake-Timeout"),
            }
        }
    }
}
