//! funkstelle-server – Bibliotheks-Root
//!
//! Verdrahtet Transport, Signaling-Engine und Exit-Kanal und stellt den
//! Einstiegspunkt fuer Integrationstests bereit.

pub mod cli;
pub mod config;

use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use anyhow::Context;
use config::Einstellungen;
use funkstelle_signaling::SignalingEngine;
use funkstelle_transport::{
    ExitSignal, GebundeneListener, LokalesExitSignal, TransportServer, Versender,
};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    einstellungen: Einstellungen,
    transport: TransportServer,
    engine: Arc<SignalingEngine<Versender>>,
}

impl Server {
    /// Erstellt den Server mit dem Exit-Kanal der Plattform
    ///
    /// Unter Unix ist das ein benannter Socket, den `funkstelle stop`
    /// erreicht. Anderswo kann der Server nur prozesslokal beendet werden.
    pub fn neu(einstellungen: Einstellungen) -> anyhow::Result<Self> {
        let exit_signal = exit_signal_oeffnen(&einstellungen.kanal)?;
        Ok(Self::mit_exit_signal(einstellungen, exit_signal))
    }

    pub fn mit_exit_signal(einstellungen: Einstellungen, exit_signal: Arc<dyn ExitSignal>) -> Self {
        let transport = TransportServer::neu(einstellungen.transport.clone(), exit_signal);
        let engine = Arc::new(SignalingEngine::neu(
            transport.versender(),
            einstellungen.ice.clone(),
        ));
        Self {
            einstellungen,
            transport,
            engine,
        }
    }

    /// Bindet die Listener; Startfehler kommen hier zurueck
    pub fn binden(self) -> anyhow::Result<GebundenerServer> {
        let listener = self
            .transport
            .binden()
            .context("Listener konnten nicht gestartet werden")?;

        tracing::info!(
            ws = %listener.klartext_adresse(),
            wss = ?listener.tls_adresse(),
            kanal = %self.einstellungen.kanal,
            ice = !self.einstellungen.ice.ist_leer(),
            "Server gebunden"
        );

        Ok(GebundenerServer {
            server: self,
            listener,
        })
    }
}

/// Server mit gebundenen Listenern, noch ohne Threads
pub struct GebundenerServer {
    server: Server,
    listener: GebundeneListener,
}

impl GebundenerServer {
    pub fn klartext_adresse(&self) -> SocketAddr {
        self.listener.klartext_adresse()
    }

    pub fn tls_adresse(&self) -> Option<SocketAddr> {
        self.listener.tls_adresse()
    }

    pub fn engine(&self) -> &Arc<SignalingEngine<Versender>> {
        &self.server.engine
    }

    /// Exit-Kanal ohne Besitz, haelt den Server nicht am Leben
    pub fn exit_signal(&self) -> Weak<dyn ExitSignal> {
        Arc::downgrade(self.server.transport.exit_signal())
    }

    /// Laeuft auf dem aufrufenden Thread, bis das Exit-Signal kommt
    pub fn ausfuehren(self) -> anyhow::Result<()> {
        let Self { server, listener } = self;
        server.transport.ausfuehren(listener, server.engine.clone())?;

        tracing::info!(
            verbleibende_peers = server.engine.peer_anzahl(),
            "Server beendet"
        );
        Ok(())
    }
}

#[cfg(unix)]
fn exit_signal_oeffnen(kanal: &str) -> anyhow::Result<Arc<dyn ExitSignal>> {
    let signal = funkstelle_transport::SocketExitSignal::neu(kanal)
        .with_context(|| format!("Steuerkanal '{kanal}' konnte nicht geoeffnet werden"))?;
    tracing::debug!(pfad = %signal.pfad().display(), "Steuerkanal offen");
    Ok(Arc::new(signal))
}

#[cfg(not(unix))]
fn exit_signal_oeffnen(kanal: &str) -> anyhow::Result<Arc<dyn ExitSignal>> {
    tracing::warn!(kanal = %kanal, "Kein Steuerkanal auf dieser Plattform, `stop` wirkt nicht");
    Ok(Arc::new(LokalesExitSignal::neu()))
}

/// Beendet den Server bei Strg-C ueber seinen Exit-Kanal
///
/// Wartet auf einem eigenen Thread; ist der Server schon weg, passiert nichts.
pub fn bei_strg_c_abbrechen(exit: Weak<dyn ExitSignal>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Runtime fuer Signal-Handler")?;

    std::thread::Builder::new()
        .name("strg-c".into())
        .spawn(move || {
            runtime.block_on(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(fehler = %e, "Strg-C-Handler nicht verfuegbar");
                    return;
                }
                tracing::info!("Strg-C empfangen, Server wird beendet");
                if let Some(signal) = exit.upgrade() {
                    signal.abbrechen();
                }
            });
        })
        .context("Signal-Thread konnte nicht gestartet werden")?;
    Ok(())
}

/// Postet "stop" an den Server auf `kanal`
///
/// `Ok(false)`: kein Server erreichbar.
#[cfg(unix)]
pub fn stop_senden(kanal: &str) -> anyhow::Result<bool> {
    funkstelle_transport::stop_senden(kanal)
        .with_context(|| format!("Stop an Kanal '{kanal}' fehlgeschlagen"))
}

#[cfg(not(unix))]
pub fn stop_senden(_kanal: &str) -> anyhow::Result<bool> {
    Ok(false)
}

/// Server fuer Einbettung und Tests, beendet ueber das zurueckgegebene Signal
pub fn lokaler_server(einstellungen: Einstellungen) -> (Server, Arc<LokalesExitSignal>) {
    let exit = Arc::new(LokalesExitSignal::neu());
    let server = Server::mit_exit_signal(einstellungen, exit.clone());
    (server, exit)
}
