//! Verbindungs-Task – besitzt genau einen Socket
//!
//! Ablauf pro Verbindung:
//! 1. HTTP-Handshake (200 fuer gewoehnliche Anfragen, 101 fuer Upgrades)
//! 2. `Subscribe`/`TlsSubscribe` mit dem Handle der Ausgangs-Queue einreihen
//! 3. Frames lesen und als `Message` einreihen, Auftraege aus der
//!    Ausgangs-Queue schreiben, Pong-Frist ueberwachen. Jedes Schreiben
//!    ist durch die Pong-Frist begrenzt
//! 4. Beim Ende `Unsubscribe` einreihen
//!
//! Der Task ruft nie Protokolllogik auf. Alles, was ueber Lesen und
//! Schreiben hinausgeht, erledigt der Worker.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Sink, SinkExt, StreamExt};
use funkstelle_core::{ListenerArt, VerbindungsId};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Role};
use tokio_tungstenite::tungstenite::{Error as WsFehler, Message};
use tokio_tungstenite::WebSocketStream;

use crate::action::{Action, ActionQueue, Nutzlast};
use crate::handshake::{handshake_ausfuehren, HandshakeErgebnis};
use crate::registry::{Ausgehend, VerbindungsHandle};

/// Schliessgrund bei ausbleibendem Pong
pub const GRUND_PONG_TIMEOUT: &str = "pong timeout";
/// Schliessgrund beim Herunterfahren
pub const GRUND_SHUTDOWN: &str = "server shutdown";

/// Wie lange Close-Frame und Abschluss des Sockets hoechstens dauern duerfen
const SCHLIESS_TIMEOUT: Duration = Duration::from_secs(1);

/// Gemeinsamer Kontext aller Verbindungs-Tasks eines Listeners
#[derive(Clone)]
pub struct VerbindungsKontext {
    pub art: ListenerArt,
    pub queue: Arc<ActionQueue>,
    pub pong_timeout: Duration,
    pub handshake_timeout: Duration,
}

/// Warum die Frame-Schleife endete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ende {
    ClientGeschlossen,
    Fehler,
    PongTimeout,
    Shutdown,
    /// Handle aus der Registry entfernt
    Abgemeldet,
}

/// Bedient eine angenommene Verbindung bis zu ihrem Ende
pub async fn verbindung_bedienen<S>(
    mut stream: S,
    adresse: SocketAddr,
    kontext: VerbindungsKontext,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    if *shutdown_rx.borrow() {
        return;
    }

    let rest = match tokio::time::timeout(kontext.handshake_timeout, handshake_ausfuehren(&mut stream)).await {
        Ok(Ok(HandshakeErgebnis::WebSocket { rest })) => rest,
        Ok(Ok(HandshakeErgebnis::HttpBeantwortet | HandshakeErgebnis::VersionAbgelehnt)) => return,
        Ok(Err(e)) => {
            tracing::debug!(peer = %adresse, fehler = %e, "Handshake fehlgeschlagen");
            return;
        }
        Err(_) => {
            tracing::debug!(peer = %adresse, "Handshake-Timeout");
            return;
        }
    };

    let ws = WebSocketStream::from_partially_read(stream, rest, Role::Server, None).await;
    let id = VerbindungsId::neu();
    let (handle, mut auftraege) = VerbindungsHandle::neu(id, adresse);

    kontext.queue.einreihen(match kontext.art {
        ListenerArt::Klartext => Action::Subscribe(handle),
        ListenerArt::Tls => Action::TlsSubscribe(handle),
    });
    tracing::info!(verbindung = %id, peer = %adresse, art = %kontext.art, "Verbindung geoeffnet");

    let (mut schreiber, mut leser) = ws.split();
    let mut ping_offen_seit: Option<Instant> = None;

    let ende = loop {
        // Ohne offenen Ping liegt die Frist in weiter Ferne und der Zweig ist aus
        let frist = ping_offen_seit
            .map(|seit| seit + kontext.pong_timeout)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

        tokio::select! {
            geaendert = shutdown_rx.changed() => {
                if geaendert.is_err() || *shutdown_rx.borrow() {
                    let _ = schreiben(&mut schreiber, schliess_frame(CloseCode::Away, GRUND_SHUTDOWN), schliess_frist()).await;
                    break Ende::Shutdown;
                }
            }

            auftrag = auftraege.recv() => {
                let nachricht = match auftrag {
                    Some(Ausgehend::Text(text)) => Message::Text(text.into()),
                    Some(Ausgehend::Binaer(daten)) => Message::Binary(Bytes::from(daten)),
                    Some(Ausgehend::Ping) => {
                        if ping_offen_seit.is_none() {
                            ping_offen_seit = Some(Instant::now());
                        }
                        Message::Ping(Bytes::new())
                    }
                    None => break Ende::Abgemeldet,
                };
                let frist = schreib_frist(ping_offen_seit, kontext.pong_timeout);
                match schreiben(&mut schreiber, nachricht, frist).await {
                    Ok(()) => {}
                    Err(Schreibfehler::Frist) => {
                        tracing::info!(
                            verbindung = %id,
                            timeout_ms = kontext.pong_timeout.as_millis() as u64,
                            "Client nimmt keine Daten mehr an, Verbindung wird geschlossen"
                        );
                        let _ = schreiben(&mut schreiber, schliess_frame(CloseCode::Normal, GRUND_PONG_TIMEOUT), schliess_frist()).await;
                        break Ende::PongTimeout;
                    }
                    Err(Schreibfehler::Socket(e)) => {
                        tracing::warn!(verbindung = %id, fehler = %e, "Schreiben fehlgeschlagen");
                        break Ende::Fehler;
                    }
                }
            }

            eingang = leser.next() => {
                match eingang {
                    Some(Ok(Message::Text(text))) => {
                        tracing::trace!(verbindung = %id, bytes = text.len(), "Textframe empfangen");
                        kontext.queue.einreihen(Action::Message(id, Nutzlast::Text(text.as_str().to_owned())));
                    }
                    Some(Ok(Message::Binary(daten))) => {
                        kontext.queue.einreihen(Action::Message(id, Nutzlast::Binaer(daten.to_vec())));
                    }
                    Some(Ok(Message::Pong(_))) => ping_offen_seit = None,
                    // Pings beantwortet tungstenite selbst
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Frame(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break Ende::ClientGeschlossen,
                    Some(Err(e)) => {
                        tracing::debug!(verbindung = %id, fehler = %e, "Lesefehler");
                        break Ende::Fehler;
                    }
                }
            }

            _ = tokio::time::sleep_until(frist), if ping_offen_seit.is_some() => {
                tracing::info!(
                    verbindung = %id,
                    timeout_ms = kontext.pong_timeout.as_millis() as u64,
                    "Kein Pong erhalten, Verbindung wird geschlossen"
                );
                let _ = schreiben(&mut schreiber, schliess_frame(CloseCode::Normal, GRUND_PONG_TIMEOUT), schliess_frist()).await;
                break Ende::PongTimeout;
            }
        }
    };

    let _ = tokio::time::timeout_at(schliess_frist(), schreiber.close()).await;
    kontext.queue.einreihen(Action::Unsubscribe(id));
    tracing::info!(verbindung = %id, peer = %adresse, ende = ?ende, "Verbindung geschlossen");
}

#[derive(Debug)]
enum Schreibfehler {
    /// Frist abgelaufen, der Client liest nicht mehr
    Frist,
    Socket(WsFehler),
}

/// Schreibt einen Frame, hoechstens bis `frist`
///
/// Ein voller Sendepuffer darf die Select-Schleife nicht unbegrenzt blockieren.
async fn schreiben<W>(schreiber: &mut W, nachricht: Message, frist: Instant) -> Result<(), Schreibfehler>
where
    W: Sink<Message, Error = WsFehler> + Unpin,
{
    match tokio::time::timeout_at(frist, schreiber.send(nachricht)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Schreibfehler::Socket(e)),
        Err(_) => Err(Schreibfehler::Frist),
    }
}

/// Laeuft ein Ping, gilt dessen Pong-Frist, sonst eine volle Pong-Frist ab jetzt
fn schreib_frist(ping_offen_seit: Option<Instant>, pong_timeout: Duration) -> Instant {
    match ping_offen_seit {
        Some(seit) => seit + pong_timeout,
        None => Instant::now() + pong_timeout,
    }
}

fn schliess_frist() -> Instant {
    Instant::now() + SCHLIESS_TIMEOUT
}

fn schliess_frame(code: CloseCode, grund: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: grund.to_owned().into(),
    }))
}
