//! HTTP-Handshake vor dem WebSocket-Betrieb
//!
//! Der Kopf der HTTP-Anfrage wird mit httparse gelesen. Upgrade-Anfragen
//! bekommen `101 Switching Protocols`, alle anderen ein schlichtes `200 OK`
//! mit Textkoerper, danach wird die Verbindung geschlossen. Upgrades mit
//! einer anderen Version als 13 bekommen `426 Upgrade Required`.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;

/// Maximale Groesse des HTTP-Kopfs
pub const MAX_KOPF_BYTES: usize = 8 * 1024;

/// Koerper der Antwort auf gewoehnliche HTTP-Anfragen
pub const HTTP_KOERPER: &str = "funkstelle signaling server\n";

/// Ausgang des Handshakes
#[derive(Debug, PartialEq, Eq)]
pub enum HandshakeErgebnis {
    /// 101 gesendet; `rest` sind bereits gelesene Bytes nach dem Kopf
    WebSocket { rest: Vec<u8> },
    /// 200 gesendet, Verbindung ist fertig
    HttpBeantwortet,
    /// Upgrade mit falscher `Sec-WebSocket-Version`, 426 gesendet
    VersionAbgelehnt,
}

/// Maximale Anzahl Kopfzeilen
const MAX_KOPFZEILEN: usize = 64;

/// Einzige unterstuetzte Protokollversion (RFC 6455)
const WS_VERSION: &str = "13";

/// Die fuer die Entscheidung 101/200 relevanten Teile des Kopfs
#[derive(Debug, Default)]
struct AnfrageKopf {
    methode: String,
    pfad: String,
    upgrade_websocket: bool,
    schluessel: Option<String>,
    version: Option<String>,
}

impl AnfrageKopf {
    fn aus_anfrage(anfrage: &httparse::Request<'_, '_>) -> Self {
        let zeilen: &[httparse::Header<'_>] = &*anfrage.headers;
        let methode = anfrage.method.unwrap_or_default();

        let upgrade = kopfwerte(zeilen, "upgrade")
            .iter()
            .any(|w| w.eq_ignore_ascii_case("websocket"));
        let connection_upgrade = kopfwerte(zeilen, "connection")
            .iter()
            .flat_map(|w| w.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case("upgrade"));

        Self {
            methode: methode.to_string(),
            pfad: anfrage.path.unwrap_or_default().to_string(),
            upgrade_websocket: upgrade && connection_upgrade && methode == "GET",
            schluessel: kopfwerte(zeilen, "sec-websocket-key").first().map(|w| w.to_string()),
            version: kopfwerte(zeilen, "sec-websocket-version").first().map(|w| w.to_string()),
        }
    }
}

/// Alle Werte einer Kopfzeile, ohne Ruecksicht auf Gross-/Kleinschreibung
fn kopfwerte<'a>(zeilen: &'a [httparse::Header<'a>], name: &str) -> Vec<&'a str> {
    zeilen
        .iter()
        .filter(|z| z.name.eq_ignore_ascii_case(name))
        .filter_map(|z| std::str::from_utf8(z.value).ok())
        .map(str::trim)
        .collect()
}

/// Fuehrt den Handshake auf einem frisch angenommenen Stream aus
pub async fn handshake_ausfuehren<S>(stream: &mut S) -> io::Result<HandshakeErgebnis>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (kopf, rest) = kopf_lesen(stream).await?;

    let Some(schluessel) = kopf.schluessel.as_deref().filter(|_| kopf.upgrade_websocket) else {
        return http_beantworten(stream, &kopf).await;
    };

    if kopf.version.as_deref() != Some(WS_VERSION) {
        let antwort = format!(
            "HTTP/1.1 426 Upgrade Required\r\n\
             Sec-WebSocket-Version: {WS_VERSION}\r\n\
             Content-Length: 0\r\n\
             Connection: close\r\n\r\n"
        );
        stream.write_all(antwort.as_bytes()).await?;
        stream.flush().await?;
        let _ = stream.shutdown().await;
        tracing::debug!(version = ?kopf.version, "WebSocket-Version abgelehnt");
        return Ok(HandshakeErgebnis::VersionAbgelehnt);
    }

    let antwort = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        derive_accept_key(schluessel.as_bytes())
    );
    stream.write_all(antwort.as_bytes()).await?;
    stream.flush().await?;
    tracing::trace!(pfad = %kopf.pfad, "WebSocket-Upgrade akzeptiert");
    Ok(HandshakeErgebnis::WebSocket { rest })
}

async fn http_beantworten<S>(stream: &mut S, kopf: &AnfrageKopf) -> io::Result<HandshakeErgebnis>
where
    S: AsyncWrite + Unpin,
{
    let antwort = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        HTTP_KOERPER.len(),
        HTTP_KOERPER
    );
    stream.write_all(antwort.as_bytes()).await?;
    stream.flush().await?;
    let _ = stream.shutdown().await;
    tracing::debug!(methode = %kopf.methode, pfad = %kopf.pfad, "HTTP-Anfrage beantwortet");
    Ok(HandshakeErgebnis::HttpBeantwortet)
}

/// Liest, bis httparse einen vollstaendigen Kopf erkennt
///
/// Gibt den Kopf und bereits gelesene Folgebytes zurueck.
async fn kopf_lesen<S>(stream: &mut S) -> io::Result<(AnfrageKopf, Vec<u8>)>
where
    S: AsyncRead + Unpin,
{
    let mut puffer = Vec::with_capacity(1024);
    let mut block = [0u8; 1024];
    loop {
        let n = stream.read(&mut block).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Verbindung vor Ende des HTTP-Kopfs geschlossen",
            ));
        }
        puffer.extend_from_slice(&block[..n]);

        if let Some((kopf, laenge)) = kopf_parsen(&puffer)? {
            let rest = puffer.split_off(laenge);
            return Ok((kopf, rest));
        }
        if puffer.len() > MAX_KOPF_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "HTTP-Kopf zu gross",
            ));
        }
    }
}

/// `None` solange der Kopf unvollstaendig ist
fn kopf_parsen(bytes: &[u8]) -> io::Result<Option<(AnfrageKopf, usize)>> {
    let mut zeilen = [httparse::EMPTY_HEADER; MAX_KOPFZEILEN];
    let mut anfrage = httparse::Request::new(&mut zeilen);
    match anfrage.parse(bytes) {
        Ok(httparse::Status::Complete(laenge)) => {
            Ok(Some((AnfrageKopf::aus_anfrage(&anfrage), laenge)))
        }
        Ok(httparse::Status::Partial) => Ok(None),
        Err(e) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Ungueltiger HTTP-Kopf: {e}"),
        )),
    }
}
