//! Server-Konfiguration
//!
//! Die wirksamen [`Einstellungen`] entstehen in drei Schichten:
//! Standardwerte, dann Kommandozeile, dann die optionale TOML-Datei.
//! Jedes Feld, das die Datei setzt, ueberschreibt den Kommandozeilenwert.
//!
//! ```toml
//! [netzwerk]
//! bind_adresse = "0.0.0.0"
//! port = 8888
//! tls_port = 8443
//!
//! [tls]
//! zertifikat = "cert.pem"
//! schluessel = "key.pem"
//! dh_parameter = "dh.pem"
//!
//! [ice]
//! deskriptor = "turn:turn.example.org:3478 nutzer:geheim"
//!
//! [keepalive]
//! ping_intervall_s = 5
//! pong_timeout_s = 15
//!
//! [logging]
//! level = "info"
//! format = "text"
//!
//! [steuerung]
//! kanal = "funkstelle"
//! ```

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use funkstelle_core::IceKonfig;
use funkstelle_observability::{log_level_normalisieren, LogFormat};
use funkstelle_transport::TransportKonfig;
use serde::Deserialize;

use crate::cli::LaufArgumente;

/// Standardname des Steuerkanals
pub const STANDARD_KANAL: &str = "funkstelle";

// ---------------------------------------------------------------------------
// Wirksame Einstellungen
// ---------------------------------------------------------------------------

/// Aufgeloeste Konfiguration, mit der der Server startet
#[derive(Debug, Clone)]
pub struct Einstellungen {
    pub transport: TransportKonfig,
    pub ice: IceKonfig,
    /// Normalisierter Level-Name
    pub log_level: String,
    pub log_format: LogFormat,
    pub kanal: String,
}

impl Default for Einstellungen {
    fn default() -> Self {
        Self {
            transport: TransportKonfig::default(),
            ice: IceKonfig::default(),
            log_level: "info".into(),
            log_format: LogFormat::Text,
            kanal: STANDARD_KANAL.into(),
        }
    }
}

impl Einstellungen {
    /// Baut die Einstellungen aus Kommandozeile und optionaler Datei
    ///
    /// Die Datei wird aus `--config` gelesen, falls angegeben.
    pub fn aufloesen(argumente: &LaufArgumente) -> anyhow::Result<Self> {
        let mut einstellungen = Self::default();
        einstellungen.kommandozeile_anwenden(argumente)?;

        if let Some(pfad) = &argumente.config {
            KonfigDatei::laden(pfad)?.anwenden(&mut einstellungen)?;
        }

        Ok(einstellungen)
    }

    fn kommandozeile_anwenden(&mut self, argumente: &LaufArgumente) -> anyhow::Result<()> {
        if let Some(port) = argumente.port {
            self.transport.port = port;
        }
        if let Some(port) = argumente.tls_port {
            self.transport.tls_port = tls_port(port);
        }
        if let Some(level) = &argumente.log_level {
            self.log_level = level_pruefen(level)?;
        }
        if let Some(deskriptor) = &argumente.ice {
            self.ice = IceKonfig::aus_deskriptor(deskriptor)
                .context("Ungueltiger Wert fuer --ice")?;
        }
        if let Some(kanal) = &argumente.kanal {
            self.kanal = kanal_pruefen(kanal)?;
        }
        Ok(())
    }
}

/// TLS-Port 0 bedeutet: kein TLS-Listener
fn tls_port(port: u16) -> Option<u16> {
    (port != 0).then_some(port)
}

fn level_pruefen(level: &str) -> anyhow::Result<String> {
    Ok(log_level_normalisieren(level)?.to_string())
}

fn kanal_pruefen(kanal: &str) -> anyhow::Result<String> {
    if kanal.is_empty() || kanal.contains(['/', '\\']) {
        bail!("Ungueltiger Kanalname '{kanal}': darf nicht leer sein und keine Pfadtrenner enthalten");
    }
    Ok(kanal.to_string())
}

fn sekunden(wert: u64, feld: &str) -> anyhow::Result<Duration> {
    if wert == 0 {
        bail!("keepalive.{feld} muss groesser als 0 sein");
    }
    Ok(Duration::from_secs(wert))
}

// ---------------------------------------------------------------------------
// TOML-Dokument
// ---------------------------------------------------------------------------

/// Inhalt der Konfigurationsdatei; fehlende Felder lassen den Wert unveraendert
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KonfigDatei {
    pub netzwerk: NetzwerkAbschnitt,
    pub tls: TlsAbschnitt,
    pub ice: IceAbschnitt,
    pub keepalive: KeepaliveAbschnitt,
    pub logging: LoggingAbschnitt,
    pub steuerung: SteuerungAbschnitt,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetzwerkAbschnitt {
    pub bind_adresse: Option<String>,
    pub port: Option<u16>,
    /// 0 deaktiviert TLS
    pub tls_port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TlsAbschnitt {
    pub zertifikat: Option<PathBuf>,
    pub schluessel: Option<PathBuf>,
    /// Leerer Pfad ueberspringt die DH-Pruefung
    pub dh_parameter: Option<PathBuf>,
}

/// Entweder `deskriptor` oder die Einzelfelder
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IceAbschnitt {
    pub deskriptor: Option<String>,
    pub uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeepaliveAbschnitt {
    pub ping_intervall_s: Option<u64>,
    pub pong_timeout_s: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingAbschnitt {
    pub level: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SteuerungAbschnitt {
    pub kanal: Option<String>,
}

impl KonfigDatei {
    /// Laedt die Konfiguration aus einer TOML-Datei
    pub fn laden(pfad: &Path) -> anyhow::Result<Self> {
        let inhalt = std::fs::read_to_string(pfad)
            .with_context(|| format!("Konfigurationsdatei '{}' nicht lesbar", pfad.display()))?;
        Self::aus_toml(&inhalt)
            .with_context(|| format!("Konfigurationsfehler in '{}'", pfad.display()))
    }

    pub fn aus_toml(inhalt: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(inhalt)?)
    }

    /// Ueberschreibt alle Felder, die die Datei setzt
    pub fn anwenden(self, einstellungen: &mut Einstellungen) -> anyhow::Result<()> {
        let transport = &mut einstellungen.transport;

        // [netzwerk]
        if let Some(adresse) = self.netzwerk.bind_adresse {
            transport.bind_adresse = adresse
                .parse::<IpAddr>()
                .with_context(|| format!("Ungueltige bind_adresse '{adresse}'"))?;
        }
        if let Some(port) = self.netzwerk.port {
            transport.port = port;
        }
        if let Some(port) = self.netzwerk.tls_port {
            transport.tls_port = tls_port(port);
        }

        // [tls]
        if let Some(pfad) = self.tls.zertifikat {
            transport.tls.zertifikat = pfad;
        }
        if let Some(pfad) = self.tls.schluessel {
            transport.tls.schluessel = pfad;
        }
        if let Some(pfad) = self.tls.dh_parameter {
            transport.tls.dh_parameter = (!pfad.as_os_str().is_empty()).then_some(pfad);
        }

        // [keepalive]
        if let Some(s) = self.keepalive.ping_intervall_s {
            transport.ping_intervall = sekunden(s, "ping_intervall_s")?;
        }
        if let Some(s) = self.keepalive.pong_timeout_s {
            transport.pong_timeout = sekunden(s, "pong_timeout_s")?;
        }

        // [ice]
        self.ice.anwenden(&mut einstellungen.ice)?;

        // [logging]
        if let Some(level) = self.logging.level {
            einstellungen.log_level = level_pruefen(&level)?;
        }
        if let Some(format) = self.logging.format {
            einstellungen.log_format = format.parse()?;
        }

        // [steuerung]
        if let Some(kanal) = self.steuerung.kanal {
            einstellungen.kanal = kanal_pruefen(&kanal)?;
        }

        Ok(())
    }
}

impl IceAbschnitt {
    fn anwenden(self, ice: &mut IceKonfig) -> anyhow::Result<()> {
        let einzelfelder = self.uri.is_some() || self.username.is_some() || self.password.is_some();

        if let Some(deskriptor) = self.deskriptor {
            if einzelfelder {
                bail!("[ice]: deskriptor und uri/username/password schliessen sich aus");
            }
            *ice = IceKonfig::aus_deskriptor(&deskriptor)?;
            return Ok(());
        }

        if let Some(uri) = self.uri {
            ice.uri = uri;
        }
        if let Some(username) = self.username {
            ice.username = username;
        }
        if let Some(password) = self.password {
            ice.password = password;
        }
        Ok(())
    }
}
