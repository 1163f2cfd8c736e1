//! Funkstelle – Einstiegspunkt
//!
//! Wertet die Kommandozeile aus, laedt die Konfiguration, initialisiert das
//! Logging und startet den Server oder sendet `stop`.

use anyhow::Result;
use clap::Parser;
use funkstelle_observability::logging_initialisieren;
use funkstelle_server::cli::{Befehl, Cli, LaufArgumente};
use funkstelle_server::config::{Einstellungen, STANDARD_KANAL};
use funkstelle_server::{bei_strg_c_abbrechen, stop_senden, Server};

fn main() -> Result<()> {
    match Cli::parse().befehl() {
        Befehl::Run(argumente) => laufen(argumente),
        Befehl::Stop { kanal } => stoppen(kanal.as_deref().unwrap_or(STANDARD_KANAL)),
    }
}

fn laufen(argumente: LaufArgumente) -> Result<()> {
    let einstellungen = Einstellungen::aufloesen(&argumente)?;

    logging_initialisieren(&einstellungen.log_level, einstellungen.log_format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?argumente.config,
        port = einstellungen.transport.port,
        tls_port = ?einstellungen.transport.tls_port,
        "Funkstelle wird initialisiert"
    );

    let gebunden = Server::neu(einstellungen)?.binden()?;
    bei_strg_c_abbrechen(gebunden.exit_signal())?;
    gebunden.ausfuehren()
}

fn stoppen(kanal: &str) -> Result<()> {
    if stop_senden(kanal)? {
        println!("Stop an '{kanal}' gesendet");
    } else {
        println!("Kein laufender Server auf Kanal '{kanal}'");
    }
    Ok(())
}
