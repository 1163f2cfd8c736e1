//! Kommandozeile
//!
//! `funkstelle [run] [OPTIONEN]` startet den Server, `funkstelle stop`
//! postet "stop" an einen laufenden Server auf demselben Host.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "funkstelle", version, about = "WebRTC-Signaling-Server")]
pub struct Cli {
    #[command(subcommand)]
    pub befehl: Option<Befehl>,

    /// Optionen fuer `run`, wenn kein Unterbefehl angegeben ist
    #[command(flatten)]
    pub lauf: LaufArgumente,
}

#[derive(Debug, Subcommand)]
pub enum Befehl {
    /// Server starten (Standard)
    Run(LaufArgumente),
    /// Laufenden Server beenden
    Stop {
        /// Name des Steuerkanals
        #[arg(long)]
        kanal: Option<String>,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct LaufArgumente {
    /// Port des ws://-Listeners
    #[arg(long)]
    pub port: Option<u16>,

    /// Port des wss://-Listeners (0 deaktiviert TLS)
    #[arg(long)]
    pub tls_port: Option<u16>,

    /// Log-Level: trace, debug, info, warn, error oder 0-5
    #[arg(long)]
    pub log_level: Option<String>,

    /// ICE-Server: "turn:<uri> [<username>:<password>]"
    #[arg(long)]
    pub ice: Option<String>,

    /// TOML-Konfiguration; gesetzte Felder ueberschreiben die Kommandozeile
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Name des Steuerkanals fuer `stop`
    #[arg(long)]
    pub kanal: Option<String>,
}

impl Cli {
    /// Ohne Unterbefehl gelten die Top-Level-Optionen als `run`
    pub fn befehl(self) -> Befehl {
        self.befehl.unwrap_or(Befehl::Run(self.lauf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsen(argumente: &[&str]) -> Befehl {
        Cli::try_parse_from(argumente).unwrap().befehl()
    }

    #[test]
    fn ohne_unterbefehl_ist_run() {
        match parsen(&["funkstelle", "--port", "9000", "--log-level", "1"]) {
            Befehl::Run(lauf) => {
                assert_eq!(lauf.port, Some(9000));
                assert_eq!(lauf.log_level.as_deref(), Some("1"));
                assert!(lauf.tls_port.is_none());
            }
            andere => panic!("Erwartet run, erhalten {andere:?}"),
        }
    }

    #[test]
    fn run_mit_optionen() {
        match parsen(&[
            "funkstelle",
            "run",
            "--tls-port",
            "8443",
            "--ice",
            "turn:t.example.org:3478 a:b",
            "--config",
            "/etc/funkstelle.toml",
        ]) {
            Befehl::Run(lauf) => {
                assert_eq!(lauf.tls_port, Some(8443));
                assert_eq!(lauf.ice.as_deref(), Some("turn:t.example.org:3478 a:b"));
                assert_eq!(lauf.config, Some(PathBuf::from("/etc/funkstelle.toml")));
            }
            andere => panic!("Erwartet run, erhalten {andere:?}"),
        }
    }

    #[test]
    fn stop_mit_kanal() {
        match parsen(&["funkstelle", "stop", "--kanal", "test"]) {
            Befehl::Stop { kanal } => assert_eq!(kanal.as_deref(), Some("test")),
            andere => panic!("Erwartet stop, erhalten {andere:?}"),
        }
    }

    #[test]
    fn ungueltiger_port() {
        assert!(Cli::try_parse_from(["funkstelle", "--port", "70000"]).is_err());
    }
}
