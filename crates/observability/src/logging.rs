//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `FS_LOG_LEVEL`: Filter (Level-Name, Zahl 0-5 oder EnvFilter-Direktive),
//!   ueberschreibt die Konfiguration
//! - `FS_LOG_FORMAT`: Format (text/json), ueberschreibt die Konfiguration
//!
//! Numerische Level: 0 trace, 1 debug, 2 info, 3 warn, 4 und 5 error.

use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer den Filter
pub const ENV_LOG_LEVEL: &str = "FS_LOG_LEVEL";
/// Umgebungsvariable fuer das Format
pub const ENV_LOG_FORMAT: &str = "FS_LOG_FORMAT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoggingFehler {
    #[error("Ungueltiges Log-Level '{0}' (erlaubt: trace, debug, info, warn, error, 0-5)")]
    UngueltigesLevel(String),

    #[error("Ungueltiges Log-Format '{0}' (erlaubt: text, json)")]
    UngueltigesFormat(String),
}

/// Ausgabeformat der Logzeilen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = LoggingFehler;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            andere => Err(LoggingFehler::UngueltigesFormat(andere.to_string())),
        }
    }
}

/// Normalisiert ein Level auf seinen Namen
///
/// Akzeptiert Namen und die Zahlen 0 bis 5.
pub fn log_level_normalisieren(level: &str) -> Result<&'static str, LoggingFehler> {
    match level.trim() {
        "trace" | "0" => Ok("trace"),
        "debug" | "1" => Ok("debug"),
        "info" | "2" => Ok("info"),
        "warn" | "3" => Ok("warn"),
        "error" | "4" | "5" => Ok("error"),
        andere => Err(LoggingFehler::UngueltigesLevel(andere.to_string())),
    }
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    format.parse::<LogFormat>().is_ok()
}

/// Baut den Filter; ein gesetztes `FS_LOG_LEVEL` hat Vorrang
///
/// Level-Namen und Zahlen werden normalisiert, alles andere geht als
/// EnvFilter-Direktive durch (z.B. `funkstelle_transport=trace,info`).
fn filter_bauen(aus_env: Option<String>, konfiguriert: &str) -> EnvFilter {
    let roh = aus_env.unwrap_or_else(|| konfiguriert.to_string());
    let direktive = log_level_normalisieren(&roh).map(str::to_string).unwrap_or(roh);
    EnvFilter::try_new(&direktive).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn format_waehlen(aus_env: Option<String>, konfiguriert: LogFormat) -> LogFormat {
    aus_env
        .and_then(|f| f.parse().ok())
        .unwrap_or(konfiguriert)
}

/// Initialisiert das Logging-System.
///
/// Gibt `false` zurueck, wenn bereits ein globaler Subscriber installiert
/// war (z.B. in Tests); der bestehende bleibt dann aktiv.
pub fn logging_initialisieren(level: &str, format: LogFormat) -> bool {
    let filter = filter_bauen(std::env::var(ENV_LOG_LEVEL).ok(), level);

    match format_waehlen(std::env::var(ENV_LOG_FORMAT).ok(), format) {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init()
            .is_ok(),
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .try_init()
            .is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_namen_und_zahlen() {
        assert_eq!(log_level_normalisieren("trace"), Ok("trace"));
        assert_eq!(log_level_normalisieren("0"), Ok("trace"));
        assert_eq!(log_level_normalisieren("2"), Ok("info"));
        assert_eq!(log_level_normalisieren(" warn "), Ok("warn"));
        assert_eq!(log_level_normalisieren("4"), Ok("error"));
        assert_eq!(log_level_normalisieren("5"), Ok("error"));
    }

    #[test]
    fn ungueltige_level() {
        for level in ["verbose", "INFO", "", "6", "-1"] {
            assert!(
                matches!(log_level_normalisieren(level), Err(LoggingFehler::UngueltigesLevel(_))),
                "{level:?}"
            );
        }
    }

    #[test]
    fn formate() {
        assert!(log_format_gueltig("text"));
        assert!(log_format_gueltig("json"));
        assert!(!log_format_gueltig("xml"));
        assert!(!log_format_gueltig("JSON")); // Gross-/Kleinschreibung
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
    }

    #[test]
    fn umgebung_hat_vorrang() {
        assert_eq!(format_waehlen(Some("json".into()), LogFormat::Text), LogFormat::Json);
        // Unbrauchbarer Wert aus der Umgebung faellt auf die Konfiguration zurueck
        assert_eq!(format_waehlen(Some("xml".into()), LogFormat::Json), LogFormat::Json);
        assert_eq!(format_waehlen(None, LogFormat::Text), LogFormat::Text);

        assert_eq!(filter_bauen(Some("1".into()), "error").to_string(), "debug");
        assert_eq!(filter_bauen(None, "3").to_string(), "warn");
    }

    #[test]
    fn direktiven_werden_durchgereicht() {
        let filter = filter_bauen(None, "funkstelle_transport=trace");
        assert_eq!(filter.to_string(), "funkstelle_transport=trace");
    }
}
