//! TLS-Material laden und Server-Konfiguration bauen
//!
//! Zertifikatskette, privater Schluessel und DH-Parameter kommen aus
//! PEM-Dateien. Die Cipher-Policy entspricht dem "intermediate"-Profil:
//! TLS 1.2 und 1.3, nur ECDHE mit AEAD-Chiffren.
//!
//! rustls verhandelt kein klassisches DHE. Die DH-Parameter werden deshalb
//! nur auf Lesbarkeit geprueft und nicht angewendet.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use rustls_pemfile::{certs, private_key};
use tokio_rustls::TlsAcceptor;

use crate::error::{TransportFehler, TransportResult};

const DH_MARKIERUNG: &str = "-----BEGIN DH PARAMETERS-----";

/// Pfade des TLS-Materials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsDateien {
    pub zertifikat: PathBuf,
    pub schluessel: PathBuf,
    /// `None` ueberspringt die Pruefung der DH-Parameter
    pub dh_parameter: Option<PathBuf>,
}

impl Default for TlsDateien {
    fn default() -> Self {
        Self {
            zertifikat: PathBuf::from("cert.pem"),
            schluessel: PathBuf::from("key.pem"),
            dh_parameter: Some(PathBuf::from("dh.pem")),
        }
    }
}

/// Crypto-Provider mit den Suites des "intermediate"-Profils
pub fn intermediate_provider() -> CryptoProvider {
    use ring::cipher_suite as cs;
    CryptoProvider {
        cipher_suites: vec![
            cs::TLS13_AES_128_GCM_SHA256,
            cs::TLS13_AES_256_GCM_SHA384,
            cs::TLS13_CHACHA20_POLY1305_SHA256,
            cs::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            cs::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            cs::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
            cs::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            cs::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
            cs::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
        ],
        ..ring::default_provider()
    }
}

/// Baut die Server-Konfiguration aus PEM-Inhalten
pub fn server_konfig_aus_pem(
    zertifikat_pem: &[u8],
    schluessel_pem: &[u8],
) -> TransportResult<ServerConfig> {
    let kette = zertifikate_parsen(zertifikat_pem)?;
    let schluessel = schluessel_parsen(schluessel_pem)?;

    let mut konfig = ServerConfig::builder_with_provider(Arc::new(intermediate_provider()))
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(|e| TransportFehler::TlsKonfig(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(kette, schluessel)
        .map_err(|e| TransportFehler::TlsKonfig(e.to_string()))?;
    konfig.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(konfig)
}

/// Laedt das TLS-Material von der Platte und erstellt den Acceptor
///
/// Jeder Fehler hier ist ein Startfehler.
pub fn acceptor_laden(dateien: &TlsDateien) -> TransportResult<TlsAcceptor> {
    let zertifikat_pem = datei_lesen(&dateien.zertifikat)?;
    let schluessel_pem = datei_lesen(&dateien.schluessel)?;

    if let Some(dh) = &dateien.dh_parameter {
        dh_parameter_pruefen(dh)?;
        tracing::info!(
            pfad = %dh.display(),
            "DH-Parameter geprueft, Schluesselaustausch erfolgt per ECDHE"
        );
    }

    let konfig = server_konfig_aus_pem(&zertifikat_pem, &schluessel_pem).map_err(|e| match e {
        TransportFehler::TlsMaterial { grund, .. } => {
            TransportFehler::tls_material(dateien.zertifikat.display(), grund)
        }
        andere => andere,
    })?;

    tracing::debug!(
        zertifikat = %dateien.zertifikat.display(),
        schluessel = %dateien.schluessel.display(),
        "TLS-Konfiguration geladen"
    );
    Ok(TlsAcceptor::from(Arc::new(konfig)))
}

fn datei_lesen(pfad: &Path) -> TransportResult<Vec<u8>> {
    std::fs::read(pfad).map_err(|e| TransportFehler::tls_material(pfad.display(), e.to_string()))
}

fn dh_parameter_pruefen(pfad: &Path) -> TransportResult<()> {
    let inhalt = datei_lesen(pfad)?;
    if String::from_utf8_lossy(&inhalt).contains(DH_MARKIERUNG) {
        Ok(())
    } else {
        Err(TransportFehler::tls_material(
            pfad.display(),
            "keine DH-Parameter im PEM gefunden",
        ))
    }
}

fn zertifikate_parsen(pem: &[u8]) -> TransportResult<Vec<CertificateDer<'static>>> {
    let mut cursor = std::io::Cursor::new(pem);
    let kette = certs(&mut cursor)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TransportFehler::tls_material("<zertifikat>", format!("Parsing fehlgeschlagen: {e}")))?;
    if kette.is_empty() {
        return Err(TransportFehler::tls_material(
            "<zertifikat>",
            "kein Zertifikat gefunden",
        ));
    }
    Ok(kette)
}

fn schluessel_parsen(pem: &[u8]) -> TransportResult<PrivateKeyDer<'static>> {
    let mut cursor = std::io::Cursor::new(pem);
    private_key(&mut cursor)
        .map_err(|e| TransportFehler::tls_material("<schluessel>", format!("Parsing fehlgeschlagen: {e}")))?
        .ok_or_else(|| TransportFehler::tls_material("<schluessel>", "kein privater Schluessel gefunden"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
