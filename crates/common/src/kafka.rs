//! Broker connection settings shared by the consumer and the publishers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rdkafka::config::ClientConfig;
use thiserror::Error;

/// Errors raised while loading a TLS identity.
#[derive(Debug, Error)]
pub enum TlsError {
    /// A required PEM file does not exist or is not a regular file.
    #[error("TLS {role} file not found: {}", .path.display())]
    MissingFile { role: &'static str, path: PathBuf },

    /// A required path variable was not set.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Client identity for mutually authenticated broker connections.
///
/// Loaded once by the composition root and shared through an [`Arc`] with
/// every component that opens a broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsIdentity {
    ca_location: PathBuf,
    certificate_location: PathBuf,
    key_location: PathBuf,
}

impl TlsIdentity {
    /// Validates that all three PEM files exist and builds the identity.
    pub fn load(
        ca_location: impl Into<PathBuf>,
        certificate_location: impl Into<PathBuf>,
        key_location: impl Into<PathBuf>,
    ) -> Result<Self, TlsError> {
        let identity = Self {
            ca_location: ca_location.into(),
            certificate_location: certificate_location.into(),
            key_location: key_location.into(),
        };

        ensure_file("CA", &identity.ca_location)?;
        ensure_file("certificate", &identity.certificate_location)?;
        ensure_file("key", &identity.key_location)?;

        Ok(identity)
    }

    pub fn ca_location(&self) -> &Path {
        &self.ca_location
    }

    pub fn certificate_location(&self) -> &Path {
        &self.certificate_location
    }

    pub fn key_location(&self) -> &Path {
        &self.key_location
    }

    /// Writes the SSL properties of this identity into a client config.
    pub fn apply(&self, config: &mut ClientConfig) {
        config
            .set("security.protocol", "ssl")
            .set("ssl.ca.location", self.ca_location.to_string_lossy())
            .set(
                "ssl.certificate.location",
                self.certificate_location.to_string_lossy(),
            )
            .set("ssl.key.location", self.key_location.to_string_lossy());
    }
}

fn ensure_file(role: &'static str, path: &Path) -> Result<(), TlsError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(TlsError::MissingFile {
            role,
            path: path.to_path_buf(),
        })
    }
}

/// Bootstrap servers plus the optional TLS identity.
#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub brokers: String,
    pub tls: Option<Arc<TlsIdentity>>,
}

impl KafkaSettings {
    /// Creates plaintext settings for the given bootstrap servers.
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            tls: None,
        }
    }

    /// Enables mutual TLS with the given identity.
    #[must_use]
    pub fn with_tls(mut self, identity: Arc<TlsIdentity>) -> Self {
        self.tls = Some(identity);
        self
    }

    /// Builds the base client config every consumer and producer starts from.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", &self.brokers);
        if let Some(identity) = &self.tls {
            identity.apply(&mut config);
        }
        config
    }
}
