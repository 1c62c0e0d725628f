//! # Twin Uplink Client
//!
//! Posts a single reading to a tracker's device twin endpoint over mutual TLS.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Certificate, Client, Identity, StatusCode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use super::router::TrackerCredential;
use crate::config::UploaderConfig;
use crate::error::{BrickError, Result};

/// Delivery of one payload to the remote twin endpoint
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TwinUplink: Send + Sync {
    /// Succeeds only on an HTTP 200 from the endpoint
    async fn submit(&self, credential: &TrackerCredential, payload: Bytes) -> Result<()>;
}

/// reqwest/rustls uplink with one client per tracker identity
pub struct HttpsUplink {
    ca_cert: Option<PathBuf>,
    timeout: Duration,
    clients: Mutex<HashMap<String, Client>>,
}

impl std::fmt::Debug for HttpsUplink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpsUplink")
            .field("ca_cert", &self.ca_cert)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| BrickError::Identity {
        path: path.to_path_buf(),
        source,
    })
}

impl HttpsUplink {
    /// # Arguments
    ///
    /// * `ca_cert` - Root CA for the endpoint; `None` uses the bundled web PKI roots
    /// * `timeout` - Bound on the whole request, connect included
    pub fn new(ca_cert: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            ca_cert,
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &UploaderConfig) -> Self {
        let ca_cert = config
            .ca_cert
            .as_ref()
            .map(|name| Path::new(&config.cert_dir).join(name));
        Self::new(ca_cert, config.upload_timeout())
    }

    /// Cached client for the credential, built on first use
    ///
    /// Failures are not cached, so a certificate installed later is picked
    /// up on the next cycle.
    fn client_for(&self, credential: &TrackerCredential) -> Result<Client> {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = clients.get(&credential.device_id) {
            return Ok(client.clone());
        }
        let client = self.build_client(credential)?;
        clients.insert(credential.device_id.clone(), client.clone());
        Ok(client)
    }

    fn build_client(&self, credential: &TrackerCredential) -> Result<Client> {
        let mut pem = read_pem(&credential.client_cert)?;
        pem.push(b'\n');
        pem.extend(read_pem(&credential.client_key)?);
        let identity = Identity::from_pem(&pem)?;

        let mut builder = Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .timeout(self.timeout);

        if let Some(ca_path) = &self.ca_cert {
            let ca = Certificate::from_pem(&read_pem(ca_path)?)?;
            builder = builder.add_root_certificate(ca);
        }

        debug!(device = %credential.device_id, "Built uplink client");
        Ok(builder.build()?)
    }
}

#[async_trait]
impl TwinUplink for HttpsUplink {
    async fn submit(&self, credential: &TrackerCredential, payload: Bytes) -> Result<()> {
        let client = self.client_for(credential)?;
        let response = client
            .post(credential.endpoint.clone())
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(BrickError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
