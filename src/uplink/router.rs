//! # Credential Router
//!
//! Maps an origin device to the twin endpoint and client identity used to
//! upload its readings. The table is built once at startup and never
//! changes afterwards.

use reqwest::Url;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::probe::parse_target;
use crate::config::{invalid, UploaderConfig};
use crate::error::{BrickError, Result};

/// Prefix of the per-tracker credential environment variables
pub const ENV_PREFIX: &str = "BRICK_";

/// Endpoint and client identity of one tracker's device twin
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerCredential {
    pub device_id: String,
    /// Friendly name from the configuration
    pub name: String,
    pub endpoint: Url,
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
}

impl TrackerCredential {
    /// Host and port the endpoint URL points at
    pub fn endpoint_target(&self) -> Option<(String, u16)> {
        let host = self.endpoint.host_str()?;
        let port = self.endpoint.port_or_known_default()?;
        Some((host.to_string(), port))
    }
}

/// Name of the environment variable holding `setting` for `device_id`
///
/// # Examples
///
/// ```
/// use riot_brick::uplink::router::env_var_name;
///
/// assert_eq!(env_var_name("riot-tracker-1", "CERT"), "BRICK_RIOT_TRACKER_1_CERT");
/// ```
pub fn env_var_name(device_id: &str, setting: &str) -> String {
    let normalised: String = device_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{}{}_{}", ENV_PREFIX, normalised, setting)
}

/// Immutable lookup table from origin device to credential
#[derive(Debug, Clone, Default)]
pub struct CredentialRouter {
    credentials: BTreeMap<String, TrackerCredential>,
    probe_override: Option<(String, u16)>,
}

impl CredentialRouter {
    pub fn new(credentials: impl IntoIterator<Item = TrackerCredential>) -> Self {
        Self {
            credentials: credentials
                .into_iter()
                .map(|c| (c.device_id.clone(), c))
                .collect(),
            probe_override: None,
        }
    }

    /// Probe this target instead of deriving one from the credentials
    pub fn with_probe_target(mut self, host: impl Into<String>, port: u16) -> Self {
        self.probe_override = Some((host.into(), port));
        self
    }

    /// Build the table from `[uploader]` plus process environment
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` if any tracker lacks an endpoint, cert or
    /// key variable. Startup must not continue in that case.
    pub fn from_config(config: &UploaderConfig) -> Result<Self> {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    /// Same as [`CredentialRouter::from_config`] with a custom variable source
    pub fn from_lookup<F>(config: &UploaderConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cert_dir = Path::new(&config.cert_dir);
        let require = |device_id: &str, setting: &str| -> Result<String> {
            let var = env_var_name(device_id, setting);
            match lookup(&var) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => Err(BrickError::MissingCredential(var)),
            }
        };

        let mut credentials = Vec::with_capacity(config.trackers.len());
        for (device_id, entry) in &config.trackers {
            let endpoint = require(device_id, "ENDPOINT")?;
            let endpoint = Url::parse(&endpoint)
                .map_err(|e| invalid(format!("endpoint for {} is not a valid URL: {}", device_id, e)))?;
            if endpoint.host_str().is_none() {
                return Err(invalid(format!("endpoint for {} has no host", device_id)));
            }

            credentials.push(TrackerCredential {
                device_id: device_id.clone(),
                name: entry.name.clone(),
                endpoint,
                client_cert: cert_dir.join(require(device_id, "CERT")?),
                client_key: cert_dir.join(require(device_id, "KEY")?),
            });
        }

        let mut router = Self::new(credentials);
        if let Some(target) = config.probe_target.as_deref().and_then(parse_target) {
            router.probe_override = Some(target);
        }
        Ok(router)
    }

    /// Credential for `origin_device`
    ///
    /// # Errors
    ///
    /// Returns `UnknownDevice` when no entry exists.
    pub fn route(&self, origin_device: &str) -> Result<&TrackerCredential> {
        self.credentials
            .get(origin_device)
            .ok_or_else(|| BrickError::UnknownDevice(origin_device.to_string()))
    }

    /// Well-known endpoint used to decide connectivity
    ///
    /// The configured override wins; otherwise the first tracker (by id)
    /// with a resolvable endpoint host is used.
    pub fn probe_target(&self) -> Option<(String, u16)> {
        if let Some(target) = &self.probe_override {
            return Some(target.clone());
        }
        self.credentials.values().find_map(TrackerCredential::endpoint_target)
    }

    pub fn credentials(&self) -> impl Iterator<Item = &TrackerCredential> {
        self.credentials.values()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn test_credential(device_id: &str, endpoint: &str) -> TrackerCredential {
    TrackerCredential {
        device_id: device_id.to_string(),
        name: device_id.to_string(),
        endpoint: Url::parse(endpoint).unwrap(),
        client_cert: PathBuf::from(format!("certs/{}.cert.pem", device_id)),
        client_key: PathBuf::from(format!("certs/{}.private.key", device_id)),
    }
}
