//! # Connectivity Probe
//!
//! Decides whether the twin endpoint is reachable before a drain, and
//! restarts the local network stack when it is not.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{invalid, UploaderConfig};
use crate::error::{BrickError, Result};

/// Placeholder in the reset command replaced by the interface name
pub const INTERFACE_PLACEHOLDER: &str = "{interface}";

/// Split a `host:port` string
///
/// # Examples
///
/// ```
/// use riot_brick::uplink::probe::parse_target;
///
/// assert_eq!(parse_target("iot.example.com:8443"), Some(("iot.example.com".to_string(), 8443)));
/// assert_eq!(parse_target("iot.example.com"), None);
/// ```
pub fn parse_target(target: &str) -> Option<(String, u16)> {
    let (host, port) = target.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    if host.is_empty() || port == 0 {
        return None;
    }
    Some((host.to_string(), port))
}

/// Reachability check against a host and port
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Prober: Send + Sync {
    /// Returns true if a connection could be opened within `timeout`
    async fn probe(&self, host: &str, port: u16, timeout: Duration) -> bool;
}

/// Side-effecting recovery of the local network link
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkReset: Send + Sync {
    /// Restart networking for `interface`
    async fn reset(&self, interface: &str) -> Result<()>;
}

/// Probes by opening (and immediately dropping) a TCP connection
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProber;

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, host: &str, port: u16, timeout: Duration) -> bool {
        let attempt = async {
            let addrs = lookup_host((host, port)).await?;
            let mut last_err = None;
            for addr in addrs {
                match TcpStream::connect(addr).await {
                    Ok(_) => return Ok::<(), std::io::Error>(()),
                    Err(e) => last_err = Some(e),
                }
            }
            Err(last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
            }))
        };

        match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!("Probe of {}:{} failed: {}", host, port, e);
                false
            }
            Err(_) => {
                debug!("Probe of {}:{} timed out after {:?}", host, port, timeout);
                false
            }
        }
    }
}

/// Runs an external command (by default a dhcpcd restart)
///
/// The command gets no stdin, so `sudo` fails instead of prompting, and it
/// is killed once `timeout` expires.
#[derive(Debug, Clone)]
pub struct CommandReset {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandReset {
    /// Build from a command line such as `["sudo", "systemctl", "restart", "dhcpcd.service"]`
    ///
    /// Arguments equal to `{interface}` are replaced with the interface name.
    pub fn new(command: &[String], timeout: Duration) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| invalid("reset_command is empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    pub fn from_config(config: &UploaderConfig) -> Result<Self> {
        Self::new(&config.reset_command, config.reset_timeout())
    }
}

#[async_trait]
impl NetworkReset for CommandReset {
    async fn reset(&self, interface: &str) -> Result<()> {
        let args: Vec<&str> = self
            .args
            .iter()
            .map(|a| if a == INTERFACE_PLACEHOLDER { interface } else { a.as_str() })
            .collect();

        info!("Restarting network interface {} ({} {})", interface, self.program, args.join(" "));
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!("Network reset command did not finish within {:?}", self.timeout);
                // the child is killed when dropped on return
                return Err(BrickError::Timeout(self.timeout));
            }
        };
        if !status.success() {
            warn!("Network reset command exited with {}", status);
            return Err(BrickError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("{} exited with {}", self.program, status),
            )));
        }
        Ok(())
    }
}
