//! Network reachability fallback using the system `ping`.
//!
//! Public domains are monitored over HTTP only; hosts that look like one
//! are reported unreachable without sending anything.

use std::process::Stdio;
use std::time::Duration;

use fleet_core::config::ProbeConfig;
use tokio::process::Command;
use tracing::debug;

use crate::address::{host_of, normalize};
use crate::checker::{Probe, ProbeFuture};

/// Extra time the ping process gets past its own deadline before it is killed.
const PING_GRACE: Duration = Duration::from_secs(1);

/// Single-packet ping probe.
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    deadline: Duration,
    external_domains: Vec<String>,
}

impl ReachabilityProbe {
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            external_domains: ProbeConfig::default().external_domains,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.ping_timeout()).with_external_domains(&config.external_domains)
    }

    pub fn with_external_domains(mut self, domains: &[String]) -> Self {
        self.external_domains = domains.iter().map(|d| d.to_ascii_lowercase()).collect();
        self
    }

    /// Whether `host` looks like a public domain that must not be pinged.
    pub fn is_external(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.external_domains.iter().any(|d| host.contains(d.as_str()))
    }

    /// `true` iff the host answered one echo request within the deadline.
    pub async fn check(&self, address: &str) -> bool {
        let host = host_of(normalize(address));
        if host.is_empty() {
            return false;
        }
        if self.is_external(host) {
            debug!(%host, "ping skipped for public domain");
            return false;
        }
        // A leading dash would be parsed by ping as an option.
        if host.starts_with('-') {
            debug!(%host, "ping skipped for flag-like host");
            return false;
        }
        ping_host(host, self.deadline).await
    }
}

impl Probe for ReachabilityProbe {
    fn probe<'a>(&'a self, address: &'a str) -> ProbeFuture<'a> {
        Box::pin(self.check(address))
    }
}

/// Run the platform ping once against `host`.
pub async fn ping_host(host: &str, deadline: Duration) -> bool {
    let mut cmd = ping_command(host, deadline);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            debug!(error = %e, %host, "ping could not be started");
            return false;
        }
    };

    match tokio::time::timeout(deadline + PING_GRACE, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(%host, code = ?status.code(), "ping finished");
            status.success()
        }
        Ok(Err(e)) => {
            debug!(error = %e, %host, "ping wait failed");
            false
        }
        Err(_) => {
            debug!(%host, "ping overran its deadline, killed");
            false
        }
    }
}

#[cfg(windows)]
fn ping_command(host: &str, deadline: Duration) -> Command {
    let mut cmd = Command::new("ping");
    cmd.arg("-n")
        .arg("1")
        .arg("-w")
        .arg(deadline.as_millis().max(1).to_string())
        .arg(host);
    cmd
}

#[cfg(target_os = "macos")]
fn ping_command(host: &str, deadline: Duration) -> Command {
    let mut cmd = Command::new("ping");
    cmd.arg("-c")
        .arg("1")
        .arg("-t")
        .arg(deadline.as_secs().max(1).to_string())
        .arg(host);
    cmd
}

#[cfg(not(any(windows, target_os = "macos")))]
fn ping_command(host: &str, deadline: Duration) -> Command {
    let mut cmd = Command::new("ping");
    cmd.arg("-c")
        .arg("1")
        .arg("-W")
        .arg(deadline.as_secs().max(1).to_string())
        .arg(host);
    cmd
}
