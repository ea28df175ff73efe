//! Single-device status policy.
//!
//! HTTP is the primary signal: most monitored devices serve a web UI.
//! Ping is only consulted when HTTP fails, to catch headless devices.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use fleet_core::config::ProbeConfig;
use fleet_core::DeviceStatus;
use tracing::debug;

use crate::address::normalize;
use crate::http_probe::HttpProbe;
use crate::reachability::ReachabilityProbe;

/// Boxed future returned by [`Probe::probe`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// A bounded-time reachability signal for one address.
///
/// Implementations receive the trimmed address as the caller gave it and
/// normalize it themselves, exactly once. They never fail: any error is
/// reported as `false`.
pub trait Probe: Send + Sync {
    fn probe<'a>(&'a self, address: &'a str) -> ProbeFuture<'a>;
}

/// Applies the HTTP-then-ping policy to a single device.
#[derive(Clone)]
pub struct StatusChecker {
    pub(crate) http: Arc<dyn Probe>,
    pub(crate) reachability: Arc<dyn Probe>,
}

impl StatusChecker {
    pub fn new(http: Arc<dyn Probe>, reachability: Arc<dyn Probe>) -> Self {
        Self { http, reachability }
    }

    /// Real network probes configured from `[probe]`.
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(
            Arc::new(HttpProbe::from_config(config)),
            Arc::new(ReachabilityProbe::from_config(config)),
        )
    }

    /// `Online` if the device answers HTTP, or failing that, ping.
    pub async fn check(&self, address: &str) -> DeviceStatus {
        let address = address.trim();
        if normalize(address).is_empty() {
            return DeviceStatus::Offline;
        }

        if self.http.probe(address).await {
            debug!(%address, via = "http", "device online");
            return DeviceStatus::Online;
        }
        if self.reachability.probe(address).await {
            debug!(%address, via = "ping", "device online");
            return DeviceStatus::Online;
        }
        debug!(%address, "device offline");
        DeviceStatus::Offline
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Answers `true` for a fixed set of normalized addresses and records
    /// every raw address it is handed.
    #[derive(Default)]
    pub struct FakeProbe {
        reachable: HashSet<String>,
        delay: Duration,
        panic_on: Option<String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeProbe {
        pub fn reaching(addresses: &[&str]) -> Self {
            Self {
                reachable: addresses.iter().map(|a| a.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn panicking_on(mut self, address: &str) -> Self {
            self.panic_on = Some(address.to_string());
            self
        }

        pub fn called_with(&self, address: &str) -> bool {
            self.calls.lock().unwrap().iter().any(|a| a == address)
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Probe for FakeProbe {
        fn probe<'a>(&'a self, address: &'a str) -> ProbeFuture<'a> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(address.to_string());
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                if self.panic_on.as_deref() == Some(address) {
                    panic!("probe blew up for {address}");
                }
                self.reachable.contains(normalize(address))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeProbe;
    use super::*;

    fn checker(http: &Arc<FakeProbe>, ping: &Arc<FakeProbe>) -> StatusChecker {
        StatusChecker::new(http.clone(), ping.clone())
    }

    #[tokio::test]
    async fn http_success_skips_ping() {
        let http = Arc::new(FakeProbe::reaching(&["10.0.0.1"]));
        let ping = Arc::new(FakeProbe::reaching(&[]));

        let status = checker(&http, &ping).check("10.0.0.1").await;
        assert_eq!(status, DeviceStatus::Online);
        assert_eq!(ping.call_count(), 0);
    }

    #[tokio::test]
    async fn ping_rescues_headless_device() {
        let http = Arc::new(FakeProbe::reaching(&[]));
        let ping = Arc::new(FakeProbe::reaching(&["192.0.2.5"]));

        let status = checker(&http, &ping).check("192.0.2.5").await;
        assert_eq!(status, DeviceStatus::Online);
        assert!(http.called_with("192.0.2.5"));
    }

    #[tokio::test]
    async fn both_failing_is_offline() {
        let http = Arc::new(FakeProbe::reaching(&[]));
        let ping = Arc::new(FakeProbe::reaching(&[]));

        let status = checker(&http, &ping).check("10.0.0.1:9999").await;
        assert_eq!(status, DeviceStatus::Offline);
        assert_eq!(http.call_count(), 1);
        assert_eq!(ping.call_count(), 1);
    }

    #[tokio::test]
    async fn probes_match_on_normalized_address() {
        let http = Arc::new(FakeProbe::reaching(&["printer.local/status"]));
        let ping = Arc::new(FakeProbe::reaching(&[]));

        let status = checker(&http, &ping).check("  HTTPS://printer.local/status ").await;
        assert_eq!(status, DeviceStatus::Online);
    }

    #[tokio::test]
    async fn probes_receive_trimmed_raw_address() {
        let http = Arc::new(FakeProbe::reaching(&[]));
        let ping = Arc::new(FakeProbe::reaching(&[]));

        checker(&http, &ping).check("  http://http://10.0.0.1 ").await;
        assert!(http.called_with("http://http://10.0.0.1"));
        assert!(ping.called_with("http://http://10.0.0.1"));
    }

    #[tokio::test]
    async fn doubled_scheme_is_stripped_once() {
        // After one strip the address is `http://10.0.0.1`, which matches nothing.
        let http = Arc::new(FakeProbe::reaching(&["10.0.0.1"]));
        let ping = Arc::new(FakeProbe::reaching(&["10.0.0.1"]));

        let status = checker(&http, &ping).check("http://http://10.0.0.1").await;
        assert_eq!(status, DeviceStatus::Offline);
    }

    #[tokio::test]
    async fn checker_agrees_with_http_probe_on_doubled_scheme() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let _ = sock.read(&mut buf).await;
                let _ = sock
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n")
                    .await;
                let _ = sock.shutdown().await;
            }
        });

        let raw = format!("http://http://{addr}");
        let http = HttpProbe::new(
            std::time::Duration::from_millis(500),
            std::time::Duration::from_secs(1),
        );
        let direct = http.check(&raw).await;

        let ping = Arc::new(FakeProbe::reaching(&[]));
        let status = StatusChecker::new(Arc::new(http), ping).check(&raw).await;

        assert!(!direct);
        assert_eq!(status, DeviceStatus::from_reachable(direct));

        // A single prefix still reaches the server.
        let http = HttpProbe::new(
            std::time::Duration::from_millis(500),
            std::time::Duration::from_secs(1),
        );
        assert!(http.check(&format!("http://{addr}")).await);
    }

    #[tokio::test]
    async fn blank_address_is_offline_without_probing() {
        let http = Arc::new(FakeProbe::reaching(&[""]));
        let ping = Arc::new(FakeProbe::reaching(&[""]));

        let status = checker(&http, &ping).check("   ").await;
        assert_eq!(status, DeviceStatus::Offline);
        assert_eq!(http.call_count() + ping.call_count(), 0);
    }

    #[tokio::test]
    async fn public_domain_is_never_pinged() {
        let http = Arc::new(FakeProbe::reaching(&[]));
        let ping = Arc::new(ReachabilityProbe::new(std::time::Duration::from_secs(2)));
        let checker = StatusChecker::new(http, ping);

        let started = std::time::Instant::now();
        assert_eq!(checker.check("example.com").await, DeviceStatus::Offline);
        assert_eq!(checker.check("http://www.example.org/status").await, DeviceStatus::Offline);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }
}
