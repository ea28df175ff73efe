//! HTTP probe.
//!
//! Sends a `HEAD` request over a plain TCP connection with hyper. Any
//! HTTP status counts as reachable: a 401 from a login-protected kiosk or
//! a 302 to a setup page is still a live device. Redirects are never
//! followed and the probe never speaks TLS.

use std::time::Duration;

use bytes::Bytes;
use fleet_core::config::ProbeConfig;
use http::header::{CONNECTION, HOST, USER_AGENT};
use http_body_util::Empty;
use tokio::net::TcpStream;
use tracing::debug;

use crate::address::normalize;
use crate::checker::{Probe, ProbeFuture};

const DEFAULT_PORT: u16 = 80;

/// HTTP reachability probe with separate connect and total deadlines.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    connect_timeout: Duration,
    total_timeout: Duration,
    user_agent: String,
}

impl HttpProbe {
    pub fn new(connect_timeout: Duration, total_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            total_timeout,
            user_agent: ProbeConfig::default().user_agent,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.connect_timeout(), config.total_timeout())
            .with_user_agent(&config.user_agent)
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    /// `true` iff the device answered with any HTTP status.
    pub async fn check(&self, address: &str) -> bool {
        http_probe(
            address,
            self.connect_timeout,
            self.total_timeout,
            &self.user_agent,
        )
        .await
    }
}

impl Probe for HttpProbe {
    fn probe<'a>(&'a self, address: &'a str) -> ProbeFuture<'a> {
        Box::pin(self.check(address))
    }
}

/// Where to connect and what to ask for.
#[derive(Debug, PartialEq, Eq)]
struct HttpTarget<'a> {
    /// `host[:port]` as written, used for the `Host` header.
    authority: &'a str,
    /// `host:port` with the default port filled in.
    connect: String,
    /// Request path, `/` when absent.
    path: String,
}

impl<'a> HttpTarget<'a> {
    fn parse(address: &'a str) -> Option<Self> {
        let (authority, path) = match address.find('/') {
            Some(slash) => (&address[..slash], address[slash..].to_string()),
            None => (address, "/".to_string()),
        };
        if authority.is_empty() {
            return None;
        }

        let connect = if has_port(authority) {
            authority.to_string()
        } else {
            format!("{authority}:{DEFAULT_PORT}")
        };
        Some(Self {
            authority,
            connect,
            path,
        })
    }
}

fn has_port(authority: &str) -> bool {
    let after_host = match authority.strip_prefix('[') {
        Some(rest) => match rest.find(']') {
            Some(end) => &rest[end + 1..],
            None => return false,
        },
        None => authority,
    };
    match after_host.rsplit_once(':') {
        Some((_, port)) => !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Perform an HTTP probe against `http://<address>`.
///
/// Returns `false` on connection refusal, DNS failure, handshake failure,
/// or when either deadline expires. Returns `true` for any status code.
pub async fn http_probe(
    address: &str,
    connect_timeout: Duration,
    total_timeout: Duration,
    user_agent: &str,
) -> bool {
    let address = normalize(address);
    let Some(target) = HttpTarget::parse(address) else {
        debug!(%address, "http probe skipped, no host");
        return false;
    };
    let uri = format!("http://{address}");

    let result = tokio::time::timeout(total_timeout, async {
        let stream =
            match tokio::time::timeout(connect_timeout, TcpStream::connect(&target.connect)).await {
                Ok(Ok(s)) => s,
                Ok(Err(e)) => {
                    debug!(error = %e, %uri, "http probe connection failed");
                    return false;
                }
                Err(_) => {
                    debug!(%uri, "http probe connect timed out");
                    return false;
                }
            };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %uri, "http probe handshake failed");
                return false;
            }
        };

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = match http::Request::builder()
            .method(http::Method::HEAD)
            .uri(target.path.as_str())
            .header(HOST, target.authority)
            .header(USER_AGENT, user_agent)
            .header(CONNECTION, "close")
            .body(Empty::<Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, %uri, "http probe request could not be built");
                return false;
            }
        };

        match sender.send_request(req).await {
            Ok(resp) => {
                debug!(status = %resp.status(), %uri, "http probe answered");
                true
            }
            Err(e) => {
                debug!(error = %e, %uri, "http probe request failed");
                false
            }
        }
    })
    .await;

    match result {
        Ok(reachable) => reachable,
        Err(_) => {
            debug!(%uri, "http probe timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Serve `response` to every connection; forward each raw request head.
    async fn serve(response: &'static str) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let n = sock.read(&mut buf).await.unwrap_or(0);
                let _ = tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        (addr, rx)
    }

    fn probe() -> HttpProbe {
        HttpProbe::new(Duration::from_millis(500), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn ok_response_is_reachable() {
        let (addr, _rx) = serve("HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n").await;
        assert!(probe().check(&addr.to_string()).await);
    }

    #[tokio::test]
    async fn error_statuses_are_reachable() {
        for response in [
            "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n",
            "HTTP/1.1 401 Unauthorized\r\ncontent-length: 0\r\n\r\n",
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\n\r\n",
        ] {
            let (addr, _rx) = serve(response).await;
            assert!(probe().check(&addr.to_string()).await, "{response}");
        }
    }

    #[tokio::test]
    async fn redirect_is_reachable_and_not_followed() {
        let (addr, mut rx) =
            serve("HTTP/1.1 302 Found\r\nlocation: http://127.0.0.1:1/login\r\ncontent-length: 0\r\n\r\n").await;
        assert!(probe().check(&addr.to_string()).await);
        assert!(rx.recv().await.is_some());
        // Exactly one request reached the device.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sends_head_with_path_and_headers() {
        let (addr, mut rx) = serve("HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n").await;
        let probe = probe().with_user_agent("fleet-test/1.0");

        assert!(probe.check(&format!("  http://{addr}/status?x=1 ")).await);
        let head = rx.recv().await.unwrap().to_lowercase();
        assert!(head.starts_with("head /status?x=1 http/1.1\r\n"), "{head}");
        assert!(head.contains("user-agent: fleet-test/1.0"));
        assert!(head.contains(&format!("host: {addr}")));
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(!probe().check(&addr.to_string()).await);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });

        let probe = HttpProbe::new(Duration::from_millis(200), Duration::from_millis(300));
        let started = Instant::now();
        assert!(!probe.check(&addr.to_string()).await);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn empty_address_is_unreachable() {
        assert!(!probe().check("").await);
        assert!(!probe().check("http:///path").await);
    }

    #[test]
    fn target_defaults_port_and_path() {
        let t = HttpTarget::parse("printer.local").unwrap();
        assert_eq!(t.authority, "printer.local");
        assert_eq!(t.connect, "printer.local:80");
        assert_eq!(t.path, "/");

        let t = HttpTarget::parse("10.0.0.5:8080/cgi/status").unwrap();
        assert_eq!(t.connect, "10.0.0.5:8080");
        assert_eq!(t.path, "/cgi/status");

        let t = HttpTarget::parse("[fe80::1]/x").unwrap();
        assert_eq!(t.connect, "[fe80::1]:80");

        let t = HttpTarget::parse("[fe80::1]:8080").unwrap();
        assert_eq!(t.connect, "[fe80::1]:8080");

        assert!(HttpTarget::parse("/only/path").is_none());
    }
}
