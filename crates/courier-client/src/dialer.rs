//! Transport dialers — direct TCP or through a SOCKS5 proxy.
//!
//! Proxy URLs: `socks5://[user:pass@]host:port` (or `socks5h://`).
//! The target address is always sent to the proxy as a domain name unless
//! it is a literal IP, so name resolution happens proxy-side.

use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use courier_core::BuildError;

const SOCKS_VERSION: u8 = 0x05;
const AUTH_NONE: u8 = 0x00;
const AUTH_USER_PASS: u8 = 0x02;
const AUTH_NO_ACCEPTABLE: u8 = 0xFF;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// Opens raw connections for the protocol layer.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, network: &str, address: &str) -> io::Result<TcpStream>;
}

pub type SharedDialer = Arc<dyn Dialer>;

/// Select a dialer for `proxy`. Empty means direct.
pub fn dialer_for(proxy: &str, timeout: Duration) -> Result<SharedDialer, BuildError> {
    if proxy.trim().is_empty() {
        return Ok(Arc::new(DirectDialer::new(timeout)));
    }
    let dialer = Socks5Dialer::from_url(proxy, timeout)?;
    tracing::info!(proxy = %dialer.proxy_addr, auth = dialer.auth.is_some(), "using SOCKS5 proxy");
    Ok(Arc::new(dialer))
}

fn check_network(network: &str) -> io::Result<()> {
    match network {
        "tcp" | "tcp4" | "tcp6" => Ok(()),
        other => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("unsupported network {other:?}"),
        )),
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    fut: impl std::future::Future<Output = io::Result<T>>,
) -> io::Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "dial timed out"))?
}

// ── Direct ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DirectDialer {
    timeout: Duration,
}

impl DirectDialer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Dialer for DirectDialer {
    async fn dial(&self, network: &str, address: &str) -> io::Result<TcpStream> {
        check_network(network)?;
        let stream = with_timeout(self.timeout, TcpStream::connect(address)).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

// ── SOCKS5 ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Socks5Dialer {
    proxy_addr: String,
    auth: Option<(String, String)>,
    timeout: Duration,
}

impl Socks5Dialer {
    pub fn from_url(url: &str, timeout: Duration) -> Result<Self, BuildError> {
        let invalid = |reason: &str| BuildError::ProxyConfig {
            url: redact(url),
            reason: reason.to_string(),
        };

        let (scheme, rest) = url.trim().split_once("://").ok_or_else(|| invalid("missing scheme"))?;
        if !scheme.eq_ignore_ascii_case("socks5") && !scheme.eq_ignore_ascii_case("socks5h") {
            return Err(invalid("unsupported scheme, expected socks5"));
        }

        let rest = rest.trim_end_matches('/');
        let (userinfo, hostport) = match rest.rsplit_once('@') {
            Some((u, h)) => (Some(u), h),
            None => (None, rest),
        };

        let auth = match userinfo {
            Some(info) => {
                let (user, pass) = info.split_once(':').unwrap_or((info, ""));
                if user.is_empty() || user.len() > 255 || pass.len() > 255 {
                    return Err(invalid("bad proxy credentials"));
                }
                Some((user.to_string(), pass.to_string()))
            }
            None => None,
        };

        let (host, port) = split_host_port(hostport).ok_or_else(|| invalid("expected host:port"))?;
        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }

        Ok(Self {
            proxy_addr: join_host_port(host, port),
            auth,
            timeout,
        })
    }

    pub fn proxy_addr(&self) -> &str {
        &self.proxy_addr
    }

    async fn handshake(&self, stream: &mut TcpStream, address: &str) -> io::Result<()> {
        let method = if self.auth.is_some() { AUTH_USER_PASS } else { AUTH_NONE };
        stream.write_all(&[SOCKS_VERSION, 1, method]).await?;

        let mut reply = [0u8; 2];
        stream.read_exact(&mut reply).await?;
        if reply[0] != SOCKS_VERSION {
            return Err(proxy_err(format!("bad version {:#04x}", reply[0])));
        }
        match reply[1] {
            AUTH_NONE => {}
            AUTH_USER_PASS => self.authenticate(stream).await?,
            AUTH_NO_ACCEPTABLE => return Err(proxy_err("no acceptable auth method".into())),
            other => return Err(proxy_err(format!("unexpected auth method {other:#04x}"))),
        }

        let (host, port) = split_host_port(address).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("bad address {address:?}"))
        })?;

        let mut req = vec![SOCKS_VERSION, CMD_CONNECT, 0x00];
        match host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => {
                req.push(ATYP_IPV4);
                req.extend_from_slice(&ip.octets());
            }
            Ok(IpAddr::V6(ip)) => {
                req.push(ATYP_IPV6);
                req.extend_from_slice(&ip.octets());
            }
            Err(_) => {
                let len = u8::try_from(host.len())
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "host name too long"))?;
                req.push(ATYP_DOMAIN);
                req.push(len);
                req.extend_from_slice(host.as_bytes());
            }
        }
        req.extend_from_slice(&port.to_be_bytes());
        stream.write_all(&req).await?;

        let mut head = [0u8; 4];
        stream.read_exact(&mut head).await?;
        if head[1] != 0x00 {
            return Err(proxy_err(format!("connect rejected: {}", reply_text(head[1]))));
        }
        // Drain the bound address; we do not use it.
        let addr_len = match head[3] {
            ATYP_IPV4 => 4,
            ATYP_IPV6 => 16,
            ATYP_DOMAIN => {
                let mut len = [0u8; 1];
                stream.read_exact(&mut len).await?;
                len[0] as usize
            }
            other => return Err(proxy_err(format!("bad address type {other:#04x}"))),
        };
        let mut bound = vec![0u8; addr_len + 2];
        stream.read_exact(&mut bound).await?;
        Ok(())
    }

    async fn authenticate(&self, stream: &mut TcpStream) -> io::Result<()> {
        let Some((user, pass)) = &self.auth else {
            return Err(proxy_err("proxy demanded credentials we do not have".into()));
        };
        let mut req = Vec::with_capacity(3 + user.len() + pass.len());
        req.push(0x01);
        req.push(user.len() as u8);
        req.extend_from_slice(user.as_bytes());
        req.push(pass.len() as u8);
        req.extend_from_slice(pass.as_bytes());
        stream.write_all(&req).await?;

        let mut reply = [0u8; 2];
        stream.read_exact(&mut reply).await?;
        if reply[1] != 0x00 {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "proxy authentication failed",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Dialer for Socks5Dialer {
    async fn dial(&self, network: &str, address: &str) -> io::Result<TcpStream> {
        check_network(network)?;
        with_timeout(self.timeout, async {
            let mut stream = TcpStream::connect(&self.proxy_addr).await?;
            stream.set_nodelay(true)?;
            self.handshake(&mut stream, address).await?;
            Ok::<_, io::Error>(stream)
        })
        .await
    }
}

fn proxy_err(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionRefused, format!("socks5: {msg}"))
}

fn reply_text(code: u8) -> &'static str {
    match code {
        0x01 => "general failure",
        0x02 => "not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown error",
    }
}

/// `host:port` or `[v6]:port`.
fn split_host_port(s: &str) -> Option<(&str, u16)> {
    let (host, port) = if let Some(rest) = s.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        (host, tail.strip_prefix(':')?)
    } else {
        let (host, port) = s.rsplit_once(':')?;
        if host.contains(':') {
            return None;
        }
        (host, port)
    };
    if host.is_empty() {
        return None;
    }
    Some((host, port.parse().ok()?))
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Drop the password from a proxy URL before it reaches an error message.
fn redact(url: &str) -> String {
    match (url.split_once("://"), url.rsplit_once('@')) {
        (Some((scheme, _)), Some((_, host))) => format!("{scheme}://***@{host}"),
        _ => url.to_string(),
    }
}
