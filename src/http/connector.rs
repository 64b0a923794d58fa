//! Connection establishment for the HTTP client.
//!
//! Every TCP connection is dialed through [`RemapDialer`], which substitutes
//! the destination according to the configured [`HostMap`] before connecting.
//! Name resolution happens on the substituted address, while TLS and the
//! `Host` header keep using the host from the request URL.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use http::Uri;
use http::uri::Scheme;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::proxy::Tunnel;
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use hyper_util::client::proxy::matcher::Matcher;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tower::{Service, ServiceExt};
use tracing::debug;

use super::error::{BoxError, ConnectTimeout, UnsupportedProxy};
use super::remap::HostMap;

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, BoxError>> + Send>>;

/// Plain TCP dialer that applies the host map to each `host:port` it is
/// asked to connect to.
#[derive(Clone)]
pub struct RemapDialer {
    http: HttpConnector,
    hosts: Arc<HostMap>,
}

impl RemapDialer {
    pub fn new(hosts: Arc<HostMap>, connect_timeout: Duration, keep_alive: Duration) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(connect_timeout));
        http.set_keepalive(Some(keep_alive));
        http.set_nodelay(true);
        Self { http, hosts }
    }
}

impl Service<Uri> for RemapDialer {
    type Response = TokioIo<TcpStream>;
    type Error = BoxError;
    type Future = BoxFuture<Self::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let http = self.http.clone();
        let hosts = Arc::clone(&self.hosts);

        Box::pin(async move {
            let addr = dial_address(&dst)?;
            let target = hosts.remap(&addr);
            if target != addr {
                debug!(from = %addr, to = %target, "remapped connection target");
            }

            let uri: Uri = format!("http://{target}").parse()?;
            let stream = http.oneshot(uri).await?;
            Ok(stream)
        })
    }
}

/// Top-level connector: picks a proxy from the environment when configured,
/// and otherwise dials the origin directly. All dials go through
/// [`RemapDialer`].
#[derive(Clone)]
pub struct RemapConnector {
    dialer: RemapDialer,
    proxies: Option<Arc<Matcher>>,
}

impl RemapConnector {
    pub fn new(dialer: RemapDialer, proxies: Option<Arc<Matcher>>) -> Self {
        Self { dialer, proxies }
    }
}

impl Service<Uri> for RemapConnector {
    type Response = MappedStream;
    type Error = BoxError;
    type Future = BoxFuture<Self::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let mut dialer = self.dialer.clone();
        let intercept = self.proxies.as_ref().and_then(|proxies| proxies.intercept(&dst));

        Box::pin(async move {
            let Some(intercept) = intercept else {
                let io = dialer.call(dst).await?;
                return Ok(MappedStream::direct(io));
            };

            let proxy = intercept.uri().clone();
            if proxy.scheme() != Some(&Scheme::HTTP) {
                return Err(UnsupportedProxy(proxy.to_string()).into());
            }

            if dst.scheme() == Some(&Scheme::HTTPS) {
                debug!(%proxy, "tunnelling through proxy");
                let mut tunnel = Tunnel::new(proxy, dialer);
                if let Some(auth) = intercept.basic_auth() {
                    tunnel = tunnel.with_auth(auth.clone());
                }
                let io = tunnel.oneshot(dst).await?;
                Ok(MappedStream::direct(io))
            } else {
                debug!(%proxy, "forwarding through proxy");
                let io = dialer.call(proxy).await?;
                Ok(MappedStream::proxied(io))
            }
        })
    }
}

/// Bounds the whole connection establishment, TLS handshake included.
#[derive(Clone)]
pub struct ConnectDeadline<S> {
    inner: S,
    deadline: Duration,
}

impl<S> ConnectDeadline<S> {
    pub fn new(inner: S, deadline: Duration) -> Self {
        Self { inner, deadline }
    }
}

impl<S> Service<Uri> for ConnectDeadline<S>
where
    S: Service<Uri>,
    S::Response: Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = BoxFuture<Self::Response>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let deadline = self.deadline;
        let connecting = self.inner.call(dst);

        Box::pin(async move {
            match tokio::time::timeout(deadline, connecting).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(ConnectTimeout(deadline).into()),
            }
        })
    }
}

/// TCP stream that remembers whether it leads to a forwarding proxy, so the
/// client sends absolute-form request targets over it.
pub struct MappedStream {
    io: TokioIo<TcpStream>,
    proxied: bool,
}

impl MappedStream {
    fn direct(io: TokioIo<TcpStream>) -> Self {
        Self { io, proxied: false }
    }

    fn proxied(io: TokioIo<TcpStream>) -> Self {
        Self { io, proxied: true }
    }
}

impl Connection for MappedStream {
    fn connected(&self) -> Connected {
        Connected::new().proxy(self.proxied)
    }
}

impl Read for MappedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl Write for MappedStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }

    fn is_write_vectored(&self) -> bool {
        self.io.is_write_vectored()
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write_vectored(cx, bufs)
    }
}

/// `host:port` the transport dials for `uri`, with the scheme's default port
/// filled in. IPv6 hosts stay bracketed.
pub fn dial_address(uri: &Uri) -> Result<String, BoxError> {
    let host = uri
        .host()
        .ok_or_else(|| format!("URL `{uri}` has no host"))?;
    let port = uri.port_u16().unwrap_or(if uri.scheme() == Some(&Scheme::HTTPS) {
        443
    } else {
        80
    });
    Ok(format!("{host}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn dial_address_fills_in_default_ports() {
        let uri: Uri = "https://example.com/path".parse().unwrap();
        assert_eq!(dial_address(&uri).unwrap(), "example.com:443");

        let uri: Uri = "http://example.com/".parse().unwrap();
        assert_eq!(dial_address(&uri).unwrap(), "example.com:80");

        let uri: Uri = "http://example.com:8080/".parse().unwrap();
        assert_eq!(dial_address(&uri).unwrap(), "example.com:8080");
    }

    #[test]
    fn dial_address_keeps_ipv6_brackets() {
        let uri: Uri = "http://[::1]:8080/".parse().unwrap();
        assert_eq!(dial_address(&uri).unwrap(), "[::1]:8080");
    }

    #[tokio::test]
    async fn dialer_connects_to_remapped_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let rule = format!("unreachable.invalid:80:127.0.0.1:{port}").parse().unwrap();
        let hosts = Arc::new(HostMap::new(vec![rule]));

        let mut dialer = RemapDialer::new(hosts, Duration::from_secs(2), Duration::from_secs(20));
        let uri: Uri = "http://unreachable.invalid/".parse().unwrap();
        let (dialed, accepted) = tokio::join!(dialer.call(uri), listener.accept());

        let stream = dialed.expect("dial through host map");
        let (_, peer) = accepted.unwrap();
        assert_eq!(stream.inner().local_addr().unwrap(), peer);
    }

    #[tokio::test]
    async fn deadline_elapses_on_stalled_connect() {
        let stalled = tower::service_fn(|_: Uri| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, BoxError>(())
        });
        let mut deadline = ConnectDeadline::new(stalled, Duration::from_millis(20));

        let err = deadline
            .call("http://example.com/".parse().unwrap())
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<ConnectTimeout>().is_some(), "{err}");
    }

    #[tokio::test]
    async fn non_http_proxy_is_rejected() {
        let matcher = Matcher::builder().http("https://proxy.test:3128").build();
        let dialer = RemapDialer::new(
            Arc::new(HostMap::default()),
            Duration::from_secs(2),
            Duration::from_secs(20),
        );
        let mut connector = RemapConnector::new(dialer, Some(Arc::new(matcher)));

        let err = match connector.call("http://origin.test/".parse().unwrap()).await {
            Ok(_) => panic!("dialed through an https proxy"),
            Err(err) => err,
        };
        let rejected = err.downcast_ref::<UnsupportedProxy>().expect("UnsupportedProxy");
        assert!(rejected.0.starts_with("https://proxy.test:3128"), "{rejected}");
    }
}
