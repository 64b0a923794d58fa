use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{HeaderValue, PROXY_AUTHORIZATION};
use http::uri::Scheme;
use http::{Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::proxy::matcher::Matcher;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tracing::{debug, info};

use super::config::{ProxyMode, TransportConfig};
use super::connector::{ConnectDeadline, RemapConnector, RemapDialer};
use super::error::HttpError;
use super::response::CapturedResponse;

type Connector = ConnectDeadline<HttpsConnector<RemapConnector>>;

/// HTTP/1.1 client that never follows redirects and dials through the host
/// map. One attempt per request, no retries.
pub struct HttpClient {
    inner: Client<Connector, Full<Bytes>>,
    proxies: Option<Arc<Matcher>>,
    request_timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &TransportConfig) -> Result<Self, HttpError> {
        let proxies = match config.proxy {
            ProxyMode::FromEnv => Some(Arc::new(Matcher::from_env())),
            ProxyMode::Disabled => None,
        };
        Self::with_proxies(config, proxies)
    }

    fn with_proxies(
        config: &TransportConfig,
        proxies: Option<Arc<Matcher>>,
    ) -> Result<Self, HttpError> {
        let dialer = RemapDialer::new(
            Arc::new(config.hosts.clone()),
            config.connect_timeout,
            config.keep_alive,
        );
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(provider)
            .map_err(|e| HttpError::Tls(Box::new(e)))?
            .https_or_http()
            .enable_http1()
            .wrap_connector(RemapConnector::new(dialer, proxies.clone()));
        let connector = ConnectDeadline::new(
            https,
            config.connect_timeout + config.tls_handshake_timeout,
        );

        let mut builder = Client::builder(TokioExecutor::new());
        builder
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host);

        Ok(Self {
            inner: builder.build(connector),
            proxies,
            request_timeout: config.request_timeout,
        })
    }

    /// Sends `request` and buffers the whole response body. Any status,
    /// 3xx included, is a successful exchange.
    pub async fn send(
        &self,
        mut request: Request<Full<Bytes>>,
    ) -> Result<CapturedResponse, HttpError> {
        if let Some(auth) = self.proxy_authorization(request.uri()) {
            request.headers_mut().insert(PROXY_AUTHORIZATION, auth);
        }
        info!(method = %request.method(), uri = %request.uri(), "sending request");

        let started = Instant::now();
        let exchange = async {
            let response = self.inner.request(request).await?;
            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| HttpError::Body(Box::new(e)))?
                .to_bytes();
            Ok::<_, HttpError>(CapturedResponse::from_parts(parts, body))
        };
        let response = tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| HttpError::Timeout(self.request_timeout))??;

        debug!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            size_bytes = response.body().len(),
            "response received"
        );
        Ok(response)
    }

    /// Credentials for a forwarding proxy. Tunnelled (https) requests carry
    /// them on the `CONNECT` instead.
    fn proxy_authorization(&self, uri: &Uri) -> Option<HeaderValue> {
        if uri.scheme() != Some(&Scheme::HTTP) {
            return None;
        }
        let intercept = self.proxies.as_ref()?.intercept(uri)?;
        intercept.basic_auth().cloned()
    }
}
