use super::auth::{self, AccessGate};
use super::target::{self, TargetPolicy};
use super::Proxy;
use crate::error::ProxyError;
use crate::rewrite::headers::strip_hop_by_hop;
use crate::web;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use http::uri::Uri;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::{
    header::{AUTHORIZATION, HOST},
    service::service_fn,
    Method, Request, Response,
};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::{convert::Infallible, future::Future, net::SocketAddr, pin::Pin, sync::Arc};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
};
use url::Url;

type ServerBuilder = hyper::server::conn::http1::Builder;
type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
type OutboundBody = BoxBody<Bytes, hyper::Error>;
type ProxyResponse = Response<BoxBody<Bytes, anyhow::Error>>;

/// Trait for handling responses fetched from the target.
#[async_trait]
pub trait HttpResponseHandler {
    /// Turn the target's response into the response sent back to the client.
    async fn handle_response(
        &self,
        method: &Method,
        target: &Url,
        response: Response<hyper::body::Incoming>,
    ) -> Result<ProxyResponse, ProxyError>;
}

pub(crate) struct HttpProxy<H> {
    client: Client<HttpsConnector, OutboundBody>,
    response_handler: Arc<H>,
    gate: Arc<AccessGate>,
    policy: Arc<TargetPolicy>,
}

impl<H> Clone for HttpProxy<H> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            response_handler: self.response_handler.clone(),
            gate: self.gate.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<H> HttpProxy<H>
where
    H: HttpResponseHandler + Send + Sync + 'static,
{
    pub fn new(response_handler: Arc<H>, gate: AccessGate, policy: TargetPolicy) -> Result<Self> {
        let https = HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .build();

        // The legacy client never follows redirects, which leaves them to the
        // response handler.
        let client: Client<HttpsConnector, OutboundBody> = Client::builder(TokioExecutor::new())
            .http1_preserve_header_case(true)
            .http1_title_case_headers(true)
            .build(https);

        Ok(Self {
            client,
            response_handler,
            gate: Arc::new(gate),
            policy: Arc::new(policy),
        })
    }

    #[allow(clippy::type_complexity)]
    fn proxy_service(
        self,
        req: Request<hyper::body::Incoming>,
    ) -> Pin<Box<impl Future<Output = std::result::Result<ProxyResponse, Infallible>> + Send>> {
        Box::pin(async move {
            let method = req.method().clone();
            let uri = req.uri().clone();
            match self.proxy_service_impl(req).await {
                Ok(resp) => Ok(resp),
                Err(e) => {
                    tracing::warn!("{method} {uri} failed: {e}");
                    Ok(e.into_response())
                }
            }
        })
    }

    async fn proxy_service_impl(
        self,
        req: Request<hyper::body::Incoming>,
    ) -> std::result::Result<ProxyResponse, ProxyError> {
        tracing::debug!("Request: {:?}", req);

        if !self.gate.authorize(req.headers()) {
            return Ok(auth::unauthorized());
        }

        let Some(raw_target) = target::extract(req.uri()) else {
            return Ok(web::form_page());
        };
        let target = self.policy.parse(&raw_target)?;
        let method = req.method().clone();
        tracing::info!("{} {}", method, target);

        let outbound = build_outbound_request(req, &target, self.gate.is_enabled())?;
        let resp = self.client.request(outbound).await?;
        self.response_handler
            .handle_response(&method, &target, resp)
            .await
    }

    async fn serve_stream<I>(self, stream: I) -> Result<()>
    where
        I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let io = TokioIo::new(stream);
        ServerBuilder::new()
            .preserve_header_case(true)
            .title_case_headers(true)
            .serve_connection(io, service_fn(move |req| self.clone().proxy_service(req)))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<H> Proxy for HttpProxy<H>
where
    H: HttpResponseHandler + Send + Sync + 'static,
{
    async fn start(&self, port: u16) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("HTTP proxy is listening on {}", addr);

        loop {
            let (stream, _) = listener.accept().await?;
            let proxy = self.clone();
            tokio::task::spawn(async move {
                if let Err(err) = proxy.serve_stream(stream).await {
                    tracing::error!("Failed to serve connection: {:?}", err);
                }
            });
        }
    }
}

/// Re-targets the inbound request at `target`, keeping its method and end-to-end
/// headers. Bodies are only forwarded for methods other than GET and HEAD.
fn build_outbound_request(
    req: Request<hyper::body::Incoming>,
    target: &Url,
    strip_authorization: bool,
) -> std::result::Result<Request<OutboundBody>, ProxyError> {
    let (mut parts, body) = req.into_parts();

    let mut target = target.clone();
    target.set_fragment(None);
    parts.uri = target
        .as_str()
        .parse::<Uri>()
        .map_err(|e| ProxyError::invalid_target(target.as_str(), e.to_string()))?;

    strip_hop_by_hop(&mut parts.headers);
    parts.headers.remove(HOST);
    if strip_authorization {
        parts.headers.remove(AUTHORIZATION);
    }

    let body = if parts.method == Method::GET || parts.method == Method::HEAD {
        Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
    } else {
        body.boxed()
    };
    Ok(Request::from_parts(parts, body))
}

pub(crate) fn empty() -> BoxBody<Bytes, anyhow::Error> {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, anyhow::Error> {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}
