use crate::config::Config;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub(crate) mod auth;
pub(crate) mod http;
pub(crate) mod target;

#[async_trait]
trait Proxy {
    async fn start(&self, port: u16) -> Result<()>;
}

pub async fn start_http_proxy<H>(config: &Config, response_handler: H) -> Result<()>
where
    H: http::HttpResponseHandler + Send + Sync + 'static,
{
    let http_proxy = http::HttpProxy::new(
        Arc::new(response_handler),
        auth::AccessGate::new(config.credentials.clone()),
        target::TargetPolicy::new(&config.allowed_hosts),
    )?;
    http_proxy.start(config.port).await
}
