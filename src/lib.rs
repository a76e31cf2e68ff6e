use anyhow::{Context, Result};

pub mod config;
pub mod error;
pub(crate) mod proxy;
pub mod rewrite;
pub(crate) mod transform;
pub(crate) mod web;

pub async fn run(config: config::Config) -> Result<()> {
    let rewriter = transform::ResponseRewriter::new(config.stages.clone());
    proxy::start_http_proxy(&config, rewriter)
        .await
        .with_context(|| format!("Proxy server on port {} stopped", config.port))
}
