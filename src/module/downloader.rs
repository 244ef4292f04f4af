//! The HTTP downloader module.

use async_trait::async_trait;
use tracing::debug;

use super::base::impl_module_delegation;
use super::{CalculateScore, Downloader, Mid, ModuleBase, Request, Response};
use crate::error::CrawlerError;

fn gen_parameter_error(msg: &str) -> CrawlerError {
    CrawlerError::downloader(format!("illegal parameter: {msg}"))
}

/// A downloader backed by a shared `reqwest` client.
///
/// Timeouts, redirects, and connection pooling are the client's business;
/// the module only enforces the counter protocol and depth propagation.
pub struct HttpDownloader {
    base: ModuleBase,
    client: reqwest::Client,
}

impl_module_delegation!(HttpDownloader);

impl HttpDownloader {
    pub fn new(
        mid: Mid,
        client: reqwest::Client,
        score_calculator: Option<CalculateScore>,
    ) -> Self {
        HttpDownloader {
            base: ModuleBase::new(mid, score_calculator),
            client,
        }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, req: Request) -> Result<Response, CrawlerError> {
        let _handling = self.base.handling_guard();
        self.base.incr_called_count();
        if !req.valid() {
            return Err(gen_parameter_error("invalid request"));
        }
        self.base.incr_accepted_count();
        debug!(url = %req.url(), depth = req.depth(), "downloading");
        let depth = req.depth();
        let url = req.url().clone();
        let http_resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| CrawlerError::downloader(e.to_string()))?;
        let status = http_resp.status();
        let body = http_resp
            .bytes()
            .await
            .map_err(|e| CrawlerError::downloader(e.to_string()))?;
        self.base.incr_completed_count();
        Ok(Response::new(url, status, body, depth))
    }
}
