//! Stage workers: one long-lived dispatcher per stage, one short-lived task
//! per datum.
//!
//! Throughput is bounded by buffer-pool occupancy rather than task count —
//! a dispatcher can only spawn as fast as data leaves its pool, and
//! producers block inside `put` when the next pool is full. Hand-offs into a
//! pool run in their own task so a worker never parks on a full pool.

use std::sync::Arc;

use tracing::{trace, warn};

use super::{host_accepted, SchedulerInner};
use crate::error::CrawlerError;
use crate::module::{Analyzer, Data, Downloader, Item, Pipeline, Request, Response};

/// Launches the download, analyze, and pipeline dispatchers.
pub(crate) fn spawn_stages(inner: &Arc<SchedulerInner>) {
    spawn_download_stage(Arc::clone(inner));
    spawn_analyze_stage(Arc::clone(inner));
    spawn_pipeline_stage(Arc::clone(inner));
}

fn spawn_download_stage(inner: Arc<SchedulerInner>) {
    tokio::spawn(async move {
        trace!("download dispatcher started");
        loop {
            if inner.cancelled() {
                break;
            }
            let req = match inner.req_pool.get().await {
                Ok(req) => req,
                Err(_) => {
                    trace!("request buffer pool closed, download dispatcher exiting");
                    break;
                }
            };
            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                download_one(inner, req).await;
            });
        }
    });
}

fn spawn_analyze_stage(inner: Arc<SchedulerInner>) {
    tokio::spawn(async move {
        trace!("analyze dispatcher started");
        loop {
            if inner.cancelled() {
                break;
            }
            let resp = match inner.resp_pool.get().await {
                Ok(resp) => resp,
                Err(_) => {
                    trace!("response buffer pool closed, analyze dispatcher exiting");
                    break;
                }
            };
            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                analyze_one(inner, resp).await;
            });
        }
    });
}

fn spawn_pipeline_stage(inner: Arc<SchedulerInner>) {
    tokio::spawn(async move {
        trace!("pipeline dispatcher started");
        loop {
            if inner.cancelled() {
                break;
            }
            let item = match inner.item_pool.get().await {
                Ok(item) => item,
                Err(_) => {
                    trace!("item buffer pool closed, pipeline dispatcher exiting");
                    break;
                }
            };
            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                pipeline_one(inner, item).await;
            });
        }
    });
}

async fn download_one(inner: Arc<SchedulerInner>, req: Request) {
    if inner.cancelled() {
        return;
    }
    let downloader = match inner.registry.get_downloader() {
        Ok(downloader) => downloader,
        Err(e) => {
            send_error(
                &inner,
                CrawlerError::scheduler(format!("couldn't get a downloader: {e}")),
            );
            return;
        }
    };
    match downloader.download(req).await {
        Ok(resp) => {
            send_resp(&inner, resp);
        }
        Err(e) => {
            send_error(&inner, e);
        }
    }
}

async fn analyze_one(inner: Arc<SchedulerInner>, resp: Response) {
    if inner.cancelled() {
        return;
    }
    let analyzer = match inner.registry.get_analyzer() {
        Ok(analyzer) => analyzer,
        Err(e) => {
            send_error(
                &inner,
                CrawlerError::scheduler(format!("couldn't get an analyzer: {e}")),
            );
            return;
        }
    };
    let (data_list, errors) = analyzer.analyze(resp).await;
    for data in data_list {
        match data {
            Data::Request(req) => {
                check_and_send_req(&inner, req);
            }
            Data::Item(item) => {
                send_item(&inner, item);
            }
            // Only requests and items route onward.
            Data::Response(_) => {}
        }
    }
    for e in errors {
        send_error(&inner, e);
    }
}

async fn pipeline_one(inner: Arc<SchedulerInner>, item: Item) {
    if inner.cancelled() {
        return;
    }
    let pipeline = match inner.registry.get_pipeline() {
        Ok(pipeline) => pipeline,
        Err(e) => {
            send_error(
                &inner,
                CrawlerError::scheduler(format!("couldn't get a pipeline: {e}")),
            );
            return;
        }
    };
    for e in pipeline.send(item).await {
        send_error(&inner, e);
    }
}

/// Admits a request into the request pool.
///
/// The request must be valid, target an accepted domain, sit within the
/// maximum depth, and be previously unseen — in that order. Rejections are
/// silent: the request is simply not enqueued.
pub(crate) fn check_and_send_req(inner: &Arc<SchedulerInner>, req: Request) -> bool {
    if inner.cancelled() {
        return false;
    }
    if !req.valid() {
        trace!("ignoring an invalid request");
        return false;
    }
    let host = req.url().host_str().unwrap_or_default();
    if !host_accepted(&inner.accepted_domains, host) {
        trace!(url = %req.url(), "ignoring a request outside the accepted domains");
        return false;
    }
    if req.depth() > inner.max_depth {
        trace!(url = %req.url(), depth = req.depth(), "ignoring a request beyond the maximum depth");
        return false;
    }
    if !inner.url_set.put_if_absent(req.url().as_str()) {
        trace!(url = %req.url(), "ignoring a repeated request");
        return false;
    }
    let pool = Arc::clone(&inner.req_pool);
    tokio::spawn(async move {
        if pool.put(req).await.is_err() {
            warn!("the request buffer pool was closed, ignore request sending");
        }
    });
    true
}

fn send_resp(inner: &Arc<SchedulerInner>, resp: Response) -> bool {
    if inner.cancelled() || inner.resp_pool.is_closed() {
        return false;
    }
    let pool = Arc::clone(&inner.resp_pool);
    tokio::spawn(async move {
        if pool.put(resp).await.is_err() {
            warn!("the response buffer pool was closed, ignore response sending");
        }
    });
    true
}

fn send_item(inner: &Arc<SchedulerInner>, item: Item) -> bool {
    if inner.cancelled() || inner.item_pool.is_closed() {
        return false;
    }
    let pool = Arc::clone(&inner.item_pool);
    tokio::spawn(async move {
        if pool.put(item).await.is_err() {
            warn!("the item buffer pool was closed, ignore item sending");
        }
    });
    true
}

/// Forwards a stage error into the error pool.
pub(crate) fn send_error(inner: &Arc<SchedulerInner>, err: CrawlerError) -> bool {
    if inner.cancelled() || inner.error_pool.is_closed() {
        return false;
    }
    let pool = Arc::clone(&inner.error_pool);
    tokio::spawn(async move {
        if pool.put(err).await.is_err() {
            warn!("the error buffer pool was closed, ignore error sending");
        }
    });
    true
}
