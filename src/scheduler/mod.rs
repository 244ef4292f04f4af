//! The scheduler: pipeline orchestration, admission, and lifecycle.
//!
//! A scheduler owns the four stage channels (request, response, item, error
//! buffer pools), the URL-seen set, and the module registry. `init` builds
//! that state, `start` launches one dispatcher task per stage and injects the
//! seed at depth zero, and `stop` closes the pools — which is the only
//! cancellation signal the stage workers need, since every blocked `put` or
//! `get` wakes with a closed-pool error.
//!
//! Stage workers never hold references to each other, only to the pools;
//! that keeps the request → download → analyze → request cycle acyclic in
//! ownership terms.

mod args;
mod status;
mod summary;
mod workers;

pub use args::{Args, DataArgs, ModuleArgs, ModuleArgsSummary, RequestArgs};
pub use status::{check_status, Status};
pub use summary::{BufferPoolSummary, SchedSummary};

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::info;
use url::Url;

use crate::error::CrawlerError;
use crate::module::{Item, Module, ModuleInstance, ModuleType, Registry, Request, Response};
use crate::pool::BufferPool;
use crate::url_set::UrlSet;
use summary::{buffer_pool_summary, module_summaries};

/// The pipeline orchestrator.
///
/// A scheduler may be re-initialized while settled, started once per
/// initialization, and stopped once per start; every transition is guarded
/// by [`check_status`].
pub struct Scheduler {
    /// Current [`Status`], stored as its numeric form for atomic reads.
    status: AtomicU8,
    /// Serializes status transitions.
    status_lock: Mutex<()>,
    /// Everything `init` builds; swapped wholesale on re-initialization.
    inner: RwLock<Option<Arc<SchedulerInner>>>,
}

pub(crate) struct SchedulerInner {
    pub(crate) request_args: RequestArgs,
    pub(crate) data_args: DataArgs,
    pub(crate) module_args_summary: ModuleArgsSummary,
    /// Accepted primary domains, lowercased at init.
    pub(crate) accepted_domains: Vec<String>,
    pub(crate) max_depth: u32,
    pub(crate) registry: Registry,
    pub(crate) url_set: UrlSet,
    pub(crate) req_pool: Arc<BufferPool<Request>>,
    pub(crate) resp_pool: Arc<BufferPool<Response>>,
    pub(crate) item_pool: Arc<BufferPool<Item>>,
    pub(crate) error_pool: Arc<BufferPool<CrawlerError>>,
    pub(crate) shutdown: AtomicBool,
}

impl SchedulerInner {
    pub(crate) fn cancelled(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl Scheduler {
    /// Creates an uninitialized scheduler.
    pub fn new() -> Self {
        Scheduler {
            status: AtomicU8::new(Status::Uninitialized as u8),
            status_lock: Mutex::new(()),
            inner: RwLock::new(None),
        }
    }

    /// The current lifecycle state.
    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// (Re-)initializes the scheduler with the given arguments.
    ///
    /// Validation failure rolls the status back to what it was; success
    /// leaves the scheduler `Initialized` with fresh pools, a fresh URL-seen
    /// set, and a freshly populated registry.
    pub fn init(
        &self,
        request_args: RequestArgs,
        data_args: DataArgs,
        module_args: ModuleArgs,
    ) -> Result<(), CrawlerError> {
        let previous = self.check_and_set_status(Status::Initializing)?;
        info!("initializing the scheduler");
        match build_inner(request_args, data_args, module_args) {
            Ok(inner) => {
                *self.inner.write() = Some(inner);
                self.set_status(Status::Initialized);
                info!("the scheduler has been initialized");
                Ok(())
            }
            Err(e) => {
                self.set_status(previous);
                Err(e)
            }
        }
    }

    /// Starts the crawl with the given seed URL.
    ///
    /// The seed must address a host inside the accepted domains; it enters
    /// the request pool at depth zero once the stage workers are running.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, first_url: Url) -> Result<(), CrawlerError> {
        let previous = self.check_and_set_status(Status::Starting)?;
        info!(url = %first_url, "starting the scheduler");
        let inner = match self.prepare_start(&first_url) {
            Ok(inner) => inner,
            Err(e) => {
                self.set_status(previous);
                return Err(e);
            }
        };
        self.set_status(Status::Started);
        workers::check_and_send_req(&inner, Request::new(first_url, 0));
        Ok(())
    }

    fn prepare_start(&self, first_url: &Url) -> Result<Arc<SchedulerInner>, CrawlerError> {
        if !first_url.has_host() || !matches!(first_url.scheme(), "http" | "https") {
            return Err(CrawlerError::illegal_parameter(format!(
                "invalid first URL: {first_url}"
            )));
        }
        let inner = self
            .inner
            .read()
            .clone()
            .ok_or_else(|| CrawlerError::scheduler("the scheduler has not been initialized!"))?;
        let host = first_url.host_str().unwrap_or_default();
        if !host_accepted(&inner.accepted_domains, host) {
            return Err(CrawlerError::illegal_parameter(format!(
                "unacceptable domain for first URL: {host}"
            )));
        }
        inner.shutdown.store(false, Ordering::SeqCst);
        workers::spawn_stages(&inner);
        Ok(inner)
    }

    /// Stops the crawl: cancels the workers and closes every pool.
    ///
    /// Legal only while `Started`. Workers blocked on a pool wake with a
    /// closed-pool error and exit; in-flight downloads and analyses run to
    /// completion and their results are discarded by the closed pools.
    pub fn stop(&self) -> Result<(), CrawlerError> {
        let previous = self.check_and_set_status(Status::Stopping)?;
        info!("stopping the scheduler");
        match self.do_stop() {
            Ok(()) => {
                self.set_status(Status::Stopped);
                info!("the scheduler has been stopped");
                Ok(())
            }
            Err(e) => {
                self.set_status(previous);
                Err(e)
            }
        }
    }

    fn do_stop(&self) -> Result<(), CrawlerError> {
        let inner = self
            .inner
            .read()
            .clone()
            .ok_or_else(|| CrawlerError::scheduler("the scheduler has not been initialized!"))?;
        inner.shutdown.store(true, Ordering::SeqCst);
        inner.req_pool.close();
        inner.resp_pool.close();
        inner.item_pool.close();
        inner.error_pool.close();
        Ok(())
    }

    /// Whether no data sits in any pool and no module is handling anything.
    pub fn idle(&self) -> bool {
        let inner = { self.inner.read().clone() };
        let Some(inner) = inner else {
            return true;
        };
        for instance in inner.registry.get_all().values() {
            if instance.as_module().handling_number() > 0 {
                return false;
            }
        }
        inner.req_pool.total() == 0
            && inner.resp_pool.total() == 0
            && inner.item_pool.total() == 0
            && inner.error_pool.total() == 0
    }

    /// The outbound error channel.
    ///
    /// Each call spawns a forwarder that drains the error pool into a fresh
    /// buffered channel; the channel closes when the scheduler stops and the
    /// pool drains. `None` before the first successful `init`.
    pub fn error_chan(&self) -> Option<kanal::AsyncReceiver<CrawlerError>> {
        let inner = self.inner.read().clone()?;
        let (tx, rx) = kanal::bounded_async(inner.data_args.error_buffer_cap as usize);
        tokio::spawn(async move {
            loop {
                if inner.cancelled() {
                    break;
                }
                match inner.error_pool.get().await {
                    Ok(err) => {
                        if inner.cancelled() {
                            break;
                        }
                        if tx.send(err).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        Some(rx)
    }

    /// A structured snapshot of the scheduler. `None` before the first
    /// successful `init`.
    pub fn summary(&self) -> Option<SchedSummary> {
        let inner = self.inner.read().clone()?;
        Some(SchedSummary {
            request_args: inner.request_args.clone(),
            data_args: inner.data_args,
            module_args: inner.module_args_summary,
            status: self.status().to_string(),
            downloaders: module_summaries(&inner.registry, ModuleType::Downloader),
            analyzers: module_summaries(&inner.registry, ModuleType::Analyzer),
            pipelines: module_summaries(&inner.registry, ModuleType::Pipeline),
            request_buffer_pool: buffer_pool_summary(&inner.req_pool),
            response_buffer_pool: buffer_pool_summary(&inner.resp_pool),
            item_buffer_pool: buffer_pool_summary(&inner.item_pool),
            error_buffer_pool: buffer_pool_summary(&inner.error_pool),
            url_number: inner.url_set.len(),
        })
    }

    /// Enters a transitional state, returning the previous settled state for
    /// rollback.
    fn check_and_set_status(&self, wanted: Status) -> Result<Status, CrawlerError> {
        let _serialized = self.status_lock.lock();
        let current = self.status();
        check_status(current, wanted)?;
        self.status.store(wanted as u8, Ordering::SeqCst);
        Ok(current)
    }

    fn set_status(&self, status: Status) {
        let _serialized = self.status_lock.lock();
        self.status.store(status as u8, Ordering::SeqCst);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

fn build_inner(
    request_args: RequestArgs,
    data_args: DataArgs,
    module_args: ModuleArgs,
) -> Result<Arc<SchedulerInner>, CrawlerError> {
    request_args.check()?;
    data_args.check()?;
    module_args.check()?;

    let req_pool = Arc::new(BufferPool::new(
        data_args.req_buffer_cap,
        data_args.req_max_buffer_number,
    )?);
    let resp_pool = Arc::new(BufferPool::new(
        data_args.resp_buffer_cap,
        data_args.resp_max_buffer_number,
    )?);
    let item_pool = Arc::new(BufferPool::new(
        data_args.item_buffer_cap,
        data_args.item_max_buffer_number,
    )?);
    let error_pool = Arc::new(BufferPool::new(
        data_args.error_buffer_cap,
        data_args.error_max_buffer_number,
    )?);

    let registry = Registry::new();
    register_modules(&registry, &module_args)?;

    let accepted_domains = request_args
        .accepted_domains
        .iter()
        .map(|domain| domain.to_ascii_lowercase())
        .collect();

    Ok(Arc::new(SchedulerInner {
        max_depth: request_args.max_depth,
        module_args_summary: module_args.summary(),
        accepted_domains,
        request_args,
        data_args,
        registry,
        url_set: UrlSet::new(),
        req_pool,
        resp_pool,
        item_pool,
        error_pool,
        shutdown: AtomicBool::new(false),
    }))
}

fn register_modules(registry: &Registry, module_args: &ModuleArgs) -> Result<(), CrawlerError> {
    for downloader in &module_args.downloaders {
        if !registry.register(ModuleInstance::Downloader(downloader.clone()))? {
            return Err(CrawlerError::scheduler(format!(
                "couldn't register downloader instance with MID {}",
                downloader.id()
            )));
        }
    }
    for analyzer in &module_args.analyzers {
        if !registry.register(ModuleInstance::Analyzer(analyzer.clone()))? {
            return Err(CrawlerError::scheduler(format!(
                "couldn't register analyzer instance with MID {}",
                analyzer.id()
            )));
        }
    }
    for pipeline in &module_args.pipelines {
        if !registry.register(ModuleInstance::Pipeline(pipeline.clone()))? {
            return Err(CrawlerError::scheduler(format!(
                "couldn't register pipeline instance with MID {}",
                pipeline.id()
            )));
        }
    }
    info!(
        downloaders = module_args.downloaders.len(),
        analyzers = module_args.analyzers.len(),
        pipelines = module_args.pipelines.len(),
        "modules registered"
    );
    Ok(())
}

/// Whether a host falls under one of the accepted primary domains.
///
/// Matching is a case-insensitive suffix check on a label boundary, so
/// `news.example.test` matches `example.test` but `badexample.test` does not.
pub(crate) fn host_accepted(domains: &[String], host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    domains.iter().any(|domain| {
        host == *domain
            || (host.len() > domain.len()
                && host.ends_with(domain.as_str())
                && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
    })
}
