//! # crawler-core
//!
//! A concurrent, modular web-crawling engine.
//!
//! Given a seed URL, a maximum crawl depth, and a set of accepted primary
//! domains, the [`Scheduler`] discovers further requests by downloading
//! responses, analyzing them into new requests and extractable items, and
//! pushing items through a processing pipeline — all concurrently, under
//! backpressure from elastic [`BufferPool`]s, with failure reporting over an
//! error channel, URL deduplication, and health-based load balancing across
//! pluggable module replicas.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use crawler_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CrawlerError> {
//!     let downloader = Arc::new(HttpDownloader::new(
//!         Mid::new(ModuleType::Downloader, 1, None),
//!         reqwest::Client::new(),
//!         None,
//!     ));
//!     let analyzer = Arc::new(BasicAnalyzer::new(
//!         Mid::new(ModuleType::Analyzer, 1, None),
//!         vec![my_link_parser()],
//!         None,
//!     )?);
//!     let pipeline = Arc::new(BasicPipeline::new(
//!         Mid::new(ModuleType::Pipeline, 1, None),
//!         vec![my_item_sink()],
//!         None,
//!     )?);
//!
//!     let scheduler = Arc::new(Scheduler::new());
//!     scheduler.init(
//!         RequestArgs { accepted_domains: vec!["example.test".into()], max_depth: 3 },
//!         my_data_args(),
//!         ModuleArgs {
//!             downloaders: vec![downloader],
//!             analyzers: vec![analyzer],
//!             pipelines: vec![pipeline],
//!         },
//!     )?;
//!     scheduler.start("http://example.test/".parse().unwrap())?;
//!
//!     let checks = monitor(
//!         scheduler,
//!         std::time::Duration::from_millis(200),
//!         std::time::Duration::from_secs(1),
//!         10,
//!         true,
//!         Arc::new(|level, msg| println!("[{level}] {msg}")),
//!     );
//!     checks.recv().await.ok();
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod error;
pub mod module;
pub mod monitor;
pub mod pool;
pub mod prelude;
pub mod scheduler;
pub mod url_set;

pub use buffer::{Buffer, BufferError, PutStatus};
pub use error::CrawlerError;
pub use module::{
    Analyzer, BasicAnalyzer, BasicPipeline, CalculateScore, Counts, Data, Downloader,
    HandlingGuard, HttpDownloader, Item, Mid, Module, ModuleBase, ModuleInstance, ModuleSummary,
    ModuleType, ParseResponse, Pipeline, ProcessItem, Registry, Request, Response, SnGenerator,
};
pub use monitor::{monitor, Record};
pub use pool::BufferPool;
pub use scheduler::{
    Args, DataArgs, ModuleArgs, ModuleArgsSummary, RequestArgs, SchedSummary, Scheduler, Status,
};
pub use url_set::UrlSet;

pub use async_trait::async_trait;
pub use bytes::Bytes;
pub use kanal;
pub use reqwest;
pub use tokio;
pub use url::Url;
