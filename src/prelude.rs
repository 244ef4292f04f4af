//! A "prelude" for users of the `crawler-core` crate.
//!
//! Re-exports the traits, structs, and function types most implementations
//! need, so they can be imported in one line.
//!
//! # Example
//!
//! ```
//! use crawler_core::prelude::*;
//! ```

pub use crate::error::CrawlerError;
pub use crate::module::{
    Analyzer, BasicAnalyzer, BasicPipeline, Data, Downloader, HttpDownloader, Item, Mid, Module,
    ModuleType, ParseResponse, Pipeline, ProcessItem, Request, Response,
};
pub use crate::monitor::{monitor, Record};
pub use crate::scheduler::{DataArgs, ModuleArgs, RequestArgs, SchedSummary, Scheduler, Status};
pub use crate::{async_trait, Url};
