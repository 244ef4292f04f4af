//! Error taxonomy for the crawling engine.
//!
//! Runtime failures inside a module surface asynchronously through the error
//! pool and the scheduler's error channel; illegal parameters and lifecycle
//! violations surface synchronously from the offending call.

use thiserror::Error;

/// All errors produced by the engine.
///
/// The role-tagged variants (`Downloader`, `Analyzer`, `Pipeline`,
/// `Scheduler`) carry the message of the underlying failure and render with
/// the `crawler error:` prefix so log consumers can route on the text alone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrawlerError {
    /// A downloader failed while fetching a request.
    #[error("crawler error: downloader error: {0}")]
    Downloader(String),

    /// An analyzer or one of its response parsers failed.
    #[error("crawler error: analyzer error: {0}")]
    Analyzer(String),

    /// An item pipeline or one of its processors failed.
    #[error("crawler error: pipeline error: {0}")]
    Pipeline(String),

    /// The scheduler itself failed, including lifecycle violations.
    #[error("crawler error: scheduler error: {0}")]
    Scheduler(String),

    /// An invalid argument reached a constructor or lifecycle call.
    #[error("illegal parameter: {0}")]
    IllegalParameter(String),

    /// The registry holds no module of the requested type.
    #[error("not found module instance")]
    NotFoundModule,
}

impl CrawlerError {
    pub fn downloader(msg: impl Into<String>) -> Self {
        CrawlerError::Downloader(msg.into())
    }

    pub fn analyzer(msg: impl Into<String>) -> Self {
        CrawlerError::Analyzer(msg.into())
    }

    pub fn pipeline(msg: impl Into<String>) -> Self {
        CrawlerError::Pipeline(msg.into())
    }

    pub fn scheduler(msg: impl Into<String>) -> Self {
        CrawlerError::Scheduler(msg.into())
    }

    pub fn illegal_parameter(msg: impl Into<String>) -> Self {
        CrawlerError::IllegalParameter(msg.into())
    }
}
