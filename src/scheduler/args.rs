//! Scheduler configuration containers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CrawlerError;
use crate::module::{Analyzer, Downloader, Pipeline};

/// A self-checking argument container.
pub trait Args {
    /// Validates the container; `Ok(())` means no problem was found.
    fn check(&self) -> Result<(), CrawlerError>;
}

/// Request-side configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestArgs {
    /// Primary domains requests may target. A host is accepted when it
    /// equals one of these or ends with `"." + domain` (case-insensitive);
    /// an empty list accepts no host at all.
    #[serde(rename = "accepted_primary_domains")]
    pub accepted_domains: Vec<String>,
    /// Requests deeper than this are ignored. Zero fetches only the seed.
    pub max_depth: u32,
}

impl Args for RequestArgs {
    fn check(&self) -> Result<(), CrawlerError> {
        // Any accepted-domain list is usable; an empty one simply rejects
        // every request.
        Ok(())
    }
}

/// Buffer-pool configuration for the four stage channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataArgs {
    pub req_buffer_cap: u32,
    pub req_max_buffer_number: u32,
    pub resp_buffer_cap: u32,
    pub resp_max_buffer_number: u32,
    pub item_buffer_cap: u32,
    pub item_max_buffer_number: u32,
    pub error_buffer_cap: u32,
    pub error_max_buffer_number: u32,
}

impl Args for DataArgs {
    fn check(&self) -> Result<(), CrawlerError> {
        let checks = [
            (self.req_buffer_cap, "zero request buffer capacity"),
            (self.req_max_buffer_number, "zero max request buffer number"),
            (self.resp_buffer_cap, "zero response buffer capacity"),
            (
                self.resp_max_buffer_number,
                "zero max response buffer number",
            ),
            (self.item_buffer_cap, "zero item buffer capacity"),
            (self.item_max_buffer_number, "zero max item buffer number"),
            (self.error_buffer_cap, "zero error buffer capacity"),
            (self.error_max_buffer_number, "zero max error buffer number"),
        ];
        for (value, msg) in checks {
            if value == 0 {
                return Err(CrawlerError::illegal_parameter(msg));
            }
        }
        Ok(())
    }
}

/// The module replicas a scheduler runs with.
#[derive(Clone, Default)]
pub struct ModuleArgs {
    pub downloaders: Vec<Arc<dyn Downloader>>,
    pub analyzers: Vec<Arc<dyn Analyzer>>,
    pub pipelines: Vec<Arc<dyn Pipeline>>,
}

impl Args for ModuleArgs {
    fn check(&self) -> Result<(), CrawlerError> {
        if self.downloaders.is_empty() {
            return Err(CrawlerError::illegal_parameter("empty downloader list"));
        }
        if self.analyzers.is_empty() {
            return Err(CrawlerError::illegal_parameter("empty analyzer list"));
        }
        if self.pipelines.is_empty() {
            return Err(CrawlerError::illegal_parameter("empty pipeline list"));
        }
        Ok(())
    }
}

impl ModuleArgs {
    pub fn summary(&self) -> ModuleArgsSummary {
        ModuleArgsSummary {
            downloader_list_size: self.downloaders.len(),
            analyzer_list_size: self.analyzers.len(),
            pipeline_list_size: self.pipelines.len(),
        }
    }
}

/// Size summary of [`ModuleArgs`], embedded in the scheduler summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleArgsSummary {
    pub downloader_list_size: usize,
    pub analyzer_list_size: usize,
    pub pipeline_list_size: usize,
}
