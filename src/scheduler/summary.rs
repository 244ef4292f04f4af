//! Structured scheduler status snapshots.

use serde::Serialize;

use super::args::{DataArgs, ModuleArgsSummary, RequestArgs};
use crate::module::{Module, ModuleSummary, ModuleType, Registry};
use crate::pool::BufferPool;

/// A point-in-time snapshot of the whole scheduler.
///
/// Field names are the wire format emitted by the monitor; equality is what
/// gates repeated recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedSummary {
    pub request_args: RequestArgs,
    pub data_args: DataArgs,
    pub module_args: ModuleArgsSummary,
    pub status: String,
    pub downloaders: Vec<ModuleSummary>,
    pub analyzers: Vec<ModuleSummary>,
    pub pipelines: Vec<ModuleSummary>,
    pub request_buffer_pool: BufferPoolSummary,
    pub response_buffer_pool: BufferPoolSummary,
    pub item_buffer_pool: BufferPoolSummary,
    pub error_buffer_pool: BufferPoolSummary,
    pub url_number: u64,
}

impl SchedSummary {
    /// The indented JSON form of the snapshot.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A snapshot of one buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferPoolSummary {
    pub buffer_cap: u32,
    pub max_buffer_number: u32,
    pub buffer_number: u32,
    pub total: u64,
}

/// Summarizes one buffer pool.
pub(crate) fn buffer_pool_summary<T>(pool: &BufferPool<T>) -> BufferPoolSummary {
    BufferPoolSummary {
        buffer_cap: pool.buffer_cap(),
        max_buffer_number: pool.max_buffer_number(),
        buffer_number: pool.buffer_number(),
        total: pool.total(),
    }
}

/// Summaries of every registered module of one role, sorted by id.
pub(crate) fn module_summaries(registry: &Registry, module_type: ModuleType) -> Vec<ModuleSummary> {
    let mut summaries: Vec<ModuleSummary> = registry
        .get_all_by_type(module_type)
        .map(|modules| {
            modules
                .values()
                .map(|instance| instance.as_module().summary())
                .collect()
        })
        .unwrap_or_default();
    summaries.sort_by_key(|summary| summary.id.to_string());
    summaries
}
