//! Pluggable modules and the data they exchange.
//!
//! A module is a downloader, analyzer, or pipeline replica: it carries an
//! identity, atomic usage counters, and a load score the registry uses for
//! least-loaded selection. The data model is a tagged sum — requests,
//! responses, and extracted items — routed by variant, never by reflection.

mod analyzer;
mod base;
mod downloader;
mod mid;
mod registry;
mod score;
mod pipeline;

pub use analyzer::BasicAnalyzer;
pub use base::{HandlingGuard, ModuleBase};
pub use downloader::HttpDownloader;
pub use mid::{Mid, ModuleType, SnGenerator};
pub use registry::{ModuleInstance, Registry};
pub use score::{calculate_score_simple, refresh_score};
pub use pipeline::BasicPipeline;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::Serialize;
use url::Url;

use crate::error::CrawlerError;

/// A one-shot snapshot of a module's internal counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// How often the module was called.
    pub called_count: u64,
    /// How many calls the module accepted after validation.
    pub accepted_count: u64,
    /// How many accepted calls completed successfully.
    pub completed_count: u64,
    /// How many calls are in flight right now.
    pub handling_number: u64,
}

/// Serializable module summary, embedded in the scheduler summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleSummary {
    pub id: Mid,
    pub called: u64,
    pub accepted: u64,
    pub completed: u64,
    pub handling: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// A pluggable load-score function over a module's counts.
pub type CalculateScore = Arc<dyn Fn(Counts) -> u64 + Send + Sync>;

/// Capabilities shared by every module. Implementations must be
/// concurrency-safe; all counter accesses are atomic.
pub trait Module: Send + Sync {
    /// The module's id.
    fn id(&self) -> &Mid;

    /// The module's network address in string form, empty for local modules.
    fn addr(&self) -> &str;

    /// The stored load score.
    fn score(&self) -> u64;

    /// Stores a new load score.
    fn set_score(&self, score: u64);

    /// The module's score function, if one was supplied.
    fn score_calculator(&self) -> Option<CalculateScore>;

    fn called_count(&self) -> u64;

    fn accepted_count(&self) -> u64;

    fn completed_count(&self) -> u64;

    fn handling_number(&self) -> u64;

    /// All counters in one consistent read.
    fn counts(&self) -> Counts;

    /// A serializable summary of the module.
    fn summary(&self) -> ModuleSummary;
}

/// A downloader turns a request into a response.
#[async_trait]
pub trait Downloader: Module {
    async fn download(&self, req: Request) -> Result<Response, CrawlerError>;
}

/// An analyzer turns a response into further requests and extracted items.
#[async_trait]
pub trait Analyzer: Module {
    /// The response parsers this analyzer runs, as a copied list.
    fn resp_parsers(&self) -> Vec<ParseResponse>;

    /// Runs every parser against the response and concatenates the results.
    async fn analyze(&self, resp: Response) -> (Vec<Data>, Vec<CrawlerError>);
}

/// A pipeline feeds an item through its processors in order.
#[async_trait]
pub trait Pipeline: Module {
    /// The item processors this pipeline runs, as a copied list.
    fn item_processors(&self) -> Vec<ProcessItem>;

    /// Sends an item through the processor chain.
    async fn send(&self, item: Item) -> Vec<CrawlerError>;

    /// Whether the first processor error aborts the chain.
    fn fail_fast(&self) -> bool;

    fn set_fail_fast(&self, fail_fast: bool);
}

/// Parses an HTTP response at a given depth into data and errors.
pub type ParseResponse =
    Arc<dyn Fn(&Response, u32) -> (Vec<Data>, Vec<CrawlerError>) + Send + Sync>;

/// Processes an item, optionally replacing it for the next step.
pub type ProcessItem =
    Arc<dyn Fn(Item) -> (Option<Item>, Option<CrawlerError>) + Send + Sync>;

/// An HTTP request tagged with its crawl depth.
#[derive(Debug, Clone)]
pub struct Request {
    url: Url,
    depth: u32,
}

impl Request {
    pub fn new(url: Url, depth: u32) -> Self {
        Request { url, depth }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Distance in request hops from the seed.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// A request is valid when it addresses an http(s) host.
    pub fn valid(&self) -> bool {
        self.url.has_host() && matches!(self.url.scheme(), "http" | "https")
    }
}

/// An HTTP response tagged with the depth of the request it answers.
#[derive(Debug, Clone)]
pub struct Response {
    url: Url,
    status: StatusCode,
    body: Bytes,
    depth: u32,
}

impl Response {
    pub fn new(url: Url, status: StatusCode, body: Bytes, depth: u32) -> Self {
        Response {
            url,
            status,
            body,
            depth,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The fully buffered body. Every parser reads from the same bytes, so
    /// the network payload is consumed exactly once per response.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn valid(&self) -> bool {
        !self.body.is_empty()
    }
}

/// An extracted item: an opaque mapping from field name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item(HashMap<String, serde_json::Value>);

impl Item {
    pub fn new() -> Self {
        Item::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// An item is valid when it carries at least one field.
    pub fn valid(&self) -> bool {
        !self.0.is_empty()
    }
}

impl From<HashMap<String, serde_json::Value>> for Item {
    fn from(map: HashMap<String, serde_json::Value>) -> Self {
        Item(map)
    }
}

impl IntoIterator for Item {
    type Item = (String, serde_json::Value);
    type IntoIter = std::collections::hash_map::IntoIter<String, serde_json::Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// The sum of everything that flows between stages.
#[derive(Debug, Clone)]
pub enum Data {
    Request(Request),
    Response(Response),
    Item(Item),
}

impl Data {
    /// Whether the carried value is valid for its variant.
    pub fn valid(&self) -> bool {
        match self {
            Data::Request(req) => req.valid(),
            Data::Response(resp) => resp.valid(),
            Data::Item(item) => item.valid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_validity_follows_scheme_and_host() {
        let req = Request::new(Url::parse("http://example.test/a").unwrap(), 1);
        assert!(req.valid());
        assert_eq!(req.depth(), 1);

        let ftp = Request::new(Url::parse("ftp://example.test/a").unwrap(), 0);
        assert!(!ftp.valid());

        let no_host = Request::new(Url::parse("data:text/plain,hi").unwrap(), 0);
        assert!(!no_host.valid());
    }

    #[test]
    fn response_validity_follows_body() {
        let url = Url::parse("http://example.test/").unwrap();
        let full = Response::new(url.clone(), StatusCode::OK, Bytes::from_static(b"x"), 0);
        assert!(full.valid());
        let empty = Response::new(url, StatusCode::OK, Bytes::new(), 0);
        assert!(!empty.valid());
    }

    #[test]
    fn item_validity_follows_contents() {
        let mut item = Item::new();
        assert!(!item.valid());
        item.insert("title", "hello");
        assert!(item.valid());
        assert_eq!(item.get("title"), Some(&serde_json::json!("hello")));
    }

    #[test]
    fn data_routes_validity_by_variant() {
        let req = Request::new(Url::parse("http://example.test/").unwrap(), 0);
        assert!(Data::Request(req).valid());
        assert!(!Data::Item(Item::new()).valid());
    }
}
