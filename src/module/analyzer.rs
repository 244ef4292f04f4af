//! The response analyzer module.

use async_trait::async_trait;
use tracing::debug;

use super::base::impl_module_delegation;
use super::{Analyzer, CalculateScore, Data, Mid, ModuleBase, ParseResponse, Request, Response};
use crate::error::CrawlerError;

fn gen_parameter_error(msg: &str) -> CrawlerError {
    CrawlerError::analyzer(format!("illegal parameter: {msg}"))
}

/// An analyzer that runs a fixed list of response parsers.
///
/// The response body is already fully buffered, so every parser reads the
/// same bytes without re-draining anything.
pub struct BasicAnalyzer {
    base: ModuleBase,
    resp_parsers: Vec<ParseResponse>,
}

impl_module_delegation!(BasicAnalyzer);

impl BasicAnalyzer {
    pub fn new(
        mid: Mid,
        resp_parsers: Vec<ParseResponse>,
        score_calculator: Option<CalculateScore>,
    ) -> Result<Self, CrawlerError> {
        if resp_parsers.is_empty() {
            return Err(gen_parameter_error("empty response parser list"));
        }
        Ok(BasicAnalyzer {
            base: ModuleBase::new(mid, score_calculator),
            resp_parsers,
        })
    }
}

#[async_trait]
impl Analyzer for BasicAnalyzer {
    fn resp_parsers(&self) -> Vec<ParseResponse> {
        self.resp_parsers.clone()
    }

    async fn analyze(&self, resp: Response) -> (Vec<Data>, Vec<CrawlerError>) {
        let _handling = self.base.handling_guard();
        self.base.incr_called_count();
        if !resp.valid() {
            return (Vec::new(), vec![gen_parameter_error("invalid response")]);
        }
        self.base.incr_accepted_count();
        let resp_depth = resp.depth();
        debug!(url = %resp.url(), depth = resp_depth, "analyzing response");

        let mut data_list = Vec::new();
        let mut error_list = Vec::new();
        for parser in &self.resp_parsers {
            let (parsed, errors) = parser(&resp, resp_depth);
            for data in parsed {
                append_data(&mut data_list, data, resp_depth);
            }
            error_list.extend(errors);
        }
        if error_list.is_empty() {
            self.base.incr_completed_count();
        }
        (data_list, error_list)
    }
}

/// Adds parsed data to the list, forcing any request onto the next depth.
fn append_data(data_list: &mut Vec<Data>, data: Data, resp_depth: u32) {
    match data {
        Data::Request(req) => {
            let new_depth = resp_depth + 1;
            let req = if req.depth() != new_depth {
                Request::new(req.url().clone(), new_depth)
            } else {
                req
            };
            data_list.push(Data::Request(req));
        }
        other => data_list.push(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Item, Module, ModuleType};
    use bytes::Bytes;
    use reqwest::StatusCode;
    use std::sync::Arc;
    use url::Url;

    fn response(depth: u32) -> Response {
        Response::new(
            Url::parse("http://example.test/page").unwrap(),
            StatusCode::OK,
            Bytes::from_static(b"<a href=\"/next\">next</a>"),
            depth,
        )
    }

    fn link_parser() -> ParseResponse {
        Arc::new(|resp, depth| {
            let next = resp.url().join("/next").unwrap();
            // Deliberately wrong depth: the analyzer must correct it.
            let req = Request::new(next, depth + 5);
            let mut item = Item::new();
            item.insert("source", resp.url().as_str());
            (vec![Data::Request(req), Data::Item(item)], Vec::new())
        })
    }

    #[test]
    fn rejects_empty_parser_list() {
        let err = BasicAnalyzer::new(Mid::new(ModuleType::Analyzer, 1, None), Vec::new(), None)
            .err()
            .unwrap();
        assert!(err.to_string().contains("empty response parser list"));
    }

    #[tokio::test]
    async fn rewrites_request_depth_and_completes() {
        let analyzer = BasicAnalyzer::new(
            Mid::new(ModuleType::Analyzer, 1, None),
            vec![link_parser()],
            None,
        )
        .unwrap();
        let (data, errors) = analyzer.analyze(response(3)).await;
        assert!(errors.is_empty());
        assert_eq!(data.len(), 2);
        match &data[0] {
            Data::Request(req) => assert_eq!(req.depth(), 4),
            other => panic!("expected a request, got {other:?}"),
        }
        assert_eq!(analyzer.called_count(), 1);
        assert_eq!(analyzer.accepted_count(), 1);
        assert_eq!(analyzer.completed_count(), 1);
        assert_eq!(analyzer.handling_number(), 0);
    }

    #[tokio::test]
    async fn parser_errors_suppress_completed() {
        let failing: ParseResponse = Arc::new(|_, _| {
            (
                Vec::new(),
                vec![CrawlerError::analyzer("parse failed")],
            )
        });
        let analyzer = BasicAnalyzer::new(
            Mid::new(ModuleType::Analyzer, 2, None),
            vec![link_parser(), failing],
            None,
        )
        .unwrap();
        let (data, errors) = analyzer.analyze(response(0)).await;
        assert_eq!(data.len(), 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(analyzer.completed_count(), 0);
        assert_eq!(analyzer.accepted_count(), 1);
    }

    #[tokio::test]
    async fn invalid_response_is_a_parameter_error() {
        let analyzer = BasicAnalyzer::new(
            Mid::new(ModuleType::Analyzer, 3, None),
            vec![link_parser()],
            None,
        )
        .unwrap();
        let empty = Response::new(
            Url::parse("http://example.test/").unwrap(),
            StatusCode::OK,
            Bytes::new(),
            0,
        );
        let (data, errors) = analyzer.analyze(empty).await;
        assert!(data.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("illegal parameter"));
        assert_eq!(analyzer.accepted_count(), 0);
    }

    #[test]
    fn parser_list_is_copied_out() {
        let analyzer = BasicAnalyzer::new(
            Mid::new(ModuleType::Analyzer, 4, None),
            vec![link_parser(), link_parser()],
            None,
        )
        .unwrap();
        assert_eq!(analyzer.resp_parsers().len(), 2);
    }
}
