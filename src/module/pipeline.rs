//! The item-processing pipeline module.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{
    CalculateScore, Counts, Item, Mid, Module, ModuleBase, ModuleSummary, Pipeline, ProcessItem,
};
use crate::error::CrawlerError;

fn gen_parameter_error(msg: &str) -> CrawlerError {
    CrawlerError::pipeline(format!("illegal parameter: {msg}"))
}

/// A pipeline that feeds each item through a fixed processor chain.
pub struct BasicPipeline {
    base: ModuleBase,
    item_processors: Vec<ProcessItem>,
    /// When set, the first processor error aborts the remaining steps.
    fail_fast: AtomicBool,
}

impl BasicPipeline {
    pub fn new(
        mid: Mid,
        item_processors: Vec<ProcessItem>,
        score_calculator: Option<CalculateScore>,
    ) -> Result<Self, CrawlerError> {
        if item_processors.is_empty() {
            return Err(gen_parameter_error("empty item processor list"));
        }
        Ok(BasicPipeline {
            base: ModuleBase::new(mid, score_calculator),
            item_processors,
            fail_fast: AtomicBool::new(false),
        })
    }
}

// Not the delegation macro: the pipeline's summary carries extra fields.
impl Module for BasicPipeline {
    fn id(&self) -> &Mid {
        self.base.id()
    }

    fn addr(&self) -> &str {
        self.base.addr()
    }

    fn score(&self) -> u64 {
        self.base.score()
    }

    fn set_score(&self, score: u64) {
        self.base.set_score(score)
    }

    fn score_calculator(&self) -> Option<CalculateScore> {
        self.base.score_calculator()
    }

    fn called_count(&self) -> u64 {
        self.base.called_count()
    }

    fn accepted_count(&self) -> u64 {
        self.base.accepted_count()
    }

    fn completed_count(&self) -> u64 {
        self.base.completed_count()
    }

    fn handling_number(&self) -> u64 {
        self.base.handling_number()
    }

    fn counts(&self) -> Counts {
        self.base.counts()
    }

    fn summary(&self) -> ModuleSummary {
        let mut summary = self.base.summary();
        summary.extra = Some(json!({
            "fail_fast": self.fail_fast(),
            "processor_number": self.item_processors.len(),
        }));
        summary
    }
}

#[async_trait]
impl Pipeline for BasicPipeline {
    fn item_processors(&self) -> Vec<ProcessItem> {
        self.item_processors.clone()
    }

    async fn send(&self, item: Item) -> Vec<CrawlerError> {
        let _handling = self.base.handling_guard();
        self.base.incr_called_count();
        let mut errors = Vec::new();
        if !item.valid() {
            errors.push(gen_parameter_error("invalid item"));
            return errors;
        }
        self.base.incr_accepted_count();
        debug!(fields = item.len(), "processing item");
        let mut current = item;
        for processor in &self.item_processors {
            let (processed, error) = processor(current.clone());
            if let Some(e) = error {
                errors.push(e);
                if self.fail_fast() {
                    break;
                }
            }
            if let Some(next) = processed {
                current = next;
            }
        }
        if errors.is_empty() {
            self.base.incr_completed_count();
        }
        errors
    }

    fn fail_fast(&self) -> bool {
        self.fail_fast.load(Ordering::SeqCst)
    }

    fn set_fail_fast(&self, fail_fast: bool) {
        self.fail_fast.store(fail_fast, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleType;
    use std::sync::Arc;

    fn tagging_processor(tag: &'static str) -> ProcessItem {
        Arc::new(move |mut item| {
            item.insert(tag, true);
            (Some(item), None)
        })
    }

    fn failing_processor() -> ProcessItem {
        Arc::new(|_| (None, Some(CrawlerError::pipeline("processor failed"))))
    }

    fn item() -> Item {
        let mut item = Item::new();
        item.insert("url", "http://example.test/");
        item
    }

    #[test]
    fn rejects_empty_processor_list() {
        assert!(
            BasicPipeline::new(Mid::new(ModuleType::Pipeline, 1, None), Vec::new(), None).is_err()
        );
    }

    #[tokio::test]
    async fn chains_processors_in_order() {
        let pipeline = BasicPipeline::new(
            Mid::new(ModuleType::Pipeline, 1, None),
            vec![tagging_processor("first"), tagging_processor("second")],
            None,
        )
        .unwrap();
        let errors = pipeline.send(item()).await;
        assert!(errors.is_empty());
        assert_eq!(pipeline.called_count(), 1);
        assert_eq!(pipeline.accepted_count(), 1);
        assert_eq!(pipeline.completed_count(), 1);
    }

    #[tokio::test]
    async fn fail_fast_aborts_the_chain() {
        let pipeline = BasicPipeline::new(
            Mid::new(ModuleType::Pipeline, 2, None),
            vec![failing_processor(), failing_processor()],
            None,
        )
        .unwrap();
        assert_eq!(pipeline.send(item()).await.len(), 2);

        pipeline.set_fail_fast(true);
        assert!(pipeline.fail_fast());
        assert_eq!(pipeline.send(item()).await.len(), 1);
        assert_eq!(pipeline.completed_count(), 0);
    }

    #[tokio::test]
    async fn empty_item_is_a_parameter_error() {
        let pipeline = BasicPipeline::new(
            Mid::new(ModuleType::Pipeline, 3, None),
            vec![tagging_processor("tag")],
            None,
        )
        .unwrap();
        let errors = pipeline.send(Item::new()).await;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("illegal parameter"));
        assert_eq!(pipeline.accepted_count(), 0);
    }

    #[test]
    fn extra_summary_reports_configuration() {
        let pipeline = BasicPipeline::new(
            Mid::new(ModuleType::Pipeline, 4, None),
            vec![tagging_processor("tag")],
            None,
        )
        .unwrap();
        pipeline.set_fail_fast(true);
        let summary = pipeline.summary();
        let extra = summary.extra.unwrap();
        assert_eq!(extra["fail_fast"], true);
        assert_eq!(extra["processor_number"], 1);
    }

    #[test]
    fn processor_list_is_copied_out() {
        let pipeline = BasicPipeline::new(
            Mid::new(ModuleType::Pipeline, 5, None),
            vec![tagging_processor("a"), tagging_processor("b")],
            None,
        )
        .unwrap();
        assert_eq!(pipeline.item_processors().len(), 2);
    }
}
