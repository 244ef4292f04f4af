//! Module registration and least-loaded selection.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{refresh_score, Analyzer, Downloader, Mid, Module, ModuleType, Pipeline};
use crate::error::CrawlerError;

/// A registered module replica, tagged by role.
#[derive(Clone)]
pub enum ModuleInstance {
    Downloader(Arc<dyn Downloader>),
    Analyzer(Arc<dyn Analyzer>),
    Pipeline(Arc<dyn Pipeline>),
}

impl ModuleInstance {
    /// The role this instance actually implements.
    pub fn module_type(&self) -> ModuleType {
        match self {
            ModuleInstance::Downloader(_) => ModuleType::Downloader,
            ModuleInstance::Analyzer(_) => ModuleType::Analyzer,
            ModuleInstance::Pipeline(_) => ModuleType::Pipeline,
        }
    }

    /// The shared module view of the instance.
    pub fn as_module(&self) -> &dyn Module {
        match self {
            ModuleInstance::Downloader(d) => d.as_ref(),
            ModuleInstance::Analyzer(a) => a.as_ref(),
            ModuleInstance::Pipeline(p) => p.as_ref(),
        }
    }
}

/// Tables of registered modules, keyed by role then id.
///
/// Reads (selection included) take the shared lock; `register`,
/// `unregister`, and `clear` take the exclusive lock.
#[derive(Default)]
pub struct Registry {
    module_type_map: RwLock<HashMap<ModuleType, HashMap<Mid, ModuleInstance>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Registers a module instance.
    ///
    /// Rejects instances whose id letter disagrees with their actual role
    /// and reports duplicates as `Ok(false)`.
    pub fn register(&self, instance: ModuleInstance) -> Result<bool, CrawlerError> {
        let mid = instance.as_module().id().clone();
        if mid.module_type() != instance.module_type() {
            return Err(CrawlerError::illegal_parameter(format!(
                "incorrect module type: {}",
                mid.module_type()
            )));
        }
        let mut map = self.module_type_map.write();
        let modules = map.entry(instance.module_type()).or_default();
        if modules.contains_key(&mid) {
            return Ok(false);
        }
        modules.insert(mid, instance);
        Ok(true)
    }

    /// Removes a module by id; reports whether anything was removed.
    pub fn unregister(&self, mid: &Mid) -> bool {
        let mut map = self.module_type_map.write();
        map.get_mut(&mid.module_type())
            .map(|modules| modules.remove(mid).is_some())
            .unwrap_or(false)
    }

    /// Selects the least-loaded module of the given role.
    ///
    /// Every candidate's score is refreshed, then the stored scores are
    /// compared; ties fall to iteration order.
    pub fn get(&self, module_type: ModuleType) -> Result<ModuleInstance, CrawlerError> {
        let map = self.module_type_map.read();
        let modules = map
            .get(&module_type)
            .filter(|modules| !modules.is_empty())
            .ok_or(CrawlerError::NotFoundModule)?;
        let mut selected: Option<(u64, &ModuleInstance)> = None;
        for instance in modules.values() {
            refresh_score(instance.as_module());
            let score = instance.as_module().score();
            match selected {
                Some((min, _)) if score >= min => {}
                _ => selected = Some((score, instance)),
            }
        }
        selected
            .map(|(_, instance)| instance.clone())
            .ok_or(CrawlerError::NotFoundModule)
    }

    /// The least-loaded downloader.
    pub fn get_downloader(&self) -> Result<Arc<dyn Downloader>, CrawlerError> {
        match self.get(ModuleType::Downloader)? {
            ModuleInstance::Downloader(d) => Ok(d),
            _ => Err(CrawlerError::NotFoundModule),
        }
    }

    /// The least-loaded analyzer.
    pub fn get_analyzer(&self) -> Result<Arc<dyn Analyzer>, CrawlerError> {
        match self.get(ModuleType::Analyzer)? {
            ModuleInstance::Analyzer(a) => Ok(a),
            _ => Err(CrawlerError::NotFoundModule),
        }
    }

    /// The least-loaded pipeline.
    pub fn get_pipeline(&self) -> Result<Arc<dyn Pipeline>, CrawlerError> {
        match self.get(ModuleType::Pipeline)? {
            ModuleInstance::Pipeline(p) => Ok(p),
            _ => Err(CrawlerError::NotFoundModule),
        }
    }

    /// A copied table of every module of the given role.
    pub fn get_all_by_type(
        &self,
        module_type: ModuleType,
    ) -> Result<HashMap<Mid, ModuleInstance>, CrawlerError> {
        let map = self.module_type_map.read();
        let modules = map
            .get(&module_type)
            .filter(|modules| !modules.is_empty())
            .ok_or(CrawlerError::NotFoundModule)?;
        Ok(modules.clone())
    }

    /// A copied table of every registered module.
    pub fn get_all(&self) -> HashMap<Mid, ModuleInstance> {
        let map = self.module_type_map.read();
        let mut result = HashMap::new();
        for modules in map.values() {
            for (mid, instance) in modules {
                result.insert(mid.clone(), instance.clone());
            }
        }
        result
    }

    /// Drops every registration.
    pub fn clear(&self) {
        self.module_type_map.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{BasicPipeline, Mid, ModuleBase, ProcessItem};
    use async_trait::async_trait;

    struct StubDownloader {
        base: ModuleBase,
    }

    crate::module::base::impl_module_delegation!(StubDownloader);

    #[async_trait]
    impl Downloader for StubDownloader {
        async fn download(
            &self,
            _req: crate::module::Request,
        ) -> Result<crate::module::Response, CrawlerError> {
            Err(CrawlerError::downloader("stub"))
        }
    }

    fn downloader(sn: u64) -> Arc<StubDownloader> {
        Arc::new(StubDownloader {
            base: ModuleBase::new(Mid::new(ModuleType::Downloader, sn, None), None),
        })
    }

    #[test]
    fn register_rejects_duplicates_without_error() {
        let registry = Registry::new();
        let d = downloader(1);
        assert!(registry
            .register(ModuleInstance::Downloader(d.clone()))
            .unwrap());
        assert!(!registry.register(ModuleInstance::Downloader(d)).unwrap());
    }

    #[test]
    fn register_rejects_mismatched_id_letter() {
        let registry = Registry::new();
        let wrong = Arc::new(StubDownloader {
            base: ModuleBase::new(Mid::new(ModuleType::Analyzer, 1, None), None),
        });
        assert!(matches!(
            registry.register(ModuleInstance::Downloader(wrong)),
            Err(CrawlerError::IllegalParameter(_))
        ));
    }

    #[test]
    fn get_on_empty_type_reports_not_found() {
        let registry = Registry::new();
        assert_eq!(
            registry.get(ModuleType::Downloader).err(),
            Some(CrawlerError::NotFoundModule)
        );
        assert!(registry.get_all_by_type(ModuleType::Pipeline).is_err());
    }

    #[test]
    fn selection_prefers_least_loaded() {
        let registry = Registry::new();
        let idle = downloader(1);
        let busy = downloader(2);
        let mild = downloader(3);
        for _ in 0..3 {
            busy.base.incr_handling_number();
        }
        mild.base.incr_handling_number();
        registry
            .register(ModuleInstance::Downloader(idle.clone()))
            .unwrap();
        registry
            .register(ModuleInstance::Downloader(busy))
            .unwrap();
        registry
            .register(ModuleInstance::Downloader(mild))
            .unwrap();
        let picked = registry.get_downloader().unwrap();
        assert_eq!(picked.id(), idle.base.id());
    }

    #[test]
    fn unregister_and_clear() {
        let registry = Registry::new();
        let d = downloader(7);
        let mid = d.id().clone();
        registry.register(ModuleInstance::Downloader(d)).unwrap();
        assert!(registry.unregister(&mid));
        assert!(!registry.unregister(&mid));

        registry
            .register(ModuleInstance::Downloader(downloader(8)))
            .unwrap();
        let processor: ProcessItem = Arc::new(|item| (Some(item), None));
        let pipeline = BasicPipeline::new(
            Mid::new(ModuleType::Pipeline, 1, None),
            vec![processor],
            None,
        )
        .unwrap();
        registry
            .register(ModuleInstance::Pipeline(Arc::new(pipeline)))
            .unwrap();
        assert_eq!(registry.get_all().len(), 2);
        registry.clear();
        assert!(registry.get_all().is_empty());
    }
}
