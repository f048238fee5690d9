//! Factories that turn `[stages.*]` / `[engines.*]` sections into components.
//!
//! Each section names a `type`; the catalog maps that type to a factory.
//! Callers add their own types next to the built-in ones with
//! [`ComponentCatalog::register_stage_kind`] and
//! [`ComponentCatalog::register_engine_kind`].

use crate::config::ComponentConfig;
use crate::engine::{EchoEngine, EngineRef, MockEngine};
use crate::error::{AsrError, Result};
use crate::stage::{GainStage, NormalizeStage, SmoothStage, StageRef};
use std::collections::BTreeMap;

/// Builds a stage from its registered name and configuration section.
pub trait StageFactory: Send + Sync {
    fn create(&self, name: &str, config: &ComponentConfig) -> Result<StageRef>;
}

impl<F> StageFactory for F
where
    F: Fn(&str, &ComponentConfig) -> Result<StageRef> + Send + Sync,
{
    fn create(&self, name: &str, config: &ComponentConfig) -> Result<StageRef> {
        self(name, config)
    }
}

/// Builds an engine from its registered name and configuration section.
///
/// Returning an [`EngineError::ModelUnavailable`](crate::error::EngineError)
/// failure makes the registry skip the engine instead of failing.
pub trait EngineFactory: Send + Sync {
    fn create(&self, name: &str, config: &ComponentConfig) -> Result<EngineRef>;
}

impl<F> EngineFactory for F
where
    F: Fn(&str, &ComponentConfig) -> Result<EngineRef> + Send + Sync,
{
    fn create(&self, name: &str, config: &ComponentConfig) -> Result<EngineRef> {
        self(name, config)
    }
}

#[derive(Default)]
pub struct ComponentCatalog {
    stages: BTreeMap<String, Box<dyn StageFactory>>,
    engines: BTreeMap<String, Box<dyn EngineFactory>>,
}

impl ComponentCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the built-in types: stages `gain`, `smooth`,
    /// `normalize`; engines `echo`, `mock`.
    pub fn with_builtins() -> Self {
        Self::new()
            .register_stage_kind("gain", gain_stage)
            .register_stage_kind("smooth", smooth_stage)
            .register_stage_kind("normalize", normalize_stage)
            .register_engine_kind("echo", echo_engine)
            .register_engine_kind("mock", mock_engine)
    }

    pub fn register_stage_kind(mut self, kind: &str, factory: impl StageFactory + 'static) -> Self {
        self.stages.insert(kind.to_string(), Box::new(factory));
        self
    }

    pub fn register_engine_kind(
        mut self,
        kind: &str,
        factory: impl EngineFactory + 'static,
    ) -> Self {
        self.engines.insert(kind.to_string(), Box::new(factory));
        self
    }

    pub fn create_stage(&self, name: &str, config: &ComponentConfig) -> Result<StageRef> {
        let factory = self
            .stages
            .get(&config.kind)
            .ok_or_else(|| AsrError::UnknownComponentKind {
                section: "stage".to_string(),
                kind: config.kind.clone(),
            })?;
        factory.create(name, config)
    }

    pub fn create_engine(&self, name: &str, config: &ComponentConfig) -> Result<EngineRef> {
        let factory = self
            .engines
            .get(&config.kind)
            .ok_or_else(|| AsrError::UnknownComponentKind {
                section: "engine".to_string(),
                kind: config.kind.clone(),
            })?;
        factory.create(name, config)
    }

    pub fn stage_kinds(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    pub fn engine_kinds(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }
}

fn gain_stage(name: &str, config: &ComponentConfig) -> Result<StageRef> {
    Ok(StageRef::streaming(GainStage::from_config(name, config)?))
}

fn smooth_stage(name: &str, config: &ComponentConfig) -> Result<StageRef> {
    Ok(StageRef::streaming(SmoothStage::from_config(name, config)?))
}

fn normalize_stage(name: &str, config: &ComponentConfig) -> Result<StageRef> {
    Ok(StageRef::batch(NormalizeStage::from_config(name, config)?))
}

fn echo_engine(name: &str, _config: &ComponentConfig) -> Result<EngineRef> {
    Ok(EngineRef::streaming(EchoEngine::new(name)))
}

fn mock_engine(name: &str, config: &ComponentConfig) -> Result<EngineRef> {
    Ok(EngineRef::batch(MockEngine::from_config(name, config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Capability;

    #[test]
    fn builtins_are_listed() {
        let catalog = ComponentCatalog::with_builtins();
        assert_eq!(
            catalog.stage_kinds().collect::<Vec<_>>(),
            vec!["gain", "normalize", "smooth"]
        );
        assert_eq!(
            catalog.engine_kinds().collect::<Vec<_>>(),
            vec!["echo", "mock"]
        );
    }

    #[test]
    fn created_stage_takes_section_name() {
        let catalog = ComponentCatalog::with_builtins();
        let stage = catalog
            .create_stage("loud", &ComponentConfig::new("gain").with("factor", 4.0))
            .unwrap();
        assert_eq!(stage.name(), "loud");
        assert_eq!(stage.capability(), Capability::Streaming);

        let normalize = catalog
            .create_stage("norm", &ComponentConfig::new("normalize"))
            .unwrap();
        assert_eq!(normalize.capability(), Capability::Batch);
    }

    #[test]
    fn unknown_kind_is_reported() {
        let catalog = ComponentCatalog::with_builtins();
        match catalog.create_engine("w", &ComponentConfig::new("whisper")) {
            Err(AsrError::UnknownComponentKind { section, kind }) => {
                assert_eq!(section, "engine");
                assert_eq!(kind, "whisper");
            }
            other => panic!("Expected UnknownComponentKind, got {:?}", other),
        }
    }

    #[test]
    fn custom_kind_can_be_registered() {
        let catalog = ComponentCatalog::new().register_engine_kind(
            "canned",
            |name: &str, _config: &ComponentConfig| -> Result<EngineRef> {
                Ok(EngineRef::batch(MockEngine::new(name).with_response("canned")))
            },
        );
        let engine = catalog
            .create_engine("c", &ComponentConfig::new("canned"))
            .unwrap();
        assert_eq!(engine.name(), "c");
        assert!(!engine.is_streaming_capable());
    }
}
